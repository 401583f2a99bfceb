//! Decision and navigation core for a key/door-gated grid world.
//! Deterministic by construction: ordered containers everywhere, explicit
//! tie-breaks on (y, x), and a seeded RNG only where a caller asks for
//! randomized tie-breaking.

pub mod engine;
pub mod grid;
pub mod types;

pub use engine::{Decision, DecisionEngine, EngineConfig, Observation, ThreatObs};
pub use grid::{Grid, GridSpec, ItemSpec};
pub use types::*;
