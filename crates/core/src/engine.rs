//! The decision engine: one `decide` call per world tick.
//! Composition root for the encoder, candidate generator, evaluator,
//! target controller, tile memory, and movement strategy chain. The
//! engine owns no world state beyond the grid; each cycle reads a fresh
//! observation and returns at most one step.

use std::hash::Hasher;

use xxhash_rust::xxh3::Xxh3;

use crate::grid::Grid;
use crate::types::*;

mod candidates;
mod controller;
mod encoder;
mod evaluator;
mod memory;
mod pathfinder;
mod reachability;
#[cfg(test)]
mod test_support;

pub use candidates::{Candidate, Objective, generate_candidates};
pub use controller::{ControllerConfig, TargetController};
pub use encoder::*;
pub use evaluator::{
    Evaluator, EvaluatorConfig, RateTable, Reaction, SCORE_SENTINEL, SimulationResult, score_state,
    simulate,
};
pub use memory::{DecayPolicy, TileMemory};
pub use pathfinder::{
    DirectStrategy, GreedyStrategy, KeySeekStrategy, StepQuery, StepStrategy, StrategyChain,
    astar_path, astar_path_collecting, greedy_step_with_tiebreak, next_step,
};
pub use reachability::{Bounds, is_reachable, nearest_reachable_key, validate_level};

#[derive(Clone, Copy, Debug, Default)]
pub struct EngineConfig {
    pub evaluator: EvaluatorConfig,
    pub controller: ControllerConfig,
    pub memory: DecayPolicy,
    pub bounds: Bounds,
    pub detour_budget: u32,
}

impl EngineConfig {
    pub fn standard() -> EngineConfig {
        EngineConfig { detour_budget: 4, ..EngineConfig::default() }
    }
}

/// Outcome of one decision cycle: which candidate won and the concrete
/// step, if the committed target admits one this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub candidate_id: u32,
    pub description: &'static str,
    pub score: f64,
    pub step: Option<Direction>,
}

pub struct DecisionEngine {
    grid: Grid,
    evaluator: Evaluator,
    controller: TargetController,
    memory: TileMemory,
    chain: StrategyChain,
    tick: u64,
    log: Vec<LogEvent>,
}

impl DecisionEngine {
    pub fn new(grid: Grid, config: EngineConfig) -> DecisionEngine {
        DecisionEngine::with_rate_table(grid, RateTable::standard(), config)
    }

    pub fn with_rate_table(
        grid: Grid,
        table: RateTable,
        config: EngineConfig,
    ) -> DecisionEngine {
        DecisionEngine {
            grid,
            evaluator: Evaluator::new(table, config.evaluator),
            controller: TargetController::new(config.controller),
            memory: TileMemory::new(config.memory),
            chain: StrategyChain::standard(config.detour_budget, config.bounds),
            tick: 0,
            log: Vec::new(),
        }
    }

    /// One full decision cycle: memory upkeep, encode, generate, score,
    /// commit, and resolve a step toward the committed target.
    pub fn decide(&mut self, obs: &Observation) -> Decision {
        self.tick += 1;
        self.memory.decay_cycle();
        self.memory.record_visit(obs.agent_pos);
        for threat in &obs.threats {
            self.memory.mark_danger(threat.pos, f64::from(threat.menace));
        }

        let baseline = encode_state(&self.grid, obs);
        let menu = generate_candidates(&self.grid, obs, &baseline, &self.memory);
        let mut scores = self.evaluator.scores(&baseline, &menu);
        for (index, candidate) in menu.iter().enumerate() {
            scores[index] += self.controller.commitment_bonus_for(candidate);
        }
        let (best, score) = evaluator::pick_best(&scores);
        let winner = &menu[best];

        if let Some(event) = self.controller.note_progress(obs.agent_pos) {
            self.log.push(event);
        }

        if let Some(objective) = winner.objective {
            let committed_score = self.controller.target().and_then(|target| {
                menu.iter()
                    .position(|candidate| {
                        candidate
                            .objective
                            .is_some_and(|o| o.kind == target.kind && o.pos == target.pos)
                    })
                    .map(|index| scores[index])
            });
            if let Some(event) =
                self.controller.consider(self.tick, obs.agent_pos, objective, score, committed_score)
            {
                self.log.push(event);
            }
        }

        let step = self.resolve_step(obs);

        Decision { candidate_id: winner.id, description: winner.description, score, step }
    }

    fn resolve_step(&mut self, obs: &Observation) -> Option<Direction> {
        let target = *self.controller.target()?;
        let query = StepQuery {
            grid: &self.grid,
            start: obs.agent_pos,
            target: target.pos,
            held: &obs.possession,
        };
        match self.chain.resolve(&query) {
            Some((strategy, direction)) => {
                self.log.push(LogEvent::StepResolved { strategy, direction });
                Some(direction)
            }
            None => {
                self.log.push(LogEvent::StepInfeasible { target: target.pos });
                if let Some(event) = self.controller.note_infeasible() {
                    self.log.push(event);
                }
                None
            }
        }
    }

    /// Swaps in a new grid and forgets everything tied to the old one:
    /// cached scores, tile memory, and the committed target.
    pub fn enter_level(&mut self, grid: Grid) {
        self.grid = grid;
        let cache_entries_dropped = self.evaluator.clear_cache();
        self.memory.reset();
        self.controller.reset();
        self.log.push(LogEvent::LevelEntered { cache_entries_dropped });
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn target(&self) -> Option<&Target> {
        self.controller.target()
    }

    pub fn memory(&self) -> &TileMemory {
        &self.memory
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.evaluator.cache_stats()
    }

    pub fn clear_cache(&mut self) -> usize {
        self.evaluator.clear_cache()
    }

    pub fn log(&self) -> &[LogEvent] {
        &self.log
    }

    pub fn drain_log(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.log)
    }

    /// Order-independent digest of the engine's mutable state, for
    /// comparing two runs that should have diverged nowhere.
    pub fn snapshot_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.write_u64(self.tick);
        match self.controller.target() {
            Some(target) => {
                hasher.write_u8(1);
                hasher.write_u8(target_kind_code(target.kind));
                hasher.write_i32(target.pos.y);
                hasher.write_i32(target.pos.x);
                hasher.write_u64(target.tick_set);
                hasher.write_u32(target.distance_at_set);
            }
            None => hasher.write_u8(0),
        }
        for (pos, danger) in self.memory.danger_entries() {
            hasher.write_i32(pos.y);
            hasher.write_i32(pos.x);
            hasher.write_u64(danger.to_bits());
        }
        hasher.finish()
    }
}

fn target_kind_code(kind: TargetKind) -> u8 {
    match kind {
        TargetKind::Goal => 0,
        TargetKind::Key => 1,
        TargetKind::Item => 2,
        TargetKind::Threat => 3,
        TargetKind::Retreat => 4,
    }
}
