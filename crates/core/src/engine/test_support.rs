//! Shared fixtures for the engine test modules.

use super::*;
use crate::grid::{Grid, GridSpec};

pub(super) use crate::grid::ItemSpec;

/// Fully open grid spec: spawn at the origin, goal in the far corner.
pub(super) fn open_spec(width: usize, height: usize) -> GridSpec {
    GridSpec {
        width,
        height,
        spawn: Pos { y: 0, x: 0 },
        goal: Pos { y: height as i32 - 1, x: width as i32 - 1 },
        ..GridSpec::default()
    }
}

pub(super) fn open_grid(width: usize, height: usize) -> Grid {
    Grid::from_spec(&open_spec(width, height)).expect("open spec is always valid")
}

/// 7x5 grid split by a wall column at x = 3 whose only opening is a
/// door-0 gate at (0, 3). Spawn (0, 0), goal (0, 6); the optional key
/// opens door 0. Returns the grid and the gate position.
pub(super) fn gated_corridor(key_pos: Option<Pos>) -> (Grid, Pos) {
    let gate = Pos { y: 0, x: 3 };
    let mut spec = GridSpec {
        width: 7,
        height: 5,
        spawn: Pos { y: 0, x: 0 },
        goal: Pos { y: 0, x: 6 },
        ..GridSpec::default()
    };
    for y in 1..5 {
        spec.walls.push(Pos { y, x: 3 });
    }
    spec.gates.push((gate, DoorId(0)));
    if let Some(pos) = key_pos {
        spec.keys.push((pos, DoorId(0)));
    }
    (Grid::from_spec(&spec).expect("corridor spec is always valid"), gate)
}

/// Healthy, unthreatened, empty-handed agent at `pos`.
pub(super) fn calm_observation(pos: Pos) -> Observation {
    Observation {
        agent_pos: pos,
        health: 20,
        max_health: 20,
        heal_charges: 0,
        wealth: 0,
        threats: Vec::new(),
        possession: Possession::default(),
    }
}
