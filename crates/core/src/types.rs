use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct ResourceId;
    pub struct EntityId;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub y: i32,
    pub x: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DoorId(pub u8);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Open,
    Wall,
    Gated(DoorId),
    Goal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Key(DoorId),
    Item,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub pos: Pos,
    pub value: u32,
}

/// Keys currently held, counted per door kind. Keys are not consumed by
/// crossing a gate; counts above one only arise from duplicate pickups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Possession {
    keys: BTreeMap<DoorId, u32>,
}

impl Possession {
    pub fn has_key(&self, door: DoorId) -> bool {
        self.keys.get(&door).copied().unwrap_or(0) > 0
    }

    pub fn add_key(&mut self, door: DoorId) {
        *self.keys.entry(door).or_insert(0) += 1;
    }

    pub fn key_count(&self) -> u32 {
        self.keys.values().sum()
    }

    pub fn doors_held(&self) -> impl Iterator<Item = DoorId> + '_ {
        self.keys.iter().filter(|(_, count)| **count > 0).map(|(door, _)| *door)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
        }
    }

    pub fn step_from(self, pos: Pos) -> Pos {
        let (dy, dx) = self.offset();
        Pos { y: pos.y + dy, x: pos.x + dx }
    }

    /// Direction from `from` to an orthogonally adjacent `to`, if any.
    pub fn between(from: Pos, to: Pos) -> Option<Direction> {
        match (to.y - from.y, to.x - from.x) {
            (-1, 0) => Some(Direction::North),
            (0, 1) => Some(Direction::East),
            (1, 0) => Some(Direction::South),
            (0, -1) => Some(Direction::West),
            _ => None,
        }
    }
}

/// Verdict of a reachability query. `Inconclusive` means a search bound was
/// exhausted before either answer could be proven; callers must not treat it
/// as `Unreachable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    Unreachable(UnreachableReason),
    Inconclusive(SearchBound),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnreachableReason {
    /// The goal sits in a region disconnected from the start even with
    /// every gate treated as open.
    DisconnectedRegion,
    /// A required gate has no matching key anywhere in the level.
    NoKeyInLevel(DoorId),
    /// A required key exists but cannot itself be reached.
    KeyUnreachable(DoorId),
    /// Keys and goal are individually reachable but no pickup order
    /// unlocks the goal.
    GateDeadlock(DoorId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchBound {
    States,
    Tokens,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TargetKind {
    Goal,
    Key,
    Item,
    Threat,
    Retreat,
}

/// The one committed navigation target. Owned by the target controller;
/// the controller's commitment state is the only source of truth for the
/// agent's "mode".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub kind: TargetKind,
    pub pos: Pos,
    pub tick_set: u64,
    pub distance_at_set: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbandonCause {
    Reached,
    Infeasible,
    Stale,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEvent {
    TargetCommitted { kind: TargetKind, pos: Pos },
    TargetAbandoned { kind: TargetKind, pos: Pos, cause: AbandonCause },
    LevelEntered { cache_entries_dropped: usize },
    StepResolved { strategy: &'static str, direction: Direction },
    StepInfeasible { target: Pos },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridSpecError {
    ZeroArea,
    OutOfBounds { pos: Pos },
    SpawnBlocked { pos: Pos },
    GoalMismatch { pos: Pos },
    ResourceOnWall { pos: Pos },
}
