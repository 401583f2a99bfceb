//! Immutable per-level grid geometry and resource placement.
//! This module owns the single traversability predicate shared by the
//! pathfinder and the reachability engine, so the two can never disagree
//! about what a held key unlocks.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::types::*;

#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
    resources: SlotMap<ResourceId, Resource>,
    spawn: Pos,
    goal: Pos,
}

// Field-wise equality; written by hand because `SlotMap` does not implement
// `PartialEq`, so the derive cannot be used.
impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.tiles == other.tiles
            && self.spawn == other.spawn
            && self.goal == other.goal
            && self.resources.len() == other.resources.len()
            && self
                .resources
                .iter()
                .zip(other.resources.iter())
                .all(|(a, b)| a == b)
    }
}

impl Grid {
    /// Builds the indexed grid from its interchange form, validating
    /// geometry. The grid is immutable afterwards; level patching happens
    /// on the spec side, never here.
    pub fn from_spec(spec: &GridSpec) -> Result<Grid, GridSpecError> {
        if spec.width == 0 || spec.height == 0 {
            return Err(GridSpecError::ZeroArea);
        }

        let in_bounds = |pos: Pos| {
            pos.y >= 0
                && pos.x >= 0
                && (pos.y as usize) < spec.height
                && (pos.x as usize) < spec.width
        };
        let index = |pos: Pos| (pos.y as usize) * spec.width + (pos.x as usize);

        let mut tiles = vec![TileKind::Open; spec.width * spec.height];
        for &pos in &spec.walls {
            if !in_bounds(pos) {
                return Err(GridSpecError::OutOfBounds { pos });
            }
            tiles[index(pos)] = TileKind::Wall;
        }
        for &(pos, door) in &spec.gates {
            if !in_bounds(pos) {
                return Err(GridSpecError::OutOfBounds { pos });
            }
            tiles[index(pos)] = TileKind::Gated(door);
        }

        if !in_bounds(spec.goal) {
            return Err(GridSpecError::OutOfBounds { pos: spec.goal });
        }
        if tiles[index(spec.goal)] != TileKind::Open {
            return Err(GridSpecError::GoalMismatch { pos: spec.goal });
        }
        tiles[index(spec.goal)] = TileKind::Goal;

        if !in_bounds(spec.spawn) {
            return Err(GridSpecError::OutOfBounds { pos: spec.spawn });
        }
        if !matches!(tiles[index(spec.spawn)], TileKind::Open | TileKind::Goal) {
            return Err(GridSpecError::SpawnBlocked { pos: spec.spawn });
        }

        let mut resources = SlotMap::with_key();
        for &(pos, door) in &spec.keys {
            if !in_bounds(pos) {
                return Err(GridSpecError::OutOfBounds { pos });
            }
            if tiles[index(pos)] == TileKind::Wall {
                return Err(GridSpecError::ResourceOnWall { pos });
            }
            resources.insert(Resource { kind: ResourceKind::Key(door), pos, value: 0 });
        }
        for item in &spec.items {
            if !in_bounds(item.pos) {
                return Err(GridSpecError::OutOfBounds { pos: item.pos });
            }
            if tiles[index(item.pos)] == TileKind::Wall {
                return Err(GridSpecError::ResourceOnWall { pos: item.pos });
            }
            resources.insert(Resource { kind: ResourceKind::Item, pos: item.pos, value: item.value });
        }

        Ok(Grid {
            width: spec.width,
            height: spec.height,
            tiles,
            resources,
            spawn: spec.spawn,
            goal: spec.goal,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn spawn(&self) -> Pos {
        self.spawn
    }

    pub fn goal(&self) -> Pos {
        self.goal
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.y >= 0
            && pos.x >= 0
            && (pos.y as usize) < self.height
            && (pos.x as usize) < self.width
    }

    pub fn tile_at(&self, pos: Pos) -> TileKind {
        if !self.in_bounds(pos) {
            return TileKind::Wall;
        }
        self.tiles[(pos.y as usize) * self.width + (pos.x as usize)]
    }

    /// The one walkability rule: open and goal cells always, gated cells
    /// only with the matching key held, walls and out-of-bounds never.
    pub fn traversable(&self, pos: Pos, held: &Possession) -> bool {
        match self.tile_at(pos) {
            TileKind::Open | TileKind::Goal => true,
            TileKind::Gated(door) => held.has_key(door),
            TileKind::Wall => false,
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources.iter()
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resource_at(&self, pos: Pos) -> Option<(ResourceId, &Resource)> {
        self.resources.iter().find(|(_, resource)| resource.pos == pos)
    }

    pub fn key_at(&self, pos: Pos) -> Option<(ResourceId, DoorId)> {
        self.resources.iter().find_map(|(id, resource)| match resource.kind {
            ResourceKind::Key(door) if resource.pos == pos => Some((id, door)),
            _ => None,
        })
    }

    pub fn item_value_at(&self, pos: Pos) -> u32 {
        self.resources
            .iter()
            .filter(|(_, resource)| resource.kind == ResourceKind::Item && resource.pos == pos)
            .map(|(_, resource)| resource.value)
            .sum()
    }

    pub fn key_positions(&self, door: DoorId) -> Vec<Pos> {
        let mut positions: Vec<Pos> = self
            .resources
            .iter()
            .filter(|(_, resource)| resource.kind == ResourceKind::Key(door))
            .map(|(_, resource)| resource.pos)
            .collect();
        positions.sort();
        positions
    }

    pub fn has_key_for(&self, door: DoorId) -> bool {
        !self.key_positions(door).is_empty()
    }

    pub fn doors_present(&self) -> Vec<DoorId> {
        let mut doors: Vec<DoorId> = self
            .tiles
            .iter()
            .filter_map(|tile| match tile {
                TileKind::Gated(door) => Some(*door),
                _ => None,
            })
            .collect();
        doors.sort();
        doors.dedup();
        doors
    }
}

/// Interchange form of a level: plain lists, serde-friendly, authored by
/// generators or hand-written fixtures and validated by `Grid::from_spec`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub spawn: Pos,
    pub goal: Pos,
    #[serde(default)]
    pub walls: Vec<Pos>,
    #[serde(default)]
    pub gates: Vec<(Pos, DoorId)>,
    #[serde(default)]
    pub keys: Vec<(Pos, DoorId)>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub pos: Pos,
    pub value: u32,
}

pub fn neighbors(pos: Pos) -> [Pos; 4] {
    [
        Pos { y: pos.y - 1, x: pos.x },
        Pos { y: pos.y, x: pos.x + 1 },
        Pos { y: pos.y + 1, x: pos.x },
        Pos { y: pos.y, x: pos.x - 1 },
    ]
}

pub fn manhattan(a: Pos, b: Pos) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}
