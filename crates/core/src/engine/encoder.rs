//! World-snapshot encoding into the named numeric state vector.
//! This module owns the vector schema and its quantization rules; the
//! evaluator's cache keys are only sound because encoding is pure and
//! quantized here, in one place.

use std::collections::BTreeMap;
use std::hash::Hasher;

use xxhash_rust::xxh3::Xxh3;

use super::*;
use crate::grid::{Grid, manhattan};

pub const VAR_HEALTH: &str = "health";
pub const VAR_DIST_TO_GOAL: &str = "dist_to_goal";
pub const VAR_DIST_TO_KEY: &str = "dist_to_key";
pub const VAR_DIST_TO_THREAT: &str = "dist_to_threat";
pub const VAR_THREAT_LEVEL: &str = "threat_level";
pub const VAR_KEYS_HELD: &str = "keys_held";
pub const VAR_WEALTH: &str = "wealth";
pub const VAR_ALIVE: &str = "alive";
pub const VAR_CAN_ATTACK: &str = "can_attack";
pub const VAR_CAN_HEAL: &str = "can_heal";
pub const VAR_CAN_DESCEND: &str = "can_descend";

/// Every variable the encoder may emit. Rate tables are validated against
/// this list at construction time.
pub const SCHEMA: &[&str] = &[
    VAR_HEALTH,
    VAR_DIST_TO_GOAL,
    VAR_DIST_TO_KEY,
    VAR_DIST_TO_THREAT,
    VAR_THREAT_LEVEL,
    VAR_KEYS_HELD,
    VAR_WEALTH,
    VAR_ALIVE,
    VAR_CAN_ATTACK,
    VAR_CAN_HEAL,
    VAR_CAN_DESCEND,
];

/// Values are quantized to this many sub-unit steps before any hashing, so
/// float noise below 1/16 cannot split cache keys.
const QUANT_STEPS: f64 = 16.0;

/// Named nonnegative levels describing the world as the evaluator sees it.
/// Simulation never mutates a vector in place; it always derives new ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateVector {
    levels: BTreeMap<String, f64>,
}

impl StateVector {
    pub fn new() -> StateVector {
        StateVector::default()
    }

    /// Missing variables read as zero, per the scoring contract.
    pub fn get(&self, name: &str) -> f64 {
        self.levels.get(name).copied().unwrap_or(0.0)
    }

    /// Levels are reservoirs; negative amounts are clamped away on entry.
    pub fn set(&mut self, name: &str, value: f64) {
        self.levels.insert(name.to_owned(), value.max(0.0));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.levels.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.levels.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn is_finite(&self) -> bool {
        self.levels.values().all(|value| value.is_finite())
    }

    /// New vector with the delta applied; untouched variables carry over,
    /// results clamp at zero.
    pub fn apply_delta(&self, delta: &Delta) -> StateVector {
        let mut next = self.clone();
        for (name, change) in &delta.changes {
            let value = next.get(name) + change;
            next.set(name, value);
        }
        next
    }

    pub fn quantized_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (name, value) in &self.levels {
            hasher.write(name.as_bytes());
            hasher.write_i64(quantize(*value));
        }
        hasher.finish()
    }
}

/// A hypothesized partial change to a state vector. Changes may be
/// negative; they are applied against the clamp-at-zero rule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Delta {
    changes: BTreeMap<String, f64>,
}

impl Delta {
    pub fn new() -> Delta {
        Delta::default()
    }

    pub fn with(mut self, name: &str, change: f64) -> Delta {
        self.changes.insert(name.to_owned(), change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn quantized_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (name, change) in &self.changes {
            hasher.write(name.as_bytes());
            hasher.write_i64(quantize(*change));
        }
        hasher.finish()
    }
}

fn quantize(value: f64) -> i64 {
    (value * QUANT_STEPS).round() as i64
}

/// One observed hostile entity. `menace` is the caller's scalar danger
/// rating; the encoder only aggregates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreatObs {
    pub id: EntityId,
    pub pos: Pos,
    pub menace: u32,
}

/// Snapshot of the live world handed in once per decision cycle. The
/// engine reads it and never writes back.
#[derive(Clone, Debug)]
pub struct Observation {
    pub agent_pos: Pos,
    pub health: i32,
    pub max_health: i32,
    pub heal_charges: u32,
    /// Accumulated value of items collected so far this level.
    pub wealth: u32,
    pub threats: Vec<ThreatObs>,
    pub possession: Possession,
}

/// Pure encoding of (grid, observation) into the schema above. Distances
/// are Manhattan to match grid movement; everything clamps at zero.
pub fn encode_state(grid: &Grid, obs: &Observation) -> StateVector {
    let mut vector = StateVector::new();

    vector.set(VAR_HEALTH, f64::from(obs.health.max(0)));
    vector.set(VAR_ALIVE, if obs.health > 0 { 1.0 } else { 0.0 });
    vector.set(VAR_DIST_TO_GOAL, f64::from(manhattan(obs.agent_pos, grid.goal())));
    vector.set(VAR_KEYS_HELD, f64::from(obs.possession.key_count()));
    vector.set(VAR_WEALTH, f64::from(obs.wealth));

    if let Some(dist) = nearest_key_distance(grid, obs) {
        vector.set(VAR_DIST_TO_KEY, f64::from(dist));
    }

    let mut threat_level = 0.0;
    let mut nearest_threat: Option<u32> = None;
    for threat in &obs.threats {
        let dist = manhattan(obs.agent_pos, threat.pos);
        threat_level += f64::from(threat.menace) / f64::from(1 + dist);
        nearest_threat = Some(nearest_threat.map_or(dist, |best| best.min(dist)));
    }
    vector.set(VAR_THREAT_LEVEL, threat_level);
    if let Some(dist) = nearest_threat {
        vector.set(VAR_DIST_TO_THREAT, f64::from(dist));
    }

    let adjacent_threat = obs.threats.iter().any(|t| manhattan(obs.agent_pos, t.pos) == 1);
    vector.set(VAR_CAN_ATTACK, if adjacent_threat { 1.0 } else { 0.0 });
    vector.set(
        VAR_CAN_HEAL,
        if obs.heal_charges > 0 && obs.health < obs.max_health { 1.0 } else { 0.0 },
    );
    vector.set(VAR_CAN_DESCEND, if obs.agent_pos == grid.goal() { 1.0 } else { 0.0 });

    vector
}

/// Nearest key the agent does not already hold a copy of; `None` when no
/// such key exists, in which case the variable is omitted entirely.
pub(super) fn nearest_key_distance(grid: &Grid, obs: &Observation) -> Option<u32> {
    grid.resources()
        .filter_map(|(_, resource)| match resource.kind {
            ResourceKind::Key(door) if !obs.possession.has_key(door) => Some(resource.pos),
            _ => None,
        })
        .map(|pos| manhattan(obs.agent_pos, pos))
        .min()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn encoding_is_pure_and_repeatable() {
        let grid = open_grid(8, 8);
        let obs = calm_observation(Pos { y: 2, x: 2 });
        let first = encode_state(&grid, &obs);
        let second = encode_state(&grid, &obs);
        assert_eq!(first, second);
        assert_eq!(first.quantized_hash(), second.quantized_hash());
    }

    #[test]
    fn encoded_schema_has_expected_flags_and_distances() {
        let mut spec = open_spec(8, 8);
        spec.keys.push((Pos { y: 0, x: 4 }, DoorId(0)));
        let grid = crate::grid::Grid::from_spec(&spec).expect("valid spec");

        let mut obs = calm_observation(Pos { y: 0, x: 0 });
        obs.threats.push(ThreatObs { id: EntityId::default(), pos: Pos { y: 0, x: 1 }, menace: 4 });

        let vector = encode_state(&grid, &obs);
        assert_eq!(vector.get(VAR_DIST_TO_GOAL), 14.0);
        assert_eq!(vector.get(VAR_DIST_TO_KEY), 4.0);
        assert_eq!(vector.get(VAR_DIST_TO_THREAT), 1.0);
        assert_eq!(vector.get(VAR_CAN_ATTACK), 1.0);
        assert_eq!(vector.get(VAR_ALIVE), 1.0);
        assert_eq!(vector.get(VAR_THREAT_LEVEL), 2.0);
        assert_eq!(vector.get(VAR_CAN_DESCEND), 0.0);
        for (name, value) in vector.iter() {
            assert!(SCHEMA.contains(&name), "unexpected variable {name}");
            assert!(value >= 0.0, "{name} must be nonnegative");
        }
    }

    #[test]
    fn held_keys_are_excluded_from_key_distance() {
        let mut spec = open_spec(8, 8);
        spec.keys.push((Pos { y: 0, x: 2 }, DoorId(0)));
        spec.keys.push((Pos { y: 0, x: 6 }, DoorId(1)));
        let grid = crate::grid::Grid::from_spec(&spec).expect("valid spec");

        let mut obs = calm_observation(Pos { y: 0, x: 0 });
        obs.possession.add_key(DoorId(0));
        let vector = encode_state(&grid, &obs);
        assert_eq!(vector.get(VAR_DIST_TO_KEY), 6.0);
        assert_eq!(vector.get(VAR_KEYS_HELD), 1.0);
    }

    #[test]
    fn dead_agent_encodes_clamped_health_and_zero_alive() {
        let grid = open_grid(5, 5);
        let mut obs = calm_observation(Pos { y: 1, x: 1 });
        obs.health = -3;
        let vector = encode_state(&grid, &obs);
        assert_eq!(vector.get(VAR_HEALTH), 0.0);
        assert_eq!(vector.get(VAR_ALIVE), 0.0);
    }

    #[test]
    fn delta_application_clamps_at_zero_and_leaves_input_untouched() {
        let mut vector = StateVector::new();
        vector.set(VAR_HEALTH, 2.0);
        let delta = Delta::new().with(VAR_HEALTH, -5.0).with(VAR_KEYS_HELD, 1.0);
        let next = vector.apply_delta(&delta);
        assert_eq!(next.get(VAR_HEALTH), 0.0);
        assert_eq!(next.get(VAR_KEYS_HELD), 1.0);
        assert_eq!(vector.get(VAR_HEALTH), 2.0, "input vector must not be mutated");
    }

    #[test]
    fn sub_quantum_noise_hashes_identically() {
        let mut left = StateVector::new();
        left.set(VAR_HEALTH, 10.0);
        let mut right = StateVector::new();
        right.set(VAR_HEALTH, 10.0 + 1.0e-9);
        assert_eq!(left.quantized_hash(), right.quantized_hash());

        let mut far = StateVector::new();
        far.set(VAR_HEALTH, 10.5);
        assert_ne!(left.quantized_hash(), far.quantized_hash());
    }
}
