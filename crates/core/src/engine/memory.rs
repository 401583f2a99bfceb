//! Bounded, decaying memory of tiles the agent has seen trouble on.
//! The retreat candidate reads danger from here rather than from live
//! observations, so the agent keeps avoiding a cell for a while after the
//! threat that made it dangerous has moved on.

use super::*;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug)]
pub struct DecayPolicy {
    /// Multiplier applied to every danger entry once per decision cycle.
    pub decay: f64,
    /// Entries below this level are forgotten outright.
    pub floor: f64,
    /// Hard cap on remembered tiles per map.
    pub capacity: usize,
}

impl Default for DecayPolicy {
    fn default() -> DecayPolicy {
        DecayPolicy { decay: 0.9, floor: 0.05, capacity: 256 }
    }
}

pub struct TileMemory {
    policy: DecayPolicy,
    danger: BTreeMap<Pos, f64>,
    visits: BTreeMap<Pos, u32>,
}

impl TileMemory {
    pub fn new(policy: DecayPolicy) -> TileMemory {
        assert!(policy.capacity > 0, "tile memory capacity must be positive");
        assert!(
            policy.decay > 0.0 && policy.decay < 1.0,
            "decay must lie strictly between 0 and 1"
        );
        TileMemory { policy, danger: BTreeMap::new(), visits: BTreeMap::new() }
    }

    /// Accumulates danger at a tile. When the map is full the weakest
    /// entry goes first, lowest (y, x) breaking ties.
    pub fn mark_danger(&mut self, pos: Pos, amount: f64) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        *self.danger.entry(pos).or_insert(0.0) += amount;
        while self.danger.len() > self.policy.capacity {
            let weakest = self
                .danger
                .iter()
                .min_by(|a, b| a.1.partial_cmp(b.1).expect("finite danger").then(a.0.cmp(b.0)))
                .map(|(pos, _)| *pos)
                .expect("non-empty over capacity");
            self.danger.remove(&weakest);
        }
    }

    pub fn record_visit(&mut self, pos: Pos) {
        *self.visits.entry(pos).or_insert(0) += 1;
        while self.visits.len() > self.policy.capacity {
            let rarest = self
                .visits
                .iter()
                .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
                .map(|(pos, _)| *pos)
                .expect("non-empty over capacity");
            self.visits.remove(&rarest);
        }
    }

    pub fn danger_at(&self, pos: Pos) -> f64 {
        self.danger.get(&pos).copied().unwrap_or(0.0)
    }

    pub fn visit_count(&self, pos: Pos) -> u32 {
        self.visits.get(&pos).copied().unwrap_or(0)
    }

    pub fn remembered_tiles(&self) -> usize {
        self.danger.len()
    }

    pub fn danger_entries(&self) -> impl Iterator<Item = (Pos, f64)> + '_ {
        self.danger.iter().map(|(pos, danger)| (*pos, *danger))
    }

    /// One cycle of forgetting: danger fades multiplicatively and entries
    /// under the floor drop out. Visit counts do not decay.
    pub fn decay_cycle(&mut self) {
        let floor = self.policy.floor;
        let decay = self.policy.decay;
        self.danger.retain(|_, level| {
            *level *= decay;
            *level >= floor
        });
    }

    pub fn reset(&mut self) {
        self.danger.clear();
        self.visits.clear();
    }
}
