//! Candidate ranking by bounded forward simulation.
//! This file wires the kinetics, scoring, and cache submodules into the
//! evaluator the decision cycle calls. Per-candidate simulations are
//! independent and run on the rayon pool; results are identical to
//! sequential evaluation because the argmax is taken in menu order.

use super::*;

mod cache;
mod kinetics;
mod scoring;

pub use kinetics::{RateTable, Reaction, SimulationResult, simulate};
pub use scoring::{SCORE_SENTINEL, score_state};

use cache::EvalCache;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug)]
pub struct EvaluatorConfig {
    pub horizon: f64,
    pub dt: f64,
    pub cache_capacity: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> EvaluatorConfig {
        EvaluatorConfig { horizon: 5.0, dt: 0.1, cache_capacity: 512 }
    }
}

pub struct Evaluator {
    table: RateTable,
    config: EvaluatorConfig,
    cache: EvalCache,
}

impl Evaluator {
    /// Panics on a non-positive horizon or step; those are construction
    /// bugs, not runtime conditions.
    pub fn new(table: RateTable, config: EvaluatorConfig) -> Evaluator {
        assert!(
            config.horizon > 0.0 && config.dt > 0.0 && config.dt <= config.horizon,
            "evaluator horizon/dt misconfigured"
        );
        let cache = EvalCache::new(config.cache_capacity);
        Evaluator { table, config, cache }
    }

    /// Scores every candidate in menu order, consulting the cache first.
    /// Parallel over candidates; the output order is the input order.
    pub fn scores(&self, baseline: &StateVector, candidates: &[Candidate]) -> Vec<f64> {
        candidates.par_iter().map(|candidate| self.score_candidate(baseline, candidate)).collect()
    }

    /// Sequential twin of [`Evaluator::scores`]; exists so determinism
    /// tests can compare the two executions.
    pub fn scores_sequential(&self, baseline: &StateVector, candidates: &[Candidate]) -> Vec<f64> {
        candidates.iter().map(|candidate| self.score_candidate(baseline, candidate)).collect()
    }

    /// Index and score of the best candidate; ties break to the lowest
    /// index. Panics on an empty menu (the generator guarantees `wait`).
    pub fn evaluate_best(&self, baseline: &StateVector, candidates: &[Candidate]) -> (usize, f64) {
        assert!(!candidates.is_empty(), "candidate menu must never be empty");
        let scores = self.scores(baseline, candidates);
        pick_best(&scores)
    }

    fn score_candidate(&self, baseline: &StateVector, candidate: &Candidate) -> f64 {
        let key = cache_key(baseline, &candidate.delta);
        if let Some(score) = self.cache.get(key) {
            return score;
        }

        let projected = baseline.apply_delta(&candidate.delta);
        let result = simulate(&projected, &self.table, self.config.horizon, self.config.dt);
        let score = if result.terminated_early || !result.final_state.is_finite() {
            SCORE_SENTINEL
        } else {
            score_state(&result.final_state)
        };

        self.cache.insert(key, score);
        score
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Wholesale invalidation. The evaluator never infers level boundaries
    /// itself; the owner calls this on world transitions.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}

/// Highest score wins; equal scores keep the earlier candidate, so the
/// generator's priority order doubles as the tie-break.
pub(in crate::engine) fn pick_best(scores: &[f64]) -> (usize, f64) {
    let mut best_index = 0;
    let mut best_score = scores[0];
    for (index, score) in scores.iter().enumerate().skip(1) {
        if *score > best_score {
            best_index = index;
            best_score = *score;
        }
    }
    (best_index, best_score)
}

fn cache_key(baseline: &StateVector, delta: &Delta) -> u64 {
    use std::hash::Hasher;
    use xxhash_rust::xxh3::Xxh3;

    let mut hasher = Xxh3::new();
    hasher.write_u64(baseline.quantized_hash());
    hasher.write_u64(delta.quantized_hash());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn living_baseline() -> StateVector {
        let mut vector = StateVector::new();
        vector.set(VAR_HEALTH, 20.0);
        vector.set(VAR_ALIVE, 1.0);
        vector.set(VAR_THREAT_LEVEL, 1.0);
        vector.set(VAR_DIST_TO_GOAL, 6.0);
        vector
    }

    fn menu() -> Vec<Candidate> {
        vec![
            Candidate {
                id: 0,
                description: "advance to goal",
                delta: Delta::new().with(VAR_DIST_TO_GOAL, -1.0),
                objective: None,
            },
            Candidate {
                id: 1,
                description: "heal",
                delta: Delta::new().with(VAR_HEALTH, 4.0),
                objective: None,
            },
            Candidate { id: 2, description: "wait", delta: Delta::new(), objective: None },
        ]
    }

    #[test]
    fn parallel_and_sequential_scores_agree() {
        let evaluator = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let baseline = living_baseline();
        let candidates = menu();
        let parallel = evaluator.scores(&baseline, &candidates);
        evaluator.clear_cache();
        let sequential = evaluator.scores_sequential(&baseline, &candidates);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn evaluate_best_is_stable_across_repeated_calls() {
        let evaluator = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let baseline = living_baseline();
        let candidates = menu();
        let first = evaluator.evaluate_best(&baseline, &candidates);
        let second = evaluator.evaluate_best(&baseline, &candidates);
        assert_eq!(first, second);
    }

    #[test]
    fn cache_hit_matches_fresh_simulation() {
        let baseline = living_baseline();
        let candidates = menu();

        let warm = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let first = warm.scores_sequential(&baseline, &candidates);
        let cached = warm.scores_sequential(&baseline, &candidates);
        assert_eq!(first, cached);
        assert!(warm.cache_stats().hits >= candidates.len() as u64);

        let cold = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let fresh = cold.scores_sequential(&baseline, &candidates);
        assert_eq!(first, fresh, "cached scores must equal a fresh evaluator's scores");
    }

    #[test]
    fn clear_cache_forces_recomputation_without_changing_scores() {
        let evaluator = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let baseline = living_baseline();
        let candidates = menu();
        let before = evaluator.scores_sequential(&baseline, &candidates);
        let dropped = evaluator.clear_cache();
        assert_eq!(dropped, candidates.len());
        let after = evaluator.scores_sequential(&baseline, &candidates);
        assert_eq!(before, after);
    }

    #[test]
    fn dead_baseline_scores_every_candidate_at_the_sentinel() {
        let evaluator = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let mut baseline = living_baseline();
        baseline.set(VAR_ALIVE, 0.0);
        let scores = evaluator.scores_sequential(&baseline, &menu());
        assert!(scores.iter().all(|score| *score == SCORE_SENTINEL));
    }

    #[test]
    fn ties_break_to_the_lowest_index() {
        assert_eq!(pick_best(&[1.0, 1.0, 0.5]), (0, 1.0));
        assert_eq!(pick_best(&[0.5, 2.0, 2.0]), (1, 2.0));
    }

    #[test]
    fn healing_beats_waiting_under_pressure() {
        let evaluator = Evaluator::new(RateTable::standard(), EvaluatorConfig::default());
        let mut baseline = living_baseline();
        baseline.set(VAR_HEALTH, 5.0);
        baseline.set(VAR_THREAT_LEVEL, 3.0);
        let candidates = menu();
        let (best, _) = evaluator.evaluate_best(&baseline, &candidates);
        assert_eq!(candidates[best].description, "heal");
    }
}
