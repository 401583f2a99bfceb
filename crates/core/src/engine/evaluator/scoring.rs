//! Terminal-state utility scoring.
//! Pure and monotonic in the documented directions: health, alive, keys,
//! and wealth score up; threat and the distance variables score down.
//! Missing variables read as zero.

use super::*;

/// Worst-case score forced onto candidates whose simulation died early or
/// produced non-finite values.
pub const SCORE_SENTINEL: f64 = -1.0e6;

const W_HEALTH: f64 = 2.0;
const W_ALIVE: f64 = 10.0;
const W_THREAT: f64 = 3.0;
const W_DIST_GOAL: f64 = 1.0;
const W_DIST_KEY: f64 = 0.25;
const W_KEYS: f64 = 1.5;
const W_WEALTH: f64 = 0.5;
const W_CAN_DESCEND: f64 = 5.0;

pub fn score_state(state: &StateVector) -> f64 {
    W_HEALTH * state.get(VAR_HEALTH) + W_ALIVE * state.get(VAR_ALIVE)
        - W_THREAT * state.get(VAR_THREAT_LEVEL)
        - W_DIST_GOAL * state.get(VAR_DIST_TO_GOAL)
        - W_DIST_KEY * state.get(VAR_DIST_TO_KEY)
        + W_KEYS * state.get(VAR_KEYS_HELD)
        + W_WEALTH * state.get(VAR_WEALTH)
        + W_CAN_DESCEND * state.get(VAR_CAN_DESCEND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_state_scores_zero() {
        assert_eq!(score_state(&StateVector::new()), 0.0);
    }

    #[test]
    fn progress_toward_goal_scores_higher() {
        let mut near = StateVector::new();
        near.set(VAR_DIST_TO_GOAL, 2.0);
        let mut far = StateVector::new();
        far.set(VAR_DIST_TO_GOAL, 9.0);
        assert!(score_state(&near) > score_state(&far));
    }

    proptest! {
        #[test]
        fn higher_health_never_scores_worse(
            base in 0.0f64..100.0,
            extra in 0.0f64..100.0,
            threat in 0.0f64..50.0,
            dist in 0.0f64..50.0,
        ) {
            let mut low = StateVector::new();
            low.set(VAR_HEALTH, base);
            low.set(VAR_THREAT_LEVEL, threat);
            low.set(VAR_DIST_TO_GOAL, dist);
            let mut high = low.clone();
            high.set(VAR_HEALTH, base + extra);
            prop_assert!(score_state(&high) >= score_state(&low));
        }

        #[test]
        fn higher_threat_never_scores_better(
            health in 0.0f64..100.0,
            threat in 0.0f64..50.0,
            extra in 0.0f64..50.0,
        ) {
            let mut calm = StateVector::new();
            calm.set(VAR_HEALTH, health);
            calm.set(VAR_THREAT_LEVEL, threat);
            let mut dire = calm.clone();
            dire.set(VAR_THREAT_LEVEL, threat + extra);
            prop_assert!(score_state(&dire) <= score_state(&calm));
        }
    }
}
