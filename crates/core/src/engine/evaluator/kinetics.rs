//! Mass-action forward simulation over state vectors.
//! Each reaction drains its input levels and feeds its outputs at a rate
//! proportional to the product of the input levels; integration is a fixed
//! Euler step so identical inputs always produce identical futures.

use super::*;

/// An agent is considered dead below this `alive` level; the horizon stops
/// there and the candidate takes the sentinel score.
const ALIVE_FLOOR: f64 = 0.5;

/// One continuous transformation. Listing a variable twice among the
/// inputs makes the rate second-order in that variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Reaction {
    pub name: &'static str,
    pub rate: f64,
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<&'static str>,
}

impl Reaction {
    pub fn new(
        name: &'static str,
        rate: f64,
        inputs: &[&'static str],
        outputs: &[&'static str],
    ) -> Reaction {
        Reaction { name, rate, inputs: inputs.to_vec(), outputs: outputs.to_vec() }
    }
}

/// Validated set of reactions plus the integration parameters. Malformed
/// tables are programmer errors and refuse to construct.
#[derive(Clone, Debug)]
pub struct RateTable {
    reactions: Vec<Reaction>,
}

impl RateTable {
    /// Panics when a reaction names a variable outside the encoder schema
    /// or carries a non-finite or negative rate constant.
    pub fn new(reactions: Vec<Reaction>) -> RateTable {
        for reaction in &reactions {
            assert!(
                reaction.rate.is_finite() && reaction.rate >= 0.0,
                "reaction `{}` has invalid rate constant {}",
                reaction.name,
                reaction.rate,
            );
            for var in reaction.inputs.iter().chain(reaction.outputs.iter()) {
                assert!(
                    SCHEMA.contains(var),
                    "reaction `{}` names unknown variable `{var}`",
                    reaction.name,
                );
            }
        }
        RateTable { reactions }
    }

    /// Background pressure plus passive recovery; always present even when
    /// a candidate delta claims otherwise.
    pub fn standard() -> RateTable {
        RateTable::new(vec![
            // Threats grind health down faster the more threat there is
            // and the more health there is to lose.
            Reaction::new(
                "threat_pressure",
                0.02,
                &[VAR_THREAT_LEVEL, VAR_HEALTH],
                &[VAR_THREAT_LEVEL],
            ),
            // Sustained pressure erodes the alive flag itself once health
            // is gone; alive participates so the drain self-limits.
            Reaction::new("mortality", 0.02, &[VAR_THREAT_LEVEL, VAR_ALIVE], &[VAR_THREAT_LEVEL]),
            // Slow passive recovery while alive.
            Reaction::new("recovery", 0.01, &[VAR_ALIVE], &[VAR_ALIVE, VAR_HEALTH]),
        ])
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
    pub final_state: StateVector,
    pub terminated_early: bool,
}

pub(in crate::engine) fn terminated(state: &StateVector) -> bool {
    state.get(VAR_ALIVE) < ALIVE_FLOOR || state.get(VAR_HEALTH) <= 0.0
}

/// Integrates the table over `horizon` in steps of `dt`. The baseline is
/// read-only; the result owns a fresh vector. A state that dies or turns
/// non-finite mid-run reports `terminated_early`.
pub fn simulate(
    baseline: &StateVector,
    table: &RateTable,
    horizon: f64,
    dt: f64,
) -> SimulationResult {
    debug_assert!(horizon > 0.0 && dt > 0.0, "horizon and dt must be positive");

    let mut state = baseline.clone();
    if terminated(&state) {
        return SimulationResult { final_state: state, terminated_early: true };
    }

    let steps = (horizon / dt).ceil() as usize;
    for _ in 0..steps {
        let mut next = state.clone();
        for reaction in table.reactions() {
            let mut flux = reaction.rate;
            for input in &reaction.inputs {
                flux *= state.get(input);
            }
            let moved = flux * dt;
            for input in &reaction.inputs {
                let level = next.get(input) - moved;
                next.set(input, level);
            }
            for output in &reaction.outputs {
                let level = next.get(output) + moved;
                next.set(output, level);
            }
        }
        state = next;

        if !state.is_finite() {
            return SimulationResult { final_state: state, terminated_early: true };
        }
        if terminated(&state) {
            return SimulationResult { final_state: state, terminated_early: true };
        }
    }

    SimulationResult { final_state: state, terminated_early: false }
}
