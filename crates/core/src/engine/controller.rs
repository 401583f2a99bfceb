//! Target commitment across decision cycles.
//! The commitment slot here is the single source of truth for the agent's
//! "mode"; any mode label shown elsewhere is a derived view. Commitment
//! bias and the staleness counter exist to suppress oscillation between
//! similarly-scored goals.

use super::*;
use crate::grid::manhattan;

#[derive(Clone, Copy, Debug)]
pub struct ControllerConfig {
    /// Consecutive non-improving cycles before a target is abandoned.
    pub staleness_limit: u32,
    /// How much better a different-kind objective must score to displace
    /// the committed one.
    pub switch_margin: f64,
    /// Score bias granted to candidates matching the committed target.
    pub commitment_bonus: f64,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig { staleness_limit: 5, switch_margin: 3.0, commitment_bonus: 1.5 }
    }
}

pub struct TargetController {
    config: ControllerConfig,
    commitment: Option<Target>,
    best_distance: u32,
    stale_cycles: u32,
}

impl TargetController {
    pub fn new(config: ControllerConfig) -> TargetController {
        TargetController { config, commitment: None, best_distance: u32::MAX, stale_cycles: 0 }
    }

    pub fn target(&self) -> Option<&Target> {
        self.commitment.as_ref()
    }

    /// Bias applied to a candidate's simulated score while a matching
    /// target is committed.
    pub fn commitment_bonus_for(&self, candidate: &Candidate) -> f64 {
        let (Some(target), Some(objective)) = (&self.commitment, candidate.objective) else {
            return 0.0;
        };
        if objective.kind == target.kind && objective.pos == target.pos {
            self.config.commitment_bonus
        } else {
            0.0
        }
    }

    /// Per-cycle upkeep: abandons a reached target, and counts cycles
    /// without distance improvement until the staleness limit trips.
    pub fn note_progress(&mut self, agent_pos: Pos) -> Option<LogEvent> {
        let target = self.commitment.as_ref()?;
        let distance = manhattan(agent_pos, target.pos);
        if distance < 1 {
            return self.abandon(AbandonCause::Reached);
        }
        if distance < self.best_distance {
            self.best_distance = distance;
            self.stale_cycles = 0;
        } else {
            self.stale_cycles += 1;
            if self.stale_cycles >= self.config.staleness_limit {
                return self.abandon(AbandonCause::Stale);
            }
        }
        None
    }

    /// Called when no strategy can produce a step toward the target.
    pub fn note_infeasible(&mut self) -> Option<LogEvent> {
        if self.commitment.is_some() {
            return self.abandon(AbandonCause::Infeasible);
        }
        None
    }

    /// Offers the cycle winner's objective. Commits when the slot is free,
    /// or replaces a different-kind target that is beaten by more than the
    /// switch margin.
    pub fn consider(
        &mut self,
        tick: u64,
        agent_pos: Pos,
        objective: Objective,
        score: f64,
        committed_score: Option<f64>,
    ) -> Option<LogEvent> {
        match &self.commitment {
            None => Some(self.commit(tick, agent_pos, objective)),
            Some(target) if target.kind != objective.kind => {
                let incumbent = committed_score.unwrap_or(f64::MIN);
                if score > incumbent + self.config.switch_margin {
                    Some(self.commit(tick, agent_pos, objective))
                } else {
                    None
                }
            }
            Some(_) => None,
        }
    }

    /// Clears the slot without an event; used on level transitions where
    /// the old target is meaningless rather than abandoned.
    pub fn reset(&mut self) {
        self.commitment = None;
        self.best_distance = u32::MAX;
        self.stale_cycles = 0;
    }

    fn commit(&mut self, tick: u64, agent_pos: Pos, objective: Objective) -> LogEvent {
        let distance = manhattan(agent_pos, objective.pos);
        self.commitment = Some(Target {
            kind: objective.kind,
            pos: objective.pos,
            tick_set: tick,
            distance_at_set: distance,
        });
        self.best_distance = distance;
        self.stale_cycles = 0;
        LogEvent::TargetCommitted { kind: objective.kind, pos: objective.pos }
    }

    fn abandon(&mut self, cause: AbandonCause) -> Option<LogEvent> {
        self.commitment
            .take()
            .map(|target| LogEvent::TargetAbandoned { kind: target.kind, pos: target.pos, cause })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_objective(pos: Pos) -> Objective {
        Objective { kind: TargetKind::Goal, pos }
    }

    #[test]
    fn commits_when_slot_is_free_and_records_distance() {
        let mut controller = TargetController::new(ControllerConfig::default());
        assert!(controller.target().is_none());
        let event = controller.consider(
            3,
            Pos { y: 0, x: 0 },
            goal_objective(Pos { y: 0, x: 10 }),
            5.0,
            None,
        );
        assert!(matches!(event, Some(LogEvent::TargetCommitted { .. })));
        let target = controller.target().expect("committed target");
        assert_eq!(target.tick_set, 3);
        assert_eq!(target.distance_at_set, 10);
    }

    #[test]
    fn reached_target_is_abandoned_on_the_next_upkeep() {
        let mut controller = TargetController::new(ControllerConfig::default());
        controller.consider(0, Pos { y: 0, x: 0 }, goal_objective(Pos { y: 0, x: 2 }), 5.0, None);
        assert!(controller.note_progress(Pos { y: 0, x: 1 }).is_none());
        let event = controller.note_progress(Pos { y: 0, x: 2 });
        assert!(matches!(
            event,
            Some(LogEvent::TargetAbandoned { cause: AbandonCause::Reached, .. })
        ));
        assert!(controller.target().is_none());
    }

    #[test]
    fn five_stale_cycles_clear_the_target_for_the_sixth_query() {
        let config = ControllerConfig { staleness_limit: 5, ..ControllerConfig::default() };
        let mut controller = TargetController::new(config);
        let start = Pos { y: 0, x: 0 };
        controller.consider(0, start, goal_objective(Pos { y: 0, x: 10 }), 5.0, None);

        for cycle in 0..4 {
            assert!(controller.note_progress(start).is_none(), "cycle {cycle} should not abandon");
            assert!(controller.target().is_some());
        }
        let event = controller.note_progress(start);
        assert!(matches!(
            event,
            Some(LogEvent::TargetAbandoned { cause: AbandonCause::Stale, .. })
        ));
        assert!(controller.target().is_none(), "sixth query sees no target");
    }

    #[test]
    fn progress_resets_the_staleness_counter() {
        let config = ControllerConfig { staleness_limit: 3, ..ControllerConfig::default() };
        let mut controller = TargetController::new(config);
        controller.consider(0, Pos { y: 0, x: 0 }, goal_objective(Pos { y: 0, x: 10 }), 5.0, None);

        assert!(controller.note_progress(Pos { y: 0, x: 0 }).is_none());
        assert!(controller.note_progress(Pos { y: 0, x: 0 }).is_none());
        assert!(controller.note_progress(Pos { y: 0, x: 1 }).is_none(), "progress resets");
        assert!(controller.note_progress(Pos { y: 0, x: 1 }).is_none());
        assert!(controller.note_progress(Pos { y: 0, x: 1 }).is_none());
        let event = controller.note_progress(Pos { y: 0, x: 1 });
        assert!(matches!(event, Some(LogEvent::TargetAbandoned { .. })));
    }

    #[test]
    fn same_kind_objective_never_displaces_the_commitment() {
        let mut controller = TargetController::new(ControllerConfig::default());
        controller.consider(0, Pos { y: 0, x: 0 }, goal_objective(Pos { y: 0, x: 10 }), 5.0, None);
        let event = controller.consider(
            1,
            Pos { y: 0, x: 0 },
            goal_objective(Pos { y: 5, x: 5 }),
            50.0,
            Some(5.0),
        );
        assert!(event.is_none());
        assert_eq!(controller.target().map(|t| t.pos), Some(Pos { y: 0, x: 10 }));
    }

    #[test]
    fn different_kind_objective_needs_the_switch_margin() {
        let config = ControllerConfig { switch_margin: 3.0, ..ControllerConfig::default() };
        let mut controller = TargetController::new(config);
        controller.consider(0, Pos { y: 0, x: 0 }, goal_objective(Pos { y: 0, x: 10 }), 5.0, None);

        let near_miss = controller.consider(
            1,
            Pos { y: 0, x: 0 },
            Objective { kind: TargetKind::Key, pos: Pos { y: 2, x: 0 } },
            7.0,
            Some(5.0),
        );
        assert!(near_miss.is_none(), "7.0 does not clear 5.0 by the 3.0 margin");

        let clear_win = controller.consider(
            2,
            Pos { y: 0, x: 0 },
            Objective { kind: TargetKind::Key, pos: Pos { y: 2, x: 0 } },
            9.0,
            Some(5.0),
        );
        assert!(matches!(clear_win, Some(LogEvent::TargetCommitted { .. })));
        assert_eq!(controller.target().map(|t| t.kind), Some(TargetKind::Key));
    }

    #[test]
    fn infeasible_target_is_dropped_with_cause() {
        let mut controller = TargetController::new(ControllerConfig::default());
        assert!(controller.note_infeasible().is_none(), "nothing to drop yet");
        controller.consider(0, Pos { y: 0, x: 0 }, goal_objective(Pos { y: 0, x: 10 }), 5.0, None);
        let event = controller.note_infeasible();
        assert!(matches!(
            event,
            Some(LogEvent::TargetAbandoned { cause: AbandonCause::Infeasible, .. })
        ));
    }

    #[test]
    fn bonus_applies_only_to_candidates_matching_the_commitment() {
        let mut controller = TargetController::new(ControllerConfig::default());
        let target_pos = Pos { y: 0, x: 10 };
        controller.consider(0, Pos { y: 0, x: 0 }, goal_objective(target_pos), 5.0, None);

        let matching = Candidate {
            id: 0,
            description: "advance to goal",
            delta: Delta::new(),
            objective: Some(goal_objective(target_pos)),
        };
        let other = Candidate {
            id: 1,
            description: "collect key",
            delta: Delta::new(),
            objective: Some(Objective { kind: TargetKind::Key, pos: Pos { y: 3, x: 3 } }),
        };
        let none = Candidate { id: 2, description: "wait", delta: Delta::new(), objective: None };

        assert!(controller.commitment_bonus_for(&matching) > 0.0);
        assert_eq!(controller.commitment_bonus_for(&other), 0.0);
        assert_eq!(controller.commitment_bonus_for(&none), 0.0);
    }
}
