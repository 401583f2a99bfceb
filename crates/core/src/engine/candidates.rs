//! Candidate menu construction for one decision cycle.
//! Rules are priority-ordered but not exclusive; several candidates
//! usually coexist and compete on simulated score. Deltas are hypothesized
//! effects used for ranking only, not ground truth.

use super::*;
use crate::grid::{Grid, manhattan, neighbors};

/// Fraction of max health below which retreating becomes a candidate.
const RETREAT_HEALTH_FRACTION: f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Objective {
    pub kind: TargetKind,
    pub pos: Pos,
}

/// One hypothesized action. Ephemeral: rebuilt every cycle, discarded
/// after scoring except the winner.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub id: u32,
    pub description: &'static str,
    pub delta: Delta,
    pub objective: Option<Objective>,
}

/// Builds the cycle's menu. Never empty: `wait` is unconditional, so the
/// evaluator always has something to rank.
pub fn generate_candidates(
    grid: &Grid,
    obs: &Observation,
    vector: &StateVector,
    memory: &TileMemory,
) -> Vec<Candidate> {
    let mut menu = MenuBuilder::default();

    menu.push(
        "advance to goal",
        Delta::new().with(VAR_DIST_TO_GOAL, -1.0),
        Some(Objective { kind: TargetKind::Goal, pos: grid.goal() }),
    );

    if let Some(key_pos) = nearest_unheld_key(grid, obs) {
        let dist = f64::from(manhattan(obs.agent_pos, key_pos));
        menu.push(
            "collect key",
            Delta::new().with(VAR_DIST_TO_KEY, -dist).with(VAR_KEYS_HELD, 1.0),
            Some(Objective { kind: TargetKind::Key, pos: key_pos }),
        );
    }

    if let Some((item_pos, value)) = nearest_item(grid, obs.agent_pos) {
        menu.push(
            "collect item",
            Delta::new().with(VAR_WEALTH, f64::from(value)),
            Some(Objective { kind: TargetKind::Item, pos: item_pos }),
        );
    }

    if vector.get(VAR_CAN_ATTACK) >= 1.0
        && let Some(threat_pos) = nearest_adjacent_threat(obs)
    {
        menu.push(
            "attack threat",
            Delta::new().with(VAR_THREAT_LEVEL, -1.5).with(VAR_HEALTH, -1.0),
            Some(Objective { kind: TargetKind::Threat, pos: threat_pos }),
        );
    }

    if vector.get(VAR_CAN_HEAL) >= 1.0 {
        menu.push("heal", Delta::new().with(VAR_HEALTH, 4.0), None);
    }

    let health_fraction = vector.get(VAR_HEALTH) / f64::from(obs.max_health.max(1));
    if !obs.threats.is_empty() && health_fraction < RETREAT_HEALTH_FRACTION {
        let objective = retreat_step(grid, obs, memory)
            .map(|pos| Objective { kind: TargetKind::Retreat, pos });
        menu.push(
            "retreat",
            Delta::new().with(VAR_DIST_TO_THREAT, 2.0).with(VAR_THREAT_LEVEL, -1.0),
            objective,
        );
    }

    menu.push("wait", Delta::new(), None);

    menu.finish()
}

#[derive(Default)]
struct MenuBuilder {
    candidates: Vec<Candidate>,
}

impl MenuBuilder {
    fn push(&mut self, description: &'static str, delta: Delta, objective: Option<Objective>) {
        let id = self.candidates.len() as u32;
        self.candidates.push(Candidate { id, description, delta, objective });
    }

    fn finish(self) -> Vec<Candidate> {
        self.candidates
    }
}

fn nearest_unheld_key(grid: &Grid, obs: &Observation) -> Option<Pos> {
    let mut best: Option<(u32, Pos)> = None;
    for (_, resource) in grid.resources() {
        let ResourceKind::Key(door) = resource.kind else {
            continue;
        };
        if obs.possession.has_key(door) {
            continue;
        }
        let dist = manhattan(obs.agent_pos, resource.pos);
        let better = match best {
            None => true,
            Some((best_dist, best_pos)) => {
                dist < best_dist
                    || (dist == best_dist
                        && (resource.pos.y, resource.pos.x) < (best_pos.y, best_pos.x))
            }
        };
        if better {
            best = Some((dist, resource.pos));
        }
    }
    best.map(|(_, pos)| pos)
}

fn nearest_item(grid: &Grid, from: Pos) -> Option<(Pos, u32)> {
    let mut best: Option<(u32, Pos, u32)> = None;
    for (_, resource) in grid.resources() {
        if resource.kind != ResourceKind::Item {
            continue;
        }
        let dist = manhattan(from, resource.pos);
        let better = match best {
            None => true,
            Some((best_dist, best_pos, _)) => {
                dist < best_dist
                    || (dist == best_dist
                        && (resource.pos.y, resource.pos.x) < (best_pos.y, best_pos.x))
            }
        };
        if better {
            best = Some((dist, resource.pos, resource.value));
        }
    }
    best.map(|(_, pos, value)| (pos, value))
}

fn nearest_adjacent_threat(obs: &Observation) -> Option<Pos> {
    let mut adjacent: Vec<Pos> = obs
        .threats
        .iter()
        .filter(|threat| manhattan(obs.agent_pos, threat.pos) == 1)
        .map(|threat| threat.pos)
        .collect();
    adjacent.sort_by_key(|pos| (pos.y, pos.x));
    adjacent.first().copied()
}

/// Adjacent traversable cell gaining the most distance from the nearest
/// threat; remembered danger breaks ties, then (y, x).
fn retreat_step(grid: &Grid, obs: &Observation, memory: &TileMemory) -> Option<Pos> {
    let nearest_threat = obs
        .threats
        .iter()
        .min_by_key(|threat| (manhattan(obs.agent_pos, threat.pos), threat.pos.y, threat.pos.x))
        .map(|threat| threat.pos)?;

    let mut best: Option<(Pos, u32, f64)> = None;
    for candidate in neighbors(obs.agent_pos) {
        if !grid.traversable(candidate, &obs.possession) {
            continue;
        }
        let dist = manhattan(candidate, nearest_threat);
        let danger = memory.danger_at(candidate);
        let better = match best {
            None => true,
            Some((best_pos, best_dist, best_danger)) => {
                dist > best_dist
                    || (dist == best_dist && danger < best_danger)
                    || (dist == best_dist
                        && danger == best_danger
                        && (candidate.y, candidate.x) < (best_pos.y, best_pos.x))
            }
        };
        if better {
            best = Some((candidate, dist, danger));
        }
    }
    best.map(|(pos, _, _)| pos)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn menu_for(grid: &Grid, obs: &Observation) -> Vec<Candidate> {
        let vector = encode_state(grid, obs);
        generate_candidates(grid, obs, &vector, &TileMemory::new(DecayPolicy::default()))
    }

    #[test]
    fn menu_is_never_empty_and_always_offers_wait() {
        let grid = open_grid(5, 5);
        let obs = calm_observation(Pos { y: 2, x: 2 });
        let menu = menu_for(&grid, &obs);
        assert!(!menu.is_empty());
        assert!(menu.iter().any(|candidate| candidate.description == "wait"));
        assert!(menu.iter().any(|candidate| candidate.description == "advance to goal"));
    }

    #[test]
    fn candidate_ids_match_menu_order() {
        let grid = open_grid(5, 5);
        let obs = calm_observation(Pos { y: 2, x: 2 });
        let menu = menu_for(&grid, &obs);
        for (index, candidate) in menu.iter().enumerate() {
            assert_eq!(candidate.id as usize, index);
        }
    }

    #[test]
    fn key_candidate_appears_only_while_a_key_is_unheld() {
        let mut spec = open_spec(6, 6);
        spec.keys.push((Pos { y: 0, x: 3 }, DoorId(0)));
        let grid = Grid::from_spec(&spec).expect("valid spec");

        let mut obs = calm_observation(Pos { y: 0, x: 0 });
        let with_key = menu_for(&grid, &obs);
        let key_candidate = with_key
            .iter()
            .find(|candidate| candidate.description == "collect key")
            .expect("key candidate");
        assert_eq!(
            key_candidate.objective,
            Some(Objective { kind: TargetKind::Key, pos: Pos { y: 0, x: 3 } })
        );

        obs.possession.add_key(DoorId(0));
        let without = menu_for(&grid, &obs);
        assert!(!without.iter().any(|candidate| candidate.description == "collect key"));
    }

    #[test]
    fn attack_candidate_requires_an_adjacent_threat() {
        let grid = open_grid(7, 7);
        let mut obs = calm_observation(Pos { y: 3, x: 3 });
        obs.threats.push(ThreatObs { id: EntityId::default(), pos: Pos { y: 3, x: 5 }, menace: 3 });
        let far = menu_for(&grid, &obs);
        assert!(!far.iter().any(|candidate| candidate.description == "attack threat"));

        obs.threats[0].pos = Pos { y: 3, x: 4 };
        let near = menu_for(&grid, &obs);
        let attack = near
            .iter()
            .find(|candidate| candidate.description == "attack threat")
            .expect("attack candidate");
        assert_eq!(
            attack.objective,
            Some(Objective { kind: TargetKind::Threat, pos: Pos { y: 3, x: 4 } })
        );
    }

    #[test]
    fn retreat_candidate_steps_away_from_the_nearest_threat() {
        let grid = open_grid(7, 7);
        let mut obs = calm_observation(Pos { y: 3, x: 3 });
        obs.health = 3;
        obs.threats.push(ThreatObs { id: EntityId::default(), pos: Pos { y: 3, x: 4 }, menace: 3 });
        let menu = menu_for(&grid, &obs);
        let retreat = menu
            .iter()
            .find(|candidate| candidate.description == "retreat")
            .expect("retreat candidate");
        let objective = retreat.objective.expect("retreat objective");
        assert_eq!(objective.kind, TargetKind::Retreat);
        assert_eq!(objective.pos, Pos { y: 2, x: 3 }, "ties on gained distance break to north");
    }

    #[test]
    fn healthy_unthreatened_agent_gets_no_retreat_or_heal() {
        let grid = open_grid(5, 5);
        let obs = calm_observation(Pos { y: 2, x: 2 });
        let menu = menu_for(&grid, &obs);
        assert!(!menu.iter().any(|candidate| candidate.description == "retreat"));
        assert!(!menu.iter().any(|candidate| candidate.description == "heal"));
    }
}
