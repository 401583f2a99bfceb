//! Goal-reachability over explicit (position, possession) states.
//! Exploration is breadth-first with hard state and token bounds, so a
//! query always terminates; exhausting a bound reports `Inconclusive`
//! rather than pretending to have proven unreachability. Also serves as
//! the offline level validator; it never mutates the grid.

use std::collections::{BTreeMap, BTreeSet, VecDeque, btree_map::Entry};

use super::*;
use crate::grid::{Grid, neighbors};

#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    /// Maximum explicit states dequeued before giving up.
    pub max_states: usize,
    /// Maximum distinct key-pickup sets tracked before giving up.
    pub max_tokens: usize,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds { max_states: 4096, max_tokens: 64 }
    }
}

/// Decides whether the goal can be reached from `start` with the keys in
/// `held`, picking up any key the agent walks over along the way.
pub fn is_reachable(
    grid: &Grid,
    start: Pos,
    held: &Possession,
    goal: Pos,
    bounds: Bounds,
) -> Reachability {
    let outcome = search(grid, start, held, |pos| pos == goal, bounds);
    if let Some(bound) = outcome.bound_hit {
        return Reachability::Inconclusive(bound);
    }
    if outcome.found.is_some() {
        return Reachability::Reachable;
    }
    Reachability::Unreachable(diagnose(grid, start, held, goal, &outcome.visited_positions))
}

/// Offline validator for freshly generated levels: can the spawn reach the
/// goal with empty hands? Callers regenerate or patch the level on a bad
/// verdict; the engine only reports.
pub fn validate_level(grid: &Grid, bounds: Bounds) -> Reachability {
    is_reachable(grid, grid.spawn(), &Possession::default(), grid.goal(), bounds)
}

/// Nearest position holding a key for `door` that the agent can actually
/// walk to under its current keys (picking up other keys on the way).
/// Ties at equal distance break on (y, x).
pub fn nearest_reachable_key(
    grid: &Grid,
    start: Pos,
    held: &Possession,
    door: DoorId,
    bounds: Bounds,
) -> Option<Pos> {
    let outcome =
        search(grid, start, held, |pos| grid.key_at(pos).is_some_and(|(_, d)| d == door), bounds);
    outcome.found
}

struct SearchOutcome {
    /// First target position found, minimal distance, (y, x) tie-break.
    found: Option<Pos>,
    /// Every grid position reached in any explored state.
    visited_positions: BTreeSet<Pos>,
    bound_hit: Option<SearchBound>,
}

type PickedKeys = BTreeSet<ResourceId>;

fn possession_with(grid: &Grid, held: &Possession, picked: &PickedKeys) -> Possession {
    let mut possession = held.clone();
    for id in picked {
        if let Some(resource) = grid.resource(*id)
            && let ResourceKind::Key(door) = resource.kind
        {
            possession.add_key(door);
        }
    }
    possession
}

fn search<IsTarget>(
    grid: &Grid,
    start: Pos,
    held: &Possession,
    is_target: IsTarget,
    bounds: Bounds,
) -> SearchOutcome
where
    IsTarget: Fn(Pos) -> bool,
{
    let mut visited: BTreeMap<(Pos, PickedKeys), u32> = BTreeMap::new();
    let mut visited_positions = BTreeSet::new();
    let mut tokens: BTreeSet<PickedKeys> = BTreeSet::new();
    let mut queue: VecDeque<(Pos, PickedKeys)> = VecDeque::new();
    let mut best_target: Option<(u32, Pos)> = None;
    let mut states_explored = 0usize;

    let mut start_picked = PickedKeys::new();
    if let Some((id, _)) = grid.key_at(start) {
        start_picked.insert(id);
    }
    visited.insert((start, start_picked.clone()), 0);
    visited_positions.insert(start);
    tokens.insert(start_picked.clone());
    queue.push_back((start, start_picked));

    while let Some((pos, picked)) = queue.pop_front() {
        states_explored += 1;
        if states_explored > bounds.max_states {
            return SearchOutcome {
                found: None,
                visited_positions,
                bound_hit: Some(SearchBound::States),
            };
        }

        let dist =
            *visited.get(&(pos, picked.clone())).expect("dequeued state must have known distance");

        if let Some((best_dist, _)) = best_target
            && dist > best_dist
        {
            break;
        }

        if is_target(pos) {
            let better = match best_target {
                None => true,
                Some((best_dist, best_pos)) => {
                    dist < best_dist || (dist == best_dist && (pos.y, pos.x) < (best_pos.y, best_pos.x))
                }
            };
            if better {
                best_target = Some((dist, pos));
            }
            continue;
        }

        let possession = possession_with(grid, held, &picked);
        for neighbor in neighbors(pos) {
            if !grid.traversable(neighbor, &possession) {
                continue;
            }
            let mut next_picked = picked.clone();
            if let Some((id, _)) = grid.key_at(neighbor) {
                next_picked.insert(id);
            }
            if !tokens.contains(&next_picked) {
                if tokens.len() >= bounds.max_tokens {
                    return SearchOutcome {
                        found: None,
                        visited_positions,
                        bound_hit: Some(SearchBound::Tokens),
                    };
                }
                tokens.insert(next_picked.clone());
            }
            if let Entry::Vacant(entry) = visited.entry((neighbor, next_picked.clone())) {
                entry.insert(dist + 1);
                visited_positions.insert(neighbor);
                queue.push_back((neighbor, next_picked));
            }
        }
    }

    SearchOutcome { found: best_target.map(|(_, pos)| pos), visited_positions, bound_hit: None }
}

/// Flood fill over positions only, with a fixed possession and no pickups.
fn flood(grid: &Grid, start: Pos, possession: &Possession) -> BTreeSet<Pos> {
    let mut visited = BTreeSet::new();
    if !grid.traversable(start, possession) {
        return visited;
    }
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for neighbor in neighbors(current) {
            if grid.traversable(neighbor, possession) && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    visited
}

fn possession_with_all_doors_except(grid: &Grid, held: &Possession, locked: Option<DoorId>) -> Possession {
    let mut possession = held.clone();
    for door in grid.doors_present() {
        if Some(door) != locked && !possession.has_key(door) {
            possession.add_key(door);
        }
    }
    possession
}

/// Explains an exhaustive (unbounded-exit) search failure. Checks are
/// ordered from the strongest explanation to the weakest.
fn diagnose(
    grid: &Grid,
    start: Pos,
    held: &Possession,
    goal: Pos,
    visited_positions: &BTreeSet<Pos>,
) -> UnreachableReason {
    let all_keys = possession_with_all_doors_except(grid, held, None);
    if !flood(grid, start, &all_keys).contains(&goal) {
        return UnreachableReason::DisconnectedRegion;
    }

    let mut first_needed = None;
    for door in grid.doors_present() {
        if held.has_key(door) {
            continue;
        }
        let without = possession_with_all_doors_except(grid, held, Some(door));
        if flood(grid, start, &without).contains(&goal) {
            continue;
        }
        // This door gates every remaining route to the goal.
        if !grid.has_key_for(door) {
            return UnreachableReason::NoKeyInLevel(door);
        }
        if !grid.key_positions(door).iter().any(|pos| visited_positions.contains(pos)) {
            return UnreachableReason::KeyUnreachable(door);
        }
        if first_needed.is_none() {
            first_needed = Some(door);
        }
    }

    // Either one needed door resisted the simpler explanations, or only a
    // combination of doors blocks the goal. Report the lowest implicated
    // door either way.
    let culprit = first_needed
        .or_else(|| grid.doors_present().into_iter().find(|door| !held.has_key(*door)));
    match culprit {
        Some(door) => UnreachableReason::GateDeadlock(door),
        None => UnreachableReason::DisconnectedRegion,
    }
}
