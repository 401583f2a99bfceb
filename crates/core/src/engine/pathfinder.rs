//! Shortest-path movement and the ordered fallback strategy chain.
//! All walkability questions defer to `Grid::traversable`, so a path can
//! never cross a gate the possession in the query does not open.

use std::collections::{BTreeMap, BTreeSet};

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::Rng;

use super::*;
use crate::grid::{Grid, manhattan, neighbors};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f: u32,
    h: u32,
    y: i32,
    x: i32,
}

/// Shortest path from `start` to `goal` under the given keys, excluding
/// `start` and including `goal`. `None` when no such path exists.
pub fn astar_path(grid: &Grid, start: Pos, goal: Pos, held: &Possession) -> Option<Vec<Pos>> {
    if !grid.traversable(start, held) || !grid.traversable(goal, held) {
        return None;
    }
    if start == goal {
        return Some(vec![]);
    }

    let mut open_set = BTreeSet::new();
    let mut g_score = BTreeMap::new();
    let mut came_from = BTreeMap::new();
    let h = manhattan(start, goal);
    open_set.insert(OpenNode { f: h, h, y: start.y, x: start.x });
    g_score.insert(start, 0u32);

    while let Some(current_node) = open_set.pop_first() {
        let current = Pos { y: current_node.y, x: current_node.x };
        if current == goal {
            return Some(reconstruct_path(&came_from, start, goal));
        }
        let current_g = *g_score.get(&current).expect("open node must have a g-score");
        for neighbor in neighbors(current) {
            if !grid.traversable(neighbor, held) {
                continue;
            }
            let tentative_g = current_g + 1;
            if tentative_g < *g_score.get(&neighbor).unwrap_or(&u32::MAX) {
                came_from.insert(neighbor, current);
                g_score.insert(neighbor, tentative_g);
                let h = manhattan(neighbor, goal);
                open_set.insert(OpenNode { f: tentative_g + h, h, y: neighbor.y, x: neighbor.x });
            }
        }
    }
    None
}

fn reconstruct_path(came_from: &BTreeMap<Pos, Pos>, start: Pos, goal: Pos) -> Vec<Pos> {
    let mut current = goal;
    let mut path = vec![current];
    while current != start {
        current = *came_from.get(&current).expect("path must be reconstructible");
        path.push(current);
    }
    path.reverse();
    path.remove(0);
    path
}

/// Shortest path that may spend up to `detour_budget` extra steps to walk
/// over an item, keeping the detour only when the item value beats the
/// extra steps. Falls back to the plain shortest path.
pub fn astar_path_collecting(
    grid: &Grid,
    start: Pos,
    goal: Pos,
    held: &Possession,
    detour_budget: u32,
) -> Option<Vec<Pos>> {
    let direct = astar_path(grid, start, goal, held)?;
    let direct_len = direct.len() as u32;

    let mut best: Option<(i64, u32, Pos, Vec<Pos>)> = None;
    for (_, resource) in grid.resources() {
        if resource.kind != ResourceKind::Item {
            continue;
        }
        let Some(leg_in) = astar_path(grid, start, resource.pos, held) else {
            continue;
        };
        let Some(leg_out) = astar_path(grid, resource.pos, goal, held) else {
            continue;
        };
        let total = (leg_in.len() + leg_out.len()) as u32;
        if total > direct_len + detour_budget {
            continue;
        }
        let extra = total - direct_len.min(total);
        let gain = i64::from(resource.value) - i64::from(extra);
        if gain <= 0 {
            continue;
        }
        let better = match &best {
            None => true,
            Some((best_gain, best_extra, best_pos, _)) => {
                gain > *best_gain
                    || (gain == *best_gain && extra < *best_extra)
                    || (gain == *best_gain
                        && extra == *best_extra
                        && (resource.pos.y, resource.pos.x) < (best_pos.y, best_pos.x))
            }
        };
        if better {
            let mut stitched = leg_in;
            stitched.extend(leg_out);
            best = Some((gain, extra, resource.pos, stitched));
        }
    }

    Some(best.map_or(direct, |(_, _, _, path)| path))
}

/// First step of the shortest path, or `None` when blocked.
pub fn next_step(grid: &Grid, start: Pos, goal: Pos, held: &Possession) -> Option<Direction> {
    let path = astar_path(grid, start, goal, held)?;
    let first = path.first()?;
    Direction::between(start, *first)
}

/// One "go from here to there" question, shared by every strategy.
pub struct StepQuery<'a> {
    pub grid: &'a Grid,
    pub start: Pos,
    pub target: Pos,
    pub held: &'a Possession,
}

/// A single way of answering a step query. Strategies are composed into
/// an ordered chain; the first one that produces a step wins.
pub trait StepStrategy {
    fn name(&self) -> &'static str;
    fn try_step(&self, query: &StepQuery<'_>) -> Option<Direction>;
}

/// Direct shortest path, optionally detouring over valuable items.
pub struct DirectStrategy {
    pub detour_budget: u32,
}

impl StepStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn try_step(&self, query: &StepQuery<'_>) -> Option<Direction> {
        let path = if self.detour_budget > 0 {
            astar_path_collecting(
                query.grid,
                query.start,
                query.target,
                query.held,
                self.detour_budget,
            )?
        } else {
            astar_path(query.grid, query.start, query.target, query.held)?
        };
        Direction::between(query.start, *path.first()?)
    }
}

/// When every direct route is gated shut, walk toward the nearest
/// reachable key for the first missing door instead.
pub struct KeySeekStrategy {
    pub bounds: Bounds,
}

impl KeySeekStrategy {
    /// Door of the first unopenable gate on the route the agent would take
    /// if it held every key. `None` when no route exists at all.
    fn required_door(&self, query: &StepQuery<'_>) -> Option<DoorId> {
        let mut all_keys = query.held.clone();
        for door in query.grid.doors_present() {
            if !all_keys.has_key(door) {
                all_keys.add_key(door);
            }
        }
        let path = astar_path(query.grid, query.start, query.target, &all_keys)?;
        path.iter().find_map(|pos| match query.grid.tile_at(*pos) {
            TileKind::Gated(door) if !query.held.has_key(door) => Some(door),
            _ => None,
        })
    }
}

impl StepStrategy for KeySeekStrategy {
    fn name(&self) -> &'static str {
        "key_seek"
    }

    fn try_step(&self, query: &StepQuery<'_>) -> Option<Direction> {
        let door = self.required_door(query)?;
        let key_pos =
            nearest_reachable_key(query.grid, query.start, query.held, door, self.bounds)?;
        next_step(query.grid, query.start, key_pos, query.held)
    }
}

/// Last resort: any adjacent traversable cell that strictly reduces
/// Manhattan distance, in fixed N/E/S/W order.
pub struct GreedyStrategy;

impl StepStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn try_step(&self, query: &StepQuery<'_>) -> Option<Direction> {
        greedy_candidates(query).first().and_then(|pos| Direction::between(query.start, *pos))
    }
}

/// Adjacent cells that strictly reduce distance, closest first, stable
/// N/E/S/W order within a distance.
fn greedy_candidates(query: &StepQuery<'_>) -> Vec<Pos> {
    let current = manhattan(query.start, query.target);
    let mut candidates: Vec<(u32, usize, Pos)> = neighbors(query.start)
        .into_iter()
        .enumerate()
        .filter(|(_, pos)| grid_step_ok(query, *pos))
        .map(|(order, pos)| (manhattan(pos, query.target), order, pos))
        .filter(|(dist, _, _)| *dist < current)
        .collect();
    candidates.sort();
    candidates.into_iter().map(|(_, _, pos)| pos).collect()
}

fn grid_step_ok(query: &StepQuery<'_>, pos: Pos) -> bool {
    query.grid.traversable(pos, query.held)
}

/// Greedy step with an explicit tie-breaking random source: among the
/// equally-close candidates, one is chosen by the caller's RNG. Without
/// an RNG the chain stays fully deterministic.
pub fn greedy_step_with_tiebreak(
    query: &StepQuery<'_>,
    rng: &mut ChaCha8Rng,
) -> Option<Direction> {
    let candidates = greedy_candidates(query);
    let best_dist = manhattan(*candidates.first()?, query.target);
    let tied: Vec<Pos> = candidates
        .into_iter()
        .filter(|pos| manhattan(*pos, query.target) == best_dist)
        .collect();
    let pick = tied[(rng.next_u64() as usize) % tied.len()];
    Direction::between(query.start, pick)
}

/// Ordered list of strategies; first success wins. Replaces nested
/// conditional fallthrough with one explicit combinator.
pub struct StrategyChain {
    strategies: Vec<Box<dyn StepStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn StepStrategy>>) -> StrategyChain {
        StrategyChain { strategies }
    }

    /// Direct (with item detours) → key seeking → greedy.
    pub fn standard(detour_budget: u32, bounds: Bounds) -> StrategyChain {
        StrategyChain::new(vec![
            Box::new(DirectStrategy { detour_budget }),
            Box::new(KeySeekStrategy { bounds }),
            Box::new(GreedyStrategy),
        ])
    }

    pub fn resolve(&self, query: &StepQuery<'_>) -> Option<(&'static str, Direction)> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.try_step(query).map(|step| (strategy.name(), step)))
    }
}
