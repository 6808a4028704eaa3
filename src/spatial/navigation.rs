//! Navigation grids: per-destination cost fields
//!
//! A grid stores, for every reachable tile, the path cost to a destination
//! and the neighbouring tile to step to next. Costs are 10 per orthogonal
//! step and 14 per diagonal step.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec2;

use crate::spatial::geometry::{TilePos, TILE_SIZE};
use crate::spatial::grid::TileGrid;

const STRAIGHT_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NavEntry {
    cost: u32,
    next: Option<TilePos>,
}

impl Default for NavEntry {
    fn default() -> Self {
        Self {
            cost: u32::MAX,
            next: None,
        }
    }
}

/// Reachable tile of a navigation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavNode {
    pub tile: TilePos,
    pub cost: u32,
    next: Option<TilePos>,
}

impl NavNode {
    pub fn center(&self) -> Vec2 {
        self.tile.center()
    }

    pub fn is_destination(&self) -> bool {
        self.next.is_none()
    }
}

/// Node in the Dijkstra open set
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    tile: TilePos,
    cost: u32,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.tile == other.tile
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; tie-break on tile for determinism
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| (other.tile.y, other.tile.x).cmp(&(self.tile.y, self.tile.x)))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost field toward one destination
#[derive(Debug, Clone)]
pub struct NavigationGrid {
    pub destination: Vec2,
    entries: TileGrid<NavEntry>,
}

impl NavigationGrid {
    /// Flood the walkable tiles outward from `destination`
    ///
    /// Diagonal steps are only taken when both adjacent orthogonal tiles are
    /// walkable, so paths never cut corners.
    pub fn build(
        width: usize,
        height: usize,
        destination: Vec2,
        is_walkable: impl Fn(TilePos) -> bool,
    ) -> Self {
        let mut entries: TileGrid<NavEntry> = TileGrid::new(width, height);
        let goal = TilePos::containing(destination);
        if !entries.contains(goal) || !is_walkable(goal) {
            return Self {
                destination,
                entries,
            };
        }

        let mut open = BinaryHeap::new();
        entries.set(goal, NavEntry { cost: 0, next: None });
        open.push(OpenNode { tile: goal, cost: 0 });

        while let Some(current) = open.pop() {
            let Some(entry) = entries.get(current.tile) else {
                continue;
            };
            if current.cost > entry.cost {
                continue;
            }

            for (dx, dy) in [
                (1, 0),
                (-1, 0),
                (0, 1),
                (0, -1),
                (1, 1),
                (1, -1),
                (-1, 1),
                (-1, -1),
            ] {
                let neighbor = TilePos::new(current.tile.x + dx, current.tile.y + dy);
                if !entries.contains(neighbor) || !is_walkable(neighbor) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && (!is_walkable(TilePos::new(current.tile.x + dx, current.tile.y))
                        || !is_walkable(TilePos::new(current.tile.x, current.tile.y + dy)))
                {
                    continue;
                }
                let step = if diagonal { DIAGONAL_COST } else { STRAIGHT_COST };
                let cost = current.cost + step;
                if let Some(existing) = entries.get_mut(neighbor) {
                    if cost < existing.cost {
                        *existing = NavEntry {
                            cost,
                            next: Some(current.tile),
                        };
                        open.push(OpenNode { tile: neighbor, cost });
                    }
                }
            }
        }

        Self {
            destination,
            entries,
        }
    }

    /// Node under a world position, if that tile can reach the destination
    pub fn node_at(&self, pos: Vec2) -> Option<NavNode> {
        self.node(TilePos::containing(pos))
    }

    pub fn node(&self, tile: TilePos) -> Option<NavNode> {
        let entry = self.entries.get(tile)?;
        if entry.cost == u32::MAX {
            return None;
        }
        Some(NavNode {
            tile,
            cost: entry.cost,
            next: entry.next,
        })
    }

    /// Next node along the path, or `None` at the destination
    pub fn next(&self, node: &NavNode) -> Option<NavNode> {
        node.next.and_then(|tile| self.node(tile))
    }

    /// Node `hops` steps further along the path
    ///
    /// Near the destination the walk may cover fewer than `hops` steps; it
    /// stops on the destination node.
    pub fn ahead(&self, node: NavNode, hops: usize) -> NavNode {
        let mut current = node;
        for _ in 0..hops {
            match self.next(&current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Path distance in world units from a position to the destination
    pub fn path_distance(&self, pos: Vec2) -> Option<f32> {
        self.node_at(pos)
            .map(|node| node.cost as f32 * TILE_SIZE / STRAIGHT_COST as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_field(width: usize, height: usize, goal: TilePos) -> NavigationGrid {
        NavigationGrid::build(width, height, goal.center(), |_| true)
    }

    #[test]
    fn test_destination_has_zero_cost() {
        let grid = open_field(10, 10, TilePos::new(5, 5));
        let node = grid.node(TilePos::new(5, 5)).unwrap();
        assert_eq!(node.cost, 0);
        assert!(node.is_destination());
    }

    #[test]
    fn test_costs_are_straight_and_diagonal() {
        let grid = open_field(10, 10, TilePos::new(0, 0));
        assert_eq!(grid.node(TilePos::new(3, 0)).unwrap().cost, 30);
        assert_eq!(grid.node(TilePos::new(2, 2)).unwrap().cost, 28);
    }

    #[test]
    fn test_ahead_walks_toward_destination_and_stops() {
        let grid = open_field(10, 1, TilePos::new(0, 0));
        let start = grid.node(TilePos::new(8, 0)).unwrap();
        assert_eq!(grid.ahead(start, 3).tile, TilePos::new(5, 0));
        assert_eq!(grid.ahead(start, 50).tile, TilePos::new(0, 0));
    }

    #[test]
    fn test_walls_route_around_and_islands_unreachable() {
        // Wall at x = 3 except a gap at y = 4; tile (8, 8) is walled in.
        let walkable = |t: TilePos| {
            if t.x == 3 {
                return t.y == 4;
            }
            !(t.x >= 7 && t.y >= 7 && (t.x == 7 || t.y == 7))
        };
        let grid = NavigationGrid::build(10, 10, TilePos::new(0, 0).center(), walkable);
        let behind_wall = grid.node(TilePos::new(4, 0)).unwrap();
        assert!(behind_wall.cost > 40);
        assert!(grid.node(TilePos::new(8, 8)).is_none());
        assert!(grid.path_distance(TilePos::new(8, 8).center()).is_none());
    }
}
