//! Terrain, pathing, and influence-grid collaborators
//!
//! These are read-only interfaces onto systems owned by the caller. The
//! engine tolerates missing data from all of them.

use glam::Vec2;

use crate::core::types::ChokeId;
use crate::spatial::geometry::TilePos;
use crate::spatial::navigation::NavigationGrid;

/// Tiles scanned per direction by [`Terrain::walkable_width`]
const WIDTH_SCAN_LIMIT: i32 = 20;

/// A passage between two regions of the map
///
/// `end1` and `end2` are the two mouths of the passage; the axis between
/// them is the direction of travel through it.
#[derive(Debug, Clone, PartialEq)]
pub struct Choke {
    pub id: ChokeId,
    pub center: Vec2,
    pub end1: Vec2,
    pub end2: Vec2,
    pub width: f32,
    pub narrow: bool,
}

impl Choke {
    pub fn length(&self) -> f32 {
        self.end1.distance(self.end2)
    }

    /// Signed progress of `pos` along the passage axis, negative toward `end1`
    pub fn axial_offset(&self, pos: Vec2) -> f32 {
        let axis = (self.end2 - self.end1).normalize_or_zero();
        axis.dot(pos - self.center)
    }

    /// The mouth on the same side of the choke as `pos`
    pub fn end_facing(&self, pos: Vec2) -> Vec2 {
        if self.axial_offset(pos) <= 0.0 {
            self.end1
        } else {
            self.end2
        }
    }

    /// Whether two positions are on opposite sides of the passage
    pub fn separates(&self, a: Vec2, b: Vec2) -> bool {
        let (oa, ob) = (self.axial_offset(a), self.axial_offset(b));
        oa * ob < 0.0
    }

    /// Inside the passage footprint
    pub fn contains(&self, pos: Vec2) -> bool {
        let axis = (self.end2 - self.end1).normalize_or_zero();
        let offset = pos - self.center;
        axis.dot(offset).abs() <= self.length() / 2.0 + 16.0
            && axis.perp_dot(offset).abs() <= self.width / 2.0 + 16.0
    }
}

/// Static map knowledge
pub trait Terrain {
    fn is_walkable(&self, pos: Vec2) -> bool;

    fn elevation(&self, pos: Vec2) -> u8;

    fn chokes(&self) -> &[Choke];

    /// Own main base, used as the withdrawal destination
    fn home_position(&self) -> Vec2;

    /// Narrow choke whose footprint contains `pos`
    fn narrow_choke_at(&self, pos: Vec2) -> Option<&Choke> {
        self.chokes().iter().find(|c| c.narrow && c.contains(pos))
    }

    /// Narrow choke lying between two positions, if any
    fn narrow_choke_between(&self, a: Vec2, b: Vec2) -> Option<&Choke> {
        self.chokes()
            .iter()
            .filter(|c| c.narrow && c.separates(a, b))
            .find(|c| point_segment_distance(c.center, a, b) <= c.width.max(64.0))
    }

    /// Open ground around `pos`, in tiles
    ///
    /// The narrowest of the four axes (two straight, two diagonal), each
    /// counted as the walkable run on both sides of the tile. Zero when
    /// `pos` itself is blocked.
    fn walkable_width(&self, pos: Vec2) -> u32 {
        let origin = TilePos::containing(pos);
        if !self.is_walkable(origin.center()) {
            return 0;
        }
        let run = |dx: i32, dy: i32| {
            (1..=WIDTH_SCAN_LIMIT)
                .take_while(|step| self.is_walkable(TilePos::new(origin.x + dx * step, origin.y + dy * step).center()))
                .count() as u32
        };
        [(1, 0), (0, 1), (1, 1), (1, -1)]
            .into_iter()
            .map(|(dx, dy)| 1 + run(dx, dy) + run(-dx, -dy))
            .min()
            .unwrap_or(0)
    }
}

/// Ground pathing queries
pub trait Pathing {
    /// Walking distance, or `None` when no path data exists
    fn ground_distance(&self, from: Vec2, to: Vec2) -> Option<f32>;

    /// Precomputed navigation grid toward `destination`, if one exists
    fn navigation_grid(&self, destination: Vec2) -> Option<&NavigationGrid>;
}

/// Per-position influence values for one player
///
/// For the own grid, `detection` is own detection coverage. For the enemy
/// grid, values describe what the enemy can see and shoot.
pub trait InfluenceGrid {
    fn detection(&self, pos: Vec2) -> i32;
    fn ground_threat(&self, pos: Vec2) -> i32;
    fn air_threat(&self, pos: Vec2) -> i32;
    fn static_ground_threat(&self, pos: Vec2) -> i32;
}

fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 0.0001 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
