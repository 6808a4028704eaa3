//! Geometry helpers shared by clustering, steering, and targeting
//!
//! Positions are world units (pixels); the map is divided into square
//! tiles of [`TILE_SIZE`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Side length of a map tile in world units
pub const TILE_SIZE: f32 = 32.0;

/// Integer tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world position
    pub fn containing(pos: Vec2) -> Self {
        Self {
            x: (pos.x / TILE_SIZE).floor() as i32,
            y: (pos.y / TILE_SIZE).floor() as i32,
        }
    }

    /// World position of the tile center, `(x << 5) + 16`
    pub fn center(self) -> Vec2 {
        Vec2::new(((self.x << 5) + 16) as f32, ((self.y << 5) + 16) as f32)
    }
}

/// Distance between two axis-aligned unit footprints
///
/// Zero when the footprints touch or overlap.
pub fn edge_distance(a_pos: Vec2, a_size: Vec2, b_pos: Vec2, b_size: Vec2) -> f32 {
    let half = (a_size + b_size) * 0.5;
    let gap = ((a_pos - b_pos).abs() - half).max(Vec2::ZERO);
    gap.length()
}

/// Rescale a vector to the given length; zero vectors stay zero
pub fn scale_to(v: Vec2, length: f32) -> Vec2 {
    let current = v.length();
    if current < 0.0001 {
        Vec2::ZERO
    } else {
        v * (length / current)
    }
}

/// Cap the length of a vector
pub fn clamp_length(v: Vec2, max: f32) -> Vec2 {
    if v.length_squared() > max * max {
        scale_to(v, max)
    } else {
        v
    }
}

/// Absolute distance of `point` from the line through `origin` along `direction`
pub fn lateral_offset(point: Vec2, origin: Vec2, direction: Vec2) -> f32 {
    let dir = direction.normalize_or_zero();
    if dir == Vec2::ZERO {
        return point.distance(origin);
    }
    dir.perp_dot(point - origin).abs()
}

/// Tiles crossed by the segment from `from` to `to`, in order, without repeats
pub fn tiles_between(from: Vec2, to: Vec2) -> Vec<TilePos> {
    let steps = (from.distance(to) / (TILE_SIZE / 2.0)).ceil().max(1.0) as usize;
    let mut tiles: Vec<TilePos> = Vec::with_capacity(steps + 1);
    for i in 0..=steps {
        let tile = TilePos::containing(from.lerp(to, i as f32 / steps as f32));
        if tiles.last() != Some(&tile) {
            tiles.push(tile);
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_distance_touching_is_zero() {
        let size = Vec2::new(16.0, 16.0);
        assert_eq!(edge_distance(Vec2::ZERO, size, Vec2::new(16.0, 0.0), size), 0.0);
        assert!((edge_distance(Vec2::ZERO, size, Vec2::new(36.0, 0.0), size) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_tile_center() {
        assert_eq!(TilePos::new(2, 3).center(), Vec2::new(80.0, 112.0));
        assert_eq!(TilePos::containing(Vec2::new(80.0, 112.0)), TilePos::new(2, 3));
    }

    #[test]
    fn test_scale_and_clamp() {
        assert_eq!(scale_to(Vec2::ZERO, 10.0), Vec2::ZERO);
        let v = clamp_length(Vec2::new(300.0, 400.0), 80.0);
        assert!((v.length() - 80.0).abs() < 1e-3);
        assert_eq!(clamp_length(Vec2::new(3.0, 4.0), 80.0), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_lateral_offset() {
        let offset = lateral_offset(Vec2::new(10.0, 5.0), Vec2::ZERO, Vec2::new(1.0, 0.0));
        assert!((offset - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_tiles_between_is_contiguous() {
        let tiles = tiles_between(Vec2::new(16.0, 16.0), Vec2::new(16.0 + 32.0 * 5.0, 16.0));
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles.first(), Some(&TilePos::new(0, 0)));
        assert_eq!(tiles.last(), Some(&TilePos::new(5, 0)));
    }
}
