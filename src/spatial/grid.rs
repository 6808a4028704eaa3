//! Generic tile grid for spatial data

use glam::Vec2;

use crate::spatial::geometry::{TilePos, TILE_SIZE};

/// Generic 2D grid with one cell per map tile
#[derive(Debug, Clone)]
pub struct TileGrid<T: Clone + Default> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> TileGrid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as usize) < self.width && (tile.y as usize) < self.height
    }

    #[inline]
    pub fn get(&self, tile: TilePos) -> Option<&T> {
        if self.contains(tile) {
            Some(&self.data[tile.y as usize * self.width + tile.x as usize])
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, tile: TilePos) -> Option<&mut T> {
        if self.contains(tile) {
            Some(&mut self.data[tile.y as usize * self.width + tile.x as usize])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, tile: TilePos, value: T) {
        if let Some(cell) = self.get_mut(tile) {
            *cell = value;
        }
    }

    /// Sample grid at world position
    pub fn sample(&self, pos: Vec2) -> Option<&T> {
        self.get(TilePos::containing(pos))
    }

    /// Set every tile of the inclusive rectangle
    pub fn fill_rect(&mut self, from: TilePos, to: TilePos, value: T) {
        for y in from.y.min(to.y)..=from.y.max(to.y) {
            for x in from.x.min(to.x)..=from.x.max(to.x) {
                self.set(TilePos::new(x, y), value.clone());
            }
        }
    }

    /// Map extent in world units
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.width as f32 * TILE_SIZE, self.height as f32 * TILE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_reads_are_none() {
        let grid: TileGrid<u8> = TileGrid::new(4, 4);
        assert!(grid.get(TilePos::new(-1, 0)).is_none());
        assert!(grid.get(TilePos::new(4, 0)).is_none());
        assert_eq!(grid.get(TilePos::new(3, 3)), Some(&0));
    }

    #[test]
    fn test_fill_rect_and_sample() {
        let mut grid: TileGrid<u8> = TileGrid::new(8, 8);
        grid.fill_rect(TilePos::new(2, 2), TilePos::new(3, 4), 7);
        assert_eq!(grid.sample(Vec2::new(2.0 * 32.0 + 5.0, 4.0 * 32.0 + 31.0)), Some(&7));
        assert_eq!(grid.sample(Vec2::new(1.0 * 32.0, 2.0 * 32.0)), Some(&0));
    }
}
