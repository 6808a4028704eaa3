//! Spatial primitives: tiles, geometry helpers, and navigation grids

pub mod geometry;
pub mod grid;
pub mod navigation;

pub use geometry::{edge_distance, TilePos, TILE_SIZE};
pub use grid::TileGrid;
pub use navigation::{NavNode, NavigationGrid};
