//! Walkable terrain
//!
//! The economy only needs one question answered by the map: how far is it
//! to walk from one tile to another.

use std::collections::HashSet;

use crate::types::TileCoord;

/// Tile graph the agents walk on
pub trait TileGraph {
    /// Walking distance in tiles, `None` if there is no route
    fn walking_distance(&self, from: TileCoord, to: TileCoord) -> Option<f64>;
}

/// Flat open ground: Manhattan distance, everything reachable
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenTerrain;

impl TileGraph for OpenTerrain {
    fn walking_distance(&self, from: TileCoord, to: TileCoord) -> Option<f64> {
        Some(from.distance_to(&to) as f64)
    }
}

/// Open ground with some tiles nobody can enter
#[derive(Clone, Debug, Default)]
pub struct WalledTerrain {
    walls: HashSet<TileCoord>,
}

impl WalledTerrain {
    pub fn new(walls: impl IntoIterator<Item = TileCoord>) -> Self {
        WalledTerrain {
            walls: walls.into_iter().collect(),
        }
    }
}

impl TileGraph for WalledTerrain {
    fn walking_distance(&self, from: TileCoord, to: TileCoord) -> Option<f64> {
        if self.walls.contains(&from) || self.walls.contains(&to) {
            return None;
        }
        Some(from.distance_to(&to) as f64)
    }
}
