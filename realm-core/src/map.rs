//! Static tile map: walkability oracle and the `MAP_DATA` payload.
//!
//! Tiles are addressed `[y][x]`; a world coordinate maps to the tile that
//! contains it (`floor`). Anything outside the grid is not walkable.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const TILE_GRASS: &str = "grass";
pub const TILE_MOUNTAIN: &str = "mountain";
pub const TILE_WATER: &str = "water";

fn default_speed_modifier() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadata {
    pub is_walkable: bool,
    #[serde(default = "default_speed_modifier")]
    pub speed_modifier: f32,
    pub asset_id: u32,
}

pub type TileSet = BTreeMap<String, TileMetadata>;

/// The grass/mountain/water set every map falls back to.
pub fn default_tileset() -> TileSet {
    let mut set = TileSet::new();
    set.insert(
        TILE_GRASS.into(),
        TileMetadata {
            is_walkable: true,
            speed_modifier: 1.0,
            asset_id: 1,
        },
    );
    set.insert(
        TILE_MOUNTAIN.into(),
        TileMetadata {
            is_walkable: false,
            speed_modifier: 0.0,
            asset_id: 2,
        },
    );
    set.insert(
        TILE_WATER.into(),
        TileMetadata {
            is_walkable: false,
            speed_modifier: 0.0,
            asset_id: 3,
        },
    );
    set
}

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("map `{0}` has no tiles")]
    Empty(String),
    #[error("map `{map}` row {row} has {found} tiles, expected {expected}")]
    Ragged {
        map: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("map `{map}` uses tile type `{tile}` missing from its tileset")]
    UnknownTile { map: String, tile: String },
}

/// Payload of `MAP_DATA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Vec<String>>,
    pub metadata: TileSet,
}

#[derive(Resource, Debug, Clone)]
pub struct GameMap {
    name: String,
    width: usize,
    height: usize,
    /// Distinct tile type names; `cells` index into this.
    kinds: Vec<String>,
    cells: Vec<u16>,
    tileset: TileSet,
}

impl GameMap {
    pub fn from_rows(
        name: impl Into<String>,
        rows: Vec<Vec<String>>,
        tileset: TileSet,
    ) -> Result<Self, MapError> {
        let name = name.into();
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(MapError::Empty(name));
        }

        let mut kinds: Vec<String> = Vec::new();
        let mut cells = Vec::with_capacity(width * height);
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(MapError::Ragged {
                    map: name,
                    row: row_idx,
                    expected: width,
                    found: row.len(),
                });
            }
            for tile in row {
                if !tileset.contains_key(&tile) {
                    return Err(MapError::UnknownTile { map: name, tile });
                }
                let idx = match kinds.iter().position(|k| *k == tile) {
                    Some(idx) => idx,
                    None => {
                        kinds.push(tile);
                        kinds.len() - 1
                    }
                };
                cells.push(idx as u16);
            }
        }

        Ok(Self {
            name,
            width,
            height,
            kinds,
            cells,
            tileset,
        })
    }

    /// Grass field with a mountain border, a mountain block at 20..30 and a
    /// lake at x 50..60, y 40..50 (both clipped to the map).
    pub fn generate_default(name: impl Into<String>, width: usize, height: usize) -> Self {
        let mut rows = vec![vec![TILE_GRASS.to_string(); width]; height];
        let mut paint = |xs: std::ops::Range<usize>, ys: std::ops::Range<usize>, tile: &str| {
            for y in ys.clone() {
                for x in xs.clone() {
                    if y < height && x < width {
                        rows[y][x] = tile.to_string();
                    }
                }
            }
        };
        paint(20..30, 20..30, TILE_MOUNTAIN);
        paint(50..60, 40..50, TILE_WATER);
        paint(0..width, 0..1, TILE_MOUNTAIN);
        paint(0..width, height.saturating_sub(1)..height, TILE_MOUNTAIN);
        paint(0..1, 0..height, TILE_MOUNTAIN);
        paint(width.saturating_sub(1)..width, 0..height, TILE_MOUNTAIN);

        let name = name.into();
        Self::from_rows(name.clone(), rows, default_tileset()).unwrap_or_else(|_| Self {
            // only reachable for a 0x0 request
            name,
            width: 0,
            height: 0,
            kinds: Vec::new(),
            cells: Vec::new(),
            tileset: default_tileset(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_at(&self, x: f32, y: f32) -> Option<&str> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (tx, ty) = (x.floor(), y.floor());
        if tx < 0.0 || ty < 0.0 || tx >= self.width as f32 || ty >= self.height as f32 {
            return None;
        }
        let idx = ty as usize * self.width + tx as usize;
        self.cells
            .get(idx)
            .and_then(|kind| self.kinds.get(*kind as usize))
            .map(String::as_str)
    }

    pub fn metadata(&self, tile: &str) -> Option<&TileMetadata> {
        self.tileset.get(tile)
    }

    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.tile_at(x, y)
            .and_then(|tile| self.metadata(tile))
            .is_some_and(|meta| meta.is_walkable)
    }

    pub fn map_data(&self) -> MapData {
        let tiles = (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.kinds[self.cells[y * self.width + x] as usize].clone())
                    .collect()
            })
            .collect();
        MapData {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            tiles,
            metadata: self.tileset.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|row| row.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_default_map_layout() {
        let map = GameMap::generate_default("Starting_Area", 100, 100);
        assert!(map.is_walkable(10.0, 10.0));
        assert!(!map.is_walkable(0.5, 10.0), "border is mountain");
        assert!(!map.is_walkable(25.0, 25.0), "mountain block");
        assert!(!map.is_walkable(55.0, 45.0), "lake");
        assert!(map.is_walkable(55.0, 30.0));
        assert_eq!(map.tile_at(55.2, 45.9), Some(TILE_WATER));
    }

    #[test]
    fn test_out_of_bounds_is_not_walkable() {
        let map = GameMap::generate_default("m", 100, 100);
        assert!(!map.is_walkable(-0.5, 10.0));
        assert!(!map.is_walkable(10.0, 100.0));
        assert!(!map.is_walkable(f32::NAN, 10.0));
        assert_eq!(map.tile_at(100.0, 1.0), None);
    }

    #[test]
    fn test_from_rows_rejects_ragged_and_unknown() {
        let ragged = rows(&[&["grass", "grass"], &["grass"]]);
        assert!(matches!(
            GameMap::from_rows("r", ragged, default_tileset()),
            Err(MapError::Ragged { row: 1, .. })
        ));
        let unknown = rows(&[&["grass", "lava"]]);
        assert!(matches!(
            GameMap::from_rows("u", unknown, default_tileset()),
            Err(MapError::UnknownTile { tile, .. }) if tile == "lava"
        ));
        assert!(matches!(
            GameMap::from_rows("e", Vec::new(), default_tileset()),
            Err(MapError::Empty(_))
        ));
    }

    #[test]
    fn test_map_data_preserves_rows() {
        let map = GameMap::from_rows(
            "tiny",
            rows(&[&["grass", "water"], &["mountain", "grass"]]),
            default_tileset(),
        )
        .unwrap();
        let data = map.map_data();
        assert_eq!(data.width, 2);
        assert_eq!(data.tiles[0][1], "water");
        assert_eq!(data.tiles[1][0], "mountain");
        assert_eq!(data.metadata["water"].asset_id, 3);
    }
}
