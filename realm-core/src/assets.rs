//! Static game data: maps, tilesets, class metadata, monsters and spawn zones.
//!
//! ```text
//! data/
//! ├── maps.json      [{name, tileset, legend: {"." : "grass"}, rows: ["^^^", ...]}]
//! ├── tilesets.json  {tileset: {tile_type: {is_walkable, speed_modifier, asset_id}}}
//! ├── classes.json   {class: {base_health, class_bonus, evolution: {level, to_classes}}}
//! └── monsters.json  {templates: [...], spawn_zones: [...]}
//! ```
//!
//! The same files are compiled into the crate (`AssetCatalog::bundled`) so a
//! server can run without a data directory. Any load failure is fatal.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::components::Attributes;
use crate::constants::{DEFAULT_BASE_HEALTH, DEFAULT_CLASS};
use crate::map::{GameMap, MapError, TileSet};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("map `{0}` is not defined")]
    UnknownMap(String),
    #[error("map `{map}` references unknown tileset `{tileset}`")]
    UnknownTileset { map: String, tileset: String },
    #[error("map `{map}` uses symbol `{symbol}` missing from its legend")]
    BadLegend { map: String, symbol: char },
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("class metadata has no `{0}` entry")]
    MissingDefaultClass(String),
}

// ============================================================================
// Class metadata
// ============================================================================

fn default_base_health() -> u32 {
    DEFAULT_BASE_HEALTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRule {
    pub level: u32,
    pub to_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetadata {
    #[serde(default = "default_base_health")]
    pub base_health: u32,
    #[serde(default)]
    pub class_bonus: Attributes,
    #[serde(default)]
    pub evolution: Option<EvolutionRule>,
}

/// Class name → metadata. Read-only once the world is running.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassMetadata>,
}

impl ClassRegistry {
    pub fn get(&self, name: &str) -> Option<&ClassMetadata> {
        self.classes.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, metadata: ClassMetadata) {
        self.classes.insert(name.into(), metadata);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// Monsters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub asset_type: String,
    pub level: u32,
    pub base_health: u32,
    pub strength: u32,
    pub vitality: u32,
    #[serde(default)]
    pub radius: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnZone {
    pub zone_name: String,
    pub monster_asset_type: String,
    pub map_name: String,
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    pub max_mobs_in_zone: u32,
    #[serde(default)]
    pub respawn_time_seconds: f32,
}

#[derive(Debug, Deserialize)]
struct MonsterFile {
    #[serde(default)]
    templates: Vec<MonsterTemplate>,
    #[serde(default)]
    spawn_zones: Vec<SpawnZone>,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct MonsterCatalog {
    templates: HashMap<String, MonsterTemplate>,
    pub spawn_zones: Vec<SpawnZone>,
}

impl MonsterCatalog {
    pub fn new(templates: Vec<MonsterTemplate>, spawn_zones: Vec<SpawnZone>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.asset_type.clone(), t))
                .collect(),
            spawn_zones,
        }
    }

    pub fn template(&self, asset_type: &str) -> Option<&MonsterTemplate> {
        self.templates.get(asset_type)
    }

    pub fn zones_for_map<'a>(&'a self, map_name: &'a str) -> impl Iterator<Item = &'a SpawnZone> {
        self.spawn_zones
            .iter()
            .filter(move |zone| zone.map_name == map_name)
    }
}

// ============================================================================
// Maps
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefinition {
    pub name: String,
    pub tileset: String,
    /// Single-character symbol → tile type.
    pub legend: BTreeMap<String, String>,
    pub rows: Vec<String>,
}

// ============================================================================
// Catalog
// ============================================================================

/// Raw JSON text of the four data files.
pub struct AssetSources<'a> {
    pub maps: &'a str,
    pub tilesets: &'a str,
    pub classes: &'a str,
    pub monsters: &'a str,
}

#[derive(Debug, Clone)]
pub struct AssetCatalog {
    pub maps: Vec<MapDefinition>,
    pub tilesets: BTreeMap<String, TileSet>,
    pub classes: ClassRegistry,
    pub monsters: MonsterCatalog,
}

fn parse<T: for<'de> Deserialize<'de>>(file: &str, text: &str) -> Result<T, AssetError> {
    serde_json::from_str(text).map_err(|source| AssetError::Json {
        file: file.to_string(),
        source,
    })
}

fn read(dir: &Path, file: &str) -> Result<String, AssetError> {
    let path = dir.join(file);
    std::fs::read_to_string(&path).map_err(|source| AssetError::Io { path, source })
}

impl AssetCatalog {
    pub fn from_sources(sources: AssetSources<'_>) -> Result<Self, AssetError> {
        let maps: Vec<MapDefinition> = parse("maps.json", sources.maps)?;
        let tilesets: BTreeMap<String, TileSet> = parse("tilesets.json", sources.tilesets)?;
        let classes: ClassRegistry = parse("classes.json", sources.classes)?;
        let monster_file: MonsterFile = parse("monsters.json", sources.monsters)?;

        if classes.get(DEFAULT_CLASS).is_none() {
            return Err(AssetError::MissingDefaultClass(DEFAULT_CLASS.to_string()));
        }
        for (name, metadata) in &classes.classes {
            let Some(evolution) = &metadata.evolution else {
                continue;
            };
            for target in &evolution.to_classes {
                if classes.get(target).is_none() {
                    warn!("Class {} evolves into undefined class {}", name, target);
                }
            }
        }

        let monsters = MonsterCatalog::new(monster_file.templates, monster_file.spawn_zones);
        for zone in &monsters.spawn_zones {
            if monsters.template(&zone.monster_asset_type).is_none() {
                warn!(
                    "Spawn zone {} references unknown monster {}",
                    zone.zone_name, zone.monster_asset_type
                );
            }
        }

        Ok(Self {
            maps,
            tilesets,
            classes,
            monsters,
        })
    }

    /// Loads every data file from `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        let maps = read(dir, "maps.json")?;
        let tilesets = read(dir, "tilesets.json")?;
        let classes = read(dir, "classes.json")?;
        let monsters = read(dir, "monsters.json")?;
        let catalog = Self::from_sources(AssetSources {
            maps: &maps,
            tilesets: &tilesets,
            classes: &classes,
            monsters: &monsters,
        })?;
        info!(
            "Loaded assets from {}: {} maps, {} classes, {} spawn zones",
            dir.display(),
            catalog.maps.len(),
            catalog.classes.len(),
            catalog.monsters.spawn_zones.len()
        );
        Ok(catalog)
    }

    /// The data files shipped with the crate.
    pub fn bundled() -> Result<Self, AssetError> {
        Self::from_sources(AssetSources {
            maps: include_str!("../data/maps.json"),
            tilesets: include_str!("../data/tilesets.json"),
            classes: include_str!("../data/classes.json"),
            monsters: include_str!("../data/monsters.json"),
        })
    }

    pub fn build_map(&self, name: &str) -> Result<GameMap, AssetError> {
        let definition = self
            .maps
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AssetError::UnknownMap(name.to_string()))?;
        let tileset = self
            .tilesets
            .get(&definition.tileset)
            .ok_or_else(|| AssetError::UnknownTileset {
                map: definition.name.clone(),
                tileset: definition.tileset.clone(),
            })?;

        let mut rows = Vec::with_capacity(definition.rows.len());
        for line in &definition.rows {
            let mut row = Vec::with_capacity(line.len());
            for symbol in line.chars() {
                let tile = definition
                    .legend
                    .get(&symbol.to_string())
                    .ok_or_else(|| AssetError::BadLegend {
                        map: definition.name.clone(),
                        symbol,
                    })?;
                row.push(tile.clone());
            }
            rows.push(row);
        }

        Ok(GameMap::from_rows(
            definition.name.clone(),
            rows,
            tileset.clone(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MAPS: &str = r####"[{"name":"Tiny","tileset":"basic","legend":{".":"grass","#":"mountain"},"rows":["###","#.#","###"]}]"####;
    const TILESETS: &str = r#"{"basic":{"grass":{"is_walkable":true,"asset_id":1},"mountain":{"is_walkable":false,"speed_modifier":0.0,"asset_id":2}}}"#;
    const CLASSES: &str = r#"{"Novice":{"base_health":100,"evolution":{"level":10,"to_classes":["Warrior"]}},"Warrior":{"base_health":150,"class_bonus":{"strength":5}}}"#;
    const MONSTERS: &str = r#"{"templates":[{"asset_type":"slime","level":1,"base_health":30,"strength":2,"vitality":1}],"spawn_zones":[]}"#;

    fn sources<'a>(maps: &'a str, classes: &'a str) -> AssetSources<'a> {
        AssetSources {
            maps,
            tilesets: TILESETS,
            classes,
            monsters: MONSTERS,
        }
    }

    #[test]
    fn test_from_sources_and_build_map() {
        let catalog = AssetCatalog::from_sources(sources(MAPS, CLASSES)).unwrap();
        let map = catalog.build_map("Tiny").unwrap();
        assert_eq!(map.width(), 3);
        assert!(map.is_walkable(1.5, 1.5));
        assert!(!map.is_walkable(0.5, 1.5));
        assert_eq!(map.metadata("grass").unwrap().speed_modifier, 1.0);
        assert_eq!(catalog.classes.get("Warrior").unwrap().class_bonus.strength, 5);
        assert_eq!(catalog.monsters.template("slime").unwrap().base_health, 30);
    }

    #[test]
    fn test_unknown_map_and_bad_legend_are_errors() {
        let catalog = AssetCatalog::from_sources(sources(MAPS, CLASSES)).unwrap();
        assert!(matches!(
            catalog.build_map("Nowhere"),
            Err(AssetError::UnknownMap(_))
        ));

        let bad = r#"[{"name":"Tiny","tileset":"basic","legend":{".":"grass"},"rows":[".?"]}]"#;
        let catalog = AssetCatalog::from_sources(sources(bad, CLASSES)).unwrap();
        assert!(matches!(
            catalog.build_map("Tiny"),
            Err(AssetError::BadLegend { symbol: '?', .. })
        ));
    }

    #[test]
    fn test_missing_default_class_is_fatal() {
        let classes = r#"{"Warrior":{"base_health":150}}"#;
        assert!(matches!(
            AssetCatalog::from_sources(sources(MAPS, classes)),
            Err(AssetError::MissingDefaultClass(_))
        ));
    }

    #[test]
    fn test_malformed_json_names_the_file() {
        let err = AssetCatalog::from_sources(sources("[{", CLASSES)).unwrap_err();
        assert!(err.to_string().contains("maps.json"));
    }

    #[test]
    fn test_load_dir_reads_all_files() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("maps.json", MAPS),
            ("tilesets.json", TILESETS),
            ("classes.json", CLASSES),
            ("monsters.json", MONSTERS),
        ] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            file.write_all(body.as_bytes()).unwrap();
        }
        let catalog = AssetCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.maps.len(), 1);

        std::fs::remove_file(dir.path().join("classes.json")).unwrap();
        assert!(matches!(
            AssetCatalog::load_dir(dir.path()),
            Err(AssetError::Io { .. })
        ));
    }

    #[test]
    fn test_bundled_data_is_consistent() {
        let catalog = AssetCatalog::bundled().unwrap();
        let map = catalog.build_map("Starting_Area").unwrap();
        assert!(map.is_walkable(10.0, 10.0), "respawn point must be walkable");
        for zone in &catalog.monsters.spawn_zones {
            assert!(
                catalog.monsters.template(&zone.monster_asset_type).is_some(),
                "zone {} has no template",
                zone.zone_name
            );
        }
        let novice = catalog.classes.get(DEFAULT_CLASS).unwrap();
        assert!(novice.evolution.is_some());
    }
}
