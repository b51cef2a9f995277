//! Server configuration from environment variables.
//!
//! | variable            | default          |
//! |---------------------|------------------|
//! | `REALM_BIND`        | `0.0.0.0:8080`   |
//! | `REALM_API_PORT`    | `8081`           |
//! | `REALM_DATA_DIR`    | bundled assets   |
//! | `REALM_DB_PATH`     | `data/realm`     |
//! | `REALM_DB_MAX_SIZE` | 100 MB           |
//! | `REALM_TICK_RATE`   | 20               |
//! | `REALM_MAP`         | `Starting_Area`  |
//! | `REALM_SEED`        | 42               |
//! | `REALM_LOG`         | `info`           |

use std::path::PathBuf;
use std::str::FromStr;

use realm_core::engine::EngineConfig;
use realm_core::logging::LogLevel;

/// LMDB requires the map size to be a multiple of the OS page size.
const PAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub api_port: u16,
    /// Directory holding `classes.json`, `monsters.json` and `maps/`.
    pub data_dir: Option<PathBuf>,
    pub db_path: PathBuf,
    pub db_max_size: usize,
    pub log_level: LogLevel,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            api_port: 8081,
            data_dir: None,
            db_path: PathBuf::from("data/realm"),
            db_max_size: round_to_page(100_000_000),
            log_level: LogLevel::Info,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let engine = EngineConfig {
            tick_rate: parse_var(&lookup, "REALM_TICK_RATE")
                .filter(|rate: &u32| *rate > 0)
                .unwrap_or(defaults.engine.tick_rate),
            map_name: lookup("REALM_MAP").unwrap_or(defaults.engine.map_name.clone()),
            seed: parse_var(&lookup, "REALM_SEED").unwrap_or(defaults.engine.seed),
            ..defaults.engine.clone()
        };

        Self {
            bind_addr: lookup("REALM_BIND").unwrap_or(defaults.bind_addr),
            api_port: parse_var(&lookup, "REALM_API_PORT").unwrap_or(defaults.api_port),
            data_dir: lookup("REALM_DATA_DIR").map(PathBuf::from),
            db_path: lookup("REALM_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            db_max_size: parse_var(&lookup, "REALM_DB_MAX_SIZE")
                .map(round_to_page)
                .unwrap_or(defaults.db_max_size),
            log_level: lookup("REALM_LOG")
                .map(|name| LogLevel::parse(&name))
                .unwrap_or(defaults.log_level),
            engine,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

fn round_to_page(raw: usize) -> usize {
    raw.div_ceil(PAGE_SIZE) * PAGE_SIZE
}
