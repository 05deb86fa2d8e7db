use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEGMENT_TYPE: &str = "cron";
pub const DEFAULT_TIME_ZONE: &str = "UTC";
pub const DEFAULT_LOG_FILTER: &str = "chronodeck_calendars=info,chronodeck_cli=info";

/// Env var that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CHRONODECK_CONFIG";

/// Top-level config (chronodeck.toml + CHRONODECK_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronodeckConfig {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Defaults used when the dashboard opens a blank calendar chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Segment type pre-selected on the root of a new chain.
    /// Override with env var: CHRONODECK_EDITOR__DEFAULT_SEGMENT_TYPE=weekly
    #[serde(default = "default_segment_type")]
    pub default_segment_type: String,
    /// IANA zone pre-filled on the root of a new chain.
    #[serde(default = "default_time_zone")]
    pub default_time_zone: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_segment_type: default_segment_type(),
            default_time_zone: default_time_zone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_segment_type() -> String {
    DEFAULT_SEGMENT_TYPE.to_string()
}
fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl ChronodeckConfig {
    /// Load config from a TOML file with CHRONODECK_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `CHRONODECK_CONFIG`
    ///   3. ~/.chronodeck/chronodeck.toml
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(default_config_path);

        let config: ChronodeckConfig = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&path))
            // Double underscore separates sections so field names keep theirs.
            .merge(Env::prefixed("CHRONODECK_").ignore(&["CONFIG"]).split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chronodeck/chronodeck.toml", home)
}
