use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,
    #[serde(default)]
    pub users: BTreeMap<String, UserConfig>,
}

/// Per-account overrides. Accounts without an entry live under `data_dir`
/// with unlimited quota.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserConfig {
    pub home: Option<String>,
    pub quota: Option<String>,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_database_path() -> String {
    "fa_trashbin.db".to_string()
}

fn default_storage_backend() -> String {
    "home".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: default_database_path(),
            storage_backend: default_storage_backend(),
            users: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("FA_TRASHBIN").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
