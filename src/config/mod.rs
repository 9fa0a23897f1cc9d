/// Draft database connection and table creation
pub mod database;

/// Application settings loading from config.toml and the environment
pub mod settings;

pub use settings::{
    AppConfig, BackendSettings, GuardSettings, OcrSettings, load_config, load_default_config,
    load_environment,
};
