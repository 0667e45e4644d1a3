// Configuration loading
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub broadcast: BroadcastSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub base_dir: String,
    pub min_check_interval_ms: u64,
    /// Development shortcut: treat every check as stale, bypassing mtime
    /// detection and its rate limiter. Production default is false.
    pub always_stale: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastSettings {
    pub publish_interval_secs: u64,
}

/// Load `config/server.toml` if present, over built-in defaults. The station
/// runs with no config file at all in the common case.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8765")?
        .set_default("store.base_dir", "jsons")?
        .set_default("store.min_check_interval_ms", 100)?
        .set_default("store.always_stale", false)?
        .set_default("broadcast.publish_interval_secs", 5)?
        .add_source(config::File::with_name("config/server").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}
