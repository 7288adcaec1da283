//! Fixed names and fallbacks that are not exposed through TOML

pub const APP_DIR_NAME: &str = "sideload";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "state.sqlite";
pub const APPS_DIR_NAME: &str = "apps";
pub const LOGS_DIR_NAME: &str = "logs";

/// File name of a cached package inside an app's artifact directory
pub const ARTIFACT_FILE_NAME: &str = "App.ipa";

pub const DEFAULT_CATALOG_URL: &str = "https://apps.sideload.dev/apps.json";
pub const DEFAULT_HELPER_PORT: u16 = 7450;
