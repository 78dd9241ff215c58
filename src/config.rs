//! Centralized configuration constants and the on-disk app config
//! Single source of truth for app defaults

use crate::resolver::SiteConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Origin used when neither the page URL nor the config file names one
pub const DEFAULT_ORIGIN: &str = "https://whale.ai";

/// Public QR rendering service
pub const DEFAULT_QR_IMAGE_BASE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Account explorer used as the desktop donation fallback
pub const DEFAULT_DONATE_WEB_BASE_URL: &str = "https://solscan.io/account/";

/// Amount preselected in the donation widget
pub const DEFAULT_START_AMOUNT: &str = "0.01";

/// QR image edge in pixels
pub const DEFAULT_QR_SIZE: u32 = 220;

/// Telegram usernames: the API accepts 5..=32, some pages relax the minimum to 3
pub const DEFAULT_HANDLE_MIN_LEN: usize = 5;
pub const DEFAULT_HANDLE_MAX_LEN: usize = 32;

/// How long a "Copied" label stays before reverting
pub const COPY_FEEDBACK_MS: u64 = 1200;

/// HTTP timeout for API calls
pub const HTTP_TIMEOUT_SECS: u64 = 15;

/// App name
pub const APP_NAME: &str = "WhaleAI";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length bounds for the Telegram handle check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleRules {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for HandleRules {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_HANDLE_MIN_LEN,
            max_len: DEFAULT_HANDLE_MAX_LEN,
        }
    }
}

/// Donation widget text and defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DonationSettings {
    pub label: String,
    pub message: String,
    pub start_amount: String,
    pub qr_size: u32,
}

impl Default for DonationSettings {
    fn default() -> Self {
        Self {
            label: "Whale AI".to_string(),
            message: "Support Whale AI development".to_string(),
            start_amount: DEFAULT_START_AMOUNT.to_string(),
            qr_size: DEFAULT_QR_SIZE,
        }
    }
}

/// Everything read from the config file at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin of the page being hydrated; also the site base fallback
    pub origin: Option<String>,
    /// The page-supplied configuration object (`WHALEAI_CONFIG`)
    pub site: HashMap<String, serde_json::Value>,
    pub handle: HandleRules,
    pub donation: DonationSettings,
    /// Device string used for the mobile/desktop donation heuristic
    pub user_agent: Option<String>,
}

impl AppConfig {
    /// Site values as strings. Numbers and booleans are stringified, nulls,
    /// arrays and objects are dropped.
    pub fn site_values(&self) -> HashMap<String, String> {
        self.site
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((key.clone(), text))
            })
            .collect()
    }

    /// Build the immutable resolver. A page origin beats the configured one.
    pub fn site_config(&self, page_origin: Option<&str>) -> SiteConfig {
        let origin = page_origin
            .or(self.origin.as_deref())
            .unwrap_or(DEFAULT_ORIGIN);
        SiteConfig::new(self.site_values(), origin)
    }
}

/// Resolve the config file path: explicit flag, then `WHALEAI_CONFIG`, then
/// the platform config directory
pub fn config_path(explicit: Option<&str>) -> Result<PathBuf, String> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(shellexpand::tilde(path).to_string()));
    }

    if let Ok(custom) = std::env::var("WHALEAI_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&custom).to_string()));
    }

    dirs::config_dir()
        .map(|p| p.join("whaleai").join("site.json"))
        .ok_or_else(|| "Could not determine config directory".to_string())
}

/// Get the app data directory (session logs live here)
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    if let Ok(custom_dir) = std::env::var("WHALEAI_DATA_DIR") {
        return Ok(PathBuf::from(shellexpand::tilde(&custom_dir).to_string()));
    }

    dirs::data_dir()
        .map(|p| p.join("whaleai"))
        .ok_or_else(|| "Could not determine app data directory".to_string())
}

/// Load config from disk. A missing file yields defaults.
pub fn load_config(explicit: Option<&str>) -> Result<AppConfig, String> {
    let path = config_path(explicit)?;

    if !path.exists() {
        if explicit.is_some() {
            return Err(format!("Config not found: {}", path.display()));
        }
        return Ok(AppConfig::default());
    }

    let json = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read config: {}", e))?;

    parse_config(&json)
}

/// Parse config JSON
pub fn parse_config(json: &str) -> Result<AppConfig, String> {
    let config: AppConfig = serde_json::from_str(json)
        .map_err(|e| format!("Failed to parse config: {}", e))?;

    if config.handle.min_len == 0 || config.handle.min_len > config.handle.max_len {
        return Err(format!(
            "Invalid handle bounds: {}..={}",
            config.handle.min_len, config.handle.max_len
        ));
    }

    Ok(config)
}

/// Save config to disk
pub fn save_config(config: &AppConfig, explicit: Option<&str>) -> Result<PathBuf, String> {
    let path = config_path(explicit)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    fs::write(&path, json)
        .map_err(|e| format!("Failed to write config: {}", e))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ConfigKey;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "origin": "https://whale.ai",
            "site": {
                "WORKER_API_BASE_URL": "https://api.example.com",
                "PRO_PRICE_SOL": 0.25,
                "GITHUB_URL": null
            },
            "handle": { "min_len": 3, "max_len": 32 },
            "donation": { "start_amount": "0.05" }
        }"#;

        let config = parse_config(json).unwrap();
        assert_eq!(config.handle.min_len, 3);
        assert_eq!(config.donation.start_amount, "0.05");
        assert_eq!(config.donation.label, "Whale AI");

        let site = config.site_config(None);
        assert_eq!(site.resolve(ConfigKey::WorkerApiBaseUrl), "https://api.example.com");
        assert_eq!(site.resolve(ConfigKey::ProPriceSol), "0.25");
        assert_eq!(site.resolve(ConfigKey::GithubUrl), "");
        assert_eq!(site.origin(), "https://whale.ai");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.handle, HandleRules::default());
        assert_eq!(config.site_config(None).origin(), DEFAULT_ORIGIN);
        assert_eq!(config.site_config(Some("http://localhost:8080")).origin(), "http://localhost:8080");
    }

    #[test]
    fn test_rejects_inverted_handle_bounds() {
        let json = r#"{ "handle": { "min_len": 10, "max_len": 4 } }"#;
        assert!(parse_config(json).is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = std::env::temp_dir().join(format!("whaleai-config-{}", std::process::id()));
        let path = dir.join("site.json");
        let path_str = path.to_string_lossy().to_string();

        let mut config = AppConfig::default();
        config.origin = Some("https://whale.ai".to_string());
        config.site.insert(
            "TELEGRAM_URL".to_string(),
            serde_json::Value::String("https://t.me/whaleai".to_string()),
        );

        save_config(&config, Some(&path_str)).unwrap();
        let loaded = load_config(Some(&path_str)).unwrap();
        assert_eq!(loaded.site_values().get("TELEGRAM_URL").map(String::as_str), Some("https://t.me/whaleai"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        assert!(load_config(Some("/definitely/not/here/site.json")).is_err());
    }
}
