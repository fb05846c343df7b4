use crate::config::types::{Config, UserSettings};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;

pub const SETTINGS_FILE: &str = "settings.json";

impl Config {
    pub fn new() -> Result<Self> {
        let settings = match Self::load_settings(Path::new(SETTINGS_FILE)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("讀取設定失敗，使用預設值: {e:#}");
                UserSettings::default()
            }
        };

        Ok(Self {
            settings: settings.validated(),
        })
    }

    pub fn load_settings(path: &Path) -> Result<UserSettings> {
        if !path.exists() {
            info!("找不到設定檔，使用預設值");
            return Ok(UserSettings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

        info!("已載入設定: {}", path.display());
        Ok(settings)
    }
}
