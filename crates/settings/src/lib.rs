//! JSON-file backed settings.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use shelfview_core::{AutoSelect, Settings};
use tracing::debug;

pub const SETTINGS_FILE: &str = "settings.json";

pub const ENV_BASE_URL: &str = "SHELFVIEW_BASE_URL";
pub const ENV_USER_ID: &str = "SHELFVIEW_USER_ID";
pub const ENV_AUTO_SELECT: &str = "SHELFVIEW_AUTO_SELECT";
pub const ENV_LOG: &str = "SHELFVIEW_LOG";

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Opens the settings file inside `config_dir`, creating the directory.
    pub fn open(config_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_dir = config_dir.as_ref();
        fs::create_dir_all(config_dir)
            .with_context(|| format!("create config dir {}", config_dir.display()))?;
        Ok(Self {
            path: config_dir.join(SETTINGS_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings, writing the defaults on first run.
    pub fn load(&self) -> anyhow::Result<Settings> {
        if !self.path.exists() {
            let settings = Settings::default();
            self.save(&settings)?;
            debug!(path = %self.path.display(), "wrote default settings");
            return Ok(settings);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read settings {}", self.path.display()))?;
        let mut settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("parse settings {}", self.path.display()))?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let json = serde_json::to_string_pretty(&settings)?;
        fs::write(&self.path, json)
            .with_context(|| format!("write settings {}", self.path.display()))?;
        Ok(())
    }
}

/// Overrides `settings` from `SHELFVIEW_*` variables found through `lookup`.
/// An unknown auto-select mode is an error rather than a silent default.
pub fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(base_url) = lookup(ENV_BASE_URL) {
        settings.base_url = base_url;
    }
    if let Some(user_id) = lookup(ENV_USER_ID) {
        settings.user_id = user_id;
    }
    if let Some(mode) = lookup(ENV_AUTO_SELECT) {
        settings.auto_select = mode
            .parse::<AutoSelect>()
            .map_err(|err| anyhow::anyhow!("{ENV_AUTO_SELECT}={mode:?}: {err}"))?;
    }
    if let Some(filter) = lookup(ENV_LOG) {
        settings.log_filter = filter;
    }
    settings.normalize();
    Ok(())
}
