// Application paths
// Where the layout, settings and instance lock live

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "deskpin";
const LAYOUT_FILE: &str = "overlay_config.json";
const SETTINGS_FILE: &str = "overlay_settings.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub layout: PathBuf,
    pub settings: PathBuf,
    pub runtime_dir: PathBuf,
}

impl AppPaths {
    /// Resolve XDG locations, with an optional layout file override
    pub fn resolve(layout_override: Option<PathBuf>) -> Result<Self> {
        let config_dir = dirs_next::config_dir()
            .context("No user config directory (is $HOME set?)")?
            .join(APP_DIR);
        let runtime_dir = dirs_next::runtime_dir().unwrap_or_else(std::env::temp_dir);

        Ok(Self::in_dirs(config_dir, runtime_dir, layout_override))
    }

    pub fn in_dirs(
        config_dir: PathBuf,
        runtime_dir: PathBuf,
        layout_override: Option<PathBuf>,
    ) -> Self {
        Self {
            layout: layout_override.unwrap_or_else(|| config_dir.join(LAYOUT_FILE)),
            settings: config_dir.join(SETTINGS_FILE),
            runtime_dir,
        }
    }
}
