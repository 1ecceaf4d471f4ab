// Layout persistence module
// Reads and writes the saved overlay layout as pretty-printed JSON

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Saved state of a single overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Image or animation shown by the overlay. Older layouts call it `file`.
    #[serde(alias = "file")]
    pub source: PathBuf,
    /// Un-rotated content width
    pub width: u32,
    /// Un-rotated content height
    pub height: u32,
    /// Clockwise rotation in degrees
    #[serde(default)]
    pub rotation: f64,
    /// Window opacity (0.1 - 1.0)
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub click_through: bool,
    /// Top-left corner of the window; the default origin is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(i32, i32)>,
}

fn default_opacity() -> f64 {
    1.0
}

/// All overlays, bottom of the stack first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub overlays: Vec<OverlayConfig>,
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("no saved layout at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read layout {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed layout {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode layout: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write layout {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Layout {
    pub fn new(overlays: Vec<OverlayConfig>) -> Self {
        Self { overlays }
    }

    /// Read a layout file
    pub fn read(path: &Path) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LayoutError::NotFound(path.to_path_buf())
            } else {
                LayoutError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|source| LayoutError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the layout, replacing any previous file only once the new
    /// content is fully on disk
    pub fn write(&self, path: &Path) -> Result<(), LayoutError> {
        let json = serde_json::to_string_pretty(self).map_err(LayoutError::Serialize)?;

        let write_err = |source| LayoutError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = temp_sibling(path);
        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(e));
        }
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "layout.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
