// Auto-start module
// Registers the application for login start through an XDG autostart entry

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier of the autostart entry
pub const APP_ID: &str = "deskpin";

/// Entry names used by earlier releases
pub const LEGACY_IDS: &[&str] = &["DesktopOverlay", "desktop-overlay", "deskpin-overlay"];

/// One named autostart entry pointing at an executable
#[derive(Debug, Clone)]
pub struct Autostart {
    dir: PathBuf,
    app_id: String,
    exe: PathBuf,
}

impl Autostart {
    pub fn new(dir: impl Into<PathBuf>, app_id: impl Into<String>, exe: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            app_id: app_id.into(),
            exe: exe.into(),
        }
    }

    /// Entry for the running executable in the user's autostart directory
    pub fn for_current_exe() -> Result<Self> {
        let dir = dirs_next::config_dir()
            .context("No user config directory")?
            .join("autostart");
        let exe = std::env::current_exe().context("Cannot locate the running executable")?;
        Ok(Self::new(dir, APP_ID, exe))
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.desktop", id))
    }

    /// True when the entry exists and launches this executable
    pub fn is_enabled(&self) -> bool {
        read_exec(&self.entry_path(&self.app_id)).as_deref() == Some(self.exe.as_path())
    }

    pub fn enable(&self) -> Result<()> {
        if self.is_enabled() {
            debug!("Autostart entry already present");
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.entry_path(&self.app_id);
        fs::write(&path, self.desktop_entry())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Added to startup: {}", self.exe.display());
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        if remove_if_present(&self.entry_path(&self.app_id))? {
            info!("Removed from startup");
        }
        Ok(())
    }

    /// Delete entries left by earlier names and drop our own entry if it
    /// points at an executable that is no longer this one.
    ///
    /// Returns the ids that were removed.
    pub fn cleanup(&self, legacy_ids: &[&str]) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        for &old in legacy_ids.iter().filter(|&&id| id != self.app_id) {
            if remove_if_present(&self.entry_path(old))? {
                info!("Removed old startup entry: {}", old);
                removed.push(old.to_string());
            }
        }

        let current = self.entry_path(&self.app_id);
        if let Some(exec) = read_exec(&current) {
            if exec != self.exe {
                remove_if_present(&current)?;
                info!("Removed outdated startup entry for {}", self.app_id);
                removed.push(self.app_id.clone());
            }
        }

        Ok(removed)
    }

    fn desktop_entry(&self) -> String {
        format!(
            "[Desktop Entry]\nType=Application\nName={}\nExec={} --load\nX-GNOME-Autostart-enabled=true\n",
            self.app_id,
            quote_exec(&self.exe)
        )
    }
}

fn quote_exec(exe: &Path) -> String {
    let exe = exe.display().to_string();
    if exe.contains(' ') {
        format!("\"{}\"", exe)
    } else {
        exe
    }
}

/// Executable named by an entry's `Exec` line
fn read_exec(path: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(path).ok()?;
    let line = content
        .lines()
        .find_map(|line| line.trim().strip_prefix("Exec="))?
        .trim();

    let program = if let Some(rest) = line.strip_prefix('"') {
        rest.split('"').next()?
    } else {
        line.split_whitespace().next()?
    };
    Some(PathBuf::from(program))
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
