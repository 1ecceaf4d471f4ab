// Single-instance guard
// A pid lock file in the runtime directory; stale locks from dead processes are reclaimed

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Held for as long as this process is the running instance
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Try to become the single running instance.
    ///
    /// Returns `None` when another live process holds the lock.
    pub fn acquire(dir: &Path, name: &str) -> Result<Option<Self>> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!("{}.lock", name));

        // The pid goes into a private file first and is linked into place,
        // so the lock is never visible without its owner
        let staged = dir.join(format!("{}.lock.{}", name, std::process::id()));
        fs::write(&staged, std::process::id().to_string())
            .with_context(|| format!("Failed to write {}", staged.display()))?;

        // One retry after clearing a stale lock
        let mut acquired = false;
        for _ in 0..2 {
            match fs::hard_link(&staged, &path) {
                Ok(()) => {
                    acquired = true;
                    break;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if owner_alive(&path) {
                        break;
                    }
                    warn!("Removing stale instance lock {}", path.display());
                    let _ = fs::remove_file(&path);
                }
                Err(e) => {
                    let _ = fs::remove_file(&staged);
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        }
        let _ = fs::remove_file(&staged);

        if acquired {
            debug!("Acquired instance lock {}", path.display());
            return Ok(Some(Self { path }));
        }
        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn owner_alive(path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        // Unreadable: assume a live owner rather than stealing its lock
        return true;
    };
    match content.trim().parse::<u32>() {
        Ok(pid) => pid == std::process::id() || Path::new("/proc").join(pid.to_string()).exists(),
        Err(_) => false,
    }
}
