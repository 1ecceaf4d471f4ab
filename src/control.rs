// Control channel
// Lets later invocations drive the running instance through a Unix socket

use crate::controller::{OverlayController, WindowHost};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::ops::ControlFlow;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Socket file next to the instance lock
pub const SOCKET_NAME: &str = "deskpin.sock";

/// How long the running instance waits for a client to finish sending
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// One request to the running instance, sent as a JSON line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Add { path: PathBuf },
    LoadLayout,
    SaveLayout,
    Opacity { percent: u8 },
    ClickThrough { enabled: bool },
    Quit,
}

/// Apply a command to the controller.
///
/// Breaks when the application should exit.
pub fn apply<H: WindowHost>(
    controller: &mut OverlayController<H>,
    command: Command,
    layout_path: &Path,
) -> ControlFlow<()> {
    debug!("Applying {:?}", command);
    // Failures are reported to the user by the controller itself
    match command {
        Command::Add { path } => {
            let _ = controller.add_overlay(&path);
        }
        Command::LoadLayout => {
            let _ = controller.load_layout(layout_path);
        }
        Command::SaveLayout => {
            let _ = controller.save_layout(layout_path);
        }
        Command::Opacity { percent } => {
            controller.set_opacity(percent);
            info!("Opacity adjusted to: {}%", controller.opacity_percent());
        }
        Command::ClickThrough { enabled } => {
            info!("Click-through {}", if enabled { "on" } else { "off" });
            controller.set_click_through(enabled);
        }
        Command::Quit => {
            info!("Quit requested");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

/// Listening end, owned by the running instance; the socket file goes with it
#[derive(Debug)]
pub struct ControlListener {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlListener {
    /// Bind the socket; the caller must hold the instance lock
    pub fn bind(dir: &Path) -> Result<Self> {
        let path = dir.join(SOCKET_NAME);
        // Left behind by an instance that did not exit cleanly
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed stale socket {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()))
            }
        }

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind {}", path.display()))?;
        listener
            .set_nonblocking(true)
            .context("Failed to make control socket non-blocking")?;
        debug!("Listening for commands on {}", path.display());
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept every waiting client and collect the commands they sent
    pub fn accept_pending(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => commands.extend(read_commands(stream)),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Control socket accept failed: {}", e);
                    break;
                }
            }
        }
        commands
    }
}

impl AsFd for ControlListener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.listener.as_fd()
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn read_commands(stream: UnixStream) -> Vec<Command> {
    if let Err(e) = stream
        .set_nonblocking(false)
        .and_then(|()| stream.set_read_timeout(Some(READ_TIMEOUT)))
    {
        warn!("Control client setup failed: {}", e);
        return Vec::new();
    }

    let mut commands = Vec::new();
    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Control client read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(command) => commands.push(command),
            Err(e) => warn!("Ignoring malformed command {:?}: {}", line, e),
        }
    }
    commands
}

/// Deliver commands to the instance listening at `socket`
pub fn send(socket: &Path, commands: &[Command]) -> Result<()> {
    let mut stream = UnixStream::connect(socket)
        .with_context(|| format!("Failed to connect to {}", socket.display()))?;
    for command in commands {
        let mut line = serde_json::to_string(command)?;
        line.push('\n');
        stream
            .write_all(line.as_bytes())
            .context("Failed to send command")?;
    }
    stream.flush()?;
    Ok(())
}
