// Desktop notifications
// Spawns a notification helper without waiting on it and reaps it later

use log::debug;
use std::process::{Child, Command};

/// Launches `notify-send` style helpers and keeps their children until they exit
#[derive(Debug)]
pub struct Notifier {
    program: String,
    args: Vec<String>,
    running: Vec<Child>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(
            "notify-send",
            &["--app-name=deskpin", "--expire-time=2000"],
        )
    }
}

impl Notifier {
    /// `program` is started with `args`, then the title and body
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            running: Vec::new(),
        }
    }

    /// Show a notification; never blocks the caller
    pub fn send(&mut self, title: &str, body: &str) {
        self.reap();
        match Command::new(&self.program)
            .args(&self.args)
            .arg(title)
            .arg(body)
            .spawn()
        {
            Ok(child) => self.running.push(child),
            Err(e) => debug!("{} unavailable: {}", self.program, e),
        }
    }

    /// Collect helpers that have exited; returns how many are still running
    pub fn reap(&mut self) -> usize {
        self.running
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        self.running.len()
    }
}
