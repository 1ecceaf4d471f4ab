// Command line interface module
// Handles parsing of command line arguments

use crate::control::Command;
use anyhow::{bail, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use std::path::PathBuf;

/// deskpin - pin images and GIFs to the Wayland desktop
#[derive(Parser, Debug)]
#[command(name = "deskpin")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Images or GIFs to pin, bottom of the stack first
    #[arg(value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Opacity of every overlay in percent (10 - 100) [default: 100]
    #[arg(short, long, value_parser = parse_opacity)]
    pub opacity: Option<u8>,

    /// Let pointer input pass through the overlays (`--click-through=off` restores it)
    #[arg(
        short,
        long,
        value_name = "on|off",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "on",
        value_parser = BoolishValueParser::new()
    )]
    pub click_through: Option<bool>,

    /// Ask the running instance to exit
    #[arg(long)]
    pub quit: bool,

    /// Layout file to save to and load from
    #[arg(long, value_name = "PATH")]
    pub layout: Option<PathBuf>,

    /// Restore the saved layout at startup
    #[arg(long)]
    pub load: bool,

    /// Persist whether the saved layout is restored on every start
    #[arg(long, value_name = "on|off", value_parser = BoolishValueParser::new())]
    pub auto_load: Option<bool>,

    /// Start deskpin when logging in
    #[arg(long, value_name = "on|off", value_parser = BoolishValueParser::new())]
    pub autostart: Option<bool>,
}

impl Args {
    /// True when the invocation only changes persisted settings
    pub fn settings_only(&self) -> bool {
        self.images.is_empty()
            && !self.load
            && !self.quit
            && self.opacity.is_none()
            && self.click_through.is_none()
            && (self.auto_load.is_some() || self.autostart.is_some())
    }

    /// Requests for an instance that is already running, in the order given
    /// on the command line: global controls, layout, images, then quit
    pub fn forwarded_commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        if let Some(enabled) = self.click_through {
            commands.push(Command::ClickThrough { enabled });
        }
        if let Some(percent) = self.opacity {
            commands.push(Command::Opacity { percent });
        }
        if self.load {
            commands.push(Command::LoadLayout);
        }
        // The running instance has its own working directory
        commands.extend(self.images.iter().map(|image| Command::Add {
            path: std::fs::canonicalize(image).unwrap_or_else(|_| image.clone()),
        }));
        if self.quit {
            commands.push(Command::Quit);
        }
        commands
    }
}

/// Parse opacity percentage and ensure it's within valid range
fn parse_opacity(s: &str) -> Result<u8, String> {
    let opacity: u8 = s
        .trim_end_matches('%')
        .parse()
        .map_err(|_| "Invalid opacity value")?;
    if !(10..=100).contains(&opacity) {
        return Err("Opacity must be between 10 and 100".to_string());
    }
    Ok(opacity)
}

/// Parse command line arguments
pub fn parse_args() -> Result<Args> {
    let args = Args::parse();
    validate(&args)?;
    Ok(args)
}

fn validate(args: &Args) -> Result<()> {
    for image in &args.images {
        if !image.exists() {
            bail!("Image not found: {}", image.display());
        }
    }
    Ok(())
}
