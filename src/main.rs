// deskpin - A desktop image pinning tool for Wayland
// Shows images and GIFs as floating, always-on-top overlays that can be moved, scaled and rotated

use anyhow::{bail, Context, Result};
use deskpin::autostart::{Autostart, LEGACY_IDS};
use deskpin::cli::{self, Args};
use deskpin::control::{self, ControlListener, SOCKET_NAME};
use deskpin::instance::InstanceLock;
use deskpin::paths::AppPaths;
use deskpin::settings::Settings;
use deskpin::wayland::{self, Startup};
use log::{info, warn};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args()?;
    let paths = AppPaths::resolve(args.layout.clone())?;

    let mut settings = Settings::load(&paths.settings).unwrap_or_else(|e| {
        warn!("{:#}; using default settings", e);
        Settings::default()
    });
    if let Some(auto_load) = args.auto_load {
        settings.auto_load_layout = auto_load;
        match settings.save(&paths.settings) {
            Ok(()) => info!("Auto-load layout: {}", if auto_load { "on" } else { "off" }),
            Err(e) => warn!("Failed to save settings: {:#}", e),
        }
    }

    update_autostart(&args);

    if args.settings_only() {
        return Ok(());
    }

    let Some(_lock) = InstanceLock::acquire(&paths.runtime_dir, "deskpin")? else {
        return forward(&args, &paths);
    };

    if args.quit {
        info!("deskpin is not running");
        return Ok(());
    }
    let load_layout = args.load || settings.auto_load_layout;
    if args.images.is_empty() && !load_layout {
        bail!("Nothing to show: pass one or more images, or --load to restore the saved layout");
    }

    let control = match ControlListener::bind(&paths.runtime_dir) {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!("Remote control unavailable: {:#}", e);
            None
        }
    };

    let opacity = args.opacity.unwrap_or(100);
    info!(
        "Starting deskpin with {} image(s), opacity: {}%",
        args.images.len(),
        opacity
    );

    wayland::run(Startup {
        images: args.images,
        opacity,
        click_through: args.click_through.unwrap_or(false),
        load_layout,
        layout_path: paths.layout,
        control,
    })
}

/// Hand this invocation's requests to the instance that is already running
fn forward(args: &Args, paths: &AppPaths) -> Result<()> {
    let commands = args.forwarded_commands();
    if commands.is_empty() {
        info!("deskpin is already running");
        return Ok(());
    }

    let socket = paths.runtime_dir.join(SOCKET_NAME);
    control::send(&socket, &commands).context("Failed to reach the running deskpin")?;
    info!("Sent {} command(s) to the running deskpin", commands.len());
    Ok(())
}

/// Registration failures never stop the overlays from showing
fn update_autostart(args: &Args) {
    let entry = match Autostart::for_current_exe() {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Autostart unavailable: {:#}", e);
            return;
        }
    };

    if let Err(e) = entry.cleanup(LEGACY_IDS) {
        warn!("Failed to clean up old startup entries: {:#}", e);
    }

    let result = match args.autostart {
        Some(true) => entry.enable(),
        Some(false) => entry.disable(),
        None => Ok(()),
    };
    if let Err(e) = result {
        warn!("Failed to update startup registration: {:#}", e);
    }
}
