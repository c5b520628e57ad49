#![forbid(unsafe_code)]

mod commands;
mod config;
mod constants;
mod hyprctl;
mod layout;
mod manager;
mod snapping;
mod snapshot;
mod store;
mod types;
mod validation;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use hyprctl::{Connectivity, Hyprctl, ReconnectPolicy};
use manager::DisplayManager;
use types::{Mode, Transform, VrrMode, parse_pair};

#[derive(Parser, Debug)]
#[command(name = "hyprdisplays")]
#[command(version, about = "Arrange, persist and apply Hyprland monitor layouts", long_about = None)]
struct Args {
    /// Settings file (defaults to ~/.config/hyprdisplays/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the live displays with persisted preferences merged in
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show where each display lands on the arrangement canvas
    Layout {
        /// Canvas size, e.g. 1200x600
        #[arg(long, value_parser = parse_canvas)]
        canvas: Option<(f64, f64)>,
    },
    /// Write the monitors and workspaces files from the current state
    Save,
    /// Push the merged configuration to the compositor
    Apply,
    /// Move a display to a logical position, then save
    #[command(allow_negative_numbers = true)]
    Move {
        name: String,
        x: i32,
        y: i32,
        /// Snap threshold in logical pixels (0 disables)
        #[arg(long)]
        snap: Option<u32>,
    },
    /// Drop a display at a canvas position, then save
    Drag { name: String, vx: f64, vy: f64 },
    /// Change display preferences, then save
    Set(SetArgs),
    Enable { name: String },
    Disable { name: String },
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Check a monitors file and print every problem
    Validate { file: Option<PathBuf> },
    /// Check whether the compositor is reachable
    Probe,
    /// Ask the compositor to reload its configuration
    Reload,
}

#[derive(clap::Args, Debug)]
struct SetArgs {
    name: String,
    /// WxH@rate
    #[arg(long)]
    mode: Option<Mode>,
    #[arg(long)]
    scale: Option<f64>,
    /// normal, 90, 180, 270, flipped, flipped-90
    #[arg(long)]
    transform: Option<String>,
    /// 0 off, 1 global, 2 fullscreen only
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=constants::validation::MAX_VRR_MODE as i64))]
    vrr: Option<u8>,
    #[arg(long)]
    hdr: Option<bool>,
    #[arg(long)]
    wide_gamut: Option<bool>,
    #[arg(long)]
    ten_bit: Option<bool>,
    #[arg(long)]
    sdr_brightness: Option<f64>,
    #[arg(long)]
    sdr_saturation: Option<f64>,
    /// Display to mirror; "none" stops mirroring
    #[arg(long)]
    mirror: Option<String>,
    /// Also push the display's command to the compositor
    #[arg(long)]
    apply: bool,
}

#[derive(Subcommand, Debug)]
enum WorkspaceAction {
    List,
    Assign {
        workspace: String,
        monitor: String,
        /// Also move the workspace live
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    Create,
    List,
    Restore { file: String },
    Delete { file: String },
}

fn parse_canvas(s: &str) -> Result<(f64, f64), String> {
    parse_pair::<f64>(s).ok_or_else(|| format!("expected WxH, got '{s}'"))
}

fn log_level(verbose: u8, configured: &str) -> TraceLevel {
    match verbose {
        0 => {}
        1 => return TraceLevel::DEBUG,
        _ => return TraceLevel::TRACE,
    }
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| configured.to_string());
    match level.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let settings_path = args.settings.clone().unwrap_or_else(Settings::path);
    let settings = Settings::load_from(&settings_path)?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(args.verbose, &settings.log_level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    info!(settings = %settings_path.display(), "Loaded settings");

    let backup_dir = settings_path
        .parent()
        .map(|dir| dir.join(constants::config::BACKUP_DIR))
        .unwrap_or_else(Settings::backup_dir);
    let executor = Hyprctl::new(settings.hyprctl_timeout_secs);
    let mut manager = DisplayManager::new(executor, settings, backup_dir);

    run(&mut manager, args.command)
}

/// Snapshot plus persisted preferences, the starting point of most commands
fn load_current(manager: &mut DisplayManager<Hyprctl>) -> Result<()> {
    manager.refresh()?;
    manager.load_persisted()?;
    Ok(())
}

fn run(manager: &mut DisplayManager<Hyprctl>, command: Command) -> Result<ExitCode> {
    match command {
        Command::List { json } => {
            load_current(manager)?;
            if json {
                let out = serde_json::to_string_pretty(manager.store().displays())
                    .context("Failed to serialize displays")?;
                println!("{out}");
            } else {
                for d in manager.store().displays() {
                    let mut flags = Vec::new();
                    if d.primary {
                        flags.push("primary".to_string());
                    }
                    if !d.enabled {
                        flags.push("disabled".to_string());
                    }
                    if !d.transform.is_normal() {
                        flags.push(format!("transform {}", d.transform));
                    }
                    if !d.mirror_of.is_empty() {
                        flags.push(format!("mirror of {}", d.mirror_of));
                    }
                    if d.hdr {
                        flags.push("hdr".to_string());
                    }
                    if d.vrr_mode != VrrMode::Off {
                        flags.push(format!("vrr {}", d.vrr_mode));
                    }
                    println!(
                        "{:<12} {} at {} scale {:.2} {} {}",
                        d.name,
                        d.mode(),
                        d.position(),
                        d.scale,
                        d.description,
                        if flags.is_empty() { String::new() } else { format!("[{}]", flags.join(", ")) }
                    );
                }
            }
        }
        Command::Layout { canvas } => {
            load_current(manager)?;
            if let Some((width, height)) = canvas {
                manager.resize_canvas(width, height)?;
            }
            for (name, rect) in manager.layout()? {
                println!(
                    "{:<12} x={:.1} y={:.1} w={:.1} h={:.1}",
                    name, rect.x, rect.y, rect.width, rect.height
                );
            }
        }
        Command::Save => {
            load_current(manager)?;
            let path = manager.save()?;
            println!("Saved {}", path.display());
        }
        Command::Apply => {
            load_current(manager)?;
            let report = manager.apply();
            for name in &report.issued {
                println!("applied {name}");
            }
            for failure in &report.failures {
                eprintln!("failed  {}: {}", failure.display, failure.message);
            }
            if !report.success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Move { name, x, y, snap } => {
            load_current(manager)?;
            let (x, y) = manager.move_display(&name, x, y, snap)?;
            manager.save()?;
            println!("{name} moved to {x}x{y}");
        }
        Command::Drag { name, vx, vy } => {
            load_current(manager)?;
            let (x, y) = manager.drag(&name, vx, vy)?;
            manager.save()?;
            println!("{name} moved to {x}x{y}");
        }
        Command::Set(set) => {
            load_current(manager)?;
            apply_set(manager, &set)?;
            manager.save()?;
            if set.apply {
                manager.apply_display(&set.name)?;
            }
            println!("Updated {}", set.name);
        }
        Command::Enable { name } => {
            load_current(manager)?;
            manager.set_enabled(&name, true)?;
        }
        Command::Disable { name } => {
            load_current(manager)?;
            let enabled = manager.store().displays().iter().filter(|d| d.enabled).count();
            if enabled <= 1 && manager.store().get(&name).is_some_and(|d| d.enabled) {
                bail!("Refusing to disable the last enabled display");
            }
            manager.set_enabled(&name, false)?;
        }
        Command::Workspace { action } => match action {
            WorkspaceAction::List => {
                if let Err(e) = manager.refresh() {
                    warn!(error = %e, "Listing workspaces without a live snapshot");
                }
                manager.load_persisted()?;
                for a in manager.workspaces() {
                    println!("{} -> {}", a.workspace_name, a.monitor_name);
                }
            }
            WorkspaceAction::Assign { workspace, monitor, apply } => {
                load_current(manager)?;
                manager.assign_workspace(&workspace, &monitor, apply)?;
                manager.save()?;
            }
        },
        Command::Backup { action } => match action {
            BackupAction::Create => {
                load_current(manager)?;
                let path = manager.create_backup()?;
                println!("{}", path.display());
            }
            BackupAction::List => {
                for entry in manager.list_backups()? {
                    println!("{}  {}", entry.file_name, entry.taken_at);
                }
            }
            BackupAction::Restore { file } => {
                let bundle = manager.restore_backup(&file)?;
                manager.save()?;
                println!("Restored {} displays from {}", bundle.display_config.len(), bundle.timestamp);
            }
            BackupAction::Delete { file } => manager.delete_backup(&file)?,
        },
        Command::Validate { file } => {
            let path = file.unwrap_or_else(|| manager.settings().monitors_path.clone());
            let problems = manager::validate_file(&path)?;
            if problems.is_empty() {
                println!("{}: ok", path.display());
            } else {
                for problem in &problems {
                    println!("{problem}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Probe => {
            let state = manager.wait_until_reachable(ReconnectPolicy::default());
            println!("{state:?}");
            if state == Connectivity::Disconnected {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Reload => manager.reload()?,
    }
    Ok(ExitCode::SUCCESS)
}

fn apply_set(manager: &mut DisplayManager<Hyprctl>, set: &SetArgs) -> Result<()> {
    let strict = manager.settings().strict_validation;
    let name = set.name.as_str();
    let store = manager.store_mut();

    if let Some(mode) = set.mode {
        store.set_mode(name, mode, strict)?;
    }
    if let Some(scale) = set.scale {
        store.set_scale(name, scale)?;
    }
    if let Some(transform) = &set.transform {
        store.set_transform(name, Transform::from(transform.as_str()))?;
    }
    if let Some(vrr) = set.vrr {
        let mode = VrrMode::try_from(vrr).map_err(anyhow::Error::msg)?;
        store.set_vrr(name, mode)?;
    }
    if let Some(hdr) = set.hdr {
        store.set_hdr(name, hdr)?;
    }
    if let Some(wide) = set.wide_gamut {
        store.set_wide_gamut(name, wide)?;
    }
    if let Some(ten_bit) = set.ten_bit {
        store.set_ten_bit(name, ten_bit)?;
    }
    if set.sdr_brightness.is_some() || set.sdr_saturation.is_some() {
        store.set_sdr(name, set.sdr_brightness, set.sdr_saturation)?;
    }
    if let Some(target) = &set.mirror {
        let target = if target == "none" { "" } else { target.as_str() };
        store.set_mirror(name, target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_move_accepts_negative_coordinates() {
        let args = Args::try_parse_from(["hyprdisplays", "move", "DP-1", "-1920", "-40", "--snap", "25"]).unwrap();
        match args.command {
            Command::Move { name, x, y, snap } => {
                assert_eq!((name.as_str(), x, y, snap), ("DP-1", -1920, -40, Some(25)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_set_parses_mode_and_flags() {
        let args = Args::try_parse_from([
            "hyprdisplays", "set", "HDMI-A-1", "--mode", "2560x1440@143.97", "--hdr", "true", "--vrr", "2",
        ])
        .unwrap();
        let Command::Set(set) = args.command else {
            panic!("expected set");
        };
        assert_eq!(set.mode.map(|m| m.width), Some(2560));
        assert_eq!(set.hdr, Some(true));
        assert_eq!(set.vrr, Some(2));
        assert!(Args::try_parse_from(["hyprdisplays", "set", "DP-1", "--vrr", "3"]).is_err());
    }

    #[test]
    fn test_canvas_and_log_level_parsing() {
        assert_eq!(parse_canvas("1200x600"), Ok((1200.0, 600.0)));
        assert!(parse_canvas("1200").is_err());
        assert_eq!(log_level(1, "error"), TraceLevel::DEBUG);
        assert_eq!(log_level(3, "error"), TraceLevel::TRACE);
    }
}
