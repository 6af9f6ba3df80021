use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use trialcam::config::TrialCamConfig;
use trialcam::naming::{self, NamingSession};
use trialcam::platform::BackendChain;
use trialcam::recording::{Mp4SinkFactory, RecordingSession, TrialSummary};
use trialcam::ui::{KeyBindings, TerminalUi};
use trialcam::{app, discovery, CameraId, CameraName, CameraRegistry, CaptureLoop};

#[derive(Parser)]
#[command(name = "trialcam")]
#[command(about = "Record labeled trials from several cameras at once")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: trialcam.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output root; each camera records into <output>/<camera>/
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Probe camera indices 0..MAX_INDEX
    #[arg(long, global = true)]
    max_index: Option<u32>,

    /// Requested and recorded frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Requested and recorded frame width
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Requested and recorded frame height
    #[arg(long, global = true)]
    height: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, name and record (default)
    Run {
        /// Read camera names from this file instead of asking
        #[arg(long)]
        names: Option<PathBuf>,

        /// Write the names given during this run to this file
        #[arg(long)]
        save_names: Option<PathBuf>,
    },

    /// Probe camera indices and print the working ones
    Discover {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(TrialCamConfig::default_path);

    if let Some(Commands::InitConfig { force }) = cli.command {
        return init_config(&config_path, force);
    }

    let config = load_config(&cli, &config_path)?;

    match cli.command {
        Some(Commands::Discover { json }) => cmd_discover(&config, json),
        Some(Commands::Run { names, save_names }) => cmd_run(&config, names, save_names),
        None => cmd_run(&config, None, None),
        Some(Commands::InitConfig { .. }) => Ok(()),
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    TrialCamConfig::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn load_config(cli: &Cli, path: &Path) -> anyhow::Result<TrialCamConfig> {
    let mut config = TrialCamConfig::load_from_file(path)?;

    if let Some(output) = &cli.output {
        config.storage.output_root = output.to_string_lossy().into_owned();
    }
    if let Some(max_index) = cli.max_index {
        config.discovery.max_index = max_index;
    }
    if let Some(fps) = cli.fps {
        config.camera.fps = fps;
    }
    if let Some(width) = cli.width {
        config.camera.resolution[0] = width;
    }
    if let Some(height) = cli.height {
        config.camera.resolution[1] = height;
    }

    if let Err(msg) = config.validate() {
        bail!("invalid configuration: {}", msg);
    }
    Ok(config)
}

fn cmd_discover(config: &TrialCamConfig, json: bool) -> anyhow::Result<()> {
    trialcam::init_logging();

    let backends = BackendChain::from_strategy(config.discovery.backend);
    let ids = discovery::discover(&backends, &config.discovery, &config.open_params());

    if json {
        println!("{}", serde_json::to_string(&ids)?);
    } else if ids.is_empty() {
        println!("No working cameras found");
    } else {
        for id in &ids {
            println!("Camera {}", id);
        }
    }
    Ok(())
}

fn cmd_run(
    config: &TrialCamConfig,
    names_file: Option<PathBuf>,
    save_names: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output_root = config.output_root();
    let log_path = output_root.join("trialcam.log");
    trialcam::init_file_logging(&log_path)?;
    println!("Logging to {}", log_path.display());

    let params = config.open_params();
    let backends = BackendChain::from_strategy(config.discovery.backend);

    println!("Searching for cameras...");
    let ids = discovery::discover(&backends, &config.discovery, &params);
    if ids.is_empty() {
        bail!("no working cameras found");
    }
    println!("Found {} camera(s): {:?}", ids.len(), ids);

    let keys = KeyBindings::from(&config.controls);
    let mut ui = None;

    let names: BTreeMap<CameraId, CameraName> = match names_file {
        Some(path) => naming::load_names(&path, config.naming.duplicate_policy)?
            .into_iter()
            .filter(|(id, name)| {
                let found = ids.contains(id);
                if !found {
                    println!("Camera {} ('{}') was not discovered, skipping", id, name);
                }
                found
            })
            .collect(),
        None => {
            let terminal = ui.insert(TerminalUi::enter(keys)?);
            NamingSession::new(&backends, params)
                .with_preview_duration(config.naming.preview_duration())
                .with_preview_height(config.controls.preview_height)
                .with_policy(config.naming.duplicate_policy)
                .assign_names(&ids, terminal)?
        }
    };

    if names.is_empty() {
        bail!("no cameras were named");
    }
    if let Some(path) = save_names {
        naming::save_names(&path, &names)?;
    }

    naming::ensure_output_dirs(&output_root, names.values())
        .context("could not create output folders")?;

    let registry = CameraRegistry::initialize(&backends, &names, &params);
    if registry.is_empty() {
        bail!("none of the named cameras could be opened");
    }

    let session = RecordingSession::new(
        Box::new(Mp4SinkFactory),
        output_root.clone(),
        config.recording_config(),
    );

    let ui = match ui {
        Some(ui) => ui,
        None => TerminalUi::enter(keys)?,
    };

    // Installed only now: until the loop runs, Ctrl-C keeps its default
    // meaning and ends discovery or naming immediately.
    let interrupt = app::install_interrupt_handler()?;
    let mut capture = CaptureLoop::new(registry, session, ui)
        .with_keys(keys)
        .with_tick_interval(config.controls.tick_interval())
        .with_preview_height(config.controls.preview_height)
        .with_interrupt(interrupt);

    let report = capture.run()?;
    drop(capture);

    print_report(&report.trials);
    println!("Exited ({:?}) after {} tick(s)", report.exit, report.ticks);
    Ok(())
}

fn print_report(trials: &[TrialSummary]) {
    if trials.is_empty() {
        println!("No trials recorded");
        return;
    }

    for trial in trials {
        println!(
            "Trial '{}' ({:.1}s, started {})",
            trial.trial,
            trial.duration_secs,
            trial.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        for camera in &trial.cameras {
            match &camera.error {
                None => println!(
                    "  {:<12} {:>6} frames  {:>4} missed  {}",
                    camera.camera,
                    camera.frames_written,
                    camera.missed_ticks(),
                    camera.path.display()
                ),
                Some(error) => println!(
                    "  {:<12} {:>6} frames  FAILED: {}",
                    camera.camera, camera.frames_written, error
                ),
            }
        }
    }
}
