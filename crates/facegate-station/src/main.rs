use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use facegate_station::config::Config;
use facegate_station::controller::{self, StationError, StationHandle};
use facegate_station::display;
use facegate_station::store::GalleryStore;
use facegate_station::synthetic;

/// Facegate biometric check-in station.
#[derive(Parser)]
#[command(name = "facegate", version, about)]
struct Args {
    /// Override the data directory (gallery files + login log)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run against the built-in synthetic capture rig instead of real
    /// hardware backends
    #[arg(long)]
    synthetic: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    tracing::info!(data_dir = %config.data_dir.display(), "facegate starting");

    let store = GalleryStore::open(&config.data_dir)?;

    if !args.synthetic {
        // Hardware capture backends (camera, landmark model, encoder,
        // classifier) plug in at the controller's `Backends` seam; this
        // build ships none.
        anyhow::bail!("no hardware backend in this build; run with --synthetic");
    }
    let (backends, control) = synthetic::rig();
    // The synthetic subject blinks on every sixth detection tick,
    // roughly every three seconds at the default sampling interval
    control.set_auto_blink(Some(6));

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let handle = controller::spawn(config, backends, store);
            command_loop(handle).await
        })
        .await
}

/// Interactive station commands: `register <name>`, `start`, `status`,
/// `quit`. Emotion readouts print whenever the display state changes.
async fn command_loop(handle: StationHandle) -> Result<()> {
    use tokio::io::AsyncBufReadExt;

    let mut display_rx = handle.subscribe_display();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut last_reading = None;

    println!("facegate ready — commands: register <name> | start | status | quit");

    loop {
        tokio::select! {
            changed = display_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = display_rx.borrow_and_update().clone();
                if state.emotion != last_reading {
                    if let Some(reading) = state.emotion {
                        let bar = "#".repeat((display::bar_width(&reading) / 10) as usize);
                        println!("{}: {}% {bar}", reading.label, reading.confidence);
                    }
                    last_reading = state.emotion;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !dispatch(&handle, line.trim()).await? {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns `false` when the loop should exit.
async fn dispatch(handle: &StationHandle, command: &str) -> Result<bool> {
    if let Some(name) = command.strip_prefix("register ") {
        let name = name.trim();
        match handle.enroll(name).await {
            Ok(()) => println!("Registered {name}"),
            Err(StationError::NoFaceDetected) => println!("No face detected. Try again."),
            Err(error) => println!("registration failed: {error}"),
        }
    } else if command == "start" {
        // Resolve in the background so the console stays responsive while
        // the attempt waits on a blink
        let handle = handle.clone();
        tokio::task::spawn_local(async move {
            match handle.start_login().await {
                Ok(outcome) => println!("{}", outcome.message()),
                Err(StationError::NoFaceDetected) => println!("No face detected. Try again."),
                Err(error) => println!("login failed: {error}"),
            }
        });
        println!("Look at the camera and blink...");
    } else if command == "status" {
        let report = handle.status().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if command == "quit" {
        return Ok(false);
    } else if !command.is_empty() {
        println!("unknown command: {command}");
    }
    Ok(true)
}
