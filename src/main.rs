use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use nexusd::action::Action;
use nexusd::adb::Adb;
use nexusd::capture::CaptureManager;
use nexusd::config::Config;
use nexusd::dispatch::Dispatcher;
use nexusd::server::Server;
use nexusd::{nlog, Error, Result};

/// Nexusd - remote control daemon for a USB- or network-attached Android device
#[derive(Parser, Debug)]
#[command(name = "nexusd")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    NEXUSD_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.nexusd/nexusd.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the control server (default when no subcommand is given)
    Serve {
        /// Listen on this port instead of the configured one
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },

    /// Show the device the daemon would use right now
    Devices,

    /// Execute one action from a JSON object and print the response
    Dispatch {
        /// The action as JSON, e.g. '{"action": "device_info"}'
        request: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    nexusd::log::init_with_debug(cli.debug);

    match cli.command {
        Some(Command::Devices) => run_devices(),
        Some(Command::Dispatch { request }) => run_dispatch(request),
        Some(Command::Serve { port }) => run_serve(port, cli.debug),
        None => run_serve(None, cli.debug),
    }
}

fn run_serve(port: Option<u16>, debug: bool) -> Result<()> {
    if debug {
        nlog!("nexusd starting (debug mode enabled)");
    } else {
        nlog!("nexusd starting");
    }

    let mut config = Config::load()?;
    if let Some(port) = port {
        config.port = port;
    }
    config.ensure_dirs()?;

    if config.is_default_key() {
        println!("WARNING: the API key is still the shipped default.");
        println!(
            "         Set api_key in {} before exposing this port.",
            Config::config_path()?.display()
        );
    }
    if !Adb::is_available() {
        println!("WARNING: 'adb' not found on PATH. Device actions will fail until it is installed.");
    }
    if which::which("scrcpy").is_err() {
        println!("WARNING: 'scrcpy' not found on PATH. Mirroring and recording will be unavailable.");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let capture = Arc::new(CaptureManager::new());
        let server = Server::bind(config, capture.clone()).await?;
        println!("nexusd listening on {}", server.local_addr()?);

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            nlog!("Interrupt received, shutting down");
            token.cancel();
        });

        let result = server.run(shutdown).await;
        // Don't leave a capture process running past the daemon
        capture.stop().await?;
        nlog!("nexusd stopped");
        result
    })
}

fn run_devices() -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(Adb::current_device()) {
        Some(device) => println!("{}", device),
        None => println!("No device connected."),
    }
    Ok(())
}

/// One-shot dispatch for scripting and troubleshooting. Runs locally, so no
/// API key is required; the response prints as pretty JSON.
fn run_dispatch(request: String) -> Result<()> {
    let action: Action = serde_json::from_str(&request)
        .map_err(|e| Error::InvalidAction(e.to_string()))?;

    let config = Config::load()?;
    config.ensure_dirs()?;

    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(async {
        let dispatcher = Dispatcher::new(config, Arc::new(CaptureManager::new()));
        dispatcher.dispatch(action).await
    });

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.is_success() {
        Ok(())
    } else {
        Err(Error::ToolFailure(response.message))
    }
}
