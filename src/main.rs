use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rover_actuator_runtime::config::RobotConfig;
use rover_actuator_runtime::runtime::{self, Shutdown};

/// Servo, camera mount and drive motor runtime for the rover
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the simulated board instead of the serial link
    #[arg(long)]
    simulate: bool,

    /// Serial port of the actuator board
    #[arg(short, long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match args.config {
        Some(path) => match RobotConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => RobotConfig::default(),
    };
    if args.simulate {
        config.hardware.enabled = false;
    }
    if let Some(port) = args.port {
        config.hardware.port = port;
    }

    match runtime::run(config).await {
        Ok(Shutdown::Restart) => info!("Exiting for firmware restart"),
        Ok(Shutdown::Stopped) => info!("Runtime stopped"),
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            std::process::exit(1);
        }
    }
}
