use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vehicle_daq::config::BoardConfig;

/// Poll the instrumentation board and print one JSON line per cycle
#[derive(Parser, Debug)]
#[command(name = "vehicle-daq", version)]
struct Args {
    /// Board layout (JSON); built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// IMU serial port, overrides the config file
    #[arg(long)]
    port: Option<String>,

    /// Polling rate in Hz, overrides the config file
    #[arg(long)]
    hz: Option<u64>,

    /// Run without the IMU serial link
    #[arg(long)]
    simulate: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug); stdout carries the readings
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match BoardConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => BoardConfig::default(),
    };
    if let Some(port) = args.port {
        config.imu.port = port;
    }
    if let Some(hz) = args.hz {
        config.loop_hz = hz;
    }
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = vehicle_daq::runtime::run(config, args.simulate).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
