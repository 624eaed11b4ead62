//! nestcamd - birdhouse camera daemon.
//!
//! Loads configuration, wires up the frame source/sink for the configured
//! pipeline descriptions, starts the capture, snapshot and sensor workers,
//! and runs until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use nestcam::{
    sink_for, source_for, Daemon, DaemonConfig, StubSensor, SysfsThermal, VcgencmdThermal,
};

#[derive(Parser, Debug)]
#[command(name = "nestcamd", version, about = "birdhouse camera daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "NESTCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the snapshot capture directory.
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Read the CPU temperature from sysfs instead of vcgencmd.
    #[arg(long)]
    sysfs_thermal: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = DaemonConfig::load_with(args.config.as_deref())?;
    if let Some(dir) = args.capture_dir {
        config.capture_dir = dir;
    }

    let source = source_for(&config)?;
    let sink = sink_for(&config)?;

    // The BMP280 driver is an external collaborator wired in by deployments
    // that have the hardware; the stub provider keeps the daemon useful
    // without it.
    let sensor = Box::new(StubSensor::default());
    let thermal: Box<dyn nestcam::CpuThermal> = if args.sysfs_thermal {
        Box::new(SysfsThermal::new())
    } else {
        Box::new(VcgencmdThermal::new())
    };

    let daemon = Arc::new(Daemon::new(config));

    let shutdown = daemon.shutdown_handle();
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        shutdown.trigger();
    })
    .context("install signal handler")?;

    daemon.start(source, sink, sensor, thermal)?;
    daemon.run_until_shutdown();
    daemon.stop();
    log::info!("nestcamd stopped");
    Ok(())
}
