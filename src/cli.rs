//! Command-line interface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use m2ha::config::Overrides;

/// m2ha - drive Home Assistant from a MIDI control surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file [default: m2ha.yaml if present]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bridge the control surface to Home Assistant
    Run(DeviceArgs),

    /// List available MIDI input devices
    List,

    /// Log controls and the service calls they would make, without sending
    Monitor(DeviceArgs),

    /// Send a single service call
    Call {
        /// Service endpoint, e.g. light/turn_on
        endpoint: String,

        /// JSON service data
        #[arg(default_value = "{}")]
        body: String,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceArgs {
    /// MIDI input device name
    #[arg(short, long)]
    pub device: Option<String>,

    /// Minimum time between service calls, in microseconds
    #[arg(short, long, allow_negative_numbers = true)]
    pub throttle: Option<i64>,
}

impl DeviceArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            device: self.device.clone(),
            min_interval_us: self.throttle,
        }
    }
}
