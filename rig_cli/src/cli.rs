//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rig", version, about = "Sample-handling rig firmware")]
pub struct Cli {
    /// Path to config TOML; built-in defaults apply when the file is absent
    #[arg(long, value_name = "FILE", default_value = "etc/rig_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the serial command protocol until the link closes
    Serve {
        /// Serial device node to serve on; stdio when omitted
        #[arg(long, value_name = "PATH")]
        device: Option<PathBuf>,

        /// Use simulated devices instead of GPIO
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,

        /// Skip the boot banner, ring self-test, and beam LED seeding
        #[arg(long, action = ArgAction::SetTrue)]
        no_boot: bool,

        /// Enable real-time mode (SCHED_FIFO + mlockall; Linux only,
        /// usually needs elevated privileges)
        #[arg(long, action = ArgAction::SetTrue)]
        rt: bool,
    },
    /// Run the boot sequence (readiness line + ring self-test) and exit
    SelfCheck {
        /// Use simulated devices instead of GPIO
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
    },
}
