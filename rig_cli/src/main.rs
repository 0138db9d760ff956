//! Firmware entry point: config, logging, then the serve loop.

mod cli;
mod error_fmt;
#[cfg(target_os = "linux")]
mod rt;
mod serve;

use std::fs;
use std::path::Path;

use clap::Parser;
use eyre::WrapErr;

use cli::{Cli, Commands, FILE_GUARD};
use rig_config::Config;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let cfg = load_config(&args.config)?;
    cfg.validate().wrap_err("invalid configuration")?;
    init_tracing(&args, &cfg)?;

    let result = match &args.cmd {
        Commands::Serve {
            device,
            sim,
            no_boot,
            rt,
        } => serve::serve(&cfg, device.as_deref(), *sim, *no_boot, *rt),
        Commands::SelfCheck { sim } => serve::self_check(&cfg, *sim),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal");
        eprintln!("{}", error_fmt::humanize(&e));
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    toml::from_str::<Config>(&text).wrap_err_with(|| format!("parse config {}", path.display()))
}

/// Console logs go to stderr (stdout belongs to the protocol); an optional
/// JSON-lines file sink is driven by the `[logging]` config table.
fn init_tracing(args: &Cli, cfg: &Config) -> eyre::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    let level = cfg
        .logging
        .level
        .clone()
        .unwrap_or_else(|| args.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if args.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match &cfg.logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| "rig.log".as_ref());
            let appender = match cfg.logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}
