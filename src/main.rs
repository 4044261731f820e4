//! Tunnel Autopilot - runs the tunnel client and answers its prompts.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use tunnel_autopilot::config::{ConfigLoader, TransportChoice};
use tunnel_autopilot::display;
use tunnel_autopilot::supervisor::{Session, SessionError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Auto,
    Pipe,
    Pty,
}

impl From<TransportArg> for TransportChoice {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Auto => TransportChoice::Auto,
            TransportArg::Pipe => TransportChoice::Pipe,
            TransportArg::Pty => TransportChoice::Pty,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "tunnel-autopilot",
    about = "Run the tunnel client unattended, reacting to its prompts",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings file (defaults to tunnel-autopilot.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Detector rules file (defaults to detector.toml).
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Override the transport from the settings file.
    #[arg(short, long, value_enum)]
    transport: Option<TransportArg>,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn log_level(verbosity: u8, debug: bool) -> &'static str {
    match verbosity {
        0 | 1 if debug => "debug",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Start logging at the CLI verbosity. Returns a handle for raising the level
/// later, unless `RUST_LOG` decides it.
fn init_tracing(verbosity: u8) -> Option<FilterHandle> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(log_level(verbosity, false)), false),
    };
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    (!from_env).then_some(handle)
}

/// Apply `debug = true` from the settings file.
fn raise_to_debug(handle: Option<&FilterHandle>, verbosity: u8) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(e) = handle.reload(EnvFilter::new(log_level(verbosity, true))) {
        tracing::warn!(error = %e, "Could not raise log level");
    }
}

async fn run(cli: Cli) -> Result<(), SessionError> {
    let settings_loader = cli
        .config
        .map_or_else(ConfigLoader::settings, ConfigLoader::with_path);
    let rules_loader = cli
        .rules
        .map_or_else(ConfigLoader::rules, ConfigLoader::with_path);

    let filter = init_tracing(cli.verbose);
    let mut settings = settings_loader.load_settings()?;
    if settings.debug {
        raise_to_debug(filter.as_ref(), cli.verbose);
    }
    if let Some(transport) = cli.transport {
        settings.transport = transport.into();
    }
    let rules = rules_loader.load_rules()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let outcome = Session::new(settings, rules)
        .with_cancellation(cancel)
        .run()
        .await?;
    tracing::info!(?outcome, "Session finished");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_fatal(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
