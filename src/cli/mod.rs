use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::transport::UreqTransport;
use crate::config::{ConfigLoader, HostPreferences};
use crate::events::{AuditEvent, AuditLayer, EventSink, TracingSink, AUDIT_TARGET};
use crate::host::Bridge;
use crate::launch::SystemOpener;

pub mod commands;

use self::commands::{QueryArgs, SelectArgs};

#[derive(Parser, Debug)]
#[command(
    name = "joplin-bridge",
    version,
    about = "Search and create Joplin notes from a launcher"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over JOPLIN_BRIDGE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Web Clipper base URL, overriding the configured host
    #[arg(long)]
    pub host: Option<String>,

    /// Web Clipper token, overriding the configured token
    #[arg(long, env = "JOPLIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Minimum log level for stderr (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single query and print the result list as JSON
    Query(QueryArgs),
    /// Run the action behind a selected result and print the host response
    Select(SelectArgs),
    /// Read one JSON request per stdin line and answer each on stdout
    Serve,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::discover(cli.config.as_deref())?;
    let config = loader.load_or_init()?;
    let audit_file = config.logging.audit.then_some(config.logging.file.as_path());
    init_tracing(&cli.log_level, audit_file)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    for notice in &config.notices {
        tracing::warn!("{notice}");
    }

    let preferences = config.preferences().overlay(&HostPreferences {
        joplin_host: cli.host.clone(),
        joplin_token: cli.token.clone(),
    });
    let transport = UreqTransport::default();
    let events = TracingSink::new(config.logging.audit);
    let opener = SystemOpener::default();
    let bridge = Bridge::new(
        &transport,
        &events,
        &opener,
        preferences.clone(),
        config.joplin.deep_link_scheme.clone(),
    );
    events.record(AuditEvent::new("extension_initialized"));

    let mut stdout = io::stdout().lock();
    match cli.command {
        Commands::Query(args) => commands::query(&bridge, &preferences, &args, &mut stdout),
        Commands::Select(args) => commands::select(&bridge, &preferences, &args, &mut stdout),
        Commands::Serve => commands::serve(&bridge, io::stdin().lock(), &mut stdout),
    }
}

fn init_tracing(level: &str, audit_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level)
            .unwrap_or_else(|_| EnvFilter::new("info"))
            .add_directive(format!("{AUDIT_TARGET}=off").parse()?);
        let stderr_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_filter(env_filter);

        let audit_layer = match audit_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening audit log {}", path.display()))?;
                Some(AuditLayer::new(file))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(audit_layer)
            .try_init()
            .context("installing tracing subscriber")?;
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
