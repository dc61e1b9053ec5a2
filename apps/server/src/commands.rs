//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use enrichkit_core::BatchRunner;
use enrichkit_shared::{
    AppConfig, AuditQuery, BatchRequest, EnvConfig, init_config, load_config, load_config_from,
};
use enrichkit_storage::{LogStore, Storage};
use tracing::info;

use crate::routes;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// EnrichKit: scrape company homepages and log enrichment steps.
#[derive(Parser)]
#[command(
    name = "enrichkit",
    version,
    about = "Scrape company homepages through a rendering proxy and keep an enrichment audit trail.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.enrichkit/enrichkit.toml).
    #[arg(long, global = true, env = "ENRICHKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP service.
    Serve {
        /// Bind address (overrides server.host).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides server.port).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one batch locally and print the result ledger.
    Scrape {
        /// JSON file holding a scrape-batch request body.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print recent enrichment audit records.
    Logs {
        #[arg(long)]
        company_id: Option<String>,

        #[arg(long)]
        workflow_id: Option<String>,

        /// Maximum records to print.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "enrichkit=info,tower_http=info",
        1 => "enrichkit=debug,tower_http=debug",
        _ => "enrichkit=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Serve { host, port } => cmd_serve(config_path, host, port).await,
        Command::Scrape { file } => cmd_scrape(config_path, &file).await,
        Command::Logs {
            company_id,
            workflow_id,
            limit,
        } => {
            let query = AuditQuery {
                company_id,
                workflow_id,
                status: None,
                limit,
            };
            cmd_logs(config_path, &query).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .wrap_err_with(|| {
            format!("invalid bind address {}:{}", config.server.host, config.server.port)
        })?;

    let env = EnvConfig::from_env(&config);
    let state = AppState::build(config, env).await;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(%addr, "enrichkit listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn cmd_scrape(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;

    let raw = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("cannot read {}", file.display()))?;
    let request: BatchRequest = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("{} is not a valid batch request", file.display()))?;
    request.validate()?;

    let settings = EnvConfig::from_env(&config).scrape_settings(&config)?;
    let runner = BatchRunner::new(&settings)?;
    let result = runner.run(&request).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.failed_count > 0 {
        return Err(eyre!(
            "{} of {} companies failed",
            result.failed_count,
            result.total
        ));
    }
    Ok(())
}

async fn cmd_logs(config_path: Option<&Path>, query: &AuditQuery) -> Result<()> {
    let config = resolve_config(config_path)?;
    let settings = EnvConfig::from_env(&config).database_settings(&config)?;
    let storage = Storage::connect(&settings).await?;

    let records = storage.list_audit_records(query).await?;
    info!(count = records.len(), "audit records loaded");

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
