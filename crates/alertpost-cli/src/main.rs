mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use alertpost_core::{AlertEvent, AlertHandler, AlertPostService, HandlerConfig, Level};

use crate::config::AppConfig;

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        VERSION
    } else {
        // Leak is fine: called once, lives for the program's lifetime.
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Forward alert events as JSON POSTs to named endpoints.
#[derive(Parser)]
#[command(name = "alertpost", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 0.0.0.0:9100). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a config file and list its endpoints.
    Check {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Deliver one synthetic alert, to check a destination by hand.
    #[command(group(ArgGroup::new("target").required(true).args(["url", "endpoint"])))]
    Send {
        /// Literal URL to POST to.
        #[arg(long)]
        url: Option<String>,

        /// Endpoint name from the config file.
        #[arg(long)]
        endpoint: Option<String>,

        /// Path to TOML config file (needed for --endpoint).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Alert level: ok, info, warning or critical.
        #[arg(long, default_value = "info")]
        level: Level,

        #[arg(long, default_value = "alertpost test alert")]
        message: String,

        #[arg(long, default_value = "alertpost-send")]
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => run_serve(listen, config).await,
        Commands::Check { config } => {
            init_tracing("pretty", "warn");
            run_check(&config)
        }
        Commands::Send {
            url,
            endpoint,
            config,
            level,
            message,
            id,
        } => {
            init_tracing("pretty", "warn");
            let handler_config = HandlerConfig {
                url: url.unwrap_or_default(),
                endpoint: endpoint.unwrap_or_default(),
            };
            let event = AlertEvent::new(id, level).with_message(message);
            run_send(handler_config, config, event).await
        }
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) -> ExitCode {
    let app_config = if let Some(ref path) = config_path {
        match AppConfig::load(path) {
            Ok(c) => {
                init_tracing(&c.server.log_format, "info");
                tracing::info!(path = %path.display(), "Loaded config file");
                Some(c)
            }
            Err(e) => {
                init_tracing("pretty", "info");
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        init_tracing("pretty", "info");
        None
    };

    let listen = listen_override
        .or(app_config.as_ref().map(|c| c.server.listen))
        .unwrap_or_else(config::default_listen);

    let endpoints = app_config.map(|c| c.alertpost).unwrap_or_default();
    tracing::info!(count = endpoints.len(), "Endpoints configured");

    let service = AlertPostService::new(endpoints);
    service.open();
    let state = alertpost_api::state::AppState::new(service);
    let service = state.service.clone();

    tracing::info!(%listen, "Starting alertpost API server");
    if let Err(e) =
        alertpost_api::serve_with_state(listen, state, alertpost_api::shutdown_signal()).await
    {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    service.close();
    tracing::info!(
        sent = service.stats().sent(),
        failed = service.stats().failed(),
        "Shutdown complete"
    );
    ExitCode::SUCCESS
}

fn run_check(path: &Path) -> ExitCode {
    let config = match AppConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{} {}",
        style("config ok:").green().bold(),
        style(path.display()).bold()
    );
    println!("  {} {}", style("listen:    ").dim(), config.server.listen);
    println!("  {} {}", style("log_format:").dim(), config.server.log_format);
    println!("  {} {}", style("endpoints: ").dim(), config.alertpost.len());

    for endpoint in config.alertpost.iter().map(|e| e.redacted()) {
        println!();
        println!("  {}", style(&endpoint.endpoint).bold());
        println!("    {} {}", style("url:").dim(), endpoint.url);
        let mut headers: Vec<_> = endpoint.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            println!("    {} {}: {}", style("header:").dim(), name, value);
        }
    }

    ExitCode::SUCCESS
}

async fn run_send(
    handler_config: HandlerConfig,
    config_path: Option<PathBuf>,
    event: AlertEvent,
) -> ExitCode {
    let endpoints = match config_path {
        Some(ref path) => match AppConfig::load(path) {
            Ok(c) => c.alertpost,
            Err(e) => {
                eprintln!("{} {}", style("error:").red().bold(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    let target = if handler_config.url.is_empty() {
        format!("endpoint {}", handler_config.endpoint)
    } else {
        handler_config.url.clone()
    };

    let service = AlertPostService::new(endpoints);
    let handler = service.handler(handler_config);
    handler.handle(&event).await;

    if service.stats().sent() > 0 {
        println!(
            "{} {} alert {} to {}",
            style("sent").green().bold(),
            event.level,
            style(&event.id).bold(),
            target
        );
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "{} alert {} to {} (see log above)",
            style("failed").red().bold(),
            style(&event.id).bold(),
            target
        );
        ExitCode::FAILURE
    }
}

fn init_tracing(log_format: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .init();
        }
    }
}
