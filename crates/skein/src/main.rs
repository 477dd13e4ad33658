//! Skein DNS Resolver
//!
//! An iterative/forwarding DNS resolver with message caching and
//! independent client and lookup deadlines.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use console::style;
use skein_cache::{CacheConfig, MessageCache};
use skein_config::{Config, ResolverMode};
use skein_metrics::tracing_setup::{init_tracing, LogConfig, LogFormat};
use skein_nsas::NameserverStore;
use skein_proto::{Message, ResponseCode};
use skein_resolver::{EngineConfig, QueryEngine};
use skein_server::{DnsServer, QueryContext, QueryHandler, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn, Level};

/// Skein DNS resolver - iterative resolution with deadline-bounded queries
#[derive(Parser, Debug)]
#[command(name = "skein")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the resolver (default)
    Run,

    /// Validate configuration file
    Validate {
        /// Show detailed validation output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show version information
    Version,
}

/// Find the configuration file in standard locations
fn find_config_file(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path);
    }

    let search_paths = [
        PathBuf::from("./skein.yaml"),
        PathBuf::from("./skein.yml"),
        PathBuf::from("./config.yaml"),
        PathBuf::from("/etc/skein/config.yaml"),
        PathBuf::from("/etc/skein/skein.yaml"),
    ];

    search_paths.into_iter().find(|path| path.exists())
}

/// Parse log level from string
fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging/tracing subsystem
fn init_logging(config: &Config, cli_level: Option<&str>, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if let Some(lvl) = cli_level {
        parse_log_level(lvl)
    } else {
        parse_log_level(&config.logging.level)
    };

    let format = match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    };

    init_tracing(&LogConfig { level, format });
}

/// Print the startup banner
fn print_banner(config: &Config, quiet: bool) {
    if quiet {
        return;
    }

    let version = env!("CARGO_PKG_VERSION");

    println!();
    println!(
        "  {} {}",
        style("Skein DNS Resolver").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!();
    println!("  {} {}", style("Server:").green(), config.server.name);

    let mode = match config.resolver.mode {
        ResolverMode::Iterative => "Iterative (from root)".to_string(),
        ResolverMode::Forward => format!("Forward ({} upstreams)", config.resolver.forwarders.len()),
    };
    println!("  {} {}", style("Mode:").green(), mode);

    let listeners: Vec<String> = config
        .listeners
        .udp
        .iter()
        .map(|a| a.to_string())
        .collect();
    println!("  {} {}", style("Listeners:").green(), listeners.join(", "));
    println!();
}

// ============================================================================
// Query handler
// ============================================================================

/// Bridges the UDP frontend to the query engine.
struct SkeinHandler {
    engine: QueryEngine,
}

#[async_trait]
impl QueryHandler for SkeinHandler {
    async fn handle(&self, query: Message, context: QueryContext) -> Message {
        skein_metrics::metrics().record_query();

        let Some(question) = query.question().cloned() else {
            let mut response = Message::response_from(&query);
            response.set_rcode(ResponseCode::FormErr);
            return response;
        };

        debug!(client = %context.client, question = %question, "query received");

        let mut response = match self.engine.resolve(&question).await {
            Ok(mut answer) => {
                answer.set_id(query.id());
                answer
            }
            Err(e) => {
                warn!(question = %question, error = %e, "resolution failed");
                skein_metrics::metrics().record_servfail();
                let mut response = Message::response_from(&query);
                response.set_rcode(ResponseCode::ServFail);
                response
            }
        };

        response.header_mut().set_recursion_available(true);
        skein_metrics::metrics().record_response();
        response
    }
}

// ============================================================================
// Component wiring
// ============================================================================

fn build_cache(config: &Config) -> Arc<MessageCache> {
    Arc::new(MessageCache::new(CacheConfig {
        max_messages: config.cache.max_messages,
        max_rrsets: config.cache.max_rrsets,
        min_ttl: Duration::from_secs(config.cache.min_ttl as u64),
        max_ttl: Duration::from_secs(config.cache.max_ttl as u64),
    }))
}

fn build_nsas(config: &Config) -> Arc<NameserverStore> {
    if config.resolver.root_hints.is_empty() {
        Arc::new(NameserverStore::new())
    } else {
        info!(
            count = config.resolver.root_hints.len(),
            "using root hints from configuration"
        );
        Arc::new(NameserverStore::with_root_hints(
            config.resolver.root_hints.clone(),
        ))
    }
}

fn build_engine(
    config: &Config,
    cache: Arc<MessageCache>,
    nsas: Arc<NameserverStore>,
) -> QueryEngine {
    let engine_config = EngineConfig {
        forwarders: config.resolver.effective_forwarders(),
        query_timeout: config.resolver.query_timeout(),
        client_timeout: config.resolver.client_timeout(),
        lookup_timeout: config.resolver.lookup_timeout(),
        retries: config.resolver.retries,
    };

    info!(
        mode = ?config.resolver.mode,
        query_timeout_ms = config.resolver.query_timeout_ms,
        retries = config.resolver.retries,
        "initializing query engine"
    );

    QueryEngine::new(engine_config, cache, nsas)
}

/// Run the resolver
async fn run_server(config: Config, quiet: bool) -> Result<()> {
    print_banner(&config, quiet);

    let cache = build_cache(&config);
    let nsas = build_nsas(&config);
    let engine = build_engine(&config, cache, nsas);

    let handler = Arc::new(SkeinHandler { engine });

    let server_config = ServerConfig {
        udp_listen: config.listeners.udp.clone(),
        shutdown_timeout: Duration::from_secs(10),
    };
    let server = DnsServer::new(server_config, handler);

    for listener in &config.listeners.udp {
        info!(address = %listener, protocol = "UDP", "listening");
    }
    info!("skein resolver started");

    let shutdown = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                return Err(e.into());
            }
        }
        _ = shutdown => {
            server.shutdown();
        }
    }

    info!("skein resolver stopped");
    Ok(())
}

/// Validate configuration file
fn validate_config(path: Option<PathBuf>, verbose: bool) -> Result<()> {
    let config_path = find_config_file(path).context("no configuration file found")?;

    println!("Validating configuration: {}", config_path.display());

    let config = Config::from_file(&config_path).with_context(|| {
        format!(
            "failed to load configuration from {}",
            config_path.display()
        )
    })?;

    if verbose {
        println!("\n{}", style("Configuration loaded:").green().bold());
        println!("  Server name: {}", config.server.name);
        println!("  UDP listeners: {}", config.listeners.udp.len());
        println!("  Resolver mode: {:?}", config.resolver.mode);
        println!("  Forwarders: {}", config.resolver.forwarders.len());
        println!("  Query timeout: {} ms", config.resolver.query_timeout_ms);
        println!(
            "  Client timeout: {}",
            timeout_display(config.resolver.client_timeout_ms)
        );
        println!(
            "  Lookup timeout: {}",
            timeout_display(config.resolver.lookup_timeout_ms)
        );
        println!("  Retries: {}", config.resolver.retries);
        println!("  Cache messages: {}", config.cache.max_messages);
    }

    config
        .validate()
        .context("configuration validation failed")?;

    println!("{}", style("Configuration is valid!").green().bold());
    Ok(())
}

fn timeout_display(ms: i64) -> String {
    if ms < 0 {
        "disabled".to_string()
    } else {
        format!("{} ms", ms)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = &cli.command {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(Commands::Validate { verbose }) = &cli.command {
        return validate_config(cli.config, *verbose);
    }

    let config_path = find_config_file(cli.config.clone());
    let config = if let Some(path) = config_path {
        Config::from_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?
    } else {
        if !cli.quiet {
            eprintln!(
                "{}",
                style("No configuration file found, using defaults").yellow()
            );
        }
        Config::default()
    };

    config.validate().context("invalid configuration")?;

    init_logging(&config, cli.log_level.as_deref(), cli.quiet);

    match cli.command {
        Some(Commands::Run) | None => run_server(config, cli.quiet).await?,
        _ => unreachable!(),
    }

    Ok(())
}
