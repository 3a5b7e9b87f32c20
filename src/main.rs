//! wirehost command-line server.
//!
//! Serves static files from a directory, plus the route documentation pages,
//! until SIGINT or SIGTERM.
//!
//! ```text
//! wirehost --bind 0.0.0.0:8080 --root ./site
//! wirehost --config wirehost.toml --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;

use wirehost::config::{load_config, validate_config, ListenerConfig, ServerConfig, TlsConfig};
use wirehost::lifecycle::shutdown_signal;
use wirehost::observability::init_logging;
use wirehost::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "wirehost", version, about = "Minimal multi-listener HTTP/1.0 server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on; repeat for several listeners (replaces configured listeners)
    #[arg(short, long = "bind", value_name = "ADDR")]
    bind: Vec<String>,

    /// PEM certificate chain; enables TLS on every listener
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key for --tls-cert
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Directory static files are served from
    #[arg(long)]
    root: Option<PathBuf>,

    /// Secondary directory below the root
    #[arg(long)]
    static_dir: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Include handler error details in 500 pages
    #[arg(long)]
    expose_handler_errors: bool,

    /// Do not serve /docs/ and /docs/json/
    #[arg(long)]
    no_docs: bool,
}

impl Cli {
    /// Layer command-line options over `config`.
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if !self.bind.is_empty() {
            config.listeners = self.bind.into_iter().map(ListenerConfig::plain).collect();
        }
        if let (Some(cert_path), Some(key_path)) = (self.tls_cert, self.tls_key) {
            for listener in &mut config.listeners {
                listener.tls = Some(TlsConfig {
                    cert_path: cert_path.clone(),
                    key_path: key_path.clone(),
                });
            }
        }
        if let Some(root) = self.root {
            config.static_files.root = root;
        }
        if let Some(static_dir) = self.static_dir {
            config.static_files.static_dir = static_dir;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if self.expose_handler_errors {
            config.diagnostics.expose_handler_errors = true;
        }
        if self.no_docs {
            config.docs.enabled = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    let config = cli.apply(config);
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {error}");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability.log_level)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wirehost starting");
    tracing::info!(
        listeners = config.listeners.len(),
        root = %config.static_files.root.display(),
        read_timeout_secs = ?config.timeouts.read_secs,
        "Configuration loaded"
    );

    let server = HttpServer::new(config)?;
    let running = server.start().await?;

    shutdown_signal().await;
    running.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
