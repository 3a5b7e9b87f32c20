//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// One entry per listening socket.
    pub listeners: Vec<ListenerConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size guards.
    pub limits: LimitsConfig,

    /// Built-in static file serving for unmatched GETs.
    pub static_files: StaticFilesConfig,

    /// Built-in route documentation pages.
    pub docs: DocsConfig,

    pub diagnostics: DiagnosticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listeners: vec![ListenerConfig::default()],
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            static_files: StaticFilesConfig::default(),
            docs: DocsConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Pending-connection queue length passed to `listen`.
    pub backlog: u32,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backlog: 5,
            tls: None,
        }
    }
}

impl ListenerConfig {
    /// Plain listener on `bind_address` with default settings.
    pub fn plain(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            ..Self::default()
        }
    }
}

/// TLS configuration for a listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-read timeout on client sockets; absent means wait forever.
    pub read_secs: Option<u64>,

    /// How long `stop` waits for each connection worker.
    pub worker_join_secs: u64,

    /// How long `stop` waits for each accept loop.
    pub listener_join_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: Some(30),
            worker_join_secs: 5,
            listener_join_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_secs.map(Duration::from_secs)
    }

    pub fn worker_join_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_join_secs)
    }

    pub fn listener_join_timeout(&self) -> Duration {
        Duration::from_secs(self.listener_join_secs)
    }
}

/// Size guards applied while framing a request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted request line plus header block, in bytes.
    pub max_head_bytes: usize,

    /// Largest accepted declared `Content-Length`, in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Install the static file handler as the GET default handler.
    pub enabled: bool,

    /// Directory request paths are resolved against.
    pub root: PathBuf,

    /// Secondary directory, relative to `root`, searched after `root` itself.
    pub static_dir: String,

    /// Document served for directory requests.
    pub index: String,

    /// Glob patterns a resolved path must match. `{staticdir}` and
    /// `{staticindex}` are replaced before matching.
    pub include: Vec<String>,

    /// Glob patterns that reject a resolved path even when included.
    pub exclude: Vec<String>,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("."),
            static_dir: "static".to_string(),
            index: "index.html".to_string(),
            include: vec!["{staticdir}/*".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Route documentation pages.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Register `/docs/` and `/docs/json/`.
    pub enabled: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Error reporting towards clients.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Embed handler error text and panic messages in 500 pages.
    pub expose_handler_errors: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].bind_address, "0.0.0.0:8080");
        assert_eq!(config.listeners[0].backlog, 5);
        assert_eq!(config.timeouts.read_timeout(), Some(Duration::from_secs(30)));
        assert!(config.static_files.enabled);
        assert!(!config.diagnostics.expose_handler_errors);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [[listeners]]
            bind_address = "127.0.0.1:9000"

            [[listeners]]
            bind_address = "127.0.0.1:9443"
            tls = { cert_path = "cert.pem", key_path = "key.pem" }

            [timeouts]
            worker_join_secs = 2

            [static_files]
            root = "/srv/www"
            "#,
        )
        .unwrap();

        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.listeners[0].backlog, 5);
        assert!(config.listeners[1].tls.is_some());
        assert_eq!(config.timeouts.worker_join_timeout(), Duration::from_secs(2));
        assert_eq!(config.timeouts.listener_join_secs, 60);
        assert_eq!(config.static_files.root, PathBuf::from("/srv/www"));
        assert_eq!(config.static_files.index, "index.html");
    }
}
