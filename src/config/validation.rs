//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (backlog > 0, limits > 0, addresses parse)
//! - Check TLS files are configured in pairs that exist
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure apart from file existence checks
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::ServerConfig;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listeners.is_empty() {
        errors.push(ValidationError::new("listeners", "at least one listener is required"));
    }

    let mut seen = HashSet::new();
    for (i, listener) in config.listeners.iter().enumerate() {
        let field = format!("listeners[{i}]");
        match listener.bind_address.parse::<SocketAddr>() {
            Ok(addr) if addr.port() != 0 && !seen.insert(addr) => {
                errors.push(ValidationError::new(
                    format!("{field}.bind_address"),
                    format!("{addr} is configured more than once"),
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(
                format!("{field}.bind_address"),
                format!("'{}' is not a socket address: {e}", listener.bind_address),
            )),
        }
        if listener.backlog == 0 {
            errors.push(ValidationError::new(format!("{field}.backlog"), "must be greater than 0"));
        }
        if let Some(tls) = &listener.tls {
            for (name, path) in [("cert_path", &tls.cert_path), ("key_path", &tls.key_path)] {
                if !path.is_file() {
                    errors.push(ValidationError::new(
                        format!("{field}.tls.{name}"),
                        format!("{} is not a readable file", path.display()),
                    ));
                }
            }
        }
    }

    if config.timeouts.read_secs == Some(0) {
        errors.push(ValidationError::new(
            "timeouts.read_secs",
            "must be greater than 0, omit it to wait forever",
        ));
    }
    if config.timeouts.worker_join_secs == 0 {
        errors.push(ValidationError::new("timeouts.worker_join_secs", "must be greater than 0"));
    }
    if config.limits.max_head_bytes == 0 {
        errors.push(ValidationError::new("limits.max_head_bytes", "must be greater than 0"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    let statics = &config.static_files;
    if statics.enabled {
        if statics.index.is_empty() || statics.index.contains('/') {
            errors.push(ValidationError::new("static_files.index", "must be a plain file name"));
        }
        if statics.static_dir.split('/').any(|part| part == "..") {
            errors.push(ValidationError::new("static_files.static_dir", "must not contain '..'"));
        }
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not a valid log filter", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
