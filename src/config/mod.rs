//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → CLI overrides applied in main.rs
//!     → handed to HttpServer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server has started
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DiagnosticsConfig, DocsConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, ServerConfig,
    StaticFilesConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
