//! Shared types, error model, and configuration for enrichkit.
//!
//! This crate is the foundation depended on by all other enrichkit crates.
//! It provides:
//! - [`EnrichKitError`]: the unified error type
//! - Domain types ([`BatchRequest`], [`BatchResult`], [`LogRequest`], [`AuditRecord`], ...)
//! - Configuration ([`AppConfig`], [`EnvConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, CredentialsConfig, DatabaseConfig, DatabaseSettings, EnvConfig,
    ForwarderConfig, ForwarderSettings, ProxyConfig, ProxySettings, ScrapeSettings,
    ServerConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{EnrichKitError, Result};
pub use types::{
    AuditEntry, AuditQuery, AuditRecord, BatchRequest, BatchResult, CompanyInput,
    CompletionEntry, CompletionQuery, CompletionRecord, DEFAULT_QUERY_LIMIT, ItemResult,
    ItemStatus, LogRequest, MAX_QUERY_LIMIT, SUCCESS_STATUS, WorkflowRef,
};
