//! Trackera Common Library
//!
//! Shared code for the Trackera services including:
//! - Database models, tenant schemas and repository patterns
//! - Identity provider abstraction
//! - Account provisioning workflow
//! - Request/response DTOs and validating extractors
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod extract;
pub mod identity;
pub mod metrics;
pub mod provisioning;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use identity::IdentityProvider;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
