//! PaperTrail Common Library
//!
//! Shared code for the PaperTrail services including:
//! - Paper, citation and task models
//! - External capability traits and their HTTP clients
//! - Error types and handling
//! - Configuration management
//! - Identifier heuristics
//! - Metrics and observability

pub mod capabilities;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use capabilities::{Capabilities, CapabilityError};
pub use config::AppConfig;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
