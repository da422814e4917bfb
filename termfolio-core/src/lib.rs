//! # termfolio-core
//!
//! Core library for termfolio - the backend of a terminal-style portfolio
//! chat.
//!
//! This library provides the request-admission and orchestration layer
//! shared by every deployment target:
//! - Per-client rate limiting (in-memory fixed window, or a shared Upstash
//!   store for multi-instance deployments)
//! - Chat payload validation and sanitization
//! - Session-scoped conversation memory with idle and pressure eviction
//! - Origin allow-listing
//! - The persona knowledge base and completion-service client
//! - Configuration management and logging infrastructure
//!
//! The HTTP server binary wires these together; nothing in this crate
//! depends on a particular web framework.
//!
//! ## Example
//!
//! ```rust,no_run
//! use termfolio_core::{Config, SessionStore};
//!
//! let config = Config::load().expect("failed to load config");
//! let sessions = SessionStore::from_config(&config.session);
//! ```

// Re-export commonly used items at the crate root
pub use chat::ChatOrchestrator;
pub use config::Config;
pub use cors::OriginPolicy;
pub use error::{Error, Result};
pub use session::SessionStore;
pub use types::*;

// Public modules
pub mod chat;
pub mod config;
pub mod cors;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod logging;
pub mod ratelimit;
pub mod session;
pub mod types;
pub mod validate;
