//! # siteref-core
//!
//! Core library for siteref - a website reference tracker for a chat channel.
//!
//! This library provides:
//! - Domain types for tracked websites and channel messages
//! - Catalog storage layer with SQLite
//! - The collection job that folds channel links into the catalog
//! - The chat command surface
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use siteref_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use collect::{CollectResult, CollectionJob, CollectionSettings};
pub use commands::{Command, CommandHandler};
pub use config::Config;
pub use db::{Database, WebsiteOrder};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod collect;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
