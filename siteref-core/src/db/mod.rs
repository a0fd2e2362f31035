//! Database layer for siteref
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for catalog queries

pub mod repo;
pub mod schema;

pub use repo::{normalize_url, Database, WebsiteOrder};
