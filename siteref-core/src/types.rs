//! Core domain types for siteref
//!
//! | Term | Definition |
//! |------|------------|
//! | **Website** | A tracked URL with its description and reference counter |
//! | **Actor** | Who last touched a website record: a human or the automated collector |
//! | **Content item** | One message from the monitored channel, as seen by the collector |
//! | **Channel** | The single chat channel the collector scans |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of a chat channel.
pub type ChannelId = u64;

/// Stored form of [`Actor::Automated`].
const AUTOMATED_TAG: &str = "automated";

/// Prefix of the stored form of [`Actor::Human`].
const HUMAN_PREFIX: &str = "human:";

/// Sentinel written by earlier versions of the bot for automated updates.
const LEGACY_BOT_SENTINEL: &str = "BOT";

/// How [`Actor::Automated`] is rendered for people.
const AUTOMATED_LABEL: &str = "BOT (automated)";

// ============================================
// Actor
// ============================================

/// Attribution for the last change to a website record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identity", rename_all = "snake_case")]
pub enum Actor {
    /// A person who issued a command
    Human(String),
    /// The collection job
    Automated,
}

impl Actor {
    /// Tagged form stored in the `updated_by` column.
    pub fn to_stored(&self) -> String {
        match self {
            Actor::Human(identity) => format!("{HUMAN_PREFIX}{identity}"),
            Actor::Automated => AUTOMATED_TAG.to_string(),
        }
    }

    /// Parse the `updated_by` column.
    ///
    /// Untagged values come from databases written before the tagged format
    /// and are read as human identities, except the old `BOT` sentinel.
    pub fn from_stored(value: &str) -> Self {
        if value == AUTOMATED_TAG || value == LEGACY_BOT_SENTINEL {
            Actor::Automated
        } else if let Some(identity) = value.strip_prefix(HUMAN_PREFIX) {
            Actor::Human(identity.to_string())
        } else {
            Actor::Human(value.to_string())
        }
    }
}

/// A human whose identity is literally `BOT (automated)` still renders with a
/// `human:` prefix, so the two variants never print the same.
impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Human(identity) if identity == AUTOMATED_LABEL => {
                write!(f, "{HUMAN_PREFIX}{identity}")
            }
            Actor::Human(identity) => f.write_str(identity),
            Actor::Automated => f.write_str(AUTOMATED_LABEL),
        }
    }
}

// ============================================
// Website
// ============================================

/// A tracked website.
///
/// Field order matches the snapshot export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteRecord {
    /// Surrogate key assigned by the store
    pub id: i64,
    /// Normalized URL (unique)
    pub url: String,
    /// Free-text description
    pub description: Option<String>,
    /// Set once when the record is created
    pub first_referenced: DateTime<Utc>,
    /// Set when the record is created
    pub last_referenced: DateTime<Utc>,
    /// Refreshed whenever the description changes
    pub last_updated: DateTime<Utc>,
    /// Last editor, if any
    pub updated_by: Option<Actor>,
    /// Number of times the collector has seen this URL
    pub reference_count: i64,
}

/// Result of folding one observed URL into the catalog.
#[derive(Debug, Clone)]
pub struct Referenced {
    /// The record after the fold
    pub record: WebsiteRecord,
    /// Whether the fold created the record
    pub newly_tracked: bool,
}

// ============================================
// Channel content
// ============================================

/// One message from the monitored channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Identity of the message author
    pub author: String,
    /// Raw message text
    pub content: String,
    /// When the message was posted
    pub posted_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn new(
        author: impl Into<String>,
        content: impl Into<String>,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            posted_at,
        }
    }
}
