//! Collection job: fold recent channel links into the catalog
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  ChannelSource  │ ──► │  CollectionJob   │ ──► │    Database     │
//! │ (chat history)  │     │                  │     │   (websites)    │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │   snapshot export    │
//!                    │ (websites_data.json) │
//!                    └──────────────────────┘
//! ```
//!
//! Each eligible message commits its own increment, so a failure partway
//! through a run keeps everything folded before it. The export is rewritten
//! at the end of every successful run.
//!
//! Messages are treated as a single opaque URL: a message holding several
//! links, or text around a link, is tracked verbatim as one entry.

pub mod export;
pub mod schedule;
pub mod transcript;

pub use schedule::Scheduler;
pub use transcript::{TranscriptChannel, TranscriptSource};

use crate::config::Config;
use crate::db::{Database, WebsiteOrder};
use crate::error::{Error, Result};
use crate::types::{ChannelId, ContentItem};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Status message posted to the channel when a run starts.
pub const RUN_ANNOUNCEMENT: &str = "Running Daily Website Reference Collection";

/// URL schemes that make a message eligible for counting.
const URL_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Connector to the chat platform, as seen by the collector.
pub trait ChannelSource {
    type Channel: Channel;

    /// Look up a channel; `None` when it does not exist or is not reachable.
    fn resolve(&self, channel_id: ChannelId) -> Result<Option<Self::Channel>>;

    /// Identity the automation posts as.
    fn self_identity(&self) -> &str;
}

/// A resolved channel.
pub trait Channel {
    /// Post a status message.
    fn announce(&self, text: &str) -> Result<()>;

    /// Every item posted strictly after `after`, oldest first.
    fn history_after(&self, after: DateTime<Utc>) -> Result<Vec<ContentItem>>;
}

/// Whether a message should be counted as a website reference.
pub fn is_eligible(content: &str, command_prefix: &str) -> bool {
    !content.is_empty()
        && !content.starts_with(command_prefix)
        && URL_SCHEMES.iter().any(|scheme| content.contains(scheme))
}

/// Settings for one collection job.
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub channel_id: ChannelId,
    pub window: chrono::Duration,
    pub default_description: String,
    pub command_prefix: String,
    pub export_path: PathBuf,
}

impl CollectionSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let channel_id = config.validate_collector()?;
        Ok(Self {
            channel_id,
            window: config.collection.window()?,
            default_description: config.collection.default_description.clone(),
            command_prefix: config.chat.command_prefix.clone(),
            export_path: config.collection.export_path(),
        })
    }
}

/// Summary of one collection run.
#[derive(Debug, Default, Clone)]
pub struct CollectResult {
    /// Items returned by the channel for the window
    pub items_seen: usize,
    /// Items posted by the automation itself
    pub skipped_self: usize,
    /// Items that were commands or carried no URL
    pub skipped_ineligible: usize,
    /// Increments committed
    pub references_recorded: usize,
    /// Websites the run started tracking
    pub websites_created: usize,
    /// Entries written to the export
    pub exported: usize,
    /// Where the export was written
    pub export_path: PathBuf,
}

/// One scan of the monitored channel.
pub struct CollectionJob<'a, S: ChannelSource> {
    db: &'a Database,
    source: &'a S,
    settings: CollectionSettings,
}

impl<'a, S: ChannelSource> CollectionJob<'a, S> {
    pub fn new(db: &'a Database, source: &'a S, settings: CollectionSettings) -> Self {
        Self {
            db,
            source,
            settings,
        }
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    /// Run the job with the window ending now.
    pub fn run_once(&self) -> Result<CollectResult> {
        self.run_at(Utc::now())
    }

    /// Run the job with the window ending at `now`.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<CollectResult> {
        let channel_id = self.settings.channel_id;
        let Some(channel) = self.source.resolve(channel_id)? else {
            tracing::warn!(channel_id, "Couldn't find channel, skipping collection run");
            return Err(Error::ChannelUnresolvable(channel_id));
        };

        channel.announce(RUN_ANNOUNCEMENT)?;

        let since = now.checked_sub_signed(self.settings.window).ok_or_else(|| {
            Error::Config(format!(
                "collection window of {}h reaches past the earliest timestamp",
                self.settings.window.num_hours()
            ))
        })?;
        let items = channel.history_after(since)?;
        tracing::info!(
            channel_id,
            since = %since,
            items = items.len(),
            "Fetched channel history"
        );

        let mut result = CollectResult {
            items_seen: items.len(),
            export_path: self.settings.export_path.clone(),
            ..Default::default()
        };

        let self_identity = self.source.self_identity();
        for item in items.iter().filter(|item| item.posted_at > since) {
            if item.author == self_identity {
                result.skipped_self += 1;
                continue;
            }
            if !is_eligible(&item.content, &self.settings.command_prefix) {
                result.skipped_ineligible += 1;
                continue;
            }

            let referenced = self
                .db
                .increment_reference(&item.content, &self.settings.default_description)?;
            result.references_recorded += 1;
            if referenced.newly_tracked {
                result.websites_created += 1;
            }
            tracing::debug!(
                url = %referenced.record.url,
                reference_count = referenced.record.reference_count,
                newly_tracked = referenced.newly_tracked,
                "Recorded reference"
            );
        }

        let records = self.db.list_websites(WebsiteOrder::Id)?;
        result.exported = export::write_snapshot(&self.settings.export_path, &records)?;

        tracing::info!(
            channel_id,
            items_seen = result.items_seen,
            references_recorded = result.references_recorded,
            websites_created = result.websites_created,
            exported = result.exported,
            export_path = %result.export_path.display(),
            "Collection run complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Actor;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const BOT: &str = "siteref";

    struct FakeChannel {
        items: Vec<ContentItem>,
        announcements: RefCell<Vec<String>>,
    }

    impl Channel for &FakeChannel {
        fn announce(&self, text: &str) -> Result<()> {
            self.announcements.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn history_after(&self, after: DateTime<Utc>) -> Result<Vec<ContentItem>> {
            Ok(self
                .items
                .iter()
                .filter(|item| item.posted_at > after)
                .cloned()
                .collect())
        }
    }

    struct FakeSource {
        channel: Option<FakeChannel>,
    }

    impl FakeSource {
        fn with_items(items: Vec<ContentItem>) -> Self {
            Self {
                channel: Some(FakeChannel {
                    items,
                    announcements: RefCell::new(Vec::new()),
                }),
            }
        }

        fn announcements(&self) -> Vec<String> {
            self.channel
                .as_ref()
                .map(|c| c.announcements.borrow().clone())
                .unwrap_or_default()
        }
    }

    impl<'c> ChannelSource for &'c FakeSource {
        type Channel = &'c FakeChannel;

        fn resolve(&self, _channel_id: ChannelId) -> Result<Option<Self::Channel>> {
            let source: &'c FakeSource = *self;
            Ok(source.channel.as_ref())
        }

        fn self_identity(&self) -> &str {
            BOT
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
    }

    fn item(author: &str, content: &str, hours_ago: i64) -> ContentItem {
        ContentItem::new(author, content, now() - chrono::Duration::hours(hours_ago))
    }

    fn settings(dir: &TempDir) -> CollectionSettings {
        CollectionSettings {
            channel_id: 7,
            window: chrono::Duration::hours(24),
            default_description: crate::config::DEFAULT_DESCRIPTION.to_string(),
            command_prefix: "!".to_string(),
            export_path: dir.path().join("websites_data.json"),
        }
    }

    fn test_db() -> Database {
        crate::logging::init_test();
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_is_eligible() {
        assert!(is_eligible("https://x.io", "!"));
        assert!(is_eligible("http://x.io", "!"));
        assert!(is_eligible("look at https://x.io", "!"));
        assert!(!is_eligible("!add_website https://x.io", "!"));
        assert!(!is_eligible("no links here", "!"));
        assert!(!is_eligible("ftp://x.io", "!"));
        assert!(!is_eligible("", "!"));
    }

    #[test]
    fn test_existing_record_is_incremented() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        db.create_website("https://x.io", "a site").unwrap();
        assert_eq!(
            db.get_website("https://x.io").unwrap().unwrap().reference_count,
            0
        );

        let fake = FakeSource::with_items(vec![item("alice", "https://x.io", 1)]);
        let source = &fake;
        let result = CollectionJob::new(&db, &source, settings(&dir))
            .run_at(now())
            .unwrap();

        assert_eq!(result.references_recorded, 1);
        assert_eq!(result.websites_created, 0);
        let record = db.get_website("https://x.io").unwrap().unwrap();
        assert_eq!(record.reference_count, 1);
        assert_eq!(record.description.as_deref(), Some("a site"));
    }

    #[test]
    fn test_repeated_new_url_counts_each_mention() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        let fake = FakeSource::with_items(vec![
            item("alice", "https://new.io", 5),
            item("bob", "https://new.io/", 4),
            item("carol", "https://new.io", 3),
        ]);
        let source = &fake;

        let result = CollectionJob::new(&db, &source, settings(&dir))
            .run_at(now())
            .unwrap();

        assert_eq!(result.references_recorded, 3);
        assert_eq!(result.websites_created, 1);
        let record = db.get_website("https://new.io").unwrap().unwrap();
        assert_eq!(record.reference_count, 3);
        assert_eq!(
            record.description.as_deref(),
            Some(crate::config::DEFAULT_DESCRIPTION)
        );
        assert_eq!(record.updated_by, Some(Actor::Automated));
    }

    #[test]
    fn test_skips_commands_bot_and_plain_text() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        let fake = FakeSource::with_items(vec![
            item("alice", "!add_website https://x.io", 2),
            item(BOT, "https://bot.io", 2),
            item("bob", "good morning", 2),
            item("carol", "https://kept.io", 2),
        ]);
        let source = &fake;

        let result = CollectionJob::new(&db, &source, settings(&dir))
            .run_at(now())
            .unwrap();

        assert_eq!(result.items_seen, 4);
        assert_eq!(result.skipped_self, 1);
        assert_eq!(result.skipped_ineligible, 2);
        assert_eq!(result.references_recorded, 1);
        assert!(db.get_website("https://x.io").unwrap().is_none());
        assert!(db.get_website("https://bot.io").unwrap().is_none());
        assert_eq!(db.count_websites().unwrap(), 1);
    }

    #[test]
    fn test_items_outside_window_are_ignored() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        let fake = FakeSource::with_items(vec![
            item("alice", "https://old.io", 30),
            item("alice", "https://edge.io", 24),
            item("alice", "https://recent.io", 23),
        ]);
        let source = &fake;

        CollectionJob::new(&db, &source, settings(&dir))
            .run_at(now())
            .unwrap();

        assert!(db.get_website("https://old.io").unwrap().is_none());
        assert!(db.get_website("https://edge.io").unwrap().is_none());
        assert!(db.get_website("https://recent.io").unwrap().is_some());
    }

    #[test]
    fn test_announces_run_start() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        let fake = FakeSource::with_items(vec![]);
        let source = &fake;

        CollectionJob::new(&db, &source, settings(&dir))
            .run_at(now())
            .unwrap();

        assert_eq!(fake.announcements(), vec![RUN_ANNOUNCEMENT.to_string()]);
    }

    #[test]
    fn test_unresolvable_channel_aborts_without_mutation() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        let fake = FakeSource { channel: None };
        let source = &fake;
        let settings = settings(&dir);
        let export_path = settings.export_path.clone();

        let err = CollectionJob::new(&db, &source, settings)
            .run_at(now())
            .unwrap_err();

        assert!(matches!(err, Error::ChannelUnresolvable(7)));
        assert_eq!(db.count_websites().unwrap(), 0);
        assert!(!export_path.exists());
    }

    #[test]
    fn test_window_past_earliest_timestamp_is_an_error() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        let fake = FakeSource::with_items(vec![item("alice", "https://x.io", 1)]);
        let source = &fake;
        let mut settings = settings(&dir);
        settings.window = chrono::Duration::try_weeks(20_000_000).unwrap();

        let err = CollectionJob::new(&db, &source, settings)
            .run_at(now())
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(db.count_websites().unwrap(), 0);
    }

    #[test]
    fn test_export_written_even_without_new_references() {
        let dir = TempDir::new().unwrap();
        let db = test_db();
        db.create_website("https://a.io", "a").unwrap();
        db.create_website("https://b.io", "b").unwrap();
        let fake = FakeSource::with_items(vec![]);
        let source = &fake;

        let result = CollectionJob::new(&db, &source, settings(&dir))
            .run_at(now())
            .unwrap();

        assert_eq!(result.references_recorded, 0);
        assert_eq!(result.exported, 2);
        let exported = export::read_snapshot(&result.export_path).unwrap();
        assert_eq!(exported, db.list_websites(WebsiteOrder::Id).unwrap());
    }
}
