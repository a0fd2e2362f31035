//! File-backed channel transcripts.
//!
//! A transcript directory holds one `<channel_id>.jsonl` file per channel.
//! Each line is a [`ContentItem`]:
//!
//! ```json
//! {"author":"alice","content":"https://example.com","posted_at":"2026-03-01T12:00:00Z"}
//! ```
//!
//! A channel without a transcript file does not resolve. Announcements are
//! appended to the transcript under the bot's identity.

use super::{Channel, ChannelSource};
use crate::error::{Error, Result};
use crate::types::{ChannelId, ContentItem};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Channels backed by transcript files in one directory.
#[derive(Debug, Clone)]
pub struct TranscriptSource {
    dir: PathBuf,
    identity: String,
}

impl TranscriptSource {
    pub fn new(dir: impl Into<PathBuf>, identity: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            identity: identity.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the transcript for `channel_id`.
    pub fn transcript_path(&self, channel_id: ChannelId) -> PathBuf {
        self.dir.join(format!("{channel_id}.jsonl"))
    }
}

impl ChannelSource for TranscriptSource {
    type Channel = TranscriptChannel;

    fn resolve(&self, channel_id: ChannelId) -> Result<Option<TranscriptChannel>> {
        let path = self.transcript_path(channel_id);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(TranscriptChannel {
            path,
            identity: self.identity.clone(),
        }))
    }

    fn self_identity(&self) -> &str {
        &self.identity
    }
}

/// One channel transcript.
#[derive(Debug, Clone)]
pub struct TranscriptChannel {
    path: PathBuf,
    identity: String,
}

impl TranscriptChannel {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an item to the transcript.
    ///
    /// A last line without its newline is terminated first, so the item
    /// always lands on a line of its own.
    pub fn append(&self, item: &ContentItem) -> Result<()> {
        let mut line = serde_json::to_string(item)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::Channel(format!(
                    "failed to open transcript {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }

        // Append mode writes at the end regardless of the read position
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl Channel for TranscriptChannel {
    fn announce(&self, text: &str) -> Result<()> {
        self.append(&ContentItem::new(self.identity.clone(), text, Utc::now()))
    }

    fn history_after(&self, after: DateTime<Utc>) -> Result<Vec<ContentItem>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Channel(format!(
                "failed to read transcript {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut items = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ContentItem>(line) {
                Ok(item) if item.posted_at > after => items.push(item),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping malformed transcript line"
                    );
                }
            }
        }

        Ok(items)
    }
}
