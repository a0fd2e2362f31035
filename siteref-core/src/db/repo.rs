//! Database repository layer
//!
//! Catalog operations for tracked websites. Every operation normalizes its URL
//! argument first and commits as one statement or one transaction.

use crate::error::{Error, Result};
use crate::types::{Actor, Referenced, WebsiteRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long a connection waits on another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Canonicalize a URL for lookup and uniqueness: strip one trailing slash.
pub fn normalize_url(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Ordering for [`Database::list_websites`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WebsiteOrder {
    /// Most referenced first; ties keep insertion order
    #[default]
    ReferenceCount,
    /// Insertion order
    Id,
}

impl WebsiteOrder {
    fn order_by(&self) -> &'static str {
        match self {
            WebsiteOrder::ReferenceCount => "reference_count DESC, id ASC",
            WebsiteOrder::Id => "id ASC",
        }
    }
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets command processes read while the collector writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-operation leaves no open transaction behind, so the
        // connection is still usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Website operations
    // ============================================

    /// Start tracking a website with a description.
    ///
    /// Fails with [`Error::AlreadyExists`] if the normalized URL is tracked.
    pub fn create_website(&self, url: &str, description: &str) -> Result<WebsiteRecord> {
        let url = normalize_url(url);
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();

        let inserted = conn.execute(
            r#"
            INSERT INTO websites (url, description, first_referenced, last_referenced,
                                  last_updated, reference_count)
            VALUES (?1, ?2, ?3, ?3, ?3, 0)
            "#,
            params![url, description, now],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::AlreadyExists(url.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM websites WHERE id = ?",
            [id],
            Self::row_to_website,
        )
        .map_err(Error::from)
    }

    /// Replace a website's description and record who changed it.
    ///
    /// Fails with [`Error::NotFound`] if the normalized URL is not tracked.
    pub fn describe_website(
        &self,
        url: &str,
        description: &str,
        editor: &str,
    ) -> Result<WebsiteRecord> {
        let url = normalize_url(url);
        let editor = Actor::Human(editor.to_string());
        let conn = self.lock();

        let changed = conn.execute(
            r#"
            UPDATE websites
            SET description = ?1, updated_by = ?2, last_updated = ?3
            WHERE url = ?4
            "#,
            params![description, editor.to_stored(), Utc::now().to_rfc3339(), url],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(url.to_string()));
        }

        conn.query_row(
            "SELECT * FROM websites WHERE url = ?",
            [url],
            Self::row_to_website,
        )
        .map_err(Error::from)
    }

    /// Get a website by URL
    pub fn get_website(&self, url: &str) -> Result<Option<WebsiteRecord>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM websites WHERE url = ?",
            [normalize_url(url)],
            Self::row_to_website,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Record one more reference to a URL, tracking it if it is new.
    ///
    /// Existing records only have `reference_count` bumped. New records start
    /// at one reference with `default_description`, attributed to
    /// [`Actor::Automated`].
    pub fn increment_reference(&self, url: &str, default_description: &str) -> Result<Referenced> {
        let url = normalize_url(url);
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM websites WHERE url = ?", [url], |r| r.get(0))
            .optional()?;

        let (id, newly_tracked) = match existing {
            Some(id) => {
                tx.execute(
                    r#"
                    UPDATE websites
                    SET reference_count = COALESCE(reference_count, 0) + 1
                    WHERE id = ?
                    "#,
                    [id],
                )?;
                (id, false)
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO websites (url, description, updated_by, first_referenced,
                                          last_referenced, last_updated, reference_count)
                    VALUES (?1, ?2, ?3, ?4, ?4, ?4, 1)
                    "#,
                    params![
                        url,
                        default_description,
                        Actor::Automated.to_stored(),
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        let record = tx.query_row(
            "SELECT * FROM websites WHERE id = ?",
            [id],
            Self::row_to_website,
        )?;
        tx.commit()?;

        Ok(Referenced {
            record,
            newly_tracked,
        })
    }

    /// List every tracked website
    pub fn list_websites(&self, order: WebsiteOrder) -> Result<Vec<WebsiteRecord>> {
        let conn = self.lock();
        let sql = format!("SELECT * FROM websites ORDER BY {}", order.order_by());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_website)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Count tracked websites
    pub fn count_websites(&self) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM websites", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_website(row: &Row) -> rusqlite::Result<WebsiteRecord> {
        let first_str: Option<String> = row.get("first_referenced")?;
        let last_referenced_str: Option<String> = row.get("last_referenced")?;
        let last_updated_str: Option<String> = row.get("last_updated")?;
        let updated_by: Option<String> = row.get("updated_by")?;
        let reference_count: Option<i64> = row.get("reference_count")?;

        let first_referenced = first_str
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(WebsiteRecord {
            id: row.get("id")?,
            url: row.get("url")?,
            description: row.get("description")?,
            first_referenced,
            last_referenced: last_referenced_str
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(first_referenced),
            last_updated: last_updated_str
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(first_referenced),
            updated_by: updated_by.as_deref().map(Actor::from_stored),
            reference_count: reference_count.unwrap_or(0),
        })
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` text
/// found in older catalogs (always UTC).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
