use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params, params_from_iter};

/// The persisted watch pointer for one (show, tag) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowProgress {
    pub show: String,
    pub tag: String,
    pub season: u32,
    pub episode: u32,
    pub watched_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkType {
    Seen,
    Unseen,
}

impl MarkType {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkType::Seen => "seen",
            MarkType::Unseen => "unseen",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "seen" => Some(MarkType::Seen),
            "unseen" => Some(MarkType::Unseen),
            _ => None,
        }
    }
}

/// One pending remote watch-history update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub show: String,
    pub season: u32,
    pub episode: u32,
    pub watched_at: String,
    pub mark: MarkType,
}

/// A queued entry together with the rowid assigned at insert. The rowid
/// sequence is the recovery order; `watched_at` is payload only, so local
/// clock adjustments between inserts cannot reorder the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEntry {
    pub id: i64,
    pub entry: SyncEntry,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS show_progress (
                show TEXT NOT NULL,
                tag TEXT NOT NULL,
                season INTEGER NOT NULL,
                episode INTEGER NOT NULL,
                watched_at TEXT NOT NULL,
                PRIMARY KEY (show, tag)
            );
            CREATE TABLE IF NOT EXISTS sync_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show TEXT NOT NULL,
                season INTEGER NOT NULL,
                episode INTEGER NOT NULL,
                watched_at TEXT NOT NULL,
                mark_type TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get_progress(
        &self,
        show: &str,
        tag: &str,
    ) -> rusqlite::Result<Option<ShowProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT show, tag, season, episode, watched_at FROM show_progress
             WHERE show = ?1 AND tag = ?2",
        )?;
        let mut rows = stmt.query(params![show, tag])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(ShowProgress {
                show: row.get(0)?,
                tag: row.get(1)?,
                season: row.get::<_, i64>(2)? as u32,
                episode: row.get::<_, i64>(3)? as u32,
                watched_at: row.get(4)?,
            }));
        }
        Ok(None)
    }

    pub fn set_progress(
        &self,
        show: &str,
        tag: &str,
        season: u32,
        episode: u32,
    ) -> rusqlite::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO show_progress (show, tag, season, episode, watched_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(show, tag) DO UPDATE SET
                season = excluded.season,
                episode = excluded.episode,
                watched_at = excluded.watched_at
            "#,
            params![show, tag, season, episode, now],
        )?;
        Ok(())
    }

    pub fn enqueue_sync(&self, entry: &SyncEntry) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO sync_queue (show, season, episode, watched_at, mark_type)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.show,
                entry.season,
                entry.episode,
                entry.watched_at,
                entry.mark.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn pending_sync(&self) -> rusqlite::Result<Vec<QueuedEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, show, season, episode, watched_at, mark_type FROM sync_queue
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let mark_raw: String = row.get(5)?;
            let mark = MarkType::parse(&mark_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("unknown mark_type '{mark_raw}'").into(),
                )
            })?;
            Ok(QueuedEntry {
                id: row.get(0)?,
                entry: SyncEntry {
                    show: row.get(1)?,
                    season: row.get::<_, i64>(2)? as u32,
                    episode: row.get::<_, i64>(3)? as u32,
                    watched_at: row.get(4)?,
                    mark,
                },
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn delete_sync_batch(&self, ids: &[i64]) -> rusqlite::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("DELETE FROM sync_queue WHERE id IN ({placeholders})");
        self.conn.execute(&sql, params_from_iter(ids.iter()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(show: &str, episode: u32, mark: MarkType) -> SyncEntry {
        SyncEntry {
            show: show.to_string(),
            season: 1,
            episode,
            watched_at: Utc::now().to_rfc3339(),
            mark,
        }
    }

    #[test]
    fn progress_upsert_replaces_existing_row() {
        let db = Database::open_in_memory().expect("open db");
        db.set_progress("Scrubs", "default", 1, 4).expect("insert");
        db.set_progress("Scrubs", "default", 2, 1).expect("update");

        let progress = db
            .get_progress("Scrubs", "default")
            .expect("query")
            .expect("row should exist");
        assert_eq!(progress.season, 2);
        assert_eq!(progress.episode, 1);
    }

    #[test]
    fn progress_is_scoped_by_tag() {
        let db = Database::open_in_memory().expect("open db");
        db.set_progress("Scrubs", "alice", 1, 4).expect("insert");

        assert!(db.get_progress("Scrubs", "bob").expect("query").is_none());
        assert!(db.get_progress("Scrubs", "alice").expect("query").is_some());
    }

    #[test]
    fn pending_sync_preserves_insertion_order() {
        let db = Database::open_in_memory().expect("open db");
        // Identical timestamps on purpose: ordering must come from the rowid.
        let stamp = "2026-01-01T00:00:00+00:00".to_string();
        for ep in [3_u32, 1, 2] {
            let mut e = entry("Scrubs", ep, MarkType::Seen);
            e.watched_at = stamp.clone();
            db.enqueue_sync(&e).expect("enqueue");
        }

        let pending = db.pending_sync().expect("pending");
        let eps: Vec<u32> = pending.iter().map(|q| q.entry.episode).collect();
        assert_eq!(eps, vec![3, 1, 2]);
    }

    #[test]
    fn delete_sync_batch_removes_only_named_ids() {
        let db = Database::open_in_memory().expect("open db");
        for ep in 1..=4 {
            db.enqueue_sync(&entry("Scrubs", ep, MarkType::Seen))
                .expect("enqueue");
        }

        let pending = db.pending_sync().expect("pending");
        db.delete_sync_batch(&[pending[0].id, pending[1].id])
            .expect("delete");

        let remaining = db.pending_sync().expect("pending");
        let eps: Vec<u32> = remaining.iter().map(|q| q.entry.episode).collect();
        assert_eq!(eps, vec![3, 4]);
    }
}
