use std::collections::HashMap;
use std::env;

use chrono::Utc;
use log::warn;
use serde_json::{Value, json};

use crate::db::{Database, QueuedEntry, SyncEntry};
use crate::error::EngineError;
use crate::http::{self, RequestPolicy};

/// The remote watch-history service, narrowed to the two calls the engine
/// makes. `search_show` only resolves a show's remote identity; marking is
/// the hot path.
pub(crate) trait RemoteSync {
    fn mark_batch(&self, entries: &[SyncEntry]) -> Result<(), EngineError>;
    fn search_show(&self, name: &str) -> Result<Vec<RemoteShow>, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoteShow {
    pub(crate) id: String,
    pub(crate) title: String,
}

pub(crate) fn now_stamp() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DrainReport {
    pub(crate) batches_sent: usize,
    pub(crate) entries_sent: usize,
    pub(crate) remaining: usize,
}

/// Splits the pending queue into maximal runs of consecutive same-mark
/// entries. A batch boundary occurs only where the mark type changes.
pub(crate) fn batch_runs(entries: &[QueuedEntry]) -> Vec<&[QueuedEntry]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for idx in 1..=entries.len() {
        if idx == entries.len() || entries[idx].entry.mark != entries[start].entry.mark {
            runs.push(&entries[start..idx]);
            start = idx;
        }
    }
    runs
}

/// Drains the queue in insertion order, one remote call per batch. A batch is
/// deleted only after its call succeeds; the first failure stops the cycle so
/// later entries are never sent ahead of earlier undrained ones.
pub(crate) fn drain(db: &Database, remote: &dyn RemoteSync) -> Result<DrainReport, EngineError> {
    let pending = db.pending_sync()?;
    let mut report = DrainReport {
        remaining: pending.len(),
        ..DrainReport::default()
    };

    for run in batch_runs(&pending) {
        let entries: Vec<SyncEntry> = run.iter().map(|q| q.entry.clone()).collect();
        match remote.mark_batch(&entries) {
            Ok(()) => {
                let ids: Vec<i64> = run.iter().map(|q| q.id).collect();
                db.delete_sync_batch(&ids)?;
                report.batches_sent += 1;
                report.entries_sent += run.len();
                report.remaining -= run.len();
            }
            Err(err) => {
                warn!("sync drain stopped with {} entr(ies) queued: {err}", report.remaining);
                break;
            }
        }
    }
    Ok(report)
}

/// Records fresh marks against the remote service, draining the backlog
/// first. If a backlog remains (the drain hit a failure) the new marks are
/// appended behind it instead of being sent out of order; if the fresh call
/// itself fails it is downgraded to a queue append, never raised to the user.
pub(crate) fn record_marks(
    db: &Database,
    remote: &dyn RemoteSync,
    entries: Vec<SyncEntry>,
) -> Result<(), EngineError> {
    if entries.is_empty() {
        return Ok(());
    }

    let report = drain(db, remote)?;
    if report.remaining > 0 {
        warn!(
            "queueing {} new mark(s) behind {} pending sync entr(ies)",
            entries.len(),
            report.remaining
        );
        for entry in &entries {
            db.enqueue_sync(entry)?;
        }
        return Ok(());
    }

    if let Err(err) = remote.mark_batch(&entries) {
        warn!("remote mark failed, queueing {} entr(ies): {err}", entries.len());
        for entry in &entries {
            db.enqueue_sync(entry)?;
        }
    }
    Ok(())
}

/// HTTP client for the remote watch-history service.
pub(crate) struct HttpRemote {
    base_url: String,
    token: String,
    policy: RequestPolicy,
}

impl HttpRemote {
    /// Credentials are a prerequisite: missing configuration is a hard
    /// user-facing error, unlike transient remote failures.
    pub(crate) fn from_env() -> Result<Self, EngineError> {
        let base_url = env::var("EPITRACK_SYNC_URL")
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| EngineError::RemoteConfig("set EPITRACK_SYNC_URL".to_string()))?;
        let token = env::var("EPITRACK_SYNC_TOKEN")
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| EngineError::RemoteConfig("set EPITRACK_SYNC_TOKEN".to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            policy: RequestPolicy::default(),
        })
    }
}

impl RemoteSync for HttpRemote {
    fn mark_batch(&self, entries: &[SyncEntry]) -> Result<(), EngineError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let mut remote_ids: HashMap<String, String> = HashMap::new();
        for entry in entries {
            if remote_ids.contains_key(&entry.show) {
                continue;
            }
            let candidates = self.search_show(&entry.show)?;
            // Prefer an exact title match, fall back to the first candidate.
            let candidate = candidates
                .iter()
                .find(|c| c.title.eq_ignore_ascii_case(&entry.show))
                .or_else(|| candidates.first())
                .ok_or_else(|| {
                    EngineError::RemoteSync(format!(
                        "show '{}' is not known to the remote service",
                        entry.show
                    ))
                })?;
            remote_ids.insert(entry.show.clone(), candidate.id.clone());
        }

        let episodes: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "show": entry.show,
                    "remote_id": remote_ids[&entry.show],
                    "season": entry.season,
                    "episode": entry.episode,
                    "watched_at": entry.watched_at,
                })
            })
            .collect();
        let payload = json!({
            "mark": first.mark.as_str(),
            "episodes": episodes,
        });

        http::post_json_with_retries(
            &format!("{}/history/mark", self.base_url),
            &payload.to_string(),
            Some(&self.token),
            self.policy,
        )
        .map(|_| ())
        .map_err(EngineError::RemoteSync)
    }

    fn search_show(&self, name: &str) -> Result<Vec<RemoteShow>, EngineError> {
        let query = vec![("q".to_string(), name.to_string())];
        let body = http::get_text_with_retries(
            &format!("{}/shows/search", self.base_url),
            &query,
            Some(&self.token),
            self.policy,
        )
        .map_err(EngineError::RemoteSync)?;
        parse_remote_shows(&body)
    }
}

fn parse_remote_shows(raw: &str) -> Result<Vec<RemoteShow>, EngineError> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|err| EngineError::RemoteSync(format!("malformed search response: {err}")))?;
    let Some(items) = parsed.pointer("/shows").and_then(Value::as_array) else {
        return Err(EngineError::RemoteSync(
            "search response is missing the shows list".to_string(),
        ));
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?.trim();
            let title = item.get("title")?.as_str()?.trim();
            if id.is_empty() || title.is_empty() {
                return None;
            }
            Some(RemoteShow {
                id: id.to_string(),
                title: title.to_string(),
            })
        })
        .collect())
}

/// Scripted remote used by queue tests: fails the first `fail_first` batch
/// calls, records every attempted batch.
#[cfg(test)]
pub(crate) struct FakeRemote {
    pub(crate) fail_first: std::cell::Cell<usize>,
    pub(crate) batches: std::cell::RefCell<Vec<Vec<SyncEntry>>>,
}

#[cfg(test)]
impl FakeRemote {
    pub(crate) fn reliable() -> Self {
        Self::failing(0)
    }

    pub(crate) fn failing(fail_first: usize) -> Self {
        Self {
            fail_first: std::cell::Cell::new(fail_first),
            batches: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn attempted(&self) -> Vec<Vec<SyncEntry>> {
        self.batches.borrow().clone()
    }
}

#[cfg(test)]
impl RemoteSync for FakeRemote {
    fn mark_batch(&self, entries: &[SyncEntry]) -> Result<(), EngineError> {
        self.batches.borrow_mut().push(entries.to_vec());
        let remaining = self.fail_first.get();
        if remaining > 0 {
            self.fail_first.set(remaining - 1);
            return Err(EngineError::RemoteSync("scripted failure".to_string()));
        }
        Ok(())
    }

    fn search_show(&self, name: &str) -> Result<Vec<RemoteShow>, EngineError> {
        Ok(vec![RemoteShow {
            id: format!("remote-{name}"),
            title: name.to_string(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MarkType;

    fn entry(episode: u32, mark: MarkType) -> SyncEntry {
        SyncEntry {
            show: "Scrubs".to_string(),
            season: 1,
            episode,
            watched_at: now_stamp(),
            mark,
        }
    }

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().expect("open db");
        for (episode, mark) in [
            (1, MarkType::Seen),
            (2, MarkType::Seen),
            (3, MarkType::Unseen),
            (4, MarkType::Seen),
        ] {
            db.enqueue_sync(&entry(episode, mark)).expect("enqueue");
        }
        db
    }

    #[test]
    fn batch_runs_split_only_where_mark_changes() {
        let db = seeded_db();
        let pending = db.pending_sync().expect("pending");
        let runs = batch_runs(&pending);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[1].len(), 1);
        assert_eq!(runs[2].len(), 1);
        assert!(batch_runs(&[]).is_empty());
    }

    #[test]
    fn failed_first_batch_leaves_everything_queued() {
        let db = seeded_db();
        let remote = FakeRemote::failing(1);

        let report = drain(&db, &remote).expect("drain");

        assert_eq!(report.batches_sent, 0);
        assert_eq!(report.remaining, 4);
        // Batch 2 and later were never attempted this cycle.
        assert_eq!(remote.attempted().len(), 1);
        assert_eq!(db.pending_sync().expect("pending").len(), 4);
    }

    #[test]
    fn successful_drain_empties_the_queue_one_call_per_run() {
        let db = seeded_db();
        let remote = FakeRemote::reliable();

        let report = drain(&db, &remote).expect("drain");

        assert_eq!(report.batches_sent, 3);
        assert_eq!(report.entries_sent, 4);
        assert_eq!(report.remaining, 0);
        assert!(db.pending_sync().expect("pending").is_empty());

        let attempted = remote.attempted();
        assert_eq!(attempted.len(), 3);
        assert_eq!(attempted[0].len(), 2);
        assert!(attempted[0].iter().all(|e| e.mark == MarkType::Seen));
        assert_eq!(attempted[1][0].mark, MarkType::Unseen);
        assert_eq!(attempted[2][0].mark, MarkType::Seen);
    }

    /// Remote that succeeds until the given 0-based call index, then fails.
    struct FailsAtCall {
        at: usize,
        calls: std::cell::Cell<usize>,
    }

    impl RemoteSync for FailsAtCall {
        fn mark_batch(&self, _entries: &[SyncEntry]) -> Result<(), EngineError> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if call == self.at {
                return Err(EngineError::RemoteSync("scripted failure".to_string()));
            }
            Ok(())
        }

        fn search_show(&self, name: &str) -> Result<Vec<RemoteShow>, EngineError> {
            Ok(vec![RemoteShow {
                id: format!("remote-{name}"),
                title: name.to_string(),
            }])
        }
    }

    #[test]
    fn mid_drain_failure_keeps_the_remaining_suffix() {
        let db = seeded_db();
        let remote = FailsAtCall {
            at: 1,
            calls: std::cell::Cell::new(0),
        };

        let report = drain(&db, &remote).expect("drain");
        assert_eq!(report.batches_sent, 1);
        assert_eq!(report.entries_sent, 2);
        assert_eq!(report.remaining, 2);

        let left: Vec<u32> = db
            .pending_sync()
            .expect("pending")
            .iter()
            .map(|q| q.entry.episode)
            .collect();
        assert_eq!(left, vec![3, 4]);
    }

    #[test]
    fn record_marks_downgrades_a_remote_failure_to_a_queue_append() {
        let db = Database::open_in_memory().expect("open db");
        let remote = FakeRemote::failing(1);

        record_marks(&db, &remote, vec![entry(5, MarkType::Seen)]).expect("record");

        let pending = db.pending_sync().expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entry.episode, 5);
    }

    #[test]
    fn record_marks_never_jumps_ahead_of_a_stuck_backlog() {
        let db = Database::open_in_memory().expect("open db");
        db.enqueue_sync(&entry(1, MarkType::Unseen)).expect("enqueue");
        let remote = FakeRemote::failing(1);

        record_marks(&db, &remote, vec![entry(2, MarkType::Seen)]).expect("record");

        // The drain attempt failed, so the new mark went behind the backlog.
        let pending = db.pending_sync().expect("pending");
        let order: Vec<(u32, MarkType)> = pending
            .iter()
            .map(|q| (q.entry.episode, q.entry.mark))
            .collect();
        assert_eq!(order, vec![(1, MarkType::Unseen), (2, MarkType::Seen)]);
        assert_eq!(remote.attempted().len(), 1);
    }

    #[test]
    fn record_marks_sends_directly_when_the_queue_is_clear() {
        let db = Database::open_in_memory().expect("open db");
        let remote = FakeRemote::reliable();

        record_marks(&db, &remote, vec![entry(7, MarkType::Seen)]).expect("record");

        assert!(db.pending_sync().expect("pending").is_empty());
        assert_eq!(remote.attempted().len(), 1);
    }

    #[test]
    fn parse_remote_shows_extracts_candidates_in_order() {
        let raw = r#"{"shows":[{"id":"r-1","title":"Scrubs"},{"id":"r-2","title":"Scrubs (2001)"}]}"#;
        let shows = parse_remote_shows(raw).expect("parse");
        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].id, "r-1");
        assert_eq!(shows[1].title, "Scrubs (2001)");
    }

    #[test]
    fn parse_remote_shows_rejects_malformed_payloads() {
        assert!(matches!(
            parse_remote_shows("not-json"),
            Err(EngineError::RemoteSync(_))
        ));
        assert!(matches!(
            parse_remote_shows(r#"{"unexpected":true}"#),
            Err(EngineError::RemoteSync(_))
        ));
    }
}
