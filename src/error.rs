use thiserror::Error;

/// Domain errors surfaced by the selection and navigation engine.
///
/// Each variant is a distinct machine-distinguishable kind; `main` maps them
/// to process exit codes. Remote failures are normally downgraded into queue
/// appends before they reach a caller, so `RemoteSync` only escapes when the
/// queue itself cannot absorb the failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid episode specifier '{0}'")]
    Grammar(String),

    #[error("no matches for '{0}'")]
    NoMatches(String),

    #[error("no matches in range '{0}'")]
    NoMatchesInRange(String),

    #[error("no current progress for '{show}' (tag '{tag}')")]
    NoProgress { show: String, tag: String },

    #[error("no {0} episode available")]
    NavigationExhausted(&'static str),

    #[error("remote sync failed: {0}")]
    RemoteSync(String),

    #[error("remote sync is not configured: {0}")]
    RemoteConfig(String),

    #[error("local progress store failure: {0}")]
    Persistence(#[from] rusqlite::Error),
}
