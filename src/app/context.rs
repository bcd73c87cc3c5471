use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::cli::SelectArgs;

/// Explicit engine configuration threaded into the matcher, selector and
/// navigator. There is no ambient global state; every invocation builds one
/// of these from the CLI surface and environment fallbacks.
#[derive(Debug, Clone)]
pub(crate) struct EngineContext {
    pub(crate) source_roots: Vec<PathBuf>,
    pub(crate) user_tag: String,
    pub(crate) track_pointer: bool,
    pub(crate) remote_sync: bool,
}

impl EngineContext {
    pub(crate) fn from_select_args(args: &SelectArgs) -> Result<Self> {
        let source_roots = if args.sources.is_empty() {
            source_roots_from_env(env::var("EPITRACK_SOURCE").ok().as_deref())
        } else {
            args.sources.clone()
        };
        if source_roots.is_empty() {
            return Err(anyhow!(
                "no media source configured; pass --source or set EPITRACK_SOURCE"
            ));
        }

        let user_tag = args
            .tag
            .clone()
            .or_else(|| env::var("EPITRACK_USER").ok().filter(|tag| !tag.is_empty()))
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            source_roots,
            user_tag,
            track_pointer: !args.no_track,
            remote_sync: args.remote,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(source_roots: Vec<PathBuf>) -> Self {
        Self {
            source_roots,
            user_tag: "default".to_string(),
            track_pointer: true,
            remote_sync: false,
        }
    }
}

pub(crate) fn source_roots_from_env(raw: Option<&str>) -> Vec<PathBuf> {
    raw.map(|value| {
        value
            .split(':')
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect()
    })
    .unwrap_or_default()
}
