use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{Context, Result};

use super::specifier::EpisodeMatch;

pub(crate) fn resolve_player_bin() -> PathBuf {
    resolve_player_bin_from_env(env::var_os("EPITRACK_PLAYER"))
}

pub(crate) fn resolve_player_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("mpv"),
    }
}

/// Launches the player with the selected files as one playlist and blocks
/// until it exits. Returns whether playback completed normally; a launch
/// failure is an error, a non-zero exit is not.
pub(crate) fn play(matches: &[EpisodeMatch]) -> Result<bool> {
    let player_bin = resolve_player_bin();
    let mut cmd = ProcessCommand::new(&player_bin);
    for m in matches {
        cmd.arg(&m.file);
    }
    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to launch {}", player_bin.display()))?;
    Ok(status.success())
}
