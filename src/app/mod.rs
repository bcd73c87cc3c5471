mod context;
mod matcher;
mod navigator;
mod player;
mod selector;
mod specifier;
mod sync;


use anyhow::Result;
use log::warn;

use crate::cli::{Cli, Command, SelectArgs};
use crate::db::{Database, MarkType, SyncEntry};
use crate::error::EngineError;
use crate::paths::database_file_path;

use self::context::EngineContext;
use self::matcher::FileMatcher;
use self::specifier::EpisodeMatch;
use self::sync::{HttpRemote, RemoteSync};

pub fn run(cli: Cli) -> Result<()> {
    let db = open_db()?;

    match cli.command {
        Command::Play(args) => run_play(&db, &args),
        Command::List(args) => run_list(&db, &args),
        Command::Count(args) => run_count(&db, &args),
        Command::Mark { select, unseen } => run_mark(&db, &select, unseen),
        Command::Sync => run_sync(&db),
    }
}

fn resolve_selection(
    db: &Database,
    ctx: &EngineContext,
    args: &SelectArgs,
) -> Result<Vec<EpisodeMatch>> {
    let spec = specifier::parse(&args.spec)?;
    let scan = FileMatcher::new(ctx, &args.show).scan();
    let pointer = db
        .get_progress(&args.show, &ctx.user_tag)
        .map_err(EngineError::from)?;
    let matches =
        selector::find_matches_or_err(&scan, &spec, pointer.as_ref(), &args.show, &ctx.user_tag)?;
    Ok(matches)
}

fn run_play(db: &Database, args: &SelectArgs) -> Result<()> {
    let ctx = EngineContext::from_select_args(args)?;
    // Remote credentials are a prerequisite; fail before any local action.
    let remote = if ctx.remote_sync {
        Some(HttpRemote::from_env()?)
    } else {
        None
    };
    let matches = resolve_selection(db, &ctx, args)?;

    println!("Playing {} file(s) for {}:", matches.len(), args.show);
    for m in &matches {
        println!("  {}  {}", m.label(), m.file.display());
    }

    let completed = player::play(&matches)?;
    if !completed {
        println!("Playback failed/interrupted. Progress not updated.");
        return Ok(());
    }

    if ctx.track_pointer && let Some(last) = matches.last() {
        update_pointer(db, &ctx, &args.show, last);
    }
    if let Some(remote) = &remote {
        record_and_drain(db, remote, &args.show, &matches, MarkType::Seen);
    }
    Ok(())
}

fn run_list(db: &Database, args: &SelectArgs) -> Result<()> {
    let ctx = EngineContext::from_select_args(args)?;
    let matches = resolve_selection(db, &ctx, args)?;
    for m in &matches {
        println!("{}  {}", m.label(), m.file.display());
    }
    Ok(())
}

fn run_count(db: &Database, args: &SelectArgs) -> Result<()> {
    let ctx = EngineContext::from_select_args(args)?;
    let matches = resolve_selection(db, &ctx, args)?;
    println!("{}", matches.len());
    Ok(())
}

fn run_mark(db: &Database, args: &SelectArgs, unseen: bool) -> Result<()> {
    let ctx = EngineContext::from_select_args(args)?;
    let remote = if ctx.remote_sync {
        Some(HttpRemote::from_env()?)
    } else {
        None
    };
    let matches = resolve_selection(db, &ctx, args)?;
    let mark = if unseen { MarkType::Unseen } else { MarkType::Seen };

    let episode_count: usize = matches.iter().map(|m| m.episodes.episodes().len()).sum();
    println!("Marked {episode_count} episode(s) {} for {}.", mark.as_str(), args.show);

    // Unseen marks rewind remote history but leave the local pointer alone.
    if ctx.track_pointer
        && mark == MarkType::Seen
        && let Some(last) = matches.last()
    {
        update_pointer(db, &ctx, &args.show, last);
    }
    if let Some(remote) = &remote {
        record_and_drain(db, remote, &args.show, &matches, mark);
    }
    Ok(())
}

fn run_sync(db: &Database) -> Result<()> {
    let remote = HttpRemote::from_env()?;
    let report = sync::drain(db, &remote)?;
    if report.remaining == 0 {
        println!(
            "Sync queue drained: {} entr(ies) in {} batch(es).",
            report.entries_sent, report.batches_sent
        );
    } else {
        println!(
            "Sent {} entr(ies); {} still queued after a remote failure.",
            report.entries_sent, report.remaining
        );
    }
    Ok(())
}

/// A pointer write failure is logged and reported but never aborts the
/// action; playback or marking has already happened by the time we get here.
fn update_pointer(db: &Database, ctx: &EngineContext, show: &str, last: &EpisodeMatch) {
    match db.set_progress(show, &ctx.user_tag, last.season, last.episodes.first()) {
        Ok(()) => println!("Progress: {show} now at {}", last.label()),
        Err(err) => {
            warn!("pointer update failed for {show}: {err}");
            println!("Pointer update failed; the action itself completed.");
        }
    }
}

/// Queues or sends the remote marks for a selection and drains whatever the
/// queue holds before shutdown. Remote trouble is downgraded, never raised.
fn record_and_drain(
    db: &Database,
    remote: &dyn RemoteSync,
    show: &str,
    matches: &[EpisodeMatch],
    mark: MarkType,
) {
    let entries = mark_entries(show, matches, mark);
    if let Err(err) = sync::record_marks(db, remote, entries) {
        warn!("recording remote marks failed: {err}");
        println!("Remote sync update failed; it will be retried on the next run.");
        return;
    }
    match sync::drain(db, remote) {
        Ok(report) if report.remaining > 0 => {
            println!(
                "{} sync entr(ies) remain queued; run `epitrack sync` to retry.",
                report.remaining
            );
        }
        Ok(_) => {}
        Err(err) => warn!("sync drain at shutdown failed: {err}"),
    }
}

/// One queue entry per episode a matched file encodes, in selection order.
fn mark_entries(show: &str, matches: &[EpisodeMatch], mark: MarkType) -> Vec<SyncEntry> {
    let watched_at = sync::now_stamp();
    matches
        .iter()
        .flat_map(|m| {
            let watched_at = watched_at.clone();
            m.episodes.episodes().iter().map(move |&episode| SyncEntry {
                show: show.to_string(),
                season: m.season,
                episode,
                watched_at: watched_at.clone(),
                mark,
            })
        })
        .collect()
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
