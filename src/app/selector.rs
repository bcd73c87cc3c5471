use crate::db::ShowProgress;
use crate::error::EngineError;

use super::matcher::ShowScan;
use super::navigator;
use super::specifier::{Direction, EpisodeMatch, Specifier};

/// Resolves a parsed specifier against one scan of the show's files.
///
/// The grammar has already disambiguated the specifier kind, so dispatch is
/// a single exhaustive match rather than a probing strategy chain. Pointer-
/// relative kinds need the stored progress; its absence is a distinct error
/// from an empty match list.
pub(crate) fn find_matches(
    scan: &ShowScan,
    spec: &Specifier,
    pointer: Option<&ShowProgress>,
    show: &str,
    tag: &str,
) -> Result<Vec<EpisodeMatch>, EngineError> {
    let matches = match *spec {
        Specifier::Single { season, episode } => episodes_at(scan, season, episode),
        Specifier::Pilot => episodes_at(scan, 1, 1),
        Specifier::Range {
            start_season,
            start_episode,
            end_season,
            end_episode,
        } => filter_matches(scan, |season, episode| {
            at_or_after(season, episode, start_season, start_episode)
                && at_or_before(season, episode, end_season, end_episode)
        }),
        Specifier::RemainingInSeasonFrom { season, episode } => {
            filter_matches(scan, |s, e| s == season && e >= episode)
        }
        Specifier::Season(season) => filter_matches(scan, |s, _| s == season),
        Specifier::SeasonRange { start, end } => {
            filter_matches(scan, |s, _| s >= start && s <= end)
        }
        Specifier::RemainingSeasonsFrom(season) => filter_matches(scan, |s, _| s >= season),
        Specifier::LatestSeason => match scan.max_season() {
            Some(season) => filter_matches(scan, |s, _| s == season),
            None => Vec::new(),
        },
        Specifier::All => scan.all().to_vec(),
        Specifier::Latest => latest_episode(scan).into_iter().collect(),
        Specifier::PointerRelative(direction) => {
            let pointer = stored_pointer(pointer, show, tag)?;
            resolve_pointer_step(scan, direction, pointer)?
                .into_iter()
                .collect()
        }
        Specifier::RemainingFromPointer(direction) => {
            let pointer = stored_pointer(pointer, show, tag)?;
            match resolve_pointer_step(scan, direction, pointer)? {
                Some(anchor) => filter_matches(scan, |season, episode| {
                    at_or_after(season, episode, anchor.season, anchor.episodes.first())
                }),
                None => Vec::new(),
            }
        }
    };
    Ok(matches)
}

/// Like [`find_matches`] but maps an empty result to the domain error for the
/// specifier's kind, so callers can tell "nothing in that range" apart from
/// "that episode does not exist".
pub(crate) fn find_matches_or_err(
    scan: &ShowScan,
    spec: &Specifier,
    pointer: Option<&ShowProgress>,
    show: &str,
    tag: &str,
) -> Result<Vec<EpisodeMatch>, EngineError> {
    let matches = find_matches(scan, spec, pointer, show, tag)?;
    if matches.is_empty() {
        return Err(empty_error(spec, show));
    }
    Ok(matches)
}

fn empty_error(spec: &Specifier, show: &str) -> EngineError {
    let label = format!("{show} {spec}");
    match spec {
        Specifier::Range { .. }
        | Specifier::SeasonRange { .. }
        | Specifier::RemainingInSeasonFrom { .. }
        | Specifier::RemainingSeasonsFrom(_) => EngineError::NoMatchesInRange(label),
        _ => EngineError::NoMatches(label),
    }
}

fn stored_pointer<'a>(
    pointer: Option<&'a ShowProgress>,
    show: &str,
    tag: &str,
) -> Result<&'a ShowProgress, EngineError> {
    pointer.ok_or_else(|| EngineError::NoProgress {
        show: show.to_string(),
        tag: tag.to_string(),
    })
}

/// A pointer step that runs off either end of the show is terminal for
/// prev/next; only a dangling `current` pointer resolves to "nothing".
fn resolve_pointer_step(
    scan: &ShowScan,
    direction: Direction,
    pointer: &ShowProgress,
) -> Result<Option<EpisodeMatch>, EngineError> {
    let stepped = navigator::step(scan, direction, pointer.season, pointer.episode);
    match (stepped, direction) {
        (Some(group), _) => Ok(Some(group)),
        (None, Direction::Current) => Ok(None),
        (None, _) => Err(EngineError::NavigationExhausted(direction.noun())),
    }
}

fn episodes_at(scan: &ShowScan, season: u32, episode: u32) -> Vec<EpisodeMatch> {
    scan.in_season(season)
        .into_iter()
        .filter(|m| m.episodes.contains(episode))
        .cloned()
        .collect()
}

/// Keeps every file with at least one episode satisfying the predicate.
fn filter_matches<F>(scan: &ShowScan, keep: F) -> Vec<EpisodeMatch>
where
    F: Fn(u32, u32) -> bool,
{
    scan.all()
        .iter()
        .filter(|m| m.episodes.episodes().iter().any(|&e| keep(m.season, e)))
        .cloned()
        .collect()
}

fn at_or_after(season: u32, episode: u32, bound_season: u32, bound_episode: u32) -> bool {
    season > bound_season || (season == bound_season && episode >= bound_episode)
}

fn at_or_before(season: u32, episode: u32, bound_season: u32, bound_episode: u32) -> bool {
    season < bound_season || (season == bound_season && episode <= bound_episode)
}

fn latest_episode(scan: &ShowScan) -> Option<EpisodeMatch> {
    let season = scan.max_season()?;
    scan.in_season(season).last().map(|m| (*m).clone())
}
