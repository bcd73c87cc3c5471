use super::matcher::ShowScan;
use super::specifier::{Direction, EpisodeMatch};

/// Steps the watch pointer across what actually exists on disk. Navigation is
/// never computed arithmetically: the scan is the source of truth, so a gap
/// in the numbering or a multi-episode file is handled by construction.
///
/// A multi-episode file is one step. When the stored episode falls inside a
/// group, `next` measures from the group's lowest episode and `prev` from its
/// highest, which is what lets the whole file be skipped as a unit.
pub(crate) fn step(
    scan: &ShowScan,
    direction: Direction,
    season: u32,
    episode: u32,
) -> Option<EpisodeMatch> {
    match direction {
        Direction::Next => next(scan, season, episode),
        Direction::Previous => prev(scan, season, episode),
        Direction::Current => current(scan, season, episode),
    }
}

pub(crate) fn next(scan: &ShowScan, season: u32, episode: u32) -> Option<EpisodeMatch> {
    let cursor = current(scan, season, episode)
        .map(|group| group.episodes.first())
        .unwrap_or(episode);

    let within = scan
        .in_season(season)
        .into_iter()
        .filter(|m| m.episodes.first() > cursor)
        .min_by_key(|m| m.episodes.first())
        .cloned();
    if within.is_some() {
        return within;
    }

    for &later in scan.seasons().iter().filter(|&&s| s > season) {
        if let Some(first) = scan.in_season(later).first() {
            return Some((*first).clone());
        }
    }
    None
}

pub(crate) fn prev(scan: &ShowScan, season: u32, episode: u32) -> Option<EpisodeMatch> {
    let cursor = current(scan, season, episode)
        .map(|group| group.episodes.last())
        .unwrap_or(episode);

    let within = scan
        .in_season(season)
        .into_iter()
        .filter(|m| m.episodes.last() < cursor)
        .max_by_key(|m| (m.episodes.last(), m.episodes.first()))
        .cloned();
    if within.is_some() {
        return within;
    }

    for &earlier in scan.seasons().iter().filter(|&&s| s < season).rev() {
        if let Some(last) = scan.in_season(earlier).last() {
            return Some((*last).clone());
        }
    }
    None
}

/// The group at exactly the stored coordinate, if a file still covers it.
pub(crate) fn current(scan: &ShowScan, season: u32, episode: u32) -> Option<EpisodeMatch> {
    scan.in_season(season)
        .into_iter()
        .find(|m| m.episodes.contains(episode))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::specifier::EpisodeGroup;
    use std::path::PathBuf;

    fn m(season: u32, episodes: &[u32]) -> EpisodeMatch {
        EpisodeMatch {
            season,
            episodes: EpisodeGroup::new(episodes.to_vec()).expect("non-empty group"),
            file: PathBuf::from(format!("s{season}-e{}.mkv", episodes[0])),
        }
    }

    /// Season 1: e01, e02+e03 (one file), e04. Season 2: e01, e02.
    fn fixture() -> ShowScan {
        ShowScan::from_matches(vec![
            m(1, &[1]),
            m(1, &[2, 3]),
            m(1, &[4]),
            m(2, &[1]),
            m(2, &[2]),
        ])
    }

    #[test]
    fn next_steps_over_a_multi_episode_group_as_one_unit() {
        let scan = fixture();
        let group = next(&scan, 1, 1).expect("next should exist");
        assert_eq!(group.episodes.episodes(), &[2, 3]);

        let after_group = next(&scan, 1, 2).expect("next should exist");
        assert_eq!(after_group.episodes.episodes(), &[4]);
    }

    #[test]
    fn prev_from_after_group_lands_on_the_whole_group() {
        let scan = fixture();
        let group = prev(&scan, 1, 4).expect("prev should exist");
        assert_eq!(group.episodes.episodes(), &[2, 3]);

        let before_group = prev(&scan, 1, 3).expect("prev should exist");
        assert_eq!(before_group.episodes.episodes(), &[1]);
    }

    #[test]
    fn next_crosses_the_season_boundary() {
        let scan = fixture();
        let group = next(&scan, 1, 4).expect("next should exist");
        assert_eq!((group.season, group.episodes.first()), (2, 1));
    }

    #[test]
    fn prev_crosses_the_season_boundary() {
        let scan = fixture();
        let group = prev(&scan, 2, 1).expect("prev should exist");
        assert_eq!((group.season, group.episodes.first()), (1, 4));
    }

    #[test]
    fn navigation_is_terminal_at_both_ends() {
        let scan = fixture();
        assert!(next(&scan, 2, 2).is_none());
        assert!(prev(&scan, 1, 1).is_none());
    }

    #[test]
    fn next_and_prev_round_trip_when_both_defined() {
        let scan = fixture();
        // Including the season boundary (s01e04 <-> s02e01) and the group.
        for (season, episode) in [(1, 2), (1, 4), (2, 1), (2, 2)] {
            let back = prev(&scan, season, episode).expect("prev defined");
            let forward = next(&scan, back.season, back.episodes.first())
                .expect("next defined after prev");
            assert!(
                forward.episodes.contains(episode) && forward.season == season,
                "round trip failed from s{season:02}e{episode:02}"
            );
        }
        for (season, episode) in [(1, 1), (1, 2), (1, 4), (2, 1)] {
            let forward = next(&scan, season, episode).expect("next defined");
            let back = prev(&scan, forward.season, forward.episodes.first())
                .expect("prev defined after next");
            assert!(
                back.episodes.contains(episode) && back.season == season,
                "round trip failed from s{season:02}e{episode:02}"
            );
        }
    }

    #[test]
    fn navigation_skips_gaps_in_numbering() {
        let scan = ShowScan::from_matches(vec![m(1, &[1]), m(1, &[5]), m(3, &[1])]);
        assert_eq!(
            next(&scan, 1, 1).map(|g| g.episodes.first()),
            Some(5),
            "episode numbering gaps follow the directory, not arithmetic"
        );
        assert_eq!(next(&scan, 1, 5).map(|g| g.season), Some(3));
        assert_eq!(prev(&scan, 3, 1).map(|g| (g.season, g.episodes.first())), Some((1, 5)));
    }

    #[test]
    fn current_requires_an_exact_covering_group() {
        let scan = fixture();
        assert_eq!(
            current(&scan, 1, 3).map(|g| g.episodes.episodes().to_vec()),
            Some(vec![2, 3])
        );
        assert!(current(&scan, 1, 9).is_none());
        assert!(current(&scan, 4, 1).is_none());
    }
}
