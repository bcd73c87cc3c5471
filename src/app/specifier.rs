use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::EngineError;

/// Direction of a pointer-relative lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Previous,
    Current,
    Next,
}

impl Direction {
    pub(crate) fn noun(self) -> &'static str {
        match self {
            Direction::Previous => "previous",
            Direction::Current => "current",
            Direction::Next => "next",
        }
    }
}

/// The episode numbers encoded by a single physical file, strictly increasing
/// and never empty. Gaps are allowed: a file combining e02 and e04 is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeGroup(Vec<u32>);

impl EpisodeGroup {
    pub(crate) fn new(mut episodes: Vec<u32>) -> Option<Self> {
        episodes.sort_unstable();
        episodes.dedup();
        if episodes.is_empty() {
            return None;
        }
        Some(Self(episodes))
    }

    pub(crate) fn single(episode: u32) -> Self {
        Self(vec![episode])
    }

    pub(crate) fn first(&self) -> u32 {
        self.0[0]
    }

    pub(crate) fn last(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    pub(crate) fn contains(&self, episode: u32) -> bool {
        self.0.contains(&episode)
    }

    pub(crate) fn episodes(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for EpisodeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for episode in &self.0 {
            write!(f, "e{episode:02}")?;
        }
        Ok(())
    }
}

/// One physical file and the episode(s) it satisfies. Built fresh on every
/// scan, never cached across invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeMatch {
    pub(crate) season: u32,
    pub(crate) episodes: EpisodeGroup,
    pub(crate) file: PathBuf,
}

impl EpisodeMatch {
    pub(crate) fn label(&self) -> String {
        format!("s{:02}{}", self.season, self.episodes)
    }
}

/// A parsed episode specifier. Exactly one variant per input string; parsing
/// is total over the grammar and everything else is a `Grammar` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Specifier {
    Single {
        season: u32,
        episode: u32,
    },
    Range {
        start_season: u32,
        start_episode: u32,
        end_season: u32,
        end_episode: u32,
    },
    RemainingInSeasonFrom {
        season: u32,
        episode: u32,
    },
    Season(u32),
    SeasonRange {
        start: u32,
        end: u32,
    },
    RemainingSeasonsFrom(u32),
    LatestSeason,
    All,
    Pilot,
    Latest,
    PointerRelative(Direction),
    RemainingFromPointer(Direction),
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Specifier::Single { season, episode } => write!(f, "s{season:02}e{episode:02}"),
            Specifier::Range {
                start_season,
                start_episode,
                end_season,
                end_episode,
            } => write!(
                f,
                "s{start_season:02}e{start_episode:02}-s{end_season:02}e{end_episode:02}"
            ),
            Specifier::RemainingInSeasonFrom { season, episode } => {
                write!(f, "s{season:02}e{episode:02}-")
            }
            Specifier::Season(season) => write!(f, "s{season:02}"),
            Specifier::SeasonRange { start, end } => write!(f, "s{start:02}-s{end:02}"),
            Specifier::RemainingSeasonsFrom(season) => write!(f, "s{season:02}-"),
            Specifier::LatestSeason => write!(f, "s"),
            Specifier::All => write!(f, "all"),
            Specifier::Pilot => write!(f, "pilot"),
            Specifier::Latest => write!(f, "latest"),
            Specifier::PointerRelative(dir) => write!(f, "{}", dir.noun()),
            Specifier::RemainingFromPointer(dir) => write!(f, "{}-", dir.noun()),
        }
    }
}

// Season and episode coordinates are fixed two-digit zero-padded fields.
// Looser forms (s1e2, 1x02) are deliberately rejected at this layer.
static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(\d{2})e(\d{2})$").expect("single pattern"));
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(\d{2})e(\d{2})-s(\d{2})e(\d{2})$").expect("range pattern"));
static REMAINING_IN_SEASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(\d{2})e(\d{2})-$").expect("remaining-in-season pattern"));
static SEASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(\d{2})$").expect("season pattern"));
static SEASON_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(\d{2})-s(\d{2})$").expect("season range pattern"));
static REMAINING_SEASONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(\d{2})-$").expect("remaining seasons pattern"));

fn two_digit(raw: &str) -> u32 {
    // The regexes above only capture \d{2}, which always fits a u32.
    raw.parse().unwrap_or(0)
}

fn direction_keyword(raw: &str) -> Option<Direction> {
    match raw {
        "prev" | "previous" => Some(Direction::Previous),
        "cur" | "current" => Some(Direction::Current),
        "next" => Some(Direction::Next),
        _ => None,
    }
}

/// Parses an episode specifier string. The whole input must match one
/// production; mixed forms such as `s01-s02e03` or `s01e04-s02` are rejected
/// rather than guessed at.
pub(crate) fn parse(spec: &str) -> Result<Specifier, EngineError> {
    let normalized = spec.trim().to_ascii_lowercase();
    let invalid = || EngineError::Grammar(spec.trim().to_string());

    match normalized.as_str() {
        "" => return Err(invalid()),
        "s" => return Ok(Specifier::LatestSeason),
        "all" => return Ok(Specifier::All),
        "pilot" => return Ok(Specifier::Pilot),
        "latest" => return Ok(Specifier::Latest),
        other => {
            if let Some(dir) = direction_keyword(other) {
                return Ok(Specifier::PointerRelative(dir));
            }
            if let Some(stem) = other.strip_suffix('-')
                && let Some(dir) = direction_keyword(stem)
            {
                return Ok(Specifier::RemainingFromPointer(dir));
            }
        }
    }

    if let Some(caps) = SINGLE_RE.captures(&normalized) {
        return Ok(Specifier::Single {
            season: two_digit(&caps[1]),
            episode: two_digit(&caps[2]),
        });
    }
    if let Some(caps) = RANGE_RE.captures(&normalized) {
        let start_season = two_digit(&caps[1]);
        let end_season = two_digit(&caps[3]);
        // The episode bound is only enforced within a single season.
        let start_episode = two_digit(&caps[2]);
        let end_episode = two_digit(&caps[4]);
        if start_season > end_season || (start_season == end_season && start_episode > end_episode)
        {
            return Err(invalid());
        }
        return Ok(Specifier::Range {
            start_season,
            start_episode,
            end_season,
            end_episode,
        });
    }
    if let Some(caps) = REMAINING_IN_SEASON_RE.captures(&normalized) {
        return Ok(Specifier::RemainingInSeasonFrom {
            season: two_digit(&caps[1]),
            episode: two_digit(&caps[2]),
        });
    }
    if let Some(caps) = SEASON_RE.captures(&normalized) {
        return Ok(Specifier::Season(two_digit(&caps[1])));
    }
    if let Some(caps) = SEASON_RANGE_RE.captures(&normalized) {
        let start = two_digit(&caps[1]);
        let end = two_digit(&caps[2]);
        if start > end {
            return Err(invalid());
        }
        return Ok(Specifier::SeasonRange { start, end });
    }
    if let Some(caps) = REMAINING_SEASONS_RE.captures(&normalized) {
        return Ok(Specifier::RemainingSeasonsFrom(two_digit(&caps[1])));
    }

    Err(invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_episode() {
        assert_eq!(
            parse("s01e02").expect("should parse"),
            Specifier::Single {
                season: 1,
                episode: 2
            }
        );
    }

    #[test]
    fn parses_episode_range_across_seasons() {
        assert_eq!(
            parse("s01e09-s02e03").expect("should parse"),
            Specifier::Range {
                start_season: 1,
                start_episode: 9,
                end_season: 2,
                end_episode: 3
            }
        );
    }

    #[test]
    fn cross_season_range_does_not_enforce_episode_bound() {
        // e09 > e03 is fine because the seasons differ.
        assert!(parse("s01e09-s02e03").is_ok());
        assert!(matches!(
            parse("s01e09-s01e03"),
            Err(EngineError::Grammar(_))
        ));
    }

    #[test]
    fn parses_remaining_in_season() {
        assert_eq!(
            parse("s01e05-").expect("should parse"),
            Specifier::RemainingInSeasonFrom {
                season: 1,
                episode: 5
            }
        );
    }

    #[test]
    fn parses_season_forms() {
        assert_eq!(parse("s02").expect("should parse"), Specifier::Season(2));
        assert_eq!(
            parse("s01-s03").expect("should parse"),
            Specifier::SeasonRange { start: 1, end: 3 }
        );
        assert_eq!(
            parse("s02-").expect("should parse"),
            Specifier::RemainingSeasonsFrom(2)
        );
        assert_eq!(parse("s").expect("should parse"), Specifier::LatestSeason);
    }

    #[test]
    fn parses_keywords_case_insensitively() {
        assert_eq!(parse("ALL").expect("should parse"), Specifier::All);
        assert_eq!(parse("pilot").expect("should parse"), Specifier::Pilot);
        assert_eq!(parse("Latest").expect("should parse"), Specifier::Latest);
    }

    #[test]
    fn parses_pointer_relative_forms() {
        assert_eq!(
            parse("prev").expect("should parse"),
            Specifier::PointerRelative(Direction::Previous)
        );
        assert_eq!(
            parse("previous").expect("should parse"),
            Specifier::PointerRelative(Direction::Previous)
        );
        assert_eq!(
            parse("cur").expect("should parse"),
            Specifier::PointerRelative(Direction::Current)
        );
        assert_eq!(
            parse("current").expect("should parse"),
            Specifier::PointerRelative(Direction::Current)
        );
        assert_eq!(
            parse("next").expect("should parse"),
            Specifier::PointerRelative(Direction::Next)
        );
        assert_eq!(
            parse("next-").expect("should parse"),
            Specifier::RemainingFromPointer(Direction::Next)
        );
        assert_eq!(
            parse("cur-").expect("should parse"),
            Specifier::RemainingFromPointer(Direction::Current)
        );
        assert_eq!(
            parse("previous-").expect("should parse"),
            Specifier::RemainingFromPointer(Direction::Previous)
        );
    }

    #[test]
    fn rejects_common_mistakes() {
        for bad in [
            "1x02",
            "s01-s02e03",
            "s01e04-s02",
            "s1e2",
            "s01e",
            "e02",
            "s01e02-s01",
            "nextt",
            "-",
            "",
        ] {
            assert!(
                matches!(parse(bad), Err(EngineError::Grammar(_))),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn rejects_reversed_season_range() {
        assert!(matches!(parse("s03-s01"), Err(EngineError::Grammar(_))));
    }

    #[test]
    fn display_round_trips_canonical_text() {
        for text in ["s01e02", "s01e02-s02e03", "s01e05-", "s02", "s01-s03", "s02-", "next-"] {
            let spec = parse(text).expect("should parse");
            assert_eq!(spec.to_string(), text);
        }
    }

    #[test]
    fn episode_group_invariants() {
        assert!(EpisodeGroup::new(vec![]).is_none());
        let group = EpisodeGroup::new(vec![4, 2, 2]).expect("non-empty");
        assert_eq!(group.episodes(), &[2, 4]);
        assert_eq!(group.first(), 2);
        assert_eq!(group.last(), 4);
        assert!(group.contains(2));
        assert!(!group.contains(3));
        assert_eq!(group.to_string(), "e02e04");
    }
}
