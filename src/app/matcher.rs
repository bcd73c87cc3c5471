use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use super::context::EngineContext;
use super::specifier::{EpisodeGroup, EpisodeMatch};

/// Extensions considered playable media. Everything else in a season
/// directory (subtitles, artwork, nfo files) is ignored.
static MEDIA_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "flv", "webm", "ts", "mpg", "mpeg", "ogv",
];

// "Season 2" / "Series 2" directory convention, case-insensitive.
static SEASON_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:season|series)[\s._-]*(\d{1,4})$").expect("season dir"));

// Primary filename encoding: SxxExx with one or more repeated Exx groups
// (S01E02E03 is one file carrying two episodes).
static SEASON_EP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)s(\d{1,2})((?:[\s._-]*e\d{1,3})+)").expect("sxxexx"));
static EP_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)e(\d{1,3})").expect("exx"));

// Primary alternate encoding: NxNN (e.g. "Scrubs - 1x05").
static CROSS_EP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b").expect("nxnn"));

// Secondary encoding for shows numbered by part markers: "pt"/"part"
// followed by an arabic number or a strict-format Roman numeral. The season
// is not in the filename for these; it is re-derived from the directory.
static PART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pt|part)[\s._-]*(\d{1,3}|[mdclxvi]+)\b").expect("part")
});

static ROMAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^m{0,4}(cm|cd|d?c{0,3})(xc|xl|l?x{0,3})(ix|iv|v?i{0,3})$").expect("roman")
});

/// Episode numbers recovered from one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileEpisodes {
    /// The filename carries its own season coordinate.
    Coded { season: u32, episodes: Vec<u32> },
    /// Part-marker numbering; the caller supplies the season from the path.
    Part { part: u32 },
}

pub(crate) fn is_media_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub(crate) fn season_dir_number(name: &str) -> Option<u32> {
    SEASON_DIR_RE
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Strict Roman numeral value, rejecting loose forms like "IIII" or "VX".
pub(crate) fn parse_roman(raw: &str) -> Option<u32> {
    if raw.is_empty() || !ROMAN_RE.is_match(raw) {
        return None;
    }
    let digit = |ch: char| match ch.to_ascii_uppercase() {
        'I' => 1,
        'V' => 5,
        'X' => 10,
        'L' => 50,
        'C' => 100,
        'D' => 500,
        'M' => 1000,
        _ => 0,
    };
    let values: Vec<u32> = raw.chars().map(digit).collect();
    let mut total = 0;
    for (idx, value) in values.iter().enumerate() {
        if values.get(idx + 1).is_some_and(|next| next > value) {
            total -= *value as i64;
        } else {
            total += *value as i64;
        }
    }
    u32::try_from(total).ok()
}

/// Extracts episode numbers from a filename stem, trying the primary
/// SxxExx / NxNN patterns first and the part-marker pattern second. `None`
/// means the file encodes no episode and is skipped, not an error.
pub(crate) fn parse_episode_encoding(stem: &str) -> Option<FileEpisodes> {
    if let Some(caps) = SEASON_EP_RE.captures(stem) {
        let season = caps[1].parse().ok()?;
        let episodes: Vec<u32> = EP_NUM_RE
            .captures_iter(&caps[2])
            .filter_map(|ep| ep[1].parse().ok())
            .collect();
        if !episodes.is_empty() {
            return Some(FileEpisodes::Coded { season, episodes });
        }
    }

    if let Some(caps) = CROSS_EP_RE.captures(stem) {
        let season = caps[1].parse().ok()?;
        let episode = caps[2].parse().ok()?;
        return Some(FileEpisodes::Coded {
            season,
            episodes: vec![episode],
        });
    }

    if let Some(caps) = PART_RE.captures(stem) {
        let raw = &caps[1];
        let part = raw.parse().ok().or_else(|| parse_roman(raw))?;
        return Some(FileEpisodes::Part { part });
    }

    None
}

/// A point-in-time view of one show's files on disk, ordered by season then
/// by lowest episode number within the season.
#[derive(Debug, Default)]
pub(crate) struct ShowScan {
    seasons: Vec<u32>,
    matches: Vec<EpisodeMatch>,
}

impl ShowScan {
    pub(crate) fn seasons(&self) -> &[u32] {
        &self.seasons
    }

    pub(crate) fn all(&self) -> &[EpisodeMatch] {
        &self.matches
    }

    pub(crate) fn in_season(&self, season: u32) -> Vec<&EpisodeMatch> {
        self.matches
            .iter()
            .filter(|m| m.season == season)
            .collect()
    }

    /// Highest season on disk. Season 0 (specials) only counts when it is
    /// the sole season present.
    pub(crate) fn max_season(&self) -> Option<u32> {
        self.seasons
            .iter()
            .copied()
            .filter(|&s| s > 0)
            .max()
            .or_else(|| self.seasons.first().copied())
    }

    #[cfg(test)]
    pub(crate) fn from_matches(matches: Vec<EpisodeMatch>) -> Self {
        let mut scan = ShowScan {
            seasons: Vec::new(),
            matches,
        };
        let seasons: BTreeSet<u32> = scan.matches.iter().map(|m| m.season).collect();
        scan.seasons = seasons.into_iter().collect();
        scan.sort();
        scan
    }

    fn sort(&mut self) {
        self.matches.sort_by(|a, b| {
            (a.season, a.episodes.first(), &a.file).cmp(&(b.season, b.episodes.first(), &b.file))
        });
    }
}

/// Scans a show's directories under the context's source roots. Missing
/// directories yield empty results; only the selection layer decides whether
/// empty is an error.
pub(crate) struct FileMatcher<'a> {
    ctx: &'a EngineContext,
    show: &'a str,
}

impl<'a> FileMatcher<'a> {
    pub(crate) fn new(ctx: &'a EngineContext, show: &'a str) -> Self {
        Self { ctx, show }
    }

    fn show_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for source in &self.ctx.source_roots {
            let entries = match fs::read_dir(source) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!("skipping unreadable source root {}: {err}", source.display());
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let matches_show = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.eq_ignore_ascii_case(self.show));
                if matches_show {
                    roots.push(path);
                }
            }
        }
        roots
    }

    pub(crate) fn scan(&self) -> ShowScan {
        let mut seasons = BTreeSet::new();
        let mut matches = Vec::new();

        for root in self.show_roots() {
            let entries = match fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!("skipping unreadable show root {}: {err}", root.display());
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if path.is_dir() {
                    if let Some(season) = season_dir_number(&name) {
                        seasons.insert(season);
                        collect_season_files(&path, season, &mut matches);
                    }
                } else if is_media_file(&name) {
                    // Loose files at the show root only count when the
                    // filename carries its own season coordinate.
                    if let Some(FileEpisodes::Coded { season, episodes }) =
                        parse_episode_encoding(file_stem(&name))
                        && let Some(group) = EpisodeGroup::new(episodes)
                    {
                        matches.push(EpisodeMatch {
                            season,
                            episodes: group,
                            file: path,
                        });
                    }
                }
            }
        }

        seasons.extend(matches.iter().map(|m| m.season));
        let mut scan = ShowScan {
            seasons: seasons.into_iter().collect(),
            matches,
        };
        scan.sort();
        debug!(
            "scan of '{}' found {} file(s) across {} season(s)",
            self.show,
            scan.matches.len(),
            scan.seasons.len()
        );
        scan
    }
}

fn collect_season_files(dir: &Path, season: u32, matches: &mut Vec<EpisodeMatch>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("skipping unreadable season dir {}: {err}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_media_file(&name) {
            continue;
        }
        let group = match parse_episode_encoding(file_stem(&name)) {
            // The filename's own coordinates win for coded patterns; the
            // directory only decides for part-marker files.
            Some(FileEpisodes::Coded {
                season: coded_season,
                episodes,
            }) => EpisodeGroup::new(episodes).map(|group| (coded_season, group)),
            Some(FileEpisodes::Part { part }) => Some((season, EpisodeGroup::single(part))),
            None => None,
        };
        if let Some((season, episodes)) = group {
            matches.push(EpisodeMatch {
                season,
                episodes,
                file: path,
            });
        }
    }
}

fn file_stem(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}
