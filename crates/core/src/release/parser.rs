//! Release name parsing.
//!
//! Turns a normalized release title such as `Show.Name.S01E02.720p.HDTV-GRP`
//! into season, episodes, quality, release group and version, and resolves
//! the owning show.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use thiserror::Error;

use super::quality::Quality;
use crate::show::{Show, ShowDirectory};

/// Errors produced while parsing a release name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The name cannot be decomposed into season/episode.
    #[error("unable to parse {0} into a valid episode")]
    InvalidName(String),

    /// The series name does not belong to any known show.
    #[error("no known show matches {0}")]
    UnknownShow(String),
}

/// Optional context for a parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseHint<'a> {
    /// Owning show, when already known. Skips name-based resolution.
    pub show: Option<&'a Show>,
    /// Release group hint; switches to group-driven (anime) numbering.
    pub release_group: Option<&'a str>,
}

impl<'a> ParseHint<'a> {
    pub fn for_show(show: &'a Show) -> Self {
        Self {
            show: Some(show),
            release_group: None,
        }
    }

    pub fn with_release_group(mut self, group: &'a str) -> Self {
        self.release_group = Some(group);
        self
    }
}

/// Structured decomposition of a release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub series_name: String,
    pub show: Show,
    /// `None` for absolute-numbered releases.
    pub season: Option<u32>,
    pub episodes: Vec<u32>,
    pub quality: Quality,
    pub release_group: Option<String>,
    /// `-1` when the name carries no version tag.
    pub version: i32,
    /// Tags between the episode token and the release group.
    pub extra_info: Option<String>,
    pub is_anime: bool,
}

impl ParseResult {
    /// Extra info with any occurrence of the show's names removed.
    pub fn extra_info_no_name(&self) -> Option<String> {
        let mut extra = self.extra_info.clone()?;
        for name in self.show.names() {
            let pattern = name
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .map(regex_lite::escape)
                .collect::<Vec<_>>()
                .join(r"[ ._-]+");
            if pattern.is_empty() {
                continue;
            }
            if let Ok(re) = Regex::new(&format!(r"(?i)\b{pattern}\b")) {
                extra = re.replace_all(&extra, "").into_owned();
            }
        }

        let kept: Vec<&str> = extra
            .split(['.', ' ', '_'])
            .filter(|token| !token.is_empty())
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(kept.join("."))
        }
    }
}

/// Parser seam; the cache and matcher only depend on this trait.
pub trait NameParser: Send + Sync {
    fn parse(&self, name: &str, hint: &ParseHint<'_>) -> Result<ParseResult, ParseError>;
}

static STANDARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<series>.+?)[ ._-]+s(?P<season>\d{1,2})[ ._-]*e(?P<ep1>\d{1,3})(?:[ ._-]*e(?P<ep2>\d{1,3}))?(?:v(?P<version>\d{1,2}))?(?P<extra>(?:[ ._-].*)?)$",
    )
    .unwrap()
});

static FOV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<series>.+?)[ ._-]+(?P<season>\d{1,2})x(?P<ep1>\d{2,3})(?:v(?P<version>\d{1,2}))?(?P<extra>(?:[ ._-].*)?)$",
    )
    .unwrap()
});

static ANIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:\[(?P<group>[^\]]+)\][ ._]*)?(?P<series>.+?)[ ._]+-[ ._]+(?P<ep1>\d{1,4})(?:v(?P<version>\d{1,2}))?(?P<extra>(?:[ ._\[(].*)?)$",
    )
    .unwrap()
});

static TRAILING_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(?P<group>[A-Za-z0-9]+)$").unwrap());

static EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mkv|mp4|avi|ts|m4v|nzb|torrent)$").unwrap());

/// Regex-based parser for common scene and fansub naming schemes.
///
/// Supported forms: `Show.S01E02[E03]`, `Show.1x02` and the absolute
/// `[Group] Show - 12v2 [720p]`. With an anime hint the absolute form is
/// tried first.
pub struct SceneNameParser {
    shows: Arc<dyn ShowDirectory>,
}

impl SceneNameParser {
    pub fn new(shows: Arc<dyn ShowDirectory>) -> Self {
        Self { shows }
    }

    fn decompose(name: &str, anime_first: bool) -> Option<Decomposed> {
        let stripped = EXTENSION.replace(name, "");
        let candidates: [(&Regex, bool); 3] = if anime_first {
            [(&*ANIME, true), (&*STANDARD, false), (&*FOV, false)]
        } else {
            [(&*STANDARD, false), (&*FOV, false), (&*ANIME, true)]
        };

        candidates.iter().find_map(|(re, absolute)| {
            re.captures(&stripped)
                .and_then(|caps| Decomposed::from_captures(&caps, *absolute))
        })
    }
}

impl NameParser for SceneNameParser {
    fn parse(&self, name: &str, hint: &ParseHint<'_>) -> Result<ParseResult, ParseError> {
        let anime_first =
            hint.release_group.is_some() || hint.show.is_some_and(|s| s.is_anime);
        let parts = Self::decompose(name, anime_first)
            .ok_or_else(|| ParseError::InvalidName(name.to_string()))?;

        let show = match hint.show {
            Some(show) => show.clone(),
            None => self
                .shows
                .find_by_name(&parts.series)
                .ok_or_else(|| ParseError::UnknownShow(parts.series.clone()))?,
        };

        Ok(ParseResult {
            series_name: parts.series,
            is_anime: show.is_anime,
            show,
            season: parts.season,
            episodes: parts.episodes,
            quality: Quality::from_name(name),
            release_group: parts.group,
            version: parts.version,
            extra_info: parts.extra,
        })
    }
}

struct Decomposed {
    series: String,
    season: Option<u32>,
    episodes: Vec<u32>,
    version: i32,
    group: Option<String>,
    extra: Option<String>,
}

impl Decomposed {
    fn from_captures(caps: &Captures<'_>, absolute: bool) -> Option<Self> {
        let number = |key: &str| caps.name(key).and_then(|m| m.as_str().parse::<u32>().ok());

        let series = clean_series(caps.name("series")?.as_str());
        if series.is_empty() {
            return None;
        }

        let ep1 = number("ep1")?;
        let episodes = match number("ep2") {
            Some(ep2) if ep2 > ep1 => (ep1..=ep2).collect(),
            Some(ep2) if ep2 < ep1 => vec![ep2, ep1],
            _ => vec![ep1],
        };

        let season = if absolute { None } else { number("season") };
        let version = caps
            .name("version")
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .unwrap_or(-1);

        let mut extra = caps
            .name("extra")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let mut group = caps.name("group").map(|m| m.as_str().to_string());

        if group.is_none() {
            if let Some(m) = TRAILING_GROUP.captures(&extra) {
                group = m.name("group").map(|g| g.as_str().to_string());
                let cut = m.get(0).map(|whole| whole.start()).unwrap_or(extra.len());
                extra.truncate(cut);
            }
        }

        let extra = extra
            .trim_matches(|c: char| matches!(c, '.' | ' ' | '_' | '-'))
            .to_string();

        Some(Self {
            series,
            season,
            episodes,
            version,
            group,
            extra: if extra.is_empty() { None } else { Some(extra) },
        })
    }
}

fn clean_series(raw: &str) -> String {
    raw.replace(['.', '_'], " ")
        .trim_matches(|c: char| c == ' ' || c == '-')
        .to_string()
}
