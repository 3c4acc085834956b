//! Release quality codes and proper/repack classification.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Quality of a release.
///
/// Codes are stable and persisted; ordering follows the codes so a higher
/// variant is a better quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    None,
    SdTv,
    SdDvd,
    HdTv,
    RawHdTv,
    FullHdTv,
    HdWebDl,
    FullHdWebDl,
    HdBluRay,
    FullHdBluRay,
    Uhd4kWeb,
    Uhd4kBluRay,
    Unknown,
}

static UHD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(2160p|4k|uhd)\b").unwrap());
static FULL_HD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b1080[pi]\b").unwrap());
static HD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b720p\b").unwrap());
static BLURAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(blu-?ray|bd(rip|remux)?|brrip)\b").unwrap());
static WEB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(web[ ._-]?(dl|rip)?|amzn|nf|dsnp|hulu)\b").unwrap());
static RAW_HD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(1080i|mpeg-?2|raw-?hd)\b").unwrap());
static DVD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(dvd(rip)?|dvd-?r)\b").unwrap());
static SD_TV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(hdtv|pdtv|sdtv|dsr|tvrip|xvid|divx|480p|576p)\b").unwrap());

impl Quality {
    /// Persisted integer code.
    pub fn code(&self) -> u32 {
        match self {
            Quality::None => 0,
            Quality::SdTv => 1,
            Quality::SdDvd => 1 << 1,
            Quality::HdTv => 1 << 2,
            Quality::RawHdTv => 1 << 3,
            Quality::FullHdTv => 1 << 4,
            Quality::HdWebDl => 1 << 5,
            Quality::FullHdWebDl => 1 << 6,
            Quality::HdBluRay => 1 << 7,
            Quality::FullHdBluRay => 1 << 8,
            Quality::Uhd4kWeb => 1 << 10,
            Quality::Uhd4kBluRay => 1 << 12,
            Quality::Unknown => 1 << 15,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::all().iter().copied().find(|q| q.code() == code)
    }

    pub fn all() -> &'static [Quality] {
        &[
            Quality::None,
            Quality::SdTv,
            Quality::SdDvd,
            Quality::HdTv,
            Quality::RawHdTv,
            Quality::FullHdTv,
            Quality::HdWebDl,
            Quality::FullHdWebDl,
            Quality::HdBluRay,
            Quality::FullHdBluRay,
            Quality::Uhd4kWeb,
            Quality::Uhd4kBluRay,
            Quality::Unknown,
        ]
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Quality::None => "N/A",
            Quality::SdTv => "SD TV",
            Quality::SdDvd => "SD DVD",
            Quality::HdTv => "HD TV",
            Quality::RawHdTv => "RawHD TV",
            Quality::FullHdTv => "1080p HD TV",
            Quality::HdWebDl => "720p WEB-DL",
            Quality::FullHdWebDl => "1080p WEB-DL",
            Quality::HdBluRay => "720p BluRay",
            Quality::FullHdBluRay => "1080p BluRay",
            Quality::Uhd4kWeb => "2160p UHD 4K WEB",
            Quality::Uhd4kBluRay => "2160p UHD 4K BluRay",
            Quality::Unknown => "Unknown",
        }
    }

    /// Derive the quality from the tags in a release name.
    pub fn from_name(name: &str) -> Self {
        let bluray = BLURAY.is_match(name);
        let web = WEB.is_match(name);

        if UHD.is_match(name) {
            return if bluray {
                Quality::Uhd4kBluRay
            } else {
                Quality::Uhd4kWeb
            };
        }
        if RAW_HD.is_match(name) && !bluray && !web {
            return Quality::RawHdTv;
        }
        if FULL_HD.is_match(name) {
            return if bluray {
                Quality::FullHdBluRay
            } else if web {
                Quality::FullHdWebDl
            } else {
                Quality::FullHdTv
            };
        }
        if HD.is_match(name) {
            return if bluray {
                Quality::HdBluRay
            } else if web {
                Quality::HdWebDl
            } else {
                Quality::HdTv
            };
        }
        if DVD.is_match(name) || (bluray && !web) {
            return Quality::SdDvd;
        }
        if SD_TV.is_match(name) || web {
            return Quality::SdTv;
        }
        Quality::Unknown
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

static PROPER_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(proper|repack|rerip|real)\b").unwrap());
static REPACK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(repack|rerip)\b").unwrap());

/// Priority tier of a re-released version of previously seen content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProperLevel {
    pub level: u32,
    pub is_repack: bool,
}

impl ProperLevel {
    /// Classify a release from its extra info, version and category.
    ///
    /// Anime is tiered by version (`v3` beats `v2`); everything else by the
    /// number of proper/repack/real tags in the extra info.
    pub fn compute(extra_info: Option<&str>, version: i32, is_anime: bool) -> Self {
        if is_anime {
            let level = if version > 1 { (version - 1) as u32 } else { 0 };
            return Self {
                level,
                is_repack: false,
            };
        }

        match extra_info {
            Some(extra) => Self {
                level: PROPER_TAGS.find_iter(extra).count() as u32,
                is_repack: REPACK_TAGS.is_match(extra),
            },
            None => Self::default(),
        }
    }
}
