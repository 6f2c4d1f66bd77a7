//! Core types and trait definitions for the scene metadata pipeline
//!
//! Defines the normalized [`MetadataRecord`] every source produces, the
//! field-fallback chain handed from one extraction step to the next, and the
//! two source-side seams:
//! - **MetadataSource:** structured-file (NFO) and filename-pattern producers
//! - **ImageFetcher:** best-effort remote image retrieval
//!
//! # Architecture
//! Per-scene workflow, strictly sequential:
//! folder NFO (defaults) → filename pattern → scene NFO → merge → resolve → commit

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Metadata records
// ============================================================================

/// Which producer created a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceOrigin {
    /// Structured sidecar description (Kodi-style NFO)
    #[serde(rename = "nfo")]
    StructuredFile,
    /// Regular expression applied to the scene file name
    #[serde(rename = "re")]
    FilenamePattern,
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::StructuredFile => write!(f, "nfo"),
            SourceOrigin::FilenamePattern => write!(f, "re"),
        }
    }
}

/// Normalized output of any metadata source
///
/// Produced fresh per extraction attempt and never mutated afterwards; merging
/// always builds a new record. Text fields are `None` rather than empty,
/// `actors` and `tags` hold no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub source: SourceOrigin,
    /// File the record was extracted from (NFO path or scene path)
    pub file: PathBuf,
    pub title: Option<String>,
    pub director: Option<String>,
    pub details: Option<String>,
    pub studio: Option<String>,
    pub date: Option<NaiveDate>,
    /// Performer names in extraction order
    pub actors: Vec<String>,
    /// Tag names, case as extracted
    pub tags: Vec<String>,
    /// Always within `0..=5`
    pub rating: Option<u8>,
    /// `data:` URI
    pub cover_image: Option<String>,
    /// `data:` URI (movie back cover)
    pub other_image: Option<String>,
    pub movie: Option<String>,
    pub scene_index: Option<u32>,
    pub url: Option<String>,
}

impl MetadataRecord {
    /// Create an empty record for `file`
    pub fn new(source: SourceOrigin, file: impl Into<PathBuf>) -> Self {
        Self {
            source,
            file: file.into(),
            title: None,
            director: None,
            details: None,
            studio: None,
            date: None,
            actors: Vec::new(),
            tags: Vec::new(),
            rating: None,
            cover_image: None,
            other_image: None,
            movie: None,
            scene_index: None,
            url: None,
        }
    }
}

// ============================================================================
// Field fallback chain
// ============================================================================

/// Ordered field-fallback defaults for one extraction step
///
/// Records are consulted in order (most specific first) and only for fields
/// the current source left empty. A fresh chain is built for every call.
#[derive(Debug, Clone, Default)]
pub struct Fallbacks<'a> {
    records: Vec<&'a MetadataRecord>,
}

impl<'a> Fallbacks<'a> {
    /// Empty chain
    pub fn none() -> Self {
        Self::default()
    }

    /// Chain from optional records, skipping absent ones
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a MetadataRecord>>,
    {
        Self {
            records: records.into_iter().flatten().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First value provided by any record of the chain
    pub fn first<T, F>(&self, field: F) -> Option<T>
    where
        F: Fn(&MetadataRecord) -> Option<T>,
    {
        self.records.iter().find_map(|r| field(r))
    }

    /// First non-empty name list of the chain
    pub fn actors(&self) -> Vec<String> {
        self.records
            .iter()
            .find(|r| !r.actors.is_empty())
            .map(|r| r.actors.clone())
            .unwrap_or_default()
    }

    /// Union of every record's tags
    pub fn tags(&self) -> Vec<String> {
        self.records.iter().flat_map(|r| r.tags.iter().cloned()).collect()
    }
}

// ============================================================================
// Normalization helpers
// ============================================================================

/// Trim text, mapping blank values to `None`
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Drop blank and duplicate names, keeping first-seen order
pub fn dedup_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut result: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() || result.iter().any(|n| n == name) {
            continue;
        }
        result.push(name.to_string());
    }
    result
}

/// Highest rating on the catalog scale
pub const MAX_RATING: u8 = 5;

/// Round a value already on the 0-5 scale
pub fn round_rating(value: f64) -> Option<u8> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, MAX_RATING as f64) as u8)
}

/// Rescale `value` out of `max` to the 0-5 scale (`8` of `10` → `4`)
pub fn scale_rating(value: f64, max: f64) -> Option<u8> {
    if max <= 0.0 {
        return None;
    }
    round_rating(value / (max / MAX_RATING as f64))
}

/// Parse an ISO date (`YYYY-MM-DD`)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Normalize a bare year to January 1st of that year
pub fn year_to_date(year: &str) -> Option<NaiveDate> {
    let year: i32 = year.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

// ============================================================================
// Source seams
// ============================================================================

/// Producer of [`MetadataRecord`]s for a scene file
///
/// Implementations return `Ok(None)` when they have nothing to say (missing
/// sidecar, no matching pattern). Errors are reported by the caller and
/// treated as "no record".
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Source name for log context
    fn name(&self) -> &'static str;

    /// Extract a record for the scene at `target`, filling empty fields from
    /// `fallbacks`
    async fn extract(
        &self,
        target: &Path,
        fallbacks: &Fallbacks<'_>,
    ) -> Result<Option<MetadataRecord>, ExtractionError>;
}

/// Best-effort remote image retrieval
///
/// Never fails past its timeout: any transport problem yields `None`.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>>;
}

/// Extraction error (recovered by the caller; the source yields no record)
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// I/O error (file read)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed structured content
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid filename pattern
    #[error("Pattern error: {0}")]
    Pattern(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_rating() {
        assert_eq!(scale_rating(8.0, 10.0), Some(4));
        assert_eq!(scale_rating(10.0, 10.0), Some(5));
        assert_eq!(scale_rating(0.0, 10.0), Some(0));
        assert_eq!(scale_rating(75.0, 100.0), Some(4));
        assert_eq!(scale_rating(5.0, 0.0), None);
    }

    #[test]
    fn test_round_rating_clamps() {
        assert_eq!(round_rating(3.6), Some(4));
        assert_eq!(round_rating(3.4), Some(3));
        assert_eq!(round_rating(9.0), Some(5));
        assert_eq!(round_rating(-1.0), Some(0));
        assert_eq!(round_rating(f64::NAN), None);
    }

    #[test]
    fn test_year_to_date() {
        assert_eq!(year_to_date("2019"), NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(year_to_date(" 2001 "), NaiveDate::from_ymd_opt(2001, 1, 1));
        assert_eq!(year_to_date("next year"), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2020-05-17"), NaiveDate::from_ymd_opt(2020, 5, 17));
        assert_eq!(parse_date("17/05/2020"), None);
    }

    #[test]
    fn test_dedup_names() {
        let names = vec![
            "Jane".to_string(),
            " ".to_string(),
            "Bob".to_string(),
            "Jane".to_string(),
            " Bob ".to_string(),
        ];
        assert_eq!(dedup_names(names), vec!["Jane", "Bob"]);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  x ")), Some("x".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_fallbacks_order_and_tag_union() {
        let mut folder = MetadataRecord::new(SourceOrigin::StructuredFile, "/a/folder.nfo");
        folder.studio = Some("Folder Studio".to_string());
        folder.director = Some("Folder Director".to_string());
        folder.tags = vec!["series".to_string()];

        let mut filename = MetadataRecord::new(SourceOrigin::FilenamePattern, "/a/scene.mp4");
        filename.studio = Some("File Studio".to_string());
        filename.tags = vec!["outdoor".to_string()];

        let chain = Fallbacks::from_records([Some(&filename), None, Some(&folder)]);
        assert_eq!(chain.first(|r| r.studio.clone()).as_deref(), Some("File Studio"));
        assert_eq!(
            chain.first(|r| r.director.clone()).as_deref(),
            Some("Folder Director")
        );
        assert_eq!(chain.tags(), vec!["outdoor", "series"]);
        assert!(chain.actors().is_empty());
        assert!(Fallbacks::none().is_empty());
    }
}
