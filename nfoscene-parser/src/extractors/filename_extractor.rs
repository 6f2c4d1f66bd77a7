//! Filename-pattern metadata source
//!
//! Matches the scene file stem against an ordered list of regular expressions
//! with named groups. The first matching pattern produces the record; groups
//! it does not capture fall back to the defaults chain.
//!
//! Recognized groups: `title`, `studio`, `date`, `year`, `performers`, `tags`,
//! `movie`, `index`, `director`, `url`. `performers` and `tags` hold lists
//! separated by `,` or `&`.

use crate::types::{
    dedup_names, non_empty, parse_date, year_to_date, ExtractionError, Fallbacks,
    MetadataRecord, MetadataSource, SourceOrigin,
};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::path::Path;
use tracing::debug;

/// Filename-pattern [`MetadataSource`]
#[derive(Debug, Clone)]
pub struct FilenameExtractor {
    patterns: Vec<Regex>,
}

impl FilenameExtractor {
    /// Compile `patterns`; any invalid expression is rejected
    pub fn new(patterns: &[String]) -> Result<Self, ExtractionError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ExtractionError::Pattern(format!("'{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn build_record(
        &self,
        target: &Path,
        caps: &Captures<'_>,
        fallbacks: &Fallbacks<'_>,
    ) -> MetadataRecord {
        let group = |name: &str| non_empty(caps.name(name).map(|m| m.as_str()));
        let mut record = MetadataRecord::new(SourceOrigin::FilenamePattern, target);

        record.title = group("title").or_else(|| fallbacks.first(|r| r.title.clone()));
        record.studio = group("studio").or_else(|| fallbacks.first(|r| r.studio.clone()));
        record.director = group("director").or_else(|| fallbacks.first(|r| r.director.clone()));
        record.details = fallbacks.first(|r| r.details.clone());
        record.date = group("date")
            .and_then(|d| parse_date(&d))
            .or_else(|| group("year").and_then(|y| year_to_date(&y)))
            .or_else(|| fallbacks.first(|r| r.date));
        record.rating = fallbacks.first(|r| r.rating);

        let actors = group("performers").map(|p| split_list(&p)).unwrap_or_default();
        record.actors = if actors.is_empty() {
            fallbacks.actors()
        } else {
            actors
        };

        let tags = group("tags").map(|t| split_list(&t)).unwrap_or_default();
        record.tags = dedup_names(tags.into_iter().chain(fallbacks.tags()));

        record.movie = group("movie").or_else(|| fallbacks.first(|r| r.movie.clone()));
        record.scene_index = group("index")
            .and_then(|i| i.parse().ok())
            .or_else(|| fallbacks.first(|r| r.scene_index));
        record.url = group("url").or_else(|| fallbacks.first(|r| r.url.clone()));

        record
    }
}

#[async_trait]
impl MetadataSource for FilenameExtractor {
    fn name(&self) -> &'static str {
        "filename"
    }

    async fn extract(
        &self,
        target: &Path,
        fallbacks: &Fallbacks<'_>,
    ) -> Result<Option<MetadataRecord>, ExtractionError> {
        let Some(stem) = target.file_stem().map(|s| s.to_string_lossy()) else {
            return Ok(None);
        };

        for (index, pattern) in self.patterns.iter().enumerate() {
            if let Some(caps) = pattern.captures(&stem) {
                debug!(file = %stem, pattern = index, "Filename pattern matched");
                return Ok(Some(self.build_record(target, &caps, fallbacks)));
            }
        }

        debug!(file = %stem, "No filename pattern matched");
        Ok(None)
    }
}

/// Split a `,`/`&` separated name list
fn split_list(value: &str) -> Vec<String> {
    dedup_names(value.split([',', '&']).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn extractor(patterns: &[&str]) -> FilenameExtractor {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        FilenameExtractor::new(&patterns).unwrap()
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = FilenameExtractor::new(&["(?P<title>".to_string()]);
        assert!(matches!(result, Err(ExtractionError::Pattern(_))));
    }

    #[tokio::test]
    async fn test_default_pattern() {
        let policy = nfoscene_common::ReconciliationPolicy::default();
        let extractor = FilenameExtractor::new(&policy.filename_patterns).unwrap();

        let record = extractor
            .extract(
                Path::new("/m/Acme - 2021-03-04 - Night Out [Jane Doe, John Roe & Ann].mp4"),
                &Fallbacks::none(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.source, SourceOrigin::FilenamePattern);
        assert_eq!(record.studio.as_deref(), Some("Acme"));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2021, 3, 4));
        assert_eq!(record.title.as_deref(), Some("Night Out"));
        assert_eq!(record.actors, vec!["Jane Doe", "John Roe", "Ann"]);
    }

    #[tokio::test]
    async fn test_first_matching_pattern_wins() {
        let extractor = extractor(&[r"^(?P<title>\w+)$", r"^(?P<studio>\w+)_(?P<title>.+)$"]);
        let record = extractor
            .extract(Path::new("/m/Acme_Some Title.mkv"), &Fallbacks::none())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.studio.as_deref(), Some("Acme"));
        assert_eq!(record.title.as_deref(), Some("Some Title"));
    }

    #[tokio::test]
    async fn test_unmatched_groups_use_fallbacks() {
        let mut folder = MetadataRecord::new(SourceOrigin::StructuredFile, "/m/folder.nfo");
        folder.studio = Some("Folder Studio".to_string());
        folder.tags = vec!["series".to_string()];
        folder.movie = Some("Saga".to_string());

        let extractor = extractor(&[r"^(?P<title>.+?) \((?P<year>\d{4})\) \[(?P<tags>[^\]]+)\]$"]);
        let record = extractor
            .extract(
                Path::new("/m/Trip (2019) [beach & sun].mp4"),
                &Fallbacks::from_records([Some(&folder)]),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.title.as_deref(), Some("Trip"));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(record.studio.as_deref(), Some("Folder Studio"));
        assert_eq!(record.movie.as_deref(), Some("Saga"));
        assert_eq!(record.tags, vec!["beach", "sun", "series"]);
    }

    #[tokio::test]
    async fn test_no_match_yields_none() {
        let extractor = extractor(&[r"^\d+$"]);
        let record = extractor
            .extract(Path::new("/m/clip.mp4"), &Fallbacks::none())
            .await
            .unwrap();
        assert!(record.is_none());
    }
}
