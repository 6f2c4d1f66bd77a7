//! NFO (structured sidecar) metadata source
//!
//! Reads Kodi-style NFO files stored next to the scene files:
//! - **Scene scope:** `<scene path without extension>.nfo`
//! - **Folder scope:** `<scene dir>/folder.nfo` (name configurable), used as
//!   defaults for every scene of the directory
//!
//! A missing NFO is not an error; malformed XML is reported as
//! [`ExtractionError::Parse`] and recovered by the caller.
//!
//! # Field rules
//! First non-empty element wins, then the fallback chain:
//! - title: `title` | `originaltitle` | `sorttitle` (never from fallbacks)
//! - details: `plot` | `outline` | `tagline`
//! - date: `premiered` | `year` (normalized to January 1st)
//! - rating: `userrating` when > 0 | `ratings/rating` scaled by its `max`
//! - tags: `tag` ∪ `genre` ∪ fallback tags
//! - movie: `set/name` | bare `set` text (folder scope: the folder title)

use super::image_fetcher::encode_data_uri;
use super::nfo_document::NfoDocument;
use crate::types::{
    dedup_names, parse_date, round_rating, scale_rating, year_to_date, ExtractionError,
    Fallbacks, ImageFetcher, MetadataRecord, MetadataSource, SourceOrigin,
};
use async_trait::async_trait;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Which NFO of a scene is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfoScope {
    Scene,
    Folder,
}

/// Image loading options
#[derive(Clone)]
pub struct ImageOptions {
    /// Images are ignored entirely when false (image field blacklisted)
    pub enabled: bool,
    pub max_images: usize,
    pub fetcher: Arc<dyn ImageFetcher>,
}

/// Structured-file [`MetadataSource`]
pub struct NfoExtractor {
    scope: NfoScope,
    folder_nfo_name: String,
    images: ImageOptions,
}

impl NfoExtractor {
    pub fn new(scope: NfoScope, folder_nfo_name: impl Into<String>, images: ImageOptions) -> Self {
        Self {
            scope,
            folder_nfo_name: folder_nfo_name.into(),
            images,
        }
    }

    /// NFO file read for the scene at `target`
    pub fn nfo_path(&self, target: &Path) -> PathBuf {
        match self.scope {
            NfoScope::Scene => target.with_extension("nfo"),
            NfoScope::Folder => target
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&self.folder_nfo_name),
        }
    }

    fn build_record(
        &self,
        nfo_path: &Path,
        doc: &NfoDocument,
        fallbacks: &Fallbacks<'_>,
        images: Vec<String>,
    ) -> MetadataRecord {
        let mut record = MetadataRecord::new(SourceOrigin::StructuredFile, nfo_path);

        record.title = doc.first_text(&["title", "originaltitle", "sorttitle"]);
        record.director = doc
            .text("director")
            .or_else(|| fallbacks.first(|r| r.director.clone()));
        record.details = doc
            .first_text(&["plot", "outline", "tagline"])
            .or_else(|| fallbacks.first(|r| r.details.clone()));
        record.studio = doc
            .text("studio")
            .or_else(|| fallbacks.first(|r| r.studio.clone()));
        record.date = extract_date(doc).or_else(|| fallbacks.first(|r| r.date));

        let actors = dedup_names(doc.all_text("actor/name"));
        record.actors = if actors.is_empty() {
            fallbacks.actors()
        } else {
            actors
        };

        record.tags = dedup_names(
            doc.all_text("tag")
                .into_iter()
                .chain(doc.all_text("genre"))
                .chain(fallbacks.tags()),
        );

        record.rating = extract_rating(doc).or_else(|| fallbacks.first(|r| r.rating));

        let mut images = images.into_iter();
        record.cover_image = images.next();
        record.other_image = images.next();

        let set_name = doc.first_text(&["set/name", "set"]);
        record.movie = match self.scope {
            NfoScope::Folder => set_name.or_else(|| record.title.clone()),
            NfoScope::Scene => set_name.or_else(|| fallbacks.first(|r| r.movie.clone())),
        };
        record.scene_index = doc
            .text("set/index")
            .and_then(|i| i.parse().ok())
            .or_else(|| fallbacks.first(|r| r.scene_index));
        record.url = doc.text("url");

        record
    }

    /// Images beside the NFO, else downloaded `<thumb>` URLs
    async fn load_images(&self, nfo_path: &Path, doc: &NfoDocument) -> Vec<String> {
        if !self.images.enabled || self.images.max_images == 0 {
            return Vec::new();
        }

        let local = read_local_images(nfo_path, self.images.max_images).await;
        if !local.is_empty() {
            return local.iter().filter_map(|b| encode_data_uri(b)).collect();
        }

        let mut urls = doc.all_text_where("thumb", "aspect", "landscape");
        if urls.is_empty() {
            urls = doc.all_text_where("thumb", "aspect", "poster");
        }
        if urls.is_empty() {
            urls = doc.all_text("thumb");
        }
        urls.truncate(self.images.max_images);

        let mut encoded = Vec::new();
        for url in urls {
            if let Some(uri) = self
                .images
                .fetcher
                .fetch(&url)
                .await
                .and_then(|bytes| encode_data_uri(&bytes))
            {
                encoded.push(uri);
            }
        }
        encoded
    }
}

#[async_trait]
impl MetadataSource for NfoExtractor {
    fn name(&self) -> &'static str {
        match self.scope {
            NfoScope::Scene => "nfo",
            NfoScope::Folder => "folder_nfo",
        }
    }

    async fn extract(
        &self,
        target: &Path,
        fallbacks: &Fallbacks<'_>,
    ) -> Result<Option<MetadataRecord>, ExtractionError> {
        let nfo_path = self.nfo_path(target);
        if !tokio::fs::try_exists(&nfo_path).await.unwrap_or(false) {
            debug!(path = %nfo_path.display(), "No NFO file");
            return Ok(None);
        }

        debug!(path = %nfo_path.display(), "Parsing NFO");
        let content = tokio::fs::read_to_string(&nfo_path).await?;
        let doc = NfoDocument::parse(&content)?;

        let images = self.load_images(&nfo_path, &doc).await;
        Ok(Some(self.build_record(&nfo_path, &doc, fallbacks, images)))
    }
}

fn extract_date(doc: &NfoDocument) -> Option<chrono::NaiveDate> {
    doc.text("premiered")
        .and_then(|d| parse_date(&d))
        .or_else(|| doc.text("year").and_then(|y| year_to_date(&y)))
}

fn extract_rating(doc: &NfoDocument) -> Option<u8> {
    let user_rating = doc
        .text("userrating")
        .and_then(|r| r.parse::<f64>().ok())
        .and_then(round_rating)
        .filter(|r| *r > 0);
    if user_rating.is_some() {
        return user_rating;
    }

    let max: f64 = doc.attribute("ratings/rating", "max")?.trim().parse().ok()?;
    let value: f64 = doc.text("ratings/rating/value")?.parse().ok()?;
    scale_rating(value, max)
}

/// Image files named after the NFO stem, sorted by name
async fn read_local_images(nfo_path: &Path, max: usize) -> Vec<Vec<u8>> {
    let (Some(dir), Some(stem)) = (nfo_path.parent(), nfo_path.file_stem()) else {
        return Vec::new();
    };
    let pattern = format!(
        r"^{}(-landscape|-thumb|-poster|-cover)?\d{{0,2}}\.(jpe?g|png)$",
        regex::escape(&stem.to_string_lossy())
    );
    let Ok(pattern) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
        return Vec::new();
    };

    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return Vec::new();
    };
    let mut names: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let matches = path
            .file_name()
            .map(|n| pattern.is_match(&n.to_string_lossy()))
            .unwrap_or(false);
        if matches {
            names.push(path);
        }
    }
    names.sort();

    let mut images = Vec::new();
    for path in names.into_iter().take(max) {
        match tokio::fs::read(&path).await {
            Ok(bytes) => images.push(bytes),
            Err(e) => debug!(path = %path.display(), error = %e, "Unreadable image file"),
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::image_fetcher::NoImageFetcher;

    fn no_images() -> ImageOptions {
        ImageOptions {
            enabled: true,
            max_images: 2,
            fetcher: Arc::new(NoImageFetcher),
        }
    }

    #[test]
    fn test_nfo_paths() {
        let scene = NfoExtractor::new(NfoScope::Scene, "folder.nfo", no_images());
        let folder = NfoExtractor::new(NfoScope::Folder, "folder.nfo", no_images());
        let target = Path::new("/media/set/clip.one.mp4");
        assert_eq!(scene.nfo_path(target), PathBuf::from("/media/set/clip.one.nfo"));
        assert_eq!(folder.nfo_path(target), PathBuf::from("/media/set/folder.nfo"));
    }

    #[test]
    fn test_user_rating_wins_over_ratings_block() {
        let doc = NfoDocument::parse(
            r#"<movie><userrating>3.6</userrating>
               <ratings><rating max="10"><value>2</value></rating></ratings></movie>"#,
        )
        .unwrap();
        assert_eq!(extract_rating(&doc), Some(4));
    }

    #[test]
    fn test_scaled_rating_when_user_rating_is_zero() {
        let doc = NfoDocument::parse(
            r#"<movie><userrating>0</userrating>
               <ratings><rating max="10"><value>8</value></rating></ratings></movie>"#,
        )
        .unwrap();
        assert_eq!(extract_rating(&doc), Some(4));
    }

    #[test]
    fn test_user_rating_above_scale_is_clamped() {
        let doc = NfoDocument::parse("<movie><userrating>9</userrating></movie>").unwrap();
        assert_eq!(extract_rating(&doc), Some(5));
    }

    #[test]
    fn test_premiered_wins_over_year() {
        let doc = NfoDocument::parse(
            "<movie><year>2001</year><premiered>2003-04-05</premiered></movie>",
        )
        .unwrap();
        assert_eq!(extract_date(&doc), chrono::NaiveDate::from_ymd_opt(2003, 4, 5));

        let doc = NfoDocument::parse("<movie><year>2001</year></movie>").unwrap();
        assert_eq!(extract_date(&doc), chrono::NaiveDate::from_ymd_opt(2001, 1, 1));
    }

    #[test]
    fn test_folder_title_becomes_movie_name() {
        let extractor = NfoExtractor::new(NfoScope::Folder, "folder.nfo", no_images());
        let doc = NfoDocument::parse("<movie><title>The Saga</title></movie>").unwrap();
        let record = extractor.build_record(
            Path::new("/m/folder.nfo"),
            &doc,
            &Fallbacks::none(),
            Vec::new(),
        );
        assert_eq!(record.movie.as_deref(), Some("The Saga"));
    }
}
