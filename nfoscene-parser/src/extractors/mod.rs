//! Metadata sources
//!
//! Concrete [`MetadataSource`] implementations and the image helpers they use.
//!
//! # Sources
//! 1. **nfo_extractor** - Kodi-style NFO files (scene and folder scope)
//! 2. **filename_extractor** - Regular expressions over the scene file name
//!
//! # Error isolation
//! A failing source never fails the scene: [`extract_or_none`] reports the
//! error and the pipeline continues with the next-priority source.

pub mod filename_extractor;
pub mod image_fetcher;
pub mod nfo_document;
pub mod nfo_extractor;

pub use filename_extractor::FilenameExtractor;
pub use image_fetcher::{encode_data_uri, HttpImageFetcher, NoImageFetcher};
pub use nfo_extractor::{ImageOptions, NfoExtractor, NfoScope};

use crate::types::{Fallbacks, MetadataRecord, MetadataSource};
use std::path::Path;
use tracing::error;

/// Run `source`, reporting any extraction error as "no record"
pub async fn extract_or_none(
    source: &dyn MetadataSource,
    target: &Path,
    fallbacks: &Fallbacks<'_>,
) -> Option<MetadataRecord> {
    match source.extract(target, fallbacks).await {
        Ok(record) => record,
        Err(e) => {
            error!(
                source = source.name(),
                path = %target.display(),
                error = %e,
                "Could not extract metadata"
            );
            None
        }
    }
}
