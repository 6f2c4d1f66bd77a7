//! Source chain and merge engine
//!
//! # Extraction order
//! Sources run in a fixed order, each receiving the records produced so far
//! as its field-fallback defaults (most specific first):
//! 1. Folder NFO (no defaults)
//! 2. Filename pattern (defaults: folder)
//! 3. Scene NFO (defaults: filename, folder)
//!
//! # Merge
//! The winning scene-level record is the first present one in
//! [`SOURCE_PRIORITY`]. Its scalar fields override the catalog's current
//! values; an empty field keeps the catalog value. Blacklisted fields collapse
//! to absent whatever the sources or catalog hold.

use crate::catalog::CatalogScene;
use crate::extractors::extract_or_none;
use crate::types::{dedup_names, Fallbacks, MetadataRecord, MetadataSource, SourceOrigin};
use nfoscene_common::{MetadataField, ReconciliationPolicy};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Scene-level sources, highest priority first
pub const SOURCE_PRIORITY: [SourceOrigin; 2] =
    [SourceOrigin::StructuredFile, SourceOrigin::FilenamePattern];

// ============================================================================
// Source chain
// ============================================================================

/// Records gathered for one scene
#[derive(Debug, Clone, Default)]
pub struct GatheredRecords {
    pub folder: Option<MetadataRecord>,
    pub filename: Option<MetadataRecord>,
    pub structured: Option<MetadataRecord>,
}

impl GatheredRecords {
    /// Scene-level record produced by `origin`
    pub fn scene_record(&self, origin: SourceOrigin) -> Option<&MetadataRecord> {
        match origin {
            SourceOrigin::StructuredFile => self.structured.as_ref(),
            SourceOrigin::FilenamePattern => self.filename.as_ref(),
        }
    }
}

/// Ordered metadata sources of the pipeline
pub struct SourceChain {
    folder: Arc<dyn MetadataSource>,
    filename: Arc<dyn MetadataSource>,
    structured: Arc<dyn MetadataSource>,
}

impl SourceChain {
    pub fn new(
        folder: Arc<dyn MetadataSource>,
        filename: Arc<dyn MetadataSource>,
        structured: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            folder,
            filename,
            structured,
        }
    }

    /// Run every source for the scene file at `target`
    ///
    /// A failing source yields no record; later sources still run.
    pub async fn gather(&self, target: &Path) -> GatheredRecords {
        let folder = extract_or_none(self.folder.as_ref(), target, &Fallbacks::none()).await;

        let filename = extract_or_none(
            self.filename.as_ref(),
            target,
            &Fallbacks::from_records([folder.as_ref()]),
        )
        .await;

        let structured = extract_or_none(
            self.structured.as_ref(),
            target,
            &Fallbacks::from_records([filename.as_ref(), folder.as_ref()]),
        )
        .await;

        debug!(
            path = %target.display(),
            folder = folder.is_some(),
            filename = filename.is_some(),
            structured = structured.is_some(),
            "Metadata sources evaluated"
        );

        GatheredRecords {
            folder,
            filename,
            structured,
        }
    }
}

// ============================================================================
// Merge engine
// ============================================================================

/// Field-level reconciliation of source records with the catalog scene
#[derive(Debug, Clone, Default)]
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    /// First present record in [`SOURCE_PRIORITY`] order
    pub fn select_winner<'a>(&self, records: &'a GatheredRecords) -> Option<&'a MetadataRecord> {
        SOURCE_PRIORITY
            .iter()
            .find_map(|origin| records.scene_record(*origin))
    }

    /// Reconcile gathered records against `scene`
    ///
    /// Returns `None` when no scene-level source produced a record.
    pub fn reconcile(
        &self,
        records: &GatheredRecords,
        scene: &CatalogScene,
        policy: &ReconciliationPolicy,
    ) -> Option<MetadataRecord> {
        let Some(winner) = self.select_winner(records) else {
            info!(scene_id = %scene.id, "No matching NFO or filename pattern, nothing to apply");
            return None;
        };
        debug!(
            scene_id = %scene.id,
            source = %winner.source,
            file = %winner.file.display(),
            "Selected winning metadata record"
        );

        Some(merge_record(winner, records.folder.as_ref(), scene, policy))
    }
}

/// Merge `winner` with the catalog's current values
///
/// Catalog-backed scalars fall back to the catalog only; the folder record
/// fills director and movie, which the catalog scene does not carry.
pub fn merge_record(
    winner: &MetadataRecord,
    folder: Option<&MetadataRecord>,
    scene: &CatalogScene,
    policy: &ReconciliationPolicy,
) -> MetadataRecord {
    let defaults = Fallbacks::from_records([folder]);
    let keep = |field: MetadataField| !policy.is_blacklisted(field);

    let mut merged = MetadataRecord::new(winner.source, winner.file.clone());

    merged.title = winner
        .title
        .clone()
        .or_else(|| scene.title.clone())
        .filter(|_| keep(MetadataField::Title));
    merged.details = winner
        .details
        .clone()
        .or_else(|| scene.details.clone())
        .filter(|_| keep(MetadataField::Details));
    merged.date = winner
        .date
        .or(scene.date)
        .filter(|_| keep(MetadataField::Date));
    merged.rating = winner
        .rating
        .or(scene.rating)
        .filter(|_| keep(MetadataField::Rating));
    merged.url = winner
        .url
        .clone()
        .or_else(|| scene.url.clone())
        .filter(|_| keep(MetadataField::Url));

    merged.director = winner
        .director
        .clone()
        .or_else(|| defaults.first(|r| r.director.clone()))
        .filter(|_| keep(MetadataField::Director));
    merged.studio = winner
        .studio
        .clone()
        .filter(|_| keep(MetadataField::Studio));

    if keep(MetadataField::Performers) {
        merged.actors = dedup_names(winner.actors.iter().cloned());
    }
    if keep(MetadataField::Tags) {
        merged.tags = dedup_names(winner.tags.iter().cloned());
    }

    if keep(MetadataField::Movie) {
        merged.movie = winner
            .movie
            .clone()
            .or_else(|| defaults.first(|r| r.movie.clone()));
        merged.scene_index = winner.scene_index;
    }

    if keep(MetadataField::Image) {
        merged.cover_image = winner.cover_image.clone();
        merged.other_image = winner.other_image.clone();
    }

    merged
}
