//! Test Helper Utilities
//!
//! Shared fixtures for nfoscene-parser integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use nfoscene_common::{EntityKind, ReconciliationPolicy};
use nfoscene_parser::catalog::{CatalogEntity, CatalogScene, InMemoryCatalog, TagRef};
use nfoscene_parser::fusion::SourceChain;
use nfoscene_parser::types::{
    ExtractionError, Fallbacks, ImageFetcher, MetadataRecord, MetadataSource, SourceOrigin,
};
use nfoscene_parser::workflow::ScenePipeline;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Source returning a fixed record (or nothing)
pub struct FixedSource {
    record: Option<MetadataRecord>,
}

impl FixedSource {
    pub fn returning(record: Option<MetadataRecord>) -> Arc<Self> {
        Arc::new(Self { record })
    }
}

#[async_trait]
impl MetadataSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn extract(
        &self,
        _target: &Path,
        _fallbacks: &Fallbacks<'_>,
    ) -> Result<Option<MetadataRecord>, ExtractionError> {
        Ok(self.record.clone())
    }
}

/// Source that always fails to parse
pub struct BrokenSource;

#[async_trait]
impl MetadataSource for BrokenSource {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn extract(
        &self,
        _target: &Path,
        _fallbacks: &Fallbacks<'_>,
    ) -> Result<Option<MetadataRecord>, ExtractionError> {
        Err(ExtractionError::Parse("mismatched tag".to_string()))
    }
}

/// Image fetcher serving canned bytes per URL and recording requests
#[derive(Default)]
pub struct StubImageFetcher {
    images: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl StubImageFetcher {
    pub fn with_image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StubImageFetcher {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        self.images.get(url).cloned()
    }
}

pub fn structured_record(title: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(SourceOrigin::StructuredFile, "/media/scene.nfo");
    record.title = Some(title.to_string());
    record
}

pub fn filename_record(title: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(SourceOrigin::FilenamePattern, "/media/scene.mp4");
    record.title = Some(title.to_string());
    record
}

pub fn tag(id: &str, name: &str) -> TagRef {
    TagRef {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Scene "1" at `/media/scene.mp4`
pub fn scene() -> CatalogScene {
    CatalogScene::new("1", PathBuf::from("/media/scene.mp4"))
}

/// Catalog holding `scene` and tag entities for its tags
pub fn catalog_with(scene: CatalogScene) -> InMemoryCatalog {
    let tags: Vec<TagRef> = scene.tags.clone();
    tags.into_iter().fold(InMemoryCatalog::new().with_scene(scene), |catalog, t| {
        catalog.with_entity(EntityKind::Tag, CatalogEntity::new(t.id, t.name))
    })
}

/// Pipeline over fixed folder/filename/structured records
pub fn pipeline(
    catalog: Arc<InMemoryCatalog>,
    policy: ReconciliationPolicy,
    folder: Option<MetadataRecord>,
    filename: Option<MetadataRecord>,
    structured: Option<MetadataRecord>,
) -> ScenePipeline {
    let sources = SourceChain::new(
        FixedSource::returning(folder),
        FixedSource::returning(filename),
        FixedSource::returning(structured),
    );
    ScenePipeline::new(catalog, Arc::new(policy), sources)
}
