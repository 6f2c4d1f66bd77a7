//! Catalog access
//!
//! The backing catalog owns scenes and satellite entities (performers, studios,
//! tags, movies). The pipeline only talks to it through [`CatalogStore`]:
//! - `graphql_client`: the HTTP/GraphQL implementation used by the binary
//! - `memory`: an in-memory implementation used as a test double

pub mod graphql_client;
pub mod memory;

pub use graphql_client::{GraphQLCatalog, ServerConnection};
pub use memory::{CatalogOp, FailureMode, InMemoryCatalog};

use crate::error::CatalogError;
use crate::types::SourceOrigin;
use async_trait::async_trait;
use chrono::NaiveDate;
use nfoscene_common::{EntityKind, MetadataField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Placeholder replacing image data in previews and logs
pub const REDACTED_IMAGE: &str = "*** Base64 encoded image removed for readability ***";

// ============================================================================
// Catalog records
// ============================================================================

/// Tag reference carried by a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    pub name: String,
}

/// Scene membership in a movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneMovie {
    pub movie_id: String,
    pub scene_index: Option<u32>,
}

/// Existing catalog state of a scene (read once per run)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogScene {
    pub id: String,
    pub organized: bool,
    pub path: PathBuf,
    pub title: Option<String>,
    pub details: Option<String>,
    pub date: Option<NaiveDate>,
    pub rating: Option<u8>,
    pub url: Option<String>,
    pub studio_id: Option<String>,
    pub performer_ids: Vec<String>,
    pub tags: Vec<TagRef>,
    /// At most one movie association is tracked
    pub movie: Option<SceneMovie>,
}

impl CatalogScene {
    /// Scene with no metadata
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            organized: false,
            path: path.into(),
            title: None,
            details: None,
            date: None,
            rating: None,
            url: None,
            studio_id: None,
            performer_ids: Vec::new(),
            tags: Vec::new(),
            movie: None,
        }
    }

    pub fn tag_ids(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.id.as_str())
    }
}

/// Scene id with its tags, as returned by scene enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneTags {
    pub id: String,
    pub tags: Vec<TagRef>,
}

impl SceneTags {
    /// Whether a tag named `name` (case-insensitive) is attached
    pub fn has_tag_named(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.tags.iter().any(|t| t.name.to_lowercase() == name)
    }
}

/// Performer, studio, tag or movie as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CatalogEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Split the catalog's alias string (joined with `", "`)
    ///
    /// A bare comma belongs to the alias itself.
    pub fn parse_aliases(joined: &str) -> Vec<String> {
        joined
            .split(", ")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Supplementary movie fields sent on creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MovieDetails {
    pub studio_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub director: Option<String>,
    pub synopsis: Option<String>,
    pub rating: Option<u8>,
    pub url: Option<String>,
    pub front_image: Option<String>,
    pub back_image: Option<String>,
}

/// Creation request for a missing entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    pub name: String,
    /// Only used for movies
    pub movie: Option<MovieDetails>,
}

impl NewEntity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            movie: None,
        }
    }
}

// ============================================================================
// Update payload
// ============================================================================

/// Final write intent for one scene
///
/// `None` means "leave the catalog value untouched"; absent fields are not
/// serialized. The payload is either discarded (dry-run) or sent as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePayload {
    pub id: String,
    /// Winning source (not written to the catalog)
    #[serde(skip)]
    pub source: SourceOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer_ids: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<SceneMovie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organized: Option<bool>,
}

impl UpdatePayload {
    /// Empty payload (no change) for scene `id`
    pub fn new(id: impl Into<String>, source: SourceOrigin) -> Self {
        Self {
            id: id.into(),
            source,
            title: None,
            details: None,
            date: None,
            rating: None,
            url: None,
            studio_id: None,
            performer_ids: None,
            tag_ids: None,
            movie: None,
            cover_image: None,
            organized: None,
        }
    }

    /// Whether the payload carries a value for `field`
    ///
    /// Entity sets count as present when non-empty.
    pub fn has_field(&self, field: MetadataField) -> bool {
        match field {
            MetadataField::Title => self.title.is_some(),
            MetadataField::Details => self.details.is_some(),
            MetadataField::Date => self.date.is_some(),
            MetadataField::Rating => self.rating.is_some(),
            MetadataField::Url => self.url.is_some(),
            MetadataField::Studio => self.studio_id.is_some(),
            MetadataField::Performers => {
                self.performer_ids.as_ref().is_some_and(|ids| !ids.is_empty())
            }
            MetadataField::Tags => self.tag_ids.as_ref().is_some_and(|ids| !ids.is_empty()),
            MetadataField::Movie => self.movie.is_some(),
            MetadataField::Image => self.cover_image.is_some(),
            // not a scene field
            MetadataField::Director => false,
        }
    }

    /// Copy with image data replaced by a placeholder
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.cover_image.is_some() {
            copy.cover_image = Some(REDACTED_IMAGE.to_string());
        }
        copy
    }

    /// JSON preview with image data redacted
    pub fn preview_json(&self) -> String {
        serde_json::to_string(&self.redacted())
            .unwrap_or_else(|e| format!("<unserializable payload: {}>", e))
    }
}

// ============================================================================
// Catalog seam
// ============================================================================

/// Read/write access to scenes and satellite entities
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch a scene with its current metadata
    async fn find_scene(&self, id: &str) -> Result<Option<CatalogScene>, CatalogError>;

    /// Apply `payload`; returns the id of the updated scene
    async fn update_scene(&self, payload: &UpdatePayload) -> Result<Option<String>, CatalogError>;

    /// Entities of `kind` whose name (or alias) contains `name`, in catalog order
    async fn find_entities(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Vec<CatalogEntity>, CatalogError>;

    /// Create a new entity of `kind`
    async fn create_entity(
        &self,
        kind: EntityKind,
        entity: &NewEntity,
    ) -> Result<CatalogEntity, CatalogError>;

    /// Every scene with its tags, in catalog order
    async fn find_scenes(&self) -> Result<Vec<SceneTags>, CatalogError>;

    /// Id of the tag named exactly `name` (case-insensitive)
    async fn find_tag_by_name(&self, name: &str) -> Result<Option<String>, CatalogError> {
        let lowered = name.to_lowercase();
        let tags = self.find_entities(EntityKind::Tag, name).await?;
        Ok(tags
            .into_iter()
            .find(|t| t.name.to_lowercase() == lowered)
            .map(|t| t.id))
    }
}
