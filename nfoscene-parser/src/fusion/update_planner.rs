//! Scene update planning
//!
//! Turns a merged [`MetadataRecord`] into the [`UpdatePayload`] sent to the
//! catalog: resolves every satellite entity, unions performer and tag ids
//! with the scene's existing ones and decides the `organized` flag.
//!
//! Absent payload fields mean "no change". Blacklisted fields are never
//! filled, so a blacklisted field can never be written.

use super::entity_resolver::EntityResolver;
use crate::catalog::{CatalogScene, MovieDetails, NewEntity, SceneMovie, UpdatePayload};
use crate::error::CatalogError;
use crate::types::{MetadataRecord, SourceOrigin};
use nfoscene_common::{EntityKind, MetadataField, ReconciliationPolicy};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds the update payload of one scene
pub struct SceneUpdatePlanBuilder {
    resolver: Arc<EntityResolver>,
    policy: Arc<ReconciliationPolicy>,
}

impl SceneUpdatePlanBuilder {
    pub fn new(resolver: Arc<EntityResolver>, policy: Arc<ReconciliationPolicy>) -> Self {
        Self { resolver, policy }
    }

    fn keep(&self, field: MetadataField) -> bool {
        !self.policy.is_blacklisted(field)
    }

    /// Build the payload for `scene`
    ///
    /// `marker_tag_id` is the reload marker (reload mode only); it is removed
    /// from the resulting tag set.
    pub async fn build(
        &self,
        merged: &MetadataRecord,
        folder: Option<&MetadataRecord>,
        scene: &CatalogScene,
        marker_tag_id: Option<&str>,
    ) -> Result<UpdatePayload, CatalogError> {
        let mut payload = UpdatePayload::new(scene.id.clone(), merged.source);

        if self.keep(MetadataField::Title) {
            payload.title = merged.title.clone();
        }
        if self.keep(MetadataField::Details) {
            payload.details = merged.details.clone();
        }
        if self.keep(MetadataField::Date) {
            payload.date = merged.date;
        }
        if self.keep(MetadataField::Rating) {
            payload.rating = merged.rating;
        }
        if self.keep(MetadataField::Url) {
            payload.url = merged.url.clone();
        }

        if self.keep(MetadataField::Performers) {
            let resolved = self.resolve_performers(&merged.actors).await?;
            let existing = scene.performer_ids.iter().map(String::as_str);
            payload.performer_ids = union_ids(resolved, existing, None);
        }

        if self.keep(MetadataField::Tags) {
            let resolved = self.resolve_tags(&merged.tags).await?;
            payload.tag_ids = union_ids(resolved, scene.tag_ids(), marker_tag_id);
        } else if marker_tag_id.is_some() {
            warn!(
                scene_id = %scene.id,
                "Tags are blacklisted, the reload marker tag stays on the scene"
            );
        }

        // Only the studio named by the sources goes to a new movie
        let resolved_studio = match &merged.studio {
            Some(name) if self.keep(MetadataField::Studio) => {
                self.resolver
                    .resolve_or_create(EntityKind::Studio, NewEntity::named(name.clone()))
                    .await?
            }
            _ => None,
        };

        if self.keep(MetadataField::Movie) {
            payload.movie = self
                .resolve_movie(merged, folder, scene, resolved_studio.clone())
                .await?;
        }

        if self.keep(MetadataField::Studio) {
            payload.studio_id = resolved_studio.or_else(|| scene.studio_id.clone());
        }

        if self.keep(MetadataField::Image) {
            payload.cover_image = merged.cover_image.clone();
        }

        if self.should_set_organized(&payload) {
            payload.organized = Some(true);
        }

        debug!(scene_id = %scene.id, source = %payload.source, "Scene update planned");
        Ok(payload)
    }

    /// Whether the payload qualifies for the organized flag
    pub fn should_set_organized(&self, payload: &UpdatePayload) -> bool {
        self.policy.set_organized_nfo
            && payload.source == SourceOrigin::StructuredFile
            && self
                .policy
                .set_organized_only_if
                .iter()
                .all(|field| payload.has_field(*field))
    }

    async fn resolve_performers(&self, actors: &[String]) -> Result<Vec<String>, CatalogError> {
        let mut ids = Vec::new();
        for actor in actors {
            if self.policy.is_performer_blacklisted(actor) {
                debug!(name = %actor, "Skipping blacklisted performer");
                continue;
            }
            if let Some(id) = self
                .resolver
                .resolve_or_create(EntityKind::Performer, NewEntity::named(actor.clone()))
                .await?
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn resolve_tags(&self, tags: &[String]) -> Result<Vec<String>, CatalogError> {
        let mut ids = Vec::new();
        for tag in tags {
            if self.policy.is_tag_blacklisted(tag) {
                debug!(name = %tag, "Skipping blacklisted tag");
                continue;
            }
            if let Some(id) = self
                .resolver
                .resolve_or_create(EntityKind::Tag, NewEntity::named(tag.clone()))
                .await?
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn resolve_movie(
        &self,
        merged: &MetadataRecord,
        folder: Option<&MetadataRecord>,
        scene: &CatalogScene,
        studio_id: Option<String>,
    ) -> Result<Option<SceneMovie>, CatalogError> {
        let existing = scene.movie.as_ref();

        let resolved = match &merged.movie {
            Some(name) => {
                let entity = NewEntity {
                    name: name.clone(),
                    movie: Some(self.movie_details(merged, folder, studio_id)),
                };
                self.resolver
                    .resolve_or_create(EntityKind::Movie, entity)
                    .await?
            }
            None => None,
        };

        let Some(movie_id) = resolved.or_else(|| existing.map(|m| m.movie_id.clone())) else {
            return Ok(None);
        };

        Ok(Some(SceneMovie {
            movie_id,
            scene_index: merged
                .scene_index
                .or_else(|| existing.and_then(|m| m.scene_index)),
        }))
    }

    /// Creation fields of a new movie, folder values first
    fn movie_details(
        &self,
        merged: &MetadataRecord,
        folder: Option<&MetadataRecord>,
        studio_id: Option<String>,
    ) -> MovieDetails {
        let pick = |field: MetadataField, get: &dyn Fn(&MetadataRecord) -> Option<String>| {
            if !self.keep(field) {
                return None;
            }
            folder.and_then(get).or_else(|| get(merged))
        };

        MovieDetails {
            studio_id: studio_id.filter(|_| self.keep(MetadataField::Studio)),
            date: folder
                .and_then(|f| f.date)
                .or(merged.date)
                .filter(|_| self.keep(MetadataField::Date)),
            director: pick(MetadataField::Director, &|r: &MetadataRecord| r.director.clone()),
            synopsis: pick(MetadataField::Details, &|r: &MetadataRecord| r.details.clone()),
            rating: folder
                .and_then(|f| f.rating)
                .or(merged.rating)
                .filter(|_| self.keep(MetadataField::Rating)),
            url: pick(MetadataField::Url, &|r: &MetadataRecord| r.url.clone()),
            front_image: pick(MetadataField::Image, &|r: &MetadataRecord| r.cover_image.clone()),
            back_image: pick(MetadataField::Image, &|r: &MetadataRecord| r.other_image.clone()),
        }
    }
}

/// Union of resolved and existing ids, without the marker id
///
/// `None` when there is nothing to write. An empty set is returned when the
/// marker was the only id, so that it still gets removed.
fn union_ids<'a, I>(
    resolved: Vec<String>,
    existing: I,
    marker: Option<&str>,
) -> Option<BTreeSet<String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut ids: BTreeSet<String> = resolved.into_iter().collect();
    ids.extend(existing.map(str::to_string));
    let removed = marker.is_some_and(|m| ids.remove(m));
    (removed || !ids.is_empty()).then_some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_ids_removes_marker() {
        let existing = ["9".to_string(), "3".to_string()];
        let ids = union_ids(
            vec!["1".to_string(), "3".to_string()],
            existing.iter().map(String::as_str),
            Some("9"),
        )
        .unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn test_union_of_nothing_is_no_change() {
        assert_eq!(union_ids(Vec::new(), std::iter::empty(), None), None);
    }

    #[test]
    fn test_lone_marker_is_still_removed() {
        let existing = ["9".to_string()];
        let ids = union_ids(Vec::new(), existing.iter().map(String::as_str), Some("9"));
        assert_eq!(ids, Some(BTreeSet::new()));
    }
}
