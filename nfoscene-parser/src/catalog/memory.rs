//! In-memory catalog
//!
//! Substitutable [`CatalogStore`] holding scenes and entities in process. Name
//! searches behave like the real catalog's `INCLUDES` filter (case-insensitive
//! substring on name, or alias for performers and studios). Every update and
//! creation is recorded so callers can assert on what would have been written.

use super::{
    CatalogEntity, CatalogScene, CatalogStore, NewEntity, SceneMovie, SceneTags, TagRef,
    UpdatePayload,
};
use crate::error::CatalogError;
use async_trait::async_trait;
use nfoscene_common::EntityKind;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    scenes: Vec<CatalogScene>,
    entities: HashMap<EntityKind, Vec<CatalogEntity>>,
    next_id: u64,
    updates: Vec<UpdatePayload>,
    created: Vec<(EntityKind, NewEntity)>,
    fail_with: Option<FailureMode>,
    fail_on: Option<(CatalogOp, FailureMode)>,
    /// Record updates but answer without a scene id
    unconfirmed_updates: bool,
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}", 1000 + self.next_id)
    }

    fn check_failure(&self, op: CatalogOp) -> Result<(), CatalogError> {
        let mode = match self.fail_on {
            Some((failing_op, mode)) if failing_op == op => Some(mode),
            _ => self.fail_with,
        };
        match mode {
            Some(FailureMode::Transport) => {
                Err(CatalogError::Transport("connection refused".to_string()))
            }
            Some(FailureMode::Unauthorized) => Err(CatalogError::Unauthorized),
            None => Ok(()),
        }
    }

    fn tag_name(&self, id: &str) -> String {
        self.entities
            .get(&EntityKind::Tag)
            .and_then(|tags| tags.iter().find(|t| t.id == id))
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }
}

/// Failure injected into catalog calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Transport,
    Unauthorized,
}

/// Catalog operation targeted by [`InMemoryCatalog::failing_on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOp {
    FindScene,
    UpdateScene,
    FindEntities,
    CreateEntity,
    FindScenes,
}

/// In-memory [`CatalogStore`]
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene
    pub fn with_scene(mut self, scene: CatalogScene) -> Self {
        self.state.get_mut().scenes.push(scene);
        self
    }

    /// Add an entity of `kind`
    pub fn with_entity(mut self, kind: EntityKind, entity: CatalogEntity) -> Self {
        self.state
            .get_mut()
            .entities
            .entry(kind)
            .or_default()
            .push(entity);
        self
    }

    /// Make every call fail
    pub fn failing(mut self, mode: FailureMode) -> Self {
        self.state.get_mut().fail_with = Some(mode);
        self
    }

    /// Record updates without applying them; `update_scene` returns no id
    pub fn unconfirmed_updates(mut self) -> Self {
        self.state.get_mut().unconfirmed_updates = true;
        self
    }

    /// Make only `op` fail; the other calls keep working
    pub fn failing_on(mut self, op: CatalogOp, mode: FailureMode) -> Self {
        self.state.get_mut().fail_on = Some((op, mode));
        self
    }

    /// Payloads received by `update_scene`, in order
    pub async fn updates(&self) -> Vec<UpdatePayload> {
        self.state.lock().await.updates.clone()
    }

    /// Creation requests received by `create_entity`, in order
    pub async fn created(&self) -> Vec<(EntityKind, NewEntity)> {
        self.state.lock().await.created.clone()
    }

    /// Current entities of `kind`
    pub async fn entities(&self, kind: EntityKind) -> Vec<CatalogEntity> {
        self.state
            .lock()
            .await
            .entities
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Current state of scene `id`
    pub async fn scene(&self, id: &str) -> Option<CatalogScene> {
        self.state
            .lock()
            .await
            .scenes
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_scene(&self, id: &str) -> Result<Option<CatalogScene>, CatalogError> {
        let state = self.state.lock().await;
        state.check_failure(CatalogOp::FindScene)?;
        Ok(state.scenes.iter().find(|s| s.id == id).cloned())
    }

    async fn update_scene(&self, payload: &UpdatePayload) -> Result<Option<String>, CatalogError> {
        let mut state = self.state.lock().await;
        state.check_failure(CatalogOp::UpdateScene)?;
        state.updates.push(payload.clone());
        if state.unconfirmed_updates {
            return Ok(None);
        }

        let tag_refs: Option<Vec<TagRef>> = payload.tag_ids.as_ref().map(|ids| {
            ids.iter()
                .map(|id| TagRef {
                    id: id.clone(),
                    name: state.tag_name(id),
                })
                .collect()
        });

        let Some(scene) = state.scenes.iter_mut().find(|s| s.id == payload.id) else {
            return Ok(None);
        };

        if let Some(title) = &payload.title {
            scene.title = Some(title.clone());
        }
        if let Some(details) = &payload.details {
            scene.details = Some(details.clone());
        }
        if let Some(date) = payload.date {
            scene.date = Some(date);
        }
        if let Some(rating) = payload.rating {
            scene.rating = Some(rating);
        }
        if let Some(url) = &payload.url {
            scene.url = Some(url.clone());
        }
        if let Some(studio_id) = &payload.studio_id {
            scene.studio_id = Some(studio_id.clone());
        }
        if let Some(ids) = &payload.performer_ids {
            scene.performer_ids = ids.iter().cloned().collect();
        }
        if let Some(tags) = tag_refs {
            scene.tags = tags;
        }
        if let Some(movie) = &payload.movie {
            scene.movie = Some(SceneMovie {
                movie_id: movie.movie_id.clone(),
                scene_index: movie.scene_index,
            });
        }
        if payload.organized == Some(true) {
            scene.organized = true;
        }

        Ok(Some(scene.id.clone()))
    }

    async fn find_entities(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Vec<CatalogEntity>, CatalogError> {
        let state = self.state.lock().await;
        state.check_failure(CatalogOp::FindEntities)?;

        let needle = name.to_lowercase();
        let search_aliases = matches!(kind, EntityKind::Performer | EntityKind::Studio);
        Ok(state
            .entities
            .get(&kind)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| {
                        e.name.to_lowercase().contains(&needle)
                            || (search_aliases
                                && e.aliases.iter().any(|a| a.to_lowercase().contains(&needle)))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_entity(
        &self,
        kind: EntityKind,
        entity: &NewEntity,
    ) -> Result<CatalogEntity, CatalogError> {
        let mut state = self.state.lock().await;
        state.check_failure(CatalogOp::CreateEntity)?;

        let created = CatalogEntity::new(state.allocate_id(), entity.name.clone());
        state.created.push((kind, entity.clone()));
        state.entities.entry(kind).or_default().push(created.clone());
        Ok(created)
    }

    async fn find_scenes(&self) -> Result<Vec<SceneTags>, CatalogError> {
        let state = self.state.lock().await;
        state.check_failure(CatalogOp::FindScenes)?;
        Ok(state
            .scenes
            .iter()
            .map(|s| SceneTags {
                id: s.id.clone(),
                tags: s.tags.clone(),
            })
            .collect())
    }
}
