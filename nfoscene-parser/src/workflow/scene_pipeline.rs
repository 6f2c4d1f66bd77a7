//! Single-scene pipeline
//!
//! fetch scene → gather sources → merge → plan → commit (or preview)
//!
//! Each scene is atomic from the caller's point of view: either its payload
//! is computed and (outside dry-run) sent in one update, or nothing is
//! written. Catalog failures abort the scene and are returned to the caller.

use crate::catalog::{CatalogStore, UpdatePayload};
use crate::error::{PipelineError, PipelineResult};
use crate::fusion::{EntityResolver, MergeEngine, SceneUpdatePlanBuilder, SourceChain};
use nfoscene_common::ReconciliationPolicy;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What happened to one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneOutcome {
    /// Already organized and `skip_organized` is set
    Skipped,
    /// No scene-level source produced a record
    NoMetadata,
    /// Payload sent to the catalog
    Updated(UpdatePayload),
    /// Payload computed but not sent
    DryRun(UpdatePayload),
    /// Payload sent but the catalog did not answer with the scene id
    Unconfirmed(UpdatePayload),
}

impl SceneOutcome {
    pub fn payload(&self) -> Option<&UpdatePayload> {
        match self {
            SceneOutcome::Updated(p)
            | SceneOutcome::DryRun(p)
            | SceneOutcome::Unconfirmed(p) => Some(p),
            SceneOutcome::Skipped | SceneOutcome::NoMetadata => None,
        }
    }
}

/// Per-scene orchestration of sources, merge and planning
pub struct ScenePipeline {
    catalog: Arc<dyn CatalogStore>,
    policy: Arc<ReconciliationPolicy>,
    sources: SourceChain,
    merge: MergeEngine,
    planner: SceneUpdatePlanBuilder,
}

impl ScenePipeline {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        policy: Arc<ReconciliationPolicy>,
        sources: SourceChain,
    ) -> Self {
        let resolver = Arc::new(EntityResolver::new(catalog.clone(), policy.clone()));
        let planner = SceneUpdatePlanBuilder::new(resolver, policy.clone());
        Self {
            catalog,
            policy,
            sources,
            merge: MergeEngine::new(),
            planner,
        }
    }

    pub fn policy(&self) -> &ReconciliationPolicy {
        &self.policy
    }

    /// Process scene `scene_id`
    ///
    /// `marker_tag_id` is set in reload mode and removed from the scene tags.
    pub async fn process_scene(
        &self,
        scene_id: &str,
        marker_tag_id: Option<&str>,
    ) -> PipelineResult<SceneOutcome> {
        let scene = self
            .catalog
            .find_scene(scene_id)
            .await?
            .ok_or_else(|| PipelineError::SceneNotFound(scene_id.to_string()))?;

        if scene.organized && self.policy.skip_organized {
            info!(scene_id = %scene.id, "Skipping already organized scene");
            return Ok(SceneOutcome::Skipped);
        }

        let records = self.sources.gather(&scene.path).await;
        let Some(merged) = self.merge.reconcile(&records, &scene, &self.policy) else {
            debug!(scene_id = %scene.id, "No matching NFO or filename pattern, nothing done");
            return Ok(SceneOutcome::NoMetadata);
        };

        let payload = self
            .planner
            .build(&merged, records.folder.as_ref(), &scene, marker_tag_id)
            .await?;

        if self.policy.dry_run {
            info!(
                scene_id = %scene.id,
                "Dry mode. Would have updated scene based on: {}",
                payload.preview_json()
            );
            return Ok(SceneOutcome::DryRun(payload));
        }

        match self.catalog.update_scene(&payload).await? {
            Some(updated) if updated == scene.id => {
                info!(
                    scene_id = %scene.id,
                    file = %merged.file.display(),
                    "Successfully updated scene"
                );
                Ok(SceneOutcome::Updated(payload))
            }
            returned => {
                error!(
                    scene_id = %scene.id,
                    returned_id = ?returned,
                    "Error updating scene based on: {}",
                    payload.preview_json()
                );
                Ok(SceneOutcome::Unconfirmed(payload))
            }
        }
    }
}
