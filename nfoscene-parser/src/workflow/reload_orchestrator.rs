//! Reload orchestration
//!
//! Batch mode: every catalog scene carrying the marker tag is run through the
//! single-scene pipeline, in catalog order, one at a time. The marker tag is
//! looked up before any scene is touched; a missing marker aborts the run.

use super::progress::ProgressReporter;
use super::scene_pipeline::{SceneOutcome, ScenePipeline};
use crate::catalog::CatalogStore;
use crate::error::{PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Result of a reload run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub scanned: usize,
    pub reloaded: usize,
    /// Reloaded scenes whose update the catalog did not confirm
    pub unconfirmed: usize,
    pub message: String,
}

/// Batch driver for reload mode
pub struct ReloadOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    pipeline: Arc<ScenePipeline>,
    progress: Arc<dyn ProgressReporter>,
}

impl ReloadOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        pipeline: Arc<ScenePipeline>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            catalog,
            pipeline,
            progress,
        }
    }

    /// Reload every scene tagged with the configured marker tag
    pub async fn run_reload(&self) -> PipelineResult<ReloadSummary> {
        let tag_name = self
            .pipeline
            .policy()
            .reload_tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                error!("Reload cancelled: no reload tag configured");
                PipelineError::Configuration("reload_tag is not configured".to_string())
            })?
            .to_string();

        let Some(marker_id) = self.catalog.find_tag_by_name(&tag_name).await? else {
            error!(tag = %tag_name, "Reload cancelled: reload tag not found in the catalog");
            return Err(PipelineError::Configuration(format!(
                "reload tag '{}' not found in the catalog",
                tag_name
            )));
        };

        let scenes = self.catalog.find_scenes().await?;
        let total = scenes.len();
        debug!(count = total, "Found scenes in the catalog");

        let mut reloaded = 0;
        let mut unconfirmed = 0;
        for (index, scene) in scenes.iter().enumerate() {
            if scene.has_tag_named(&tag_name) {
                debug!(scene_id = %scene.id, "Scene is tagged to be reloaded");
                let outcome = self
                    .pipeline
                    .process_scene(&scene.id, Some(marker_id.as_str()))
                    .await?;
                if matches!(outcome, SceneOutcome::Unconfirmed(_)) {
                    unconfirmed += 1;
                }
                reloaded += 1;
            }
            self.progress.report((index + 1) as f64 / total as f64);
        }

        let message = if reloaded == 0 {
            format!("Scanned {} scenes. None had the '{}' tag.", total, tag_name)
        } else if unconfirmed > 0 {
            format!(
                "Reloaded {} of {} scanned scenes. {} update(s) not confirmed by the catalog.",
                reloaded, total, unconfirmed
            )
        } else {
            format!("Reloaded {} of {} scanned scenes.", reloaded, total)
        };
        info!(scanned = total, reloaded, unconfirmed, "{}", message);

        Ok(ReloadSummary {
            scanned: total,
            reloaded,
            unconfirmed,
            message,
        })
    }
}
