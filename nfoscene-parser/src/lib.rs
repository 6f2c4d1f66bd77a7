//! nfoscene-parser library interface
//!
//! Scene metadata reconciliation: NFO and filename sources, merge engine,
//! entity resolution and update planning against a media catalog. The binary
//! wires [`SceneParser`] to the GraphQL catalog; tests use the in-memory one.

pub mod catalog;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod invocation;
pub mod types;
pub mod workflow;

pub use crate::error::{CatalogError, PipelineError, PipelineResult};

use crate::catalog::{CatalogStore, GraphQLCatalog};
use crate::extractors::{FilenameExtractor, HttpImageFetcher, ImageOptions, NfoExtractor, NfoScope};
use crate::fusion::SourceChain;
use crate::invocation::{PluginInput, RunMode};
use crate::types::ImageFetcher;
use crate::workflow::{
    PluginProgress, ProgressReporter, ReloadOrchestrator, SceneOutcome, ScenePipeline,
};
use nfoscene_common::config::TomlConfig;
use nfoscene_common::{MetadataField, ReconciliationPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the ordered source chain for `policy`
///
/// Invalid filename patterns are a configuration error.
pub fn build_sources(
    policy: &ReconciliationPolicy,
    fetcher: Arc<dyn ImageFetcher>,
) -> PipelineResult<SourceChain> {
    let images = ImageOptions {
        enabled: !policy.is_blacklisted(MetadataField::Image),
        max_images: policy.max_images,
        fetcher,
    };

    let filename = FilenameExtractor::new(&policy.filename_patterns)
        .map_err(|e| PipelineError::Configuration(format!("filename_patterns: {}", e)))?;

    Ok(SourceChain::new(
        Arc::new(NfoExtractor::new(
            NfoScope::Folder,
            policy.folder_nfo_name.clone(),
            images.clone(),
        )),
        Arc::new(filename),
        Arc::new(NfoExtractor::new(
            NfoScope::Scene,
            policy.folder_nfo_name.clone(),
            images,
        )),
    ))
}

/// One configured run against a catalog
pub struct SceneParser {
    catalog: Arc<dyn CatalogStore>,
    pipeline: Arc<ScenePipeline>,
    progress: Arc<dyn ProgressReporter>,
}

impl SceneParser {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        policy: ReconciliationPolicy,
        fetcher: Arc<dyn ImageFetcher>,
        progress: Arc<dyn ProgressReporter>,
    ) -> PipelineResult<Self> {
        let sources = build_sources(&policy, fetcher)?;
        let pipeline = Arc::new(ScenePipeline::new(catalog.clone(), Arc::new(policy), sources));
        Ok(Self {
            catalog,
            pipeline,
            progress,
        })
    }

    pub fn pipeline(&self) -> &ScenePipeline {
        &self.pipeline
    }

    /// Process one scene (normal mode)
    pub async fn process_scene(&self, scene_id: &str) -> PipelineResult<SceneOutcome> {
        self.pipeline.process_scene(scene_id, None).await
    }

    /// Run `mode`, returning the success message
    pub async fn run(&self, mode: RunMode, scene_id: Option<&str>) -> PipelineResult<String> {
        match mode {
            RunMode::Normal => {
                let scene_id = scene_id.ok_or_else(|| {
                    PipelineError::Configuration("normal mode requires a scene id".to_string())
                })?;
                let outcome = self.process_scene(scene_id).await?;
                Ok(outcome_message(scene_id, &outcome))
            }
            RunMode::Reload => {
                let orchestrator = ReloadOrchestrator::new(
                    self.catalog.clone(),
                    self.pipeline.clone(),
                    self.progress.clone(),
                );
                Ok(orchestrator.run_reload().await?.message)
            }
        }
    }
}

fn outcome_message(scene_id: &str, outcome: &SceneOutcome) -> String {
    match outcome {
        SceneOutcome::Updated(_) => "Successful!".to_string(),
        SceneOutcome::DryRun(_) => format!("Dry run: scene {} not updated", scene_id),
        SceneOutcome::Unconfirmed(_) => {
            format!("Update of scene {} was not confirmed by the catalog", scene_id)
        }
        SceneOutcome::Skipped => format!("Skipped already organized scene {}", scene_id),
        SceneOutcome::NoMetadata => {
            format!("No matching NFO or filename pattern for scene {}", scene_id)
        }
    }
}

/// Execute a plugin invocation against the GraphQL catalog
pub async fn run_invocation(
    input: &PluginInput,
    config: &TomlConfig,
    dry_run: bool,
) -> PipelineResult<String> {
    let mode = input.mode()?;
    let scene_id = match mode {
        RunMode::Normal => Some(input.scene_id()?),
        RunMode::Reload => None,
    };

    let catalog = GraphQLCatalog::new(
        &input.server_connection,
        Duration::from_secs(config.catalog.timeout_secs),
    )?
    .with_path_rewrite(input.args.path_rewrite.clone());

    let fetcher = HttpImageFetcher::new(Duration::from_secs(config.catalog.image_timeout_secs))
        .map_err(|e| CatalogError::Transport(format!("image client: {}", e)))?;

    let policy = config.policy.clone().with_dry_run(dry_run);
    info!(mode = ?mode, dry_run = policy.dry_run, "Running scene parser");

    let parser = SceneParser::new(
        Arc::new(catalog),
        policy,
        Arc::new(fetcher),
        Arc::new(PluginProgress),
    )?;
    parser.run(mode, scene_id).await
}
