//! Scene processing workflows
//!
//! - **Normal mode:** one scene, processed by [`ScenePipeline`]
//! - **Reload mode:** every scene carrying the marker tag, driven by
//!   [`ReloadOrchestrator`] with progress reporting
//!
//! Scenes are processed strictly one at a time.

pub mod progress;
pub mod reload_orchestrator;
pub mod scene_pipeline;

pub use progress::{PluginProgress, ProgressReporter, RecordingProgress, TracingProgress};
pub use reload_orchestrator::{ReloadOrchestrator, ReloadSummary};
pub use scene_pipeline::{SceneOutcome, ScenePipeline};
