// Fusion Module - source merge, entity resolution and update planning
//
// Gathered records → MergeEngine (winning record + catalog values)
//                  → SceneUpdatePlanBuilder (EntityResolver per satellite kind)
//                  → UpdatePayload

pub mod entity_resolver;
pub mod metadata_merger;
pub mod update_planner;

pub use entity_resolver::{match_candidates, EntityResolver, MatchKind, MatchResult};
pub use metadata_merger::{GatheredRecords, MergeEngine, SourceChain, SOURCE_PRIORITY};
pub use update_planner::SceneUpdatePlanBuilder;
