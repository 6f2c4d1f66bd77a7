//! Entity resolution
//!
//! Matches free-text names (performers, studios, tags, movies) against the
//! catalog and optionally creates the missing ones.
//!
//! # Matching
//! - **Pass 1 (direct):** case-insensitive equality with the canonical name.
//!   The first candidate in catalog order wins; every further equal name is
//!   counted for ambiguity reporting only.
//! - **Pass 2 (alias):** only when pass 1 found nothing and the policy allows
//!   alias search for the kind and name. Same first-wins/count-all rule over
//!   every alias. Matches are never counted across passes.
//!
//! # Creation
//! Resolution followed by creation is a critical section: the resolver holds
//! one lock for the whole find-then-create sequence and remembers what it
//! created, so a name is never created twice within a run.

use crate::catalog::{CatalogEntity, CatalogStore, NewEntity};
use crate::error::CatalogError;
use nfoscene_common::{EntityKind, ReconciliationPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How a name was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    None,
    Direct,
    Alias,
}

/// Outcome of matching one name against catalog candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched_id: Option<String>,
    pub kind: MatchKind,
    /// Candidates that matched within the deciding pass
    pub match_count: usize,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            matched_id: None,
            kind: MatchKind::None,
            match_count: 0,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.match_count > 1
    }
}

/// Two-pass match of `name` against `candidates` (in catalog order)
pub fn match_candidates(
    kind: EntityKind,
    name: &str,
    candidates: &[CatalogEntity],
    policy: &ReconciliationPolicy,
) -> MatchResult {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return MatchResult::none();
    }

    let direct = count_matches(candidates.iter().map(|c| (&c.id, c.name.as_str())), &needle);
    if let Some((id, count)) = direct {
        return MatchResult {
            matched_id: Some(id),
            kind: MatchKind::Direct,
            match_count: count,
        };
    }

    if !policy.alias_search_for(kind, name) {
        return MatchResult::none();
    }

    let aliases = candidates
        .iter()
        .flat_map(|c| c.aliases.iter().map(move |a| (&c.id, a.as_str())));
    match count_matches(aliases, &needle) {
        Some((id, count)) => MatchResult {
            matched_id: Some(id),
            kind: MatchKind::Alias,
            match_count: count,
        },
        None => MatchResult::none(),
    }
}

/// First matching id and the number of matches
fn count_matches<'a, I>(names: I, needle: &str) -> Option<(String, usize)>
where
    I: Iterator<Item = (&'a String, &'a str)>,
{
    let mut first: Option<&String> = None;
    let mut count = 0;
    for (id, name) in names {
        if name.trim().to_lowercase() == needle {
            first.get_or_insert(id);
            count += 1;
        }
    }
    first.map(|id| (id.clone(), count))
}

/// Catalog-backed resolver for every entity kind
pub struct EntityResolver {
    catalog: Arc<dyn CatalogStore>,
    policy: Arc<ReconciliationPolicy>,
    /// Entities created during this run, keyed by kind and lowercased name
    created: Mutex<HashMap<(EntityKind, String), CatalogEntity>>,
}

impl EntityResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>, policy: Arc<ReconciliationPolicy>) -> Self {
        Self {
            catalog,
            policy,
            created: Mutex::new(HashMap::new()),
        }
    }

    /// Match `name` against the catalog entities of `kind`
    pub async fn resolve(&self, kind: EntityKind, name: &str) -> Result<MatchResult, CatalogError> {
        let candidates = self.catalog.find_entities(kind, name).await?;
        let result = match_candidates(kind, name, &candidates, &self.policy);

        match &result.matched_id {
            Some(id) => {
                debug!(
                    kind = %kind,
                    name = %name,
                    id = %id,
                    match_kind = ?result.kind,
                    match_count = result.match_count,
                    "Matched existing entity"
                );
                if result.is_ambiguous() {
                    warn!(
                        kind = %kind,
                        name = %name,
                        id = %id,
                        match_count = result.match_count,
                        "Linked to the first of {} matching {}s; check for duplicates and their aliases",
                        result.match_count,
                        kind
                    );
                }
            }
            None => debug!(kind = %kind, name = %name, "No matching entity"),
        }

        Ok(result)
    }

    /// Create `entity` when the policy allows it
    pub async fn create_if_allowed(
        &self,
        kind: EntityKind,
        entity: &NewEntity,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        if !self.policy.may_create(kind) {
            if kind == EntityKind::Tag {
                debug!(
                    name = %entity.name,
                    dry_run = self.policy.dry_run,
                    "Tag creation prevented by policy"
                );
            } else {
                info!(
                    kind = %kind,
                    name = %entity.name,
                    dry_run = self.policy.dry_run,
                    "Entity creation prevented by policy"
                );
            }
            return Ok(None);
        }

        let created = self.catalog.create_entity(kind, entity).await?;
        info!(kind = %kind, name = %created.name, id = %created.id, "Created missing entity");
        Ok(Some(created))
    }

    /// Id of the entity named `entity.name`, creating it if missing and allowed
    ///
    /// Returns `None` when the name is dropped (no match, creation disallowed).
    pub async fn resolve_or_create(
        &self,
        kind: EntityKind,
        entity: NewEntity,
    ) -> Result<Option<String>, CatalogError> {
        let name = entity.name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let key = (kind, name.to_lowercase());

        let mut created = self.created.lock().await;
        if let Some(existing) = created.get(&key) {
            return Ok(Some(existing.id.clone()));
        }

        let result = self.resolve(kind, name).await?;
        if let Some(id) = result.matched_id {
            return Ok(Some(id));
        }

        match self.create_if_allowed(kind, &entity).await? {
            Some(new_entity) => {
                let id = new_entity.id.clone();
                created.insert(key, new_entity);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    fn studio(id: &str, name: &str, aliases: &[&str]) -> CatalogEntity {
        CatalogEntity::new(id, name).with_aliases(aliases)
    }

    #[test]
    fn test_direct_match_counts_every_hit() {
        let candidates = vec![
            studio("1", "Acme Pictures", &[]),
            studio("2", "ACME", &[]),
            studio("3", "acme", &[]),
        ];
        let result = match_candidates(
            EntityKind::Studio,
            "Acme",
            &candidates,
            &ReconciliationPolicy::default(),
        );
        assert_eq!(result.matched_id.as_deref(), Some("2"));
        assert_eq!(result.kind, MatchKind::Direct);
        assert_eq!(result.match_count, 2);
        assert!(result.is_ambiguous());
    }

    #[test]
    fn test_alias_pass_skipped_after_direct_match() {
        let candidates = vec![
            studio("1", "Acme", &[]),
            studio("2", "Other", &["Acme"]),
            studio("3", "Third", &["acme"]),
        ];
        let result = match_candidates(
            EntityKind::Studio,
            "acme",
            &candidates,
            &ReconciliationPolicy::default(),
        );
        assert_eq!(result.matched_id.as_deref(), Some("1"));
        assert_eq!(result.match_count, 1);
    }

    #[test]
    fn test_alias_match() {
        let candidates = vec![studio("1", "Acme Pictures", &["Acme", "AP"])];
        let result = match_candidates(
            EntityKind::Studio,
            "ap",
            &candidates,
            &ReconciliationPolicy::default(),
        );
        assert_eq!(result.matched_id.as_deref(), Some("1"));
        assert_eq!(result.kind, MatchKind::Alias);
    }

    #[test]
    fn test_single_name_performer_alias_gating() {
        let candidates = vec![
            CatalogEntity::new("1", "Alexandra Smith").with_aliases(&["Alex"]),
            CatalogEntity::new("2", "Alexander Doe").with_aliases(&["Alex Doe"]),
        ];
        let mut policy = ReconciliationPolicy::default();

        let single = match_candidates(EntityKind::Performer, "Alex", &candidates, &policy);
        assert_eq!(single, MatchResult::none());

        let full = match_candidates(EntityKind::Performer, "Alex Doe", &candidates, &policy);
        assert_eq!(full.matched_id.as_deref(), Some("2"));
        assert_eq!(full.kind, MatchKind::Alias);

        policy.alias_search.ignore_single_name_performer_aliases = false;
        let allowed = match_candidates(EntityKind::Performer, "Alex", &candidates, &policy);
        assert_eq!(allowed.matched_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_tags_never_alias_match() {
        let candidates = vec![CatalogEntity::new("1", "Outdoors").with_aliases(&["outside"])];
        let result = match_candidates(
            EntityKind::Tag,
            "outside",
            &candidates,
            &ReconciliationPolicy::default(),
        );
        assert_eq!(result.kind, MatchKind::None);
    }

    #[tokio::test]
    async fn test_create_when_missing() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let resolver = EntityResolver::new(catalog.clone(), Arc::new(ReconciliationPolicy::default()));

        let id = resolver
            .resolve_or_create(EntityKind::Tag, NewEntity::named("fresh"))
            .await
            .unwrap();
        assert!(id.is_some());
        assert_eq!(catalog.created().await.len(), 1);

        // second request for the same name reuses the created entity
        let again = resolver
            .resolve_or_create(EntityKind::Tag, NewEntity::named("FRESH"))
            .await
            .unwrap();
        assert_eq!(again, id);
        assert_eq!(catalog.created().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_drops_missing_names() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let policy = ReconciliationPolicy::default().with_dry_run(true);
        let resolver = EntityResolver::new(catalog.clone(), Arc::new(policy));

        let id = resolver
            .resolve_or_create(EntityKind::Performer, NewEntity::named("Nobody Known"))
            .await
            .unwrap();
        assert_eq!(id, None);
        assert!(catalog.created().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_creation_per_kind() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut policy = ReconciliationPolicy::default();
        policy.create_missing.studios = false;
        let resolver = EntityResolver::new(catalog.clone(), Arc::new(policy));

        let id = resolver
            .resolve_or_create(EntityKind::Studio, NewEntity::named("Acme"))
            .await
            .unwrap();
        assert_eq!(id, None);
    }
}
