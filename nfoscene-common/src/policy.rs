//! Reconciliation policy
//!
//! Operator-configured rules that gate every mutation the scene pipeline may
//! perform: blacklisted fields, creation of missing catalog entities, alias
//! searching, dry-run and the "organized" flag rules.
//!
//! The policy is deserialized once from the `[policy]` table of the TOML
//! configuration and is read-only afterwards. Components receive it by
//! reference; nothing reads configuration from ambient state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default marker tag used to select scenes for a reload run
pub const DEFAULT_RELOAD_TAG: &str = "_NFO_RELOAD";

/// Default file name of the folder-level NFO
pub const DEFAULT_FOLDER_NFO_NAME: &str = "folder.nfo";

/// Default maximum number of images (front/back cover) kept per record
pub const DEFAULT_MAX_IMAGES: usize = 2;

/// Satellite entity kinds stored independently of scenes in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Performer,
    Studio,
    Tag,
    Movie,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Performer => "performer",
            EntityKind::Studio => "studio",
            EntityKind::Tag => "tag",
            EntityKind::Movie => "movie",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scene fields that can be blacklisted or required for the organized flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Title,
    Details,
    Date,
    Rating,
    Url,
    Director,
    Studio,
    Performers,
    Tags,
    Movie,
    #[serde(alias = "cover_image")]
    Image,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Details => "details",
            MetadataField::Date => "date",
            MetadataField::Rating => "rating",
            MetadataField::Url => "url",
            MetadataField::Director => "director",
            MetadataField::Studio => "studio",
            MetadataField::Performers => "performers",
            MetadataField::Tags => "tags",
            MetadataField::Movie => "movie",
            MetadataField::Image => "image",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind permission to create entities missing from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateMissing {
    pub performers: bool,
    pub studios: bool,
    pub tags: bool,
    pub movies: bool,
}

impl Default for CreateMissing {
    fn default() -> Self {
        Self {
            performers: true,
            studios: true,
            tags: true,
            movies: true,
        }
    }
}

/// Alias search switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasSearch {
    /// Global switch; per-kind switches are ignored when false
    pub enabled: bool,
    pub performers: bool,
    pub studios: bool,
    /// Single-token performer names ("Alex") never alias-match while true
    pub ignore_single_name_performer_aliases: bool,
}

impl Default for AliasSearch {
    fn default() -> Self {
        Self {
            enabled: true,
            performers: true,
            studios: true,
            ignore_single_name_performer_aliases: true,
        }
    }
}

/// Immutable per-run reconciliation policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationPolicy {
    /// Compute payloads but never write to the catalog or create entities
    pub dry_run: bool,
    /// Fields never written, whatever the sources or catalog contain
    pub blacklist: BTreeSet<MetadataField>,
    /// Tag names dropped before resolution (case-insensitive)
    pub blacklisted_tags: Vec<String>,
    /// Performer names dropped before resolution (case-insensitive)
    pub blacklisted_performers: Vec<String>,
    pub create_missing: CreateMissing,
    pub alias_search: AliasSearch,
    /// Marker tag selecting scenes for a reload run
    pub reload_tag: Option<String>,
    /// Leave scenes already flagged organized untouched
    pub skip_organized: bool,
    /// Set `organized` when the winning source is a structured file
    pub set_organized_nfo: bool,
    /// Fields that must be present in the payload before `organized` is set
    pub set_organized_only_if: Vec<MetadataField>,
    /// File name of the folder-level NFO next to the scene files
    pub folder_nfo_name: String,
    /// Regular expressions (named groups) matched against scene file stems
    pub filename_patterns: Vec<String>,
    /// Maximum number of images kept per record
    pub max_images: usize,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            dry_run: false,
            blacklist: BTreeSet::new(),
            blacklisted_tags: Vec::new(),
            blacklisted_performers: Vec::new(),
            create_missing: CreateMissing::default(),
            alias_search: AliasSearch::default(),
            reload_tag: Some(DEFAULT_RELOAD_TAG.to_string()),
            skip_organized: true,
            set_organized_nfo: true,
            set_organized_only_if: vec![MetadataField::Title],
            folder_nfo_name: DEFAULT_FOLDER_NFO_NAME.to_string(),
            filename_patterns: vec![
                r"^(?P<studio>[^\[\]]+?)\s+-\s+(?P<date>\d{4}-\d{2}-\d{2})\s+-\s+(?P<title>.+?)(?:\s+\[(?P<performers>[^\]]+)\])?$"
                    .to_string(),
            ],
            max_images: DEFAULT_MAX_IMAGES,
        }
    }
}

impl ReconciliationPolicy {
    /// Whether `field` must never be written
    pub fn is_blacklisted(&self, field: MetadataField) -> bool {
        self.blacklist.contains(&field)
    }

    /// Whether missing entities of `kind` may be created (never in dry-run)
    pub fn may_create(&self, kind: EntityKind) -> bool {
        if self.dry_run {
            return false;
        }
        match kind {
            EntityKind::Performer => self.create_missing.performers,
            EntityKind::Studio => self.create_missing.studios,
            EntityKind::Tag => self.create_missing.tags,
            EntityKind::Movie => self.create_missing.movies,
        }
    }

    /// Whether the alias pass runs for `kind` and `name`
    ///
    /// Tags and movies have no alias pass. Performer names without a space are
    /// excluded unless the single-name exclusion is switched off.
    pub fn alias_search_for(&self, kind: EntityKind, name: &str) -> bool {
        if !self.alias_search.enabled {
            return false;
        }
        match kind {
            EntityKind::Performer => {
                self.alias_search.performers
                    && (!self.alias_search.ignore_single_name_performer_aliases
                        || name.trim().contains(' '))
            }
            EntityKind::Studio => self.alias_search.studios,
            EntityKind::Tag | EntityKind::Movie => false,
        }
    }

    pub fn is_tag_blacklisted(&self, name: &str) -> bool {
        contains_ignore_case(&self.blacklisted_tags, name)
    }

    pub fn is_performer_blacklisted(&self, name: &str) -> bool {
        contains_ignore_case(&self.blacklisted_performers, name)
    }

    /// Returns a copy with dry-run forced on; used for the CLI override
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = self.dry_run || dry_run;
        self
    }
}

fn contains_ignore_case(names: &[String], name: &str) -> bool {
    let name = name.to_lowercase();
    names.iter().any(|n| n.to_lowercase() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = ReconciliationPolicy::default();
        assert!(!policy.dry_run);
        assert!(policy.blacklist.is_empty());
        assert_eq!(policy.reload_tag.as_deref(), Some(DEFAULT_RELOAD_TAG));
        assert_eq!(policy.folder_nfo_name, "folder.nfo");
        assert_eq!(policy.max_images, 2);
        assert!(policy.alias_search.ignore_single_name_performer_aliases);
    }

    #[test]
    fn test_dry_run_blocks_creation() {
        let policy = ReconciliationPolicy::default();
        assert!(policy.may_create(EntityKind::Studio));

        let dry = policy.with_dry_run(true);
        for kind in [
            EntityKind::Performer,
            EntityKind::Studio,
            EntityKind::Tag,
            EntityKind::Movie,
        ] {
            assert!(!dry.may_create(kind), "{} creation must be blocked", kind);
        }
    }

    #[test]
    fn test_single_name_performer_alias_exclusion() {
        let mut policy = ReconciliationPolicy::default();
        assert!(!policy.alias_search_for(EntityKind::Performer, "Alex"));
        assert!(policy.alias_search_for(EntityKind::Performer, "Alex Doe"));

        policy.alias_search.ignore_single_name_performer_aliases = false;
        assert!(policy.alias_search_for(EntityKind::Performer, "Alex"));
    }

    #[test]
    fn test_alias_search_global_switch() {
        let mut policy = ReconciliationPolicy::default();
        policy.alias_search.enabled = false;
        assert!(!policy.alias_search_for(EntityKind::Studio, "Acme"));
        assert!(!policy.alias_search_for(EntityKind::Performer, "Alex Doe"));
    }

    #[test]
    fn test_no_alias_pass_for_tags_and_movies() {
        let policy = ReconciliationPolicy::default();
        assert!(!policy.alias_search_for(EntityKind::Tag, "Outdoor Scene"));
        assert!(!policy.alias_search_for(EntityKind::Movie, "Some Movie"));
    }

    #[test]
    fn test_name_blacklists_ignore_case() {
        let policy = ReconciliationPolicy {
            blacklisted_tags: vec!["4K".to_string()],
            blacklisted_performers: vec!["Unknown".to_string()],
            ..Default::default()
        };
        assert!(policy.is_tag_blacklisted("4k"));
        assert!(!policy.is_tag_blacklisted("hd"));
        assert!(policy.is_performer_blacklisted("UNKNOWN"));
    }

    #[test]
    fn test_deserialize_field_names() {
        let policy: ReconciliationPolicy =
            toml::from_str(r#"blacklist = ["rating", "cover_image", "performers"]"#).unwrap();
        assert!(policy.is_blacklisted(MetadataField::Rating));
        assert!(policy.is_blacklisted(MetadataField::Image));
        assert!(policy.is_blacklisted(MetadataField::Performers));
        assert!(!policy.is_blacklisted(MetadataField::Title));
    }
}
