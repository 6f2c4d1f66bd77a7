//! GraphQL catalog client
//!
//! Talks to the catalog server's `/graphql` endpoint over HTTP. Every call is a
//! single POST with a bounded timeout; failures are never retried.

use super::{
    CatalogEntity, CatalogScene, CatalogStore, NewEntity, SceneMovie, SceneTags, TagRef,
    UpdatePayload,
};
use crate::error::CatalogError;
use crate::types::parse_date;
use async_trait::async_trait;
use nfoscene_common::EntityKind;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const SCENE_FIELDS: &str = r#"
    id
    organized
    path
    title
    details
    date
    rating
    url
    studio { id }
    performers { id }
    tags { id name }
    movies { movie { id } scene_index }
"#;

/// Connection details handed over by the catalog server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConnection {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub session_cookie: Option<SessionCookie>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
}

/// Session cookie used for authentication
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCookie {
    pub value: String,
}

impl ServerConnection {
    /// GraphQL endpoint URL (`0.0.0.0` is reached through `localhost`)
    pub fn endpoint(&self) -> String {
        let host = if self.host == "0.0.0.0" {
            "localhost"
        } else {
            self.host.as_str()
        };
        format!("{}://{}:{}/graphql", self.scheme, host, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQLErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SceneData {
    id: String,
    #[serde(default)]
    organized: bool,
    path: String,
    title: Option<String>,
    details: Option<String>,
    date: Option<String>,
    rating: Option<u8>,
    url: Option<String>,
    studio: Option<IdOnly>,
    #[serde(default)]
    performers: Vec<IdOnly>,
    #[serde(default)]
    tags: Vec<TagRef>,
    #[serde(default)]
    movies: Vec<SceneMovieData>,
}

#[derive(Debug, Deserialize)]
struct SceneMovieData {
    movie: IdOnly,
    scene_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SceneTagsData {
    id: String,
    #[serde(default)]
    tags: Vec<TagRef>,
}

#[derive(Debug, Deserialize)]
struct EntityData {
    id: String,
    name: String,
    #[serde(default)]
    aliases: Option<String>,
}

impl From<EntityData> for CatalogEntity {
    fn from(data: EntityData) -> Self {
        let aliases = data
            .aliases
            .as_deref()
            .map(CatalogEntity::parse_aliases)
            .unwrap_or_default();
        CatalogEntity {
            id: data.id,
            name: data.name,
            aliases,
        }
    }
}

/// Catalog reached over GraphQL
pub struct GraphQLCatalog {
    http_client: reqwest::Client,
    endpoint: String,
    /// Test-only `(from, to)` prefix rewrite of scene paths
    path_rewrite: Option<(String, String)>,
}

impl GraphQLCatalog {
    pub fn new(connection: &ServerConnection, timeout: Duration) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &connection.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| CatalogError::Transport(format!("Invalid API key header: {}", e)))?;
            headers.insert("ApiKey", value);
        }
        if let Some(cookie) = &connection.session_cookie {
            let value = HeaderValue::from_str(&format!("session={}", cookie.value))
                .map_err(|e| CatalogError::Transport(format!("Invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: connection.endpoint(),
            path_rewrite: None,
        })
    }

    /// Rewrite the `from` prefix of scene paths to `to` (testing only)
    pub fn with_path_rewrite(mut self, rewrite: Option<(String, String)>) -> Self {
        self.path_rewrite = rewrite;
        self
    }

    async fn call(&self, query: &str, variables: Value) -> Result<Value, CatalogError> {
        let body = json!({ "query": query, "variables": variables });

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CatalogError::Transport(format!("Error with the graphql request: {}", e))
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Unauthorized);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Transport(format!(
                "GraphQL query failed: {} - {}",
                status.as_u16(),
                error_text
            )));
        }

        let result: GraphQLResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        if !result.errors.is_empty() {
            let messages: Vec<String> = result.errors.into_iter().map(|e| e.message).collect();
            return Err(CatalogError::Query(messages.join("; ")));
        }

        result
            .data
            .ok_or_else(|| CatalogError::Decode("response carries no data".to_string()))
    }

    /// Run `query` and decode `data.<field>`
    async fn call_field<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        field: &str,
    ) -> Result<T, CatalogError> {
        let mut data = self.call(query, variables).await?;
        let value = data
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| CatalogError::Decode(format!("missing field '{}'", field)))?;
        serde_json::from_value(value).map_err(|e| CatalogError::Decode(format!("{}: {}", field, e)))
    }

    fn rewrite_path(&self, path: String) -> PathBuf {
        match &self.path_rewrite {
            Some((from, to)) => PathBuf::from(path.replacen(from.as_str(), to, 1)),
            None => PathBuf::from(path),
        }
    }

    fn scene_from_data(&self, data: SceneData) -> CatalogScene {
        let movie = data.movies.into_iter().next().map(|m| SceneMovie {
            movie_id: m.movie.id,
            scene_index: m.scene_index,
        });
        CatalogScene {
            id: data.id,
            organized: data.organized,
            path: self.rewrite_path(data.path),
            title: data.title,
            details: data.details,
            date: data.date.as_deref().and_then(parse_date),
            rating: data.rating,
            url: data.url,
            studio_id: data.studio.map(|s| s.id),
            performer_ids: data.performers.into_iter().map(|p| p.id).collect(),
            tags: data.tags,
            movie,
        }
    }
}

/// Query name, result list field and filter argument per entity kind
fn find_query(kind: EntityKind) -> (&'static str, &'static str, &'static str, bool) {
    match kind {
        EntityKind::Performer => ("findPerformers", "performers", "performer_filter: $filter", true),
        EntityKind::Studio => ("findStudios", "studios", "studio_filter: $filter", true),
        EntityKind::Tag => ("findTags", "tags", "tag_filter: $filter", false),
        EntityKind::Movie => ("findMovies", "movies", "movie_filter: $filter", false),
    }
}

fn filter_type(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Performer => "PerformerFilterType",
        EntityKind::Studio => "StudioFilterType",
        EntityKind::Tag => "TagFilterType",
        EntityKind::Movie => "MovieFilterType",
    }
}

fn create_mutation(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Performer => ("performerCreate", "PerformerCreateInput"),
        EntityKind::Studio => ("studioCreate", "StudioCreateInput"),
        EntityKind::Tag => ("tagCreate", "TagCreateInput"),
        EntityKind::Movie => ("movieCreate", "MovieCreateInput"),
    }
}

/// Build the `SceneUpdateInput` variables; absent fields are left out
fn scene_update_input(payload: &UpdatePayload) -> Result<Value, CatalogError> {
    let mut input =
        serde_json::to_value(payload).map_err(|e| CatalogError::Decode(e.to_string()))?;
    if let Some(object) = input.as_object_mut() {
        if let Some(movie) = object.remove("movie") {
            object.insert("movies".to_string(), Value::Array(vec![movie]));
        }
    }
    Ok(input)
}

/// Build the creation input for `entity`
fn create_input(kind: EntityKind, entity: &NewEntity) -> Result<Value, CatalogError> {
    let mut input = json!({ "name": entity.name });
    if let (EntityKind::Movie, Some(details)) = (kind, &entity.movie) {
        let extra =
            serde_json::to_value(details).map_err(|e| CatalogError::Decode(e.to_string()))?;
        if let (Some(target), Value::Object(fields)) = (input.as_object_mut(), extra) {
            target.extend(fields.into_iter().filter(|(_, v)| !v.is_null()));
        }
    }
    Ok(input)
}

#[async_trait]
impl CatalogStore for GraphQLCatalog {
    async fn find_scene(&self, id: &str) -> Result<Option<CatalogScene>, CatalogError> {
        let query = format!(
            "query FindScene($id: ID!) {{ findScene(id: $id) {{ {} }} }}",
            SCENE_FIELDS
        );
        debug!(scene_id = %id, "Querying catalog scene");
        let scene: Option<SceneData> = self.call_field(&query, json!({ "id": id }), "findScene").await?;
        Ok(scene.map(|s| self.scene_from_data(s)))
    }

    async fn update_scene(&self, payload: &UpdatePayload) -> Result<Option<String>, CatalogError> {
        let query = r#"
            mutation sceneUpdate($input: SceneUpdateInput!) {
                sceneUpdate(input: $input) { id }
            }
        "#;
        let input = scene_update_input(payload)?;
        debug!(scene_id = %payload.id, "Sending scene update");
        let updated: Option<IdOnly> = self
            .call_field(query, json!({ "input": input }), "sceneUpdate")
            .await?;
        Ok(updated.map(|u| u.id))
    }

    async fn find_entities(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Vec<CatalogEntity>, CatalogError> {
        let (operation, list_field, filter_arg, has_aliases) = find_query(kind);
        let fields = if has_aliases { "id name aliases" } else { "id name" };
        let query = format!(
            "query {op}($filter: {ty}, $page: FindFilterType) {{ {op}({arg}, filter: $page) {{ {list} {{ {fields} }} }} }}",
            op = operation,
            ty = filter_type(kind),
            arg = filter_arg,
            list = list_field,
            fields = fields,
        );

        let mut filter = json!({ "name": { "value": name, "modifier": "INCLUDES" } });
        if has_aliases {
            filter["OR"] = json!({ "aliases": { "value": name, "modifier": "INCLUDES" } });
        }
        let variables = json!({ "filter": filter, "page": { "per_page": -1 } });

        debug!(kind = %kind, name = %name, "Searching catalog entities");
        let mut result: Value = self.call_field(&query, variables, operation).await?;
        let list = result
            .get_mut(list_field)
            .map(Value::take)
            .ok_or_else(|| CatalogError::Decode(format!("missing field '{}'", list_field)))?;
        let entities: Vec<EntityData> = serde_json::from_value(list)
            .map_err(|e| CatalogError::Decode(format!("{}: {}", list_field, e)))?;
        Ok(entities.into_iter().map(CatalogEntity::from).collect())
    }

    async fn create_entity(
        &self,
        kind: EntityKind,
        entity: &NewEntity,
    ) -> Result<CatalogEntity, CatalogError> {
        let (operation, input_type) = create_mutation(kind);
        let query = format!(
            "mutation {op}($input: {ty}!) {{ {op}(input: $input) {{ id name }} }}",
            op = operation,
            ty = input_type,
        );
        let input = create_input(kind, entity)?;
        debug!(kind = %kind, name = %entity.name, "Creating catalog entity");
        let created: Option<EntityData> = self
            .call_field(&query, json!({ "input": input }), operation)
            .await?;
        created
            .map(CatalogEntity::from)
            .ok_or_else(|| CatalogError::Decode(format!("{} returned nothing", operation)))
    }

    async fn find_scenes(&self) -> Result<Vec<SceneTags>, CatalogError> {
        let query = r#"
            query findScenes($filter: FindFilterType) {
                findScenes(filter: $filter) {
                    scenes { id tags { id name } }
                }
            }
        "#;
        let mut result: Value = self
            .call_field(query, json!({ "filter": { "per_page": -1 } }), "findScenes")
            .await?;
        let list = result
            .get_mut("scenes")
            .map(Value::take)
            .ok_or_else(|| CatalogError::Decode("missing field 'scenes'".to_string()))?;
        let scenes: Vec<SceneTagsData> =
            serde_json::from_value(list).map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(scenes
            .into_iter()
            .map(|s| SceneTags {
                id: s.id,
                tags: s.tags,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MovieDetails;
    use crate::types::SourceOrigin;

    fn connection(host: &str) -> ServerConnection {
        serde_json::from_value(json!({
            "Scheme": "http",
            "Host": host,
            "Port": 9999,
            "SessionCookie": { "Name": "session", "Value": "abc" },
        }))
        .unwrap()
    }

    #[test]
    fn test_endpoint_replaces_wildcard_host() {
        assert_eq!(connection("0.0.0.0").endpoint(), "http://localhost:9999/graphql");
        assert_eq!(connection("stash.lan").endpoint(), "http://stash.lan:9999/graphql");
    }

    #[test]
    fn test_scene_update_input_wraps_movie() {
        let mut payload = UpdatePayload::new("4", SourceOrigin::StructuredFile);
        payload.title = Some("T".to_string());
        payload.movie = Some(SceneMovie {
            movie_id: "9".to_string(),
            scene_index: Some(2),
        });

        let input = scene_update_input(&payload).unwrap();
        assert_eq!(input["id"], "4");
        assert_eq!(input["title"], "T");
        assert_eq!(input["movies"], json!([{ "movie_id": "9", "scene_index": 2 }]));
        assert!(input.get("movie").is_none());
        assert!(input.get("rating").is_none());
    }

    #[test]
    fn test_create_input_for_movie_drops_nulls() {
        let entity = NewEntity {
            name: "Saga".to_string(),
            movie: Some(MovieDetails {
                director: Some("Dee".to_string()),
                rating: Some(4),
                ..Default::default()
            }),
        };
        let input = create_input(EntityKind::Movie, &entity).unwrap();
        assert_eq!(input, json!({ "name": "Saga", "director": "Dee", "rating": 4 }));

        let tag = create_input(EntityKind::Tag, &NewEntity::named("x")).unwrap();
        assert_eq!(tag, json!({ "name": "x" }));
    }

    #[test]
    fn test_path_rewrite() {
        let catalog = GraphQLCatalog::new(&connection("localhost"), Duration::from_secs(1))
            .unwrap()
            .with_path_rewrite(Some(("/data".to_string(), "/mnt/media".to_string())));
        assert_eq!(
            catalog.rewrite_path("/data/a/b.mp4".to_string()),
            PathBuf::from("/mnt/media/a/b.mp4")
        );
    }

    #[test]
    fn test_entity_aliases_are_split() {
        let data: EntityData = serde_json::from_value(json!({
            "id": "1", "name": "Jane", "aliases": "JJ, Janie"
        }))
        .unwrap();
        let entity = CatalogEntity::from(data);
        assert_eq!(entity.aliases, vec!["JJ", "Janie"]);
    }
}
