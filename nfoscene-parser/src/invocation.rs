//! Plugin invocation surface
//!
//! The catalog server starts the binary with one JSON object (first argument
//! or stdin) and reads back a single `{"output", "error"}` line from stdout.

use crate::catalog::ServerConnection;
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Process the scene named by the hook context
    #[default]
    Normal,
    /// Process every scene carrying the reload marker tag
    Reload,
}

/// Hook that triggered the invocation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HookContext {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub hook_type: Option<String>,
}

/// `args` object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginArgs {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(rename = "hookContext", default)]
    pub hook_context: Option<HookContext>,
    /// Test-only `[from, to]` scene path prefix rewrite
    #[serde(rename = "pathRewrite", default)]
    pub path_rewrite: Option<(String, String)>,
}

/// Complete invocation input
#[derive(Debug, Clone, Deserialize)]
pub struct PluginInput {
    pub server_connection: ServerConnection,
    #[serde(default)]
    pub args: PluginArgs,
}

impl PluginInput {
    /// Parse the invocation JSON
    pub fn parse(raw: &str) -> PipelineResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            PipelineError::Configuration(format!("Invalid plugin input: {}", e))
        })
    }

    /// Operating mode; a missing mode means normal
    pub fn mode(&self) -> PipelineResult<RunMode> {
        match self.args.mode.as_deref().map(str::trim) {
            None | Some("") => Ok(RunMode::Normal),
            Some(mode) => serde_json::from_value(serde_json::Value::String(mode.to_lowercase()))
                .map_err(|_| {
                    PipelineError::Configuration(format!("unsupported mode '{}'", mode))
                }),
        }
    }

    /// Scene targeted in normal mode
    pub fn scene_id(&self) -> PipelineResult<&str> {
        self.args
            .hook_context
            .as_ref()
            .map(|h| h.id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("normal mode requires hookContext.id".to_string())
            })
    }
}

/// Final result line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginOutput {
    pub output: Option<String>,
    pub error: Option<String>,
}

impl PluginOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            output: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            output: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"output":null,"error":"unserializable plugin output"}"#.to_string()
        })
    }
}

/// Accept numeric and string ids
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}
