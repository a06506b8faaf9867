//! # Codelore MCP Server
//!
//! Implements `ServerHandler` with 11 MCP tools that proxy to the
//! codelore HTTP API, so an AI analyzer can record and recall code
//! knowledge while reading a repository.

use crate::client::LoreClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;
use serde_json::{Value, json};

/// How many observations to preview per entity in list output.
const OBSERVATION_PREVIEW: usize = 3;

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP server that bridges to a codelore HTTP API.
#[derive(Clone)]
pub struct LoreMcp {
    client: LoreClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterEntityParams {
    /// Unique entity name (e.g. "parse_config", "HttpServer").
    #[schemars(description = "Unique entity name (e.g. 'parse_config', 'HttpServer')")]
    pub name: String,
    /// Kind of code object (e.g. "function", "struct", "module").
    #[schemars(description = "Kind of code object (e.g. 'function', 'struct', 'module')")]
    pub entity_type: String,
    /// One-line summary of what the entity does.
    #[schemars(description = "One-line summary of what the entity does")]
    pub summary: String,
    /// Optional type or call signature.
    #[schemars(description = "Optional type or call signature")]
    pub signature: Option<String>,
    /// Optional programming language.
    #[schemars(description = "Optional programming language")]
    pub language: Option<String>,
    /// Optional free-form notes about the entity.
    #[schemars(description = "Optional free-form notes about the entity")]
    pub observations: Option<Vec<String>>,
    /// Optional structured metadata (string keys, JSON values, no nulls).
    #[schemars(description = "Optional structured metadata (string keys, JSON values, no nulls)")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterRelationshipParams {
    /// Name of the source entity.
    #[schemars(description = "Name of the source entity")]
    pub from_entity: String,
    /// Name of the target entity.
    #[schemars(description = "Name of the target entity")]
    pub to_entity: String,
    /// Relationship kind (e.g. "calls", "implements", "depends_on").
    #[schemars(description = "Relationship kind (e.g. 'calls', 'implements', 'depends_on')")]
    pub relationship_type: String,
    /// Optional structured metadata (string keys, JSON values, no nulls).
    #[schemars(description = "Optional structured metadata (string keys, JSON values, no nulls)")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterPatternParams {
    /// Pattern name (e.g. "builder", "newtype wrapper").
    #[schemars(description = "Pattern name (e.g. 'builder', 'newtype wrapper')")]
    pub name: String,
    /// What the pattern is and when this codebase uses it.
    #[schemars(description = "What the pattern is and when this codebase uses it")]
    pub description: String,
    /// Optional language the pattern applies to.
    #[schemars(description = "Optional language the pattern applies to")]
    pub language: Option<String>,
    /// Optional code example demonstrating the pattern.
    #[schemars(description = "Optional code example demonstrating the pattern")]
    pub example: Option<String>,
    /// Optional structured metadata (string keys, JSON values, no nulls).
    #[schemars(description = "Optional structured metadata (string keys, JSON values, no nulls)")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterConventionParams {
    /// Convention name (e.g. "snake_case functions").
    #[schemars(description = "Convention name (e.g. 'snake_case functions')")]
    pub name: String,
    /// What the convention requires.
    #[schemars(description = "What the convention requires")]
    pub description: String,
    /// Optional language the convention applies to.
    #[schemars(description = "Optional language the convention applies to")]
    pub language: Option<String>,
    /// Optional code examples following the convention.
    #[schemars(description = "Optional code examples following the convention")]
    pub examples: Option<Vec<String>>,
    /// Optional structured metadata (string keys, JSON values, no nulls).
    #[schemars(description = "Optional structured metadata (string keys, JSON values, no nulls)")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddObservationParams {
    /// Name of the entity to annotate.
    #[schemars(description = "Name of the entity to annotate")]
    pub entity_name: String,
    /// The observation to record.
    #[schemars(description = "The observation to record")]
    pub observation: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryEntitiesParams {
    /// Filter by entity type (e.g. "function").
    #[schemars(description = "Filter by entity type (e.g. 'function')")]
    pub entity_type: Option<String>,
    /// Filter by language.
    #[schemars(description = "Filter by language")]
    pub language: Option<String>,
    /// Regular expression matched against entity names.
    #[schemars(description = "Regular expression matched against entity names")]
    pub name_pattern: Option<String>,
    /// Maximum number of results (must be positive).
    #[schemars(description = "Maximum number of results (must be positive)")]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EntityDetailsParams {
    /// Exact name of the entity to inspect.
    #[schemars(description = "Exact name of the entity to inspect")]
    pub name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CatalogQueryParams {
    /// Exact name to match.
    #[schemars(description = "Exact name to match")]
    pub name: Option<String>,
    /// Filter by language.
    #[schemars(description = "Filter by language")]
    pub language: Option<String>,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl LoreMcp {
    pub fn new(client: LoreClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Record a code entity (function, struct, module, ...) in the knowledge graph; repeated registrations merge into the existing record")]
    async fn register_entity(
        &self,
        params: Parameters<RegisterEntityParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({
            "name": p.name,
            "entity_type": p.entity_type,
            "summary": p.summary,
            "signature": p.signature,
            "language": p.language,
            "observations": p.observations.unwrap_or_default(),
            "metadata": p.metadata.unwrap_or_default(),
        });
        let resp = self.map_err(self.client.post("/entity", body).await)?;
        Ok(text_result(format_registration("Entity", &resp)))
    }

    #[tool(description = "Record a directed relationship between two entities by name; endpoints do not have to be registered yet")]
    async fn register_relationship(
        &self,
        params: Parameters<RegisterRelationshipParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({
            "from_entity": p.from_entity,
            "to_entity": p.to_entity,
            "relationship_type": p.relationship_type,
            "metadata": p.metadata.unwrap_or_default(),
        });
        let resp = self.map_err(self.client.post("/relationship", body).await)?;
        Ok(text_result(format_registration("Relationship", &resp)))
    }

    #[tool(description = "Record a design pattern observed in the codebase")]
    async fn register_pattern(
        &self,
        params: Parameters<RegisterPatternParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({
            "name": p.name,
            "description": p.description,
            "language": p.language,
            "example": p.example,
            "metadata": p.metadata.unwrap_or_default(),
        });
        let resp = self.map_err(self.client.post("/pattern", body).await)?;
        Ok(text_result(format_registration("Pattern", &resp)))
    }

    #[tool(description = "Record a style convention the codebase follows")]
    async fn register_style_convention(
        &self,
        params: Parameters<RegisterConventionParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({
            "name": p.name,
            "description": p.description,
            "language": p.language,
            "examples": p.examples.unwrap_or_default(),
            "metadata": p.metadata.unwrap_or_default(),
        });
        let resp = self.map_err(self.client.post("/convention", body).await)?;
        Ok(text_result(format_registration("Convention", &resp)))
    }

    #[tool(description = "Append an observation to an existing entity; immediate repeats are skipped")]
    async fn add_entity_observation(
        &self,
        params: Parameters<AddObservationParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({
            "entity_name": p.entity_name,
            "observation": p.observation,
        });
        let resp = self.map_err(self.client.post("/entity/observation", body).await)?;
        let text = if resp.get("appended").and_then(Value::as_bool) == Some(true) {
            "Observation recorded.".to_string()
        } else if resp.get("success").and_then(Value::as_bool) == Some(true) {
            "Observation already present, not duplicated.".to_string()
        } else {
            format!(
                "Failed: {}",
                resp.get("error").and_then(Value::as_str).unwrap_or("unknown error")
            )
        };
        Ok(text_result(text))
    }

    #[tool(description = "List stored entities filtered by type, language, and/or a name regex")]
    async fn query_entities(
        &self,
        params: Parameters<QueryEntitiesParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({
            "entity_type": p.entity_type,
            "language": p.language,
            "name_pattern": p.name_pattern,
            "limit": p.limit,
        });
        let resp = self.map_err(self.client.post("/query/entities", body).await)?;
        Ok(text_result(format_entity_list(&resp)))
    }

    #[tool(description = "Get the full record of one entity plus every relationship touching it")]
    async fn get_entity_details(
        &self,
        params: Parameters<EntityDetailsParams>,
    ) -> Result<CallToolResult, McpError> {
        let encoded = percent_encode(&params.0.name);
        let resp = self
            .map_err(self.client.get(&format!("/entity/{encoded}")).await)?;
        Ok(text_result(format_entity_details(&resp)))
    }

    #[tool(description = "List stored design patterns, optionally filtered by exact name and/or language")]
    async fn query_patterns(
        &self,
        params: Parameters<CatalogQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({"name": p.name, "language": p.language});
        let resp = self.map_err(self.client.post("/query/patterns", body).await)?;
        Ok(text_result(format_patterns(&resp)))
    }

    #[tool(description = "List stored style conventions, optionally filtered by exact name and/or language")]
    async fn query_style_conventions(
        &self,
        params: Parameters<CatalogQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let body = json!({"name": p.name, "language": p.language});
        let resp = self.map_err(self.client.post("/query/conventions", body).await)?;
        Ok(text_result(format_conventions(&resp)))
    }

    #[tool(description = "Get counts of everything stored, broken down by type and language")]
    async fn get_knowledge_statistics(&self) -> Result<CallToolResult, McpError> {
        let resp = self.map_err(self.client.get("/statistics").await)?;
        Ok(text_result(format_statistics(&resp)))
    }

    #[tool(description = "Delete ALL stored knowledge; irreversible")]
    async fn clear_knowledge(&self) -> Result<CallToolResult, McpError> {
        let resp = self.map_err(self.client.post("/clear", json!({})).await)?;
        let text = if resp.get("success").and_then(Value::as_bool) == Some(true) {
            "All stored knowledge cleared.".to_string()
        } else {
            format!(
                "Clear failed: {}",
                resp.get("error").and_then(Value::as_str).unwrap_or("unknown error")
            )
        };
        Ok(text_result(text))
    }
}

impl LoreMcp {
    fn map_err<T>(&self, result: Result<T, crate::client::ClientError>) -> Result<T, McpError> {
        result.map_err(|e| McpError::internal_error(format!("{e}"), None))
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for LoreMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Codelore code knowledge server. Record entities, relationships, \
                 patterns, and style conventions as you analyze a codebase, and \
                 query them back in later sessions."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

/// Entity names go into the URL path, so anything outside the unreserved
/// set gets percent-encoded byte by byte.
fn percent_encode(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Format a register response as one line.
fn format_registration(kind: &str, resp: &Value) -> String {
    if resp.get("success").and_then(Value::as_bool) != Some(true) {
        return format!(
            "{kind} registration failed: {}",
            resp.get("error").and_then(Value::as_str).unwrap_or("unknown error")
        );
    }
    let id = resp.get("id").and_then(Value::as_str).unwrap_or("?");
    if resp.get("created").and_then(Value::as_bool) == Some(true) {
        format!("{kind} created: {id}")
    } else {
        format!("{kind} merged into existing record: {id}")
    }
}

/// Format an entity query response as a readable list.
fn format_entity_list(resp: &Value) -> String {
    if resp.get("success").and_then(Value::as_bool) != Some(true) {
        return format!(
            "Query failed: {}",
            resp.get("error").and_then(Value::as_str).unwrap_or("unknown error")
        );
    }
    let entities = resp
        .get("entities")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if entities.is_empty() {
        return "No matching entities.".to_string();
    }

    let mut lines = vec![format!("Found {} entities:", entities.len())];
    for entity in &entities {
        let name = entity.get("name").and_then(Value::as_str).unwrap_or("?");
        let entity_type = entity.get("entity_type").and_then(Value::as_str).unwrap_or("?");
        let summary = entity.get("summary").and_then(Value::as_str).unwrap_or("");
        let language = entity
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("-");
        lines.push(format!("- {name} [{entity_type}/{language}]: {summary}"));
        if let Some(observations) = entity.get("observations").and_then(Value::as_array) {
            for observation in observations.iter().take(OBSERVATION_PREVIEW) {
                if let Some(text) = observation.as_str() {
                    lines.push(format!("    note: {text}"));
                }
            }
            if observations.len() > OBSERVATION_PREVIEW {
                lines.push(format!(
                    "    ... {} more notes",
                    observations.len() - OBSERVATION_PREVIEW
                ));
            }
        }
    }
    lines.join("\n")
}

/// Format an entity details response, relationships annotated by direction.
fn format_entity_details(resp: &Value) -> String {
    if resp.get("success").and_then(Value::as_bool) != Some(true) {
        return format!(
            "Lookup failed: {}",
            resp.get("error").and_then(Value::as_str).unwrap_or("unknown error")
        );
    }
    let Some(entity) = resp.get("entity") else {
        return "Lookup failed: empty response.".to_string();
    };

    let name = entity.get("name").and_then(Value::as_str).unwrap_or("?");
    let entity_type = entity.get("entity_type").and_then(Value::as_str).unwrap_or("?");
    let summary = entity.get("summary").and_then(Value::as_str).unwrap_or("");
    let mut lines = vec![format!("{name} [{entity_type}]"), format!("  {summary}")];

    if let Some(signature) = entity.get("signature").and_then(Value::as_str) {
        lines.push(format!("  signature: {signature}"));
    }
    if let Some(language) = entity.get("language").and_then(Value::as_str) {
        lines.push(format!("  language: {language}"));
    }
    if let Some(observations) = entity.get("observations").and_then(Value::as_array)
        && !observations.is_empty()
    {
        lines.push(format!("  Notes ({}):", observations.len()));
        for observation in observations {
            if let Some(text) = observation.as_str() {
                lines.push(format!("    - {text}"));
            }
        }
    }

    if let Some(relationships) = resp.get("relationships").and_then(Value::as_array)
        && !relationships.is_empty()
    {
        lines.push(format!("  Relationships ({}):", relationships.len()));
        for rel in relationships {
            let rel_type = rel
                .get("relationship_type")
                .and_then(Value::as_str)
                .unwrap_or("?");
            match rel.get("direction").and_then(Value::as_str) {
                Some("outgoing") => {
                    let to = rel.get("to_entity").and_then(Value::as_str).unwrap_or("?");
                    lines.push(format!("    -> {to} ({rel_type})"));
                }
                _ => {
                    let from = rel.get("from_entity").and_then(Value::as_str).unwrap_or("?");
                    lines.push(format!("    <- {from} ({rel_type})"));
                }
            }
        }
    }

    lines.join("\n")
}

/// Format a pattern list with fenced code examples.
fn format_patterns(resp: &Value) -> String {
    let patterns = resp
        .get("patterns")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if patterns.is_empty() {
        return "No matching patterns.".to_string();
    }

    let mut lines = vec![format!("Found {} patterns:", patterns.len())];
    for pattern in &patterns {
        let name = pattern.get("name").and_then(Value::as_str).unwrap_or("?");
        let description = pattern.get("description").and_then(Value::as_str).unwrap_or("");
        let language = pattern
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("any");
        lines.push(format!("- {name} [{language}]: {description}"));
        if let Some(example) = pattern.get("example").and_then(Value::as_str) {
            lines.push(format!("```\n{example}\n```"));
        }
    }
    lines.join("\n")
}

/// Format a convention list with fenced code examples.
fn format_conventions(resp: &Value) -> String {
    let conventions = resp
        .get("conventions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if conventions.is_empty() {
        return "No matching conventions.".to_string();
    }

    let mut lines = vec![format!("Found {} conventions:", conventions.len())];
    for convention in &conventions {
        let name = convention.get("name").and_then(Value::as_str).unwrap_or("?");
        let description = convention
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("");
        let language = convention
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("any");
        lines.push(format!("- {name} [{language}]: {description}"));
        if let Some(examples) = convention.get("examples").and_then(Value::as_array) {
            for example in examples {
                if let Some(text) = example.as_str() {
                    lines.push(format!("```\n{text}\n```"));
                }
            }
        }
    }
    lines.join("\n")
}

/// Format the statistics response as an indented breakdown.
fn format_statistics(resp: &Value) -> String {
    let count = |key: &str| resp.get(key).and_then(Value::as_u64).unwrap_or(0);
    let mut lines = vec![
        "Knowledge statistics:".to_string(),
        format!("  Entities: {}", count("entity_count")),
    ];
    if let Some(by_type) = resp.get("entities_by_type").and_then(Value::as_object) {
        for (entity_type, n) in by_type {
            lines.push(format!("    {entity_type}: {}", n.as_u64().unwrap_or(0)));
        }
    }
    if let Some(by_language) = resp.get("entities_by_language").and_then(Value::as_object)
        && !by_language.is_empty()
    {
        lines.push("  By language:".to_string());
        for (language, n) in by_language {
            lines.push(format!("    {language}: {}", n.as_u64().unwrap_or(0)));
        }
    }
    lines.push(format!("  Relationships: {}", count("relationship_count")));
    if let Some(by_type) = resp.get("relationships_by_type").and_then(Value::as_object) {
        for (rel_type, n) in by_type {
            lines.push(format!("    {rel_type}: {}", n.as_u64().unwrap_or(0)));
        }
    }
    lines.push(format!("  Patterns: {}", count("pattern_count")));
    lines.push(format!("  Conventions: {}", count("convention_count")));
    lines.push(format!("  Notes: {}", count("note_count")));
    lines.join("\n")
}
