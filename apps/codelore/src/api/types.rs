//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API, plus the
//! conversion between loose JSON metadata and the engine's closed
//! `MetaValue` union. That conversion is the validation boundary: `null`
//! is rejected here, before anything reaches the core.

use codelore_core::{
    ConventionDraft, Entity, EntityDraft, EntityQuery, CatalogQuery, DirectedRelationship,
    Direction, FloatBits, KnowledgeStats, LoreError, MetaValue, Metadata, Pattern, PatternDraft,
    Registration, Relationship, RelationshipDraft, StyleConvention,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// METADATA CONVERSION
// =============================================================================

/// Smallest f64 exactly representable as i64.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
/// Largest f64 not exceeding i64::MAX.
const I64_MAX_F: f64 = 9_223_372_036_854_775_807.0;

/// Convert one loose JSON value into the engine's tagged union.
///
/// `null` has no meaning in stored metadata and is rejected rather than
/// silently dropped. Integral numbers become `Int` (callers sending `3.0`
/// get `Int(3)`); everything else is kept bit-exact as `Float`.
pub fn json_to_meta(value: &serde_json::Value) -> Result<MetaValue, LoreError> {
    match value {
        serde_json::Value::Null => Err(LoreError::Validation(
            "metadata values must not be null".to_string(),
        )),
        serde_json::Value::Bool(b) => Ok(MetaValue::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(MetaValue::Int(i));
            }
            if let Some(f) = n.as_f64() {
                if f.is_finite() && f.fract() == 0.0 && (I64_MIN_F..=I64_MAX_F).contains(&f) {
                    return Ok(MetaValue::Int(f as i64));
                }
                return Ok(MetaValue::Float(FloatBits::from_f64(f)));
            }
            Err(LoreError::Validation(format!(
                "unrepresentable metadata number {n}"
            )))
        }
        serde_json::Value::String(s) => Ok(MetaValue::Str(s.clone())),
        serde_json::Value::Array(items) => {
            let converted: Result<Vec<MetaValue>, LoreError> =
                items.iter().map(json_to_meta).collect();
            Ok(MetaValue::Seq(converted?))
        }
        serde_json::Value::Object(map) => {
            let mut converted = std::collections::BTreeMap::new();
            for (key, item) in map {
                converted.insert(key.clone(), json_to_meta(item)?);
            }
            Ok(MetaValue::Map(converted))
        }
    }
}

/// Convert a JSON object into engine metadata.
pub fn json_to_metadata(
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<Metadata, LoreError> {
    let mut metadata = Metadata::new();
    for (key, value) in map {
        metadata.insert(key.clone(), json_to_meta(value)?);
    }
    Ok(metadata)
}

/// Render a stored metadata value back as plain JSON.
#[must_use]
pub fn meta_to_json(value: &MetaValue) -> serde_json::Value {
    match value {
        MetaValue::Str(s) => serde_json::Value::String(s.clone()),
        MetaValue::Int(i) => serde_json::Value::Number((*i).into()),
        // NaN/infinity have no JSON form; JSON input can never produce
        // them, so Null only covers values injected through the core API.
        MetaValue::Float(bits) => serde_json::Number::from_f64(bits.to_f64())
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        MetaValue::Bool(b) => serde_json::Value::Bool(*b),
        MetaValue::Seq(items) => serde_json::Value::Array(items.iter().map(meta_to_json).collect()),
        MetaValue::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), meta_to_json(v)))
                .collect(),
        ),
    }
}

#[must_use]
pub fn metadata_to_json(metadata: &Metadata) -> serde_json::Value {
    serde_json::Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), meta_to_json(v)))
            .collect(),
    )
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// REGISTRATION REQUESTS
// =============================================================================

/// Entity registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEntityRequest {
    pub name: String,
    pub entity_type: String,
    pub summary: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RegisterEntityRequest {
    /// Convert to an engine draft, validating metadata at the boundary.
    pub fn to_draft(&self) -> Result<EntityDraft, LoreError> {
        Ok(EntityDraft {
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            summary: self.summary.clone(),
            signature: self.signature.clone(),
            language: self.language.clone(),
            observations: self.observations.clone(),
            metadata: json_to_metadata(&self.metadata)?,
        })
    }
}

/// Relationship registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRelationshipRequest {
    pub from_entity: String,
    pub to_entity: String,
    pub relationship_type: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RegisterRelationshipRequest {
    pub fn to_draft(&self) -> Result<RelationshipDraft, LoreError> {
        Ok(RelationshipDraft {
            from_entity: self.from_entity.clone(),
            to_entity: self.to_entity.clone(),
            relationship_type: self.relationship_type.clone(),
            metadata: json_to_metadata(&self.metadata)?,
        })
    }
}

/// Pattern registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPatternRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RegisterPatternRequest {
    pub fn to_draft(&self) -> Result<PatternDraft, LoreError> {
        Ok(PatternDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            example: self.example.clone(),
            metadata: json_to_metadata(&self.metadata)?,
        })
    }
}

/// Style convention registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConventionRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RegisterConventionRequest {
    pub fn to_draft(&self) -> Result<ConventionDraft, LoreError> {
        Ok(ConventionDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            examples: self.examples.clone(),
            metadata: json_to_metadata(&self.metadata)?,
        })
    }
}

/// Observation append request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRequest {
    pub entity_name: String,
    pub observation: String,
}

// =============================================================================
// REGISTRATION RESPONSES
// =============================================================================

/// Shared response shape for all register endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub id: Option<String>,
    pub created: Option<bool>,
    pub error: Option<String>,
}

impl RegisterResponse {
    #[must_use]
    pub fn success(registration: Registration) -> Self {
        Self {
            success: true,
            id: Some(registration.id.to_string()),
            created: Some(registration.created),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            created: None,
            error: Some(msg.into()),
        }
    }
}

/// Observation append response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationResponse {
    pub success: bool,
    /// False when the note was skipped as an immediate repeat.
    pub appended: Option<bool>,
    pub error: Option<String>,
}

impl ObservationResponse {
    #[must_use]
    pub fn success(appended: bool) -> Self {
        Self {
            success: true,
            appended: Some(appended),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            appended: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// RECORD JSON VIEWS
// =============================================================================

/// Entity JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityJson {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub summary: String,
    pub signature: Option<String>,
    pub language: Option<String>,
    pub observations: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&Entity> for EntityJson {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.to_string(),
            name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
            summary: entity.summary.clone(),
            signature: entity.signature.clone(),
            language: entity.language.clone(),
            observations: entity.observations.clone(),
            metadata: metadata_to_json(&entity.metadata),
            created_at: entity.created_at.millis(),
            updated_at: entity.updated_at.millis(),
        }
    }
}

/// Relationship JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipJson {
    pub id: String,
    pub from_entity: String,
    pub to_entity: String,
    pub relationship_type: String,
    pub metadata: serde_json::Value,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&Relationship> for RelationshipJson {
    fn from(relationship: &Relationship) -> Self {
        Self {
            id: relationship.id.to_string(),
            from_entity: relationship.from_entity.clone(),
            to_entity: relationship.to_entity.clone(),
            relationship_type: relationship.relationship_type.clone(),
            metadata: metadata_to_json(&relationship.metadata),
            created_at: relationship.created_at.millis(),
            updated_at: relationship.updated_at.millis(),
        }
    }
}

/// A relationship annotated with direction, as seen from a queried entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectedRelationshipJson {
    pub direction: String,
    #[serde(flatten)]
    pub relationship: RelationshipJson,
}

impl From<&DirectedRelationship> for DirectedRelationshipJson {
    fn from(directed: &DirectedRelationship) -> Self {
        Self {
            direction: match directed.direction {
                Direction::Outgoing => "outgoing".to_string(),
                Direction::Incoming => "incoming".to_string(),
            },
            relationship: RelationshipJson::from(&directed.relationship),
        }
    }
}

/// Pattern JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternJson {
    pub id: String,
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub example: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&Pattern> for PatternJson {
    fn from(pattern: &Pattern) -> Self {
        Self {
            id: pattern.id.to_string(),
            name: pattern.name.clone(),
            description: pattern.description.clone(),
            language: pattern.language.clone(),
            example: pattern.example.clone(),
            metadata: metadata_to_json(&pattern.metadata),
            created_at: pattern.created_at.millis(),
            updated_at: pattern.updated_at.millis(),
        }
    }
}

/// Style convention JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConventionJson {
    pub id: String,
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub examples: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&StyleConvention> for ConventionJson {
    fn from(convention: &StyleConvention) -> Self {
        Self {
            id: convention.id.to_string(),
            name: convention.name.clone(),
            description: convention.description.clone(),
            language: convention.language.clone(),
            examples: convention.examples.clone(),
            metadata: metadata_to_json(&convention.metadata),
            created_at: convention.created_at.millis(),
            updated_at: convention.updated_at.millis(),
        }
    }
}

// =============================================================================
// QUERY REQUESTS/RESPONSES
// =============================================================================

/// Entity query request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityQueryRequest {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl EntityQueryRequest {
    #[must_use]
    pub fn to_query(&self) -> EntityQuery {
        EntityQuery {
            entity_type: self.entity_type.clone(),
            language: self.language.clone(),
            name_pattern: self.name_pattern.clone(),
            limit: self.limit,
        }
    }
}

/// Pattern/convention catalog query request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogQueryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl CatalogQueryRequest {
    #[must_use]
    pub fn to_query(&self) -> CatalogQuery {
        CatalogQuery {
            name: self.name.clone(),
            language: self.language.clone(),
        }
    }
}

/// Entity query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityQueryResponse {
    pub success: bool,
    pub count: usize,
    pub entities: Vec<EntityJson>,
    pub error: Option<String>,
}

impl EntityQueryResponse {
    #[must_use]
    pub fn success(entities: Vec<EntityJson>) -> Self {
        Self {
            success: true,
            count: entities.len(),
            entities,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            entities: vec![],
            error: Some(msg.into()),
        }
    }
}

/// Entity details response (entity + directed relationships).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDetailsResponse {
    pub success: bool,
    pub entity: Option<EntityJson>,
    pub relationships: Vec<DirectedRelationshipJson>,
    pub error: Option<String>,
}

impl EntityDetailsResponse {
    #[must_use]
    pub fn success(entity: EntityJson, relationships: Vec<DirectedRelationshipJson>) -> Self {
        Self {
            success: true,
            entity: Some(entity),
            relationships,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            entity: None,
            relationships: vec![],
            error: Some(msg.into()),
        }
    }
}

/// Pattern query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternQueryResponse {
    pub success: bool,
    pub count: usize,
    pub patterns: Vec<PatternJson>,
}

/// Style convention query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConventionQueryResponse {
    pub success: bool,
    pub count: usize,
    pub conventions: Vec<ConventionJson>,
}

/// Statistics response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: KnowledgeStats,
}

impl StatisticsResponse {
    #[must_use]
    pub fn success(stats: KnowledgeStats) -> Self {
        Self {
            success: true,
            stats,
        }
    }
}

/// Clear response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub error: Option<String>,
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded snapshot
    pub checksum: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    #[must_use]
    pub fn success(data: &[u8], checksum: u64) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
