//! # API Handlers
//!
//! One handler per route. Each handler converts the JSON boundary types,
//! delegates to the store, and maps `LoreError` onto HTTP status codes:
//! validation -> 400, not-found -> 404, persistence -> 500.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use codelore_core::{LoreError, snapshot_checksum};

use super::AppState;
use super::types::{
    CatalogQueryRequest, ClearResponse, ConventionJson, ConventionQueryResponse,
    DirectedRelationshipJson, EntityDetailsResponse, EntityJson, EntityQueryRequest,
    EntityQueryResponse, ExportResponse, HealthResponse, ObservationRequest, ObservationResponse,
    PatternJson, PatternQueryResponse, RegisterConventionRequest, RegisterEntityRequest,
    RegisterPatternRequest, RegisterRelationshipRequest, RegisterResponse, StatisticsResponse,
};

fn status_for(error: &LoreError) -> StatusCode {
    match error {
        LoreError::Validation(_) => StatusCode::BAD_REQUEST,
        LoreError::NotFound(_) => StatusCode::NOT_FOUND,
        LoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// REGISTRATION HANDLERS
// =============================================================================

pub async fn register_entity(
    State(state): State<AppState>,
    Json(request): Json<RegisterEntityRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    let draft = match request.to_draft() {
        Ok(draft) => draft,
        Err(e) => return (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    };

    let mut store = state.store.write().await;
    match store.register_entity(draft) {
        Ok(registration) => {
            tracing::debug!(id = %registration.id, created = registration.created, "entity registered");
            (StatusCode::OK, Json(RegisterResponse::success(registration)))
        }
        Err(e) => (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    }
}

pub async fn register_relationship(
    State(state): State<AppState>,
    Json(request): Json<RegisterRelationshipRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    let draft = match request.to_draft() {
        Ok(draft) => draft,
        Err(e) => return (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    };

    let mut store = state.store.write().await;
    match store.register_relationship(draft) {
        Ok(registration) => (StatusCode::OK, Json(RegisterResponse::success(registration))),
        Err(e) => (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    }
}

pub async fn register_pattern(
    State(state): State<AppState>,
    Json(request): Json<RegisterPatternRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    let draft = match request.to_draft() {
        Ok(draft) => draft,
        Err(e) => return (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    };

    let mut store = state.store.write().await;
    match store.register_pattern(draft) {
        Ok(registration) => (StatusCode::OK, Json(RegisterResponse::success(registration))),
        Err(e) => (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    }
}

pub async fn register_convention(
    State(state): State<AppState>,
    Json(request): Json<RegisterConventionRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    let draft = match request.to_draft() {
        Ok(draft) => draft,
        Err(e) => return (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    };

    let mut store = state.store.write().await;
    match store.register_style_convention(draft) {
        Ok(registration) => (StatusCode::OK, Json(RegisterResponse::success(registration))),
        Err(e) => (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    }
}

pub async fn add_observation(
    State(state): State<AppState>,
    Json(request): Json<ObservationRequest>,
) -> (StatusCode, Json<ObservationResponse>) {
    let mut store = state.store.write().await;
    match store.add_entity_observation(&request.entity_name, &request.observation) {
        Ok(appended) => (StatusCode::OK, Json(ObservationResponse::success(appended))),
        Err(e) => (
            status_for(&e),
            Json(ObservationResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// QUERY HANDLERS
// =============================================================================

pub async fn query_entities(
    State(state): State<AppState>,
    Json(request): Json<EntityQueryRequest>,
) -> (StatusCode, Json<EntityQueryResponse>) {
    let store = state.store.read().await;
    match store.query_entities(&request.to_query()) {
        Ok(entities) => {
            let entities: Vec<EntityJson> = entities.iter().map(EntityJson::from).collect();
            (StatusCode::OK, Json(EntityQueryResponse::success(entities)))
        }
        Err(e) => (
            status_for(&e),
            Json(EntityQueryResponse::error(e.to_string())),
        ),
    }
}

pub async fn entity_details(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<EntityDetailsResponse>) {
    let store = state.store.read().await;
    match store.entity_details(&name) {
        Ok(details) => {
            let relationships: Vec<DirectedRelationshipJson> = details
                .relationships
                .iter()
                .map(DirectedRelationshipJson::from)
                .collect();
            (
                StatusCode::OK,
                Json(EntityDetailsResponse::success(
                    EntityJson::from(&details.entity),
                    relationships,
                )),
            )
        }
        Err(e) => (
            status_for(&e),
            Json(EntityDetailsResponse::error(e.to_string())),
        ),
    }
}

pub async fn query_patterns(
    State(state): State<AppState>,
    Json(request): Json<CatalogQueryRequest>,
) -> Json<PatternQueryResponse> {
    let store = state.store.read().await;
    let patterns: Vec<PatternJson> = store
        .query_patterns(&request.to_query())
        .iter()
        .map(PatternJson::from)
        .collect();
    Json(PatternQueryResponse {
        success: true,
        count: patterns.len(),
        patterns,
    })
}

pub async fn query_conventions(
    State(state): State<AppState>,
    Json(request): Json<CatalogQueryRequest>,
) -> Json<ConventionQueryResponse> {
    let store = state.store.read().await;
    let conventions: Vec<ConventionJson> = store
        .query_style_conventions(&request.to_query())
        .iter()
        .map(ConventionJson::from)
        .collect();
    Json(ConventionQueryResponse {
        success: true,
        count: conventions.len(),
        conventions,
    })
}

pub async fn statistics(State(state): State<AppState>) -> Json<StatisticsResponse> {
    let store = state.store.read().await;
    Json(StatisticsResponse::success(store.statistics()))
}

// =============================================================================
// ADMINISTRATION HANDLERS
// =============================================================================

pub async fn export(State(state): State<AppState>) -> (StatusCode, Json<ExportResponse>) {
    let store = state.store.read().await;
    match store.snapshot_bytes() {
        Ok(bytes) => {
            let checksum = snapshot_checksum(&bytes);
            tracing::info!(bytes = bytes.len(), checksum, "knowledge exported");
            (StatusCode::OK, Json(ExportResponse::success(&bytes, checksum)))
        }
        Err(e) => (status_for(&e), Json(ExportResponse::error(e.to_string()))),
    }
}

pub async fn clear(State(state): State<AppState>) -> (StatusCode, Json<ClearResponse>) {
    let mut store = state.store.write().await;
    match store.clear() {
        Ok(()) => {
            tracing::warn!("knowledge graph cleared");
            (
                StatusCode::OK,
                Json(ClearResponse {
                    success: true,
                    error: None,
                }),
            )
        }
        Err(e) => (
            status_for(&e),
            Json(ClearResponse {
                success: false,
                error: Some(e.to_string()),
            }),
        ),
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}
