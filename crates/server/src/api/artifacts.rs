//! Artifact API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use cellar_core::{ArtifactView, Outcome, Phase, SyncSummary};

use super::ws::WsMessage;
use crate::state::AppState;

// ============================================================================
// Response types
// ============================================================================

/// An artifact as listed to the frontend.
#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    #[serde(flatten)]
    pub view: ArtifactView,
    pub phase: Phase,
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<ArtifactResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Artifact not found: {}", id),
        }),
    )
        .into_response()
}

/// Outcomes are results, not HTTP failures; only a rejected command maps to
/// a non-2xx status.
fn outcome_response(outcome: Outcome) -> Response {
    let status = match outcome {
        Outcome::AlreadyInProgress => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(OutcomeResponse { outcome })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/artifacts
///
/// All known artifacts, newest first.
pub async fn list_artifacts(State(state): State<Arc<AppState>>) -> Json<ArtifactListResponse> {
    let controller = state.controller();
    let artifacts: Vec<ArtifactResponse> = state
        .registry()
        .list()
        .into_iter()
        .map(|view| {
            let phase = controller.phase(&view.descriptor.id);
            ArtifactResponse { view, phase }
        })
        .collect();
    let total = artifacts.len();
    Json(ArtifactListResponse { artifacts, total })
}

/// GET /api/v1/artifacts/{id}
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.registry().view(&id) {
        Some(view) => Json(ArtifactResponse {
            phase: state.controller().phase(&id),
            view,
        })
        .into_response(),
        None => not_found(&id),
    }
}

/// POST /api/v1/artifacts/{id}/install
///
/// Runs the install to completion and returns its outcome.
pub async fn install(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if !state.registry().contains(&id) {
        return not_found(&id);
    }
    outcome_response(state.controller().install(&id).await)
}

/// POST /api/v1/artifacts/{id}/update
pub async fn update(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if !state.registry().contains(&id) {
        return not_found(&id);
    }
    outcome_response(state.controller().update(&id).await)
}

/// POST /api/v1/artifacts/{id}/remove
pub async fn remove(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if !state.registry().contains(&id) {
        return not_found(&id);
    }
    outcome_response(state.controller().remove(&id).await)
}

/// POST /api/v1/artifacts/{id}/abort
///
/// Returns once the artifact is back to idle.
pub async fn abort(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if !state.registry().contains(&id) {
        return not_found(&id);
    }
    outcome_response(state.controller().abort(&id).await)
}

/// POST /api/v1/catalog/refresh
///
/// Reloads the catalog source and syncs the registry with it.
pub async fn refresh_catalog(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncSummary>, impl IntoResponse> {
    let descriptors = match state.catalog().fetch().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            warn!("Catalog refresh from {} failed: {}", state.catalog().name(), e);
            return Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
    };

    let summary = state.controller().sync_catalog(descriptors);
    info!("Catalog refreshed from {}", state.catalog().name());
    state
        .ws_broadcaster()
        .broadcast(WsMessage::CatalogRefreshed {
            added: summary.added,
            removed: summary.removed,
            updates_available: summary.updates_available,
        });
    Ok(Json(summary))
}
