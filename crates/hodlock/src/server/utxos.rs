use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use hodlock_core::types::BlockHeight;
use hodlock_core::{Snapshot, UtxoRefresh};

use super::auth::check_auth;
use super::error::AppError;
use super::{run_detached, SharedState};

#[derive(Deserialize)]
pub(super) struct HeightQuery {
    current_height: Option<u32>,
}

/// The caller's height when given, otherwise the clock-based estimate.
pub(super) fn resolve_height(
    state: &SharedState,
    explicit: Option<u32>,
) -> Result<BlockHeight, AppError> {
    match explicit {
        Some(height) => Ok(BlockHeight(height)),
        None => Ok(state.orchestrator.approx_height()?),
    }
}

pub(super) async fn get_utxos(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<HeightQuery>,
) -> Result<Json<Snapshot>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let current_height = resolve_height(&state, query.current_height)?;
    Ok(Json(state.orchestrator.snapshot(current_height).await))
}

pub(super) async fn refresh_utxos(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<UtxoRefresh>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let refresh = run_detached(&state, |orchestrator| async move {
        orchestrator.refresh_utxos().await
    })
    .await?;
    Ok(Json(refresh))
}
