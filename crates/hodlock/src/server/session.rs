use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use hodlock_core::types::{ProviderName, WalletSession};
use hodlock_core::UtxoRefresh;

use super::auth::check_auth;
use super::error::AppError;
use super::{run_detached, SharedState};

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
pub(super) struct ConnectBody {
    provider: String,
}

#[derive(Serialize)]
pub(super) struct SessionResponse {
    session: Option<WalletSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    utxos: Option<UtxoRefresh>,
}

#[derive(Serialize)]
pub(super) struct ProvidersResponse {
    registered: Vec<ProviderName>,
    supported: Vec<ProviderName>,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn list_providers(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ProvidersResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(ProvidersResponse {
        registered: state.orchestrator.registry().names(),
        supported: ProviderName::ALL.to_vec(),
    }))
}

pub(super) async fn get_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    Ok(Json(SessionResponse {
        session: state.orchestrator.session().await,
        utxos: None,
    }))
}

/// Connect the requested provider and list its outputs.
pub(super) async fn connect(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<ConnectBody>, JsonRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(body) = payload?;
    let provider: ProviderName = body.provider.parse().map_err(AppError::BadRequest)?;

    let (session, utxos) = run_detached(&state, move |orchestrator| async move {
        let session = orchestrator.connect(provider).await?;
        let utxos = orchestrator.refresh_utxos().await?;
        Ok((session, utxos))
    })
    .await?;

    Ok(Json(SessionResponse {
        session: Some(session),
        utxos: Some(utxos),
    }))
}

pub(super) async fn disconnect(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    state.orchestrator.disconnect().await?;
    Ok(Json(SessionResponse {
        session: None,
        utxos: None,
    }))
}
