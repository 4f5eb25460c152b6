use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bitcoin::{Amount, OutPoint, Txid};
use serde::{Deserialize, Serialize};

use hodlock_core::inspect::PsbtSummary;
use hodlock_core::types::{BlockHeight, UnspentOutput};
use hodlock_core::{LockReceipt, LockRequest};

use super::auth::check_auth;
use super::error::AppError;
use super::utxos::resolve_height;
use super::{run_detached, SharedState};

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
pub(super) struct LockBody {
    txid: Txid,
    vout: u32,
    amount_sats: u64,
    fee_sats: u64,
    destination: String,
    change_address: String,
}

impl From<LockBody> for LockRequest {
    fn from(body: LockBody) -> Self {
        LockRequest {
            outpoint: OutPoint::new(body.txid, body.vout),
            amount: Amount::from_sat(body.amount_sats),
            fee: Amount::from_sat(body.fee_sats),
            destination: body.destination,
            change_address: body.change_address,
        }
    }
}

#[derive(Serialize)]
pub(super) struct PreviewResponse {
    psbt: String,
    change_sats: Option<u64>,
    summary: PsbtSummary,
}

#[derive(Deserialize)]
pub(super) struct UnlockBody {
    txid: Txid,
    vout: u32,
    current_height: Option<u32>,
}

#[derive(Serialize)]
pub(super) struct UnlockResponse {
    released: UnspentOutput,
    current_height: BlockHeight,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn preview_psbt(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<LockBody>, JsonRejection>,
) -> Result<Json<PreviewResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(body) = payload?;
    let unsigned = state.orchestrator.preview(&body.into()).await?;

    Ok(Json(PreviewResponse {
        psbt: unsigned.to_base64(),
        change_sats: unsigned.change().map(Amount::to_sat),
        summary: unsigned.summary(),
    }))
}

/// Run the lock protocol. The sequence runs to completion even if the
/// client goes away while the wallet prompt is open.
pub(super) async fn lock(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<LockBody>, JsonRejection>,
) -> Result<Json<LockReceipt>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(body) = payload?;
    let request = LockRequest::from(body);

    let receipt = run_detached(&state, move |orchestrator| async move {
        orchestrator.lock(&request).await
    })
    .await?;
    Ok(Json(receipt))
}

pub(super) async fn unlock(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<UnlockBody>, JsonRejection>,
) -> Result<Json<UnlockResponse>, AppError> {
    check_auth(&state.api_token, &headers)?;
    let Json(body) = payload?;
    let current_height = resolve_height(&state, body.current_height)?;
    let outpoint = OutPoint::new(body.txid, body.vout);

    let released = state.orchestrator.unlock(&outpoint, current_height).await?;
    Ok(Json(UnlockResponse {
        released,
        current_height,
    }))
}

/// Download the signed lock transaction as a plain-text base64 PSBT.
pub(super) async fn export_signed(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(outpoint): Path<String>,
) -> Result<Response, AppError> {
    check_auth(&state.api_token, &headers)?;
    let outpoint = OutPoint::from_str(&outpoint)
        .map_err(|e| AppError::BadRequest(format!("invalid outpoint `{outpoint}`: {e}")))?;
    let signed = state.orchestrator.export(&outpoint).await?;

    let mut response = (StatusCode::OK, signed.0).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    let disposition = format!(
        "attachment; filename=\"hodlock-{}-{}.psbt.txt\"",
        outpoint.txid, outpoint.vout
    );
    let disposition_header = HeaderValue::from_str(&disposition)
        .map_err(|e| AppError::Internal(format!("invalid content disposition header: {e}")))?;
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition_header);
    Ok(response)
}
