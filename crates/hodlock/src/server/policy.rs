use axum::extract::State;
use axum::Json;
use serde::Serialize;

use hodlock_core::policy::{BLOCKS_PER_YEAR, LOCKTIME_THRESHOLD};
use hodlock_core::types::BlockHeight;

use super::error::AppError;
use super::SharedState;

#[derive(Serialize)]
pub(super) struct PolicyResponse {
    duration_years: u32,
    blocks_per_year: u32,
    approx_height: BlockHeight,
    target_height: BlockHeight,
    locktime_threshold: u32,
}

pub(super) async fn get_policy(
    State(state): State<SharedState>,
) -> Result<Json<PolicyResponse>, AppError> {
    let orchestrator = &state.orchestrator;
    Ok(Json(PolicyResponse {
        duration_years: orchestrator.policy().duration_years(),
        blocks_per_year: BLOCKS_PER_YEAR,
        approx_height: orchestrator.approx_height()?,
        target_height: orchestrator.target_height()?,
        locktime_threshold: LOCKTIME_THRESHOLD,
    }))
}
