use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use hodlock_core::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        map_core_error(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Operator mistakes are 400, missing things 404, state conflicts 409 and
/// anything the wallet side failed at 502.
pub(super) fn map_core_error(err: CoreError) -> AppError {
    let message = err.to_string();
    match err {
        CoreError::Validation(_)
        | CoreError::InsufficientFunds { .. }
        | CoreError::InvalidAddress { .. }
        | CoreError::EmptyInputs
        | CoreError::TxEncoding(_) => AppError::BadRequest(message),
        CoreError::ProviderNotRegistered(_) | CoreError::NotLocked(_) => {
            AppError::NotFound(message)
        }
        CoreError::NoSession
        | CoreError::NotAvailable(_)
        | CoreError::NotMatured { .. }
        | CoreError::SequenceInFlight(_) => AppError::Conflict(message),
        CoreError::WalletConnection { .. }
        | CoreError::UnsupportedOperation { .. }
        | CoreError::Signing { .. }
        | CoreError::Broadcast { .. }
        | CoreError::Wallet(_) => AppError::BadGateway(message),
    }
}
