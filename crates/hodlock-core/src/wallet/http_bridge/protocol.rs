use crate::error::{CoreError, WalletError};

/// Error code wallets use for "the user rejected the request" (EIP-1193
/// convention, also used by the Bitcoin extension wallets).
pub(super) const USER_REJECTED_CODE: i64 = 4001;

#[derive(serde::Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    pub(super) jsonrpc: &'static str,
    pub(super) id: u64,
    pub(super) method: &'a str,
    pub(super) params: Vec<serde_json::Value>,
}

#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponse {
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

/// Parse a JSON-RPC error value into a structured `CoreError`.
///
/// Well-formed `{"code", "message"}` errors become `Provider` errors, or
/// `Rejected` for the user-rejection code. Anything else is reported as
/// `InvalidResponse` with the raw JSON.
pub(super) fn parse_jsonrpc_error(err: serde_json::Value) -> CoreError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) if parsed.code == USER_REJECTED_CODE => {
            WalletError::Rejected(parsed.message).into()
        }
        Ok(parsed) => WalletError::Provider {
            code: parsed.code,
            message: parsed.message,
        }
        .into(),
        Err(_) => {
            WalletError::InvalidResponse(format!("non-standard JSON-RPC error: {err}")).into()
        }
    }
}
