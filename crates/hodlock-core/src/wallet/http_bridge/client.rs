use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tracing::{debug, trace};

use crate::error::{CoreError, WalletError};
use crate::wallet::WalletBridge;

use super::connection::{parse_connection, resolve_auth};
use super::protocol::{parse_jsonrpc_error, JsonRpcRequest, JsonRpcResponse};

/// Wallet bridge reached over HTTP(S) JSON-RPC 2.0.
///
/// One bridge serves one provider. The request timeout covers the whole
/// round trip, including the time the user spends on the wallet's approval
/// prompt, so it should be generous.
pub struct HttpWalletBridge {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpWalletBridge {
    /// Create a bridge client for an `http://` or `https://` URL.
    ///
    /// `user` and `pass` enable basic auth and must be given together.
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        if timeout.is_zero() {
            return Err(CoreError::Validation(
                "wallet bridge timeout must be non-zero".to_owned(),
            ));
        }
        let auth = resolve_auth(user, pass)?;
        let url = parse_connection(connection)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(WalletError::Transport)?;

        Ok(Self {
            client,
            url,
            auth,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, err: reqwest::Error) -> CoreError {
        if err.is_timeout() {
            WalletError::Timeout(self.timeout).into()
        } else {
            WalletError::Transport(err).into()
        }
    }
}

#[async_trait]
impl WalletBridge for HttpWalletBridge {
    async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            bridge.id = id,
            bridge.method = method,
            bridge.params = params.len(),
            "wallet call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(
            bridge.id = id,
            bridge.method = method,
            %status,
            body_len = body.len(),
            "wallet response"
        );
        trace!(bridge.id = id, bridge.method = method, body = %body, "wallet response body");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            WalletError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;

        if let Some(err) = decoded.error {
            return Err(parse_jsonrpc_error(err));
        }

        Ok(decoded.result.unwrap_or(serde_json::Value::Null))
    }
}
