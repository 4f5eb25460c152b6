mod auth;
mod error;
mod lock;
mod policy;
mod session;
mod utxos;

use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use hodlock_core::{CoreError, LockOrchestrator};

use self::error::{map_core_error, AppError};

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub orchestrator: Arc<LockOrchestrator>,
    pub api_token: String,
}

type SharedState = Arc<AppState>;

/// Run a wallet-facing operation on its own task so that a dropped HTTP
/// request cannot cancel it halfway through a sign/broadcast sequence.
async fn run_detached<T, F, Fut>(state: &SharedState, work: F) -> Result<T, AppError>
where
    F: FnOnce(Arc<LockOrchestrator>) -> Fut,
    Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work(state.orchestrator.clone()))
        .await
        .map_err(|e| AppError::Internal(format!("wallet task failed: {e}")))?
        .map_err(map_core_error)
}

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, allowed_origin: HeaderValue) -> Router {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches; otherwise omit the header entirely.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &HeaderValue, _| *request_origin == allowed_origin,
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static(auth::API_TOKEN_HEADER),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/policy", get(policy::get_policy));

    let protected_api = Router::new()
        .route("/api/v1/providers", get(session::list_providers))
        .route(
            "/api/v1/session",
            get(session::get_session)
                .post(session::connect)
                .delete(session::disconnect),
        )
        .route("/api/v1/utxos", get(utxos::get_utxos))
        .route("/api/v1/utxos/refresh", post(utxos::refresh_utxos))
        .route("/api/v1/psbt", post(lock::preview_psbt))
        .route("/api/v1/lock", post(lock::lock))
        .route("/api/v1/unlock", post(lock::unlock))
        .route(
            "/api/v1/locked/{outpoint}/export",
            get(lock::export_signed),
        );

    Router::new()
        .merge(public_api)
        .merge(protected_api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .fallback(api_not_found)
        .layer(cors)
        .with_state(shared)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> AppError {
    AppError::NotFound("API route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use hodlock_core::wallet::{FixtureWallet, ProviderRegistry};
    use hodlock_core::LockPolicy;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";
    const DESTINATION: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const CHANGE: &str = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";
    const SAMPLE_TXID: &str = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

    fn test_router(wallet: FixtureWallet) -> Router {
        let registry = ProviderRegistry::new().with(Arc::new(wallet));
        let state = AppState {
            orchestrator: Arc::new(LockOrchestrator::new(
                registry,
                LockPolicy::new(1).expect("one-year policy is valid"),
            )),
            api_token: TOKEN.to_string(),
        };
        build_router(state, HeaderValue::from_static("http://127.0.0.1:3090"))
    }

    fn sample_router() -> Router {
        test_router(FixtureWallet::builder().with_sample_utxos().build())
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-token", TOKEN);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request must build")
    }

    async fn send(router: &Router, req: Request<Body>) -> axum::response::Response {
        router
            .clone()
            .oneshot(req)
            .await
            .expect("router should serve request")
    }

    async fn response_body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .expect("response body must be readable");
        serde_json::from_slice(&bytes).expect("response body must be valid JSON")
    }

    async fn response_body_text(resp: axum::response::Response) -> String {
        let bytes = to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .expect("response body must be readable");
        String::from_utf8(bytes.to_vec()).expect("response body must be utf-8")
    }

    fn lock_body() -> Value {
        json!({
            "txid": SAMPLE_TXID,
            "vout": 0,
            "amount_sats": 90_000,
            "fee_sats": 1_000,
            "destination": DESTINATION,
            "change_address": CHANGE,
        })
    }

    async fn connect_fixture(router: &Router) -> Value {
        let response = send(
            router,
            request("POST", "/api/v1/session", Some(json!({ "provider": "fixture" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        response_body_json(response).await
    }

    fn error_message(json: &Value) -> &str {
        json.get("error")
            .and_then(Value::as_str)
            .expect("error body must carry a message")
    }

    #[tokio::test]
    async fn unknown_api_route_returns_json_404() {
        let router = sample_router();
        let response = send(&router, request("GET", "/api/v1/does-not-exist", None)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_body_json(response).await;
        assert_eq!(error_message(&json), "API route not found");
    }

    #[tokio::test]
    async fn public_routes_need_no_token() {
        let router = sample_router();
        let response = send(
            &router,
            Request::builder()
                .uri("/api/v1/policy")
                .body(Body::empty())
                .expect("request must build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_body_json(response).await;
        assert_eq!(json.get("duration_years").and_then(Value::as_u64), Some(1));
        let approx = json.get("approx_height").and_then(Value::as_u64).unwrap();
        let target = json.get("target_height").and_then(Value::as_u64).unwrap();
        assert_eq!(target - approx, 52_560);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let router = sample_router();
        let response = send(
            &router,
            Request::builder()
                .uri("/api/v1/session")
                .body(Body::empty())
                .expect("request must build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn connect_rejects_unknown_and_unregistered_providers() {
        let router = sample_router();

        let response = send(
            &router,
            request("POST", "/api/v1/session", Some(json!({ "provider": "metamask" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &router,
            request("POST", "/api/v1/session", Some(json!({ "provider": "unisat" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_body_json(response).await;
        assert!(error_message(&json).contains("unisat"));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let router = sample_router();
        let response = send(
            &router,
            Request::builder()
                .method("POST")
                .uri("/api/v1/lock")
                .header("x-api-token", TOKEN)
                .header("content-type", "application/json")
                .body(Body::from("{\"txid\":"))
                .expect("request must build"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lock_without_session_is_conflict() {
        let router = sample_router();
        let response = send(&router, request("POST", "/api/v1/lock", Some(lock_body()))).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = response_body_json(response).await;
        assert!(error_message(&json).contains("no wallet session"));
    }

    #[tokio::test]
    async fn connection_failure_is_bad_gateway_with_provider_message() {
        let router = test_router(FixtureWallet::builder().fail_connect("wallet locked").build());
        let response = send(
            &router,
            request("POST", "/api/v1/session", Some(json!({ "provider": "fixture" }))),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = response_body_json(response).await;
        assert!(error_message(&json).contains("wallet locked"));
    }

    #[tokio::test]
    async fn signing_rejection_is_bad_gateway_and_keeps_output_available() {
        let router = test_router(
            FixtureWallet::builder()
                .with_sample_utxos()
                .reject_signing()
                .build(),
        );
        connect_fixture(&router).await;

        let response = send(&router, request("POST", "/api/v1/lock", Some(lock_body()))).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = send(&router, request("GET", "/api/v1/utxos?current_height=1", None)).await;
        let json = response_body_json(response).await;
        assert_eq!(json["available"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["locked"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn preview_returns_psbt_and_summary() {
        let router = sample_router();
        connect_fixture(&router).await;

        let response = send(&router, request("POST", "/api/v1/psbt", Some(lock_body()))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_body_json(response).await;
        assert!(json["psbt"].as_str().is_some_and(|p| p.starts_with("cHNidP8")));
        assert_eq!(json["change_sats"].as_u64(), Some(9_000));
        assert_eq!(json["summary"]["input_count"].as_u64(), Some(1));
    }

    #[tokio::test]
    async fn insufficient_funds_is_bad_request() {
        let router = sample_router();
        connect_fixture(&router).await;

        let mut body = lock_body();
        body["amount_sats"] = json!(200_000);
        let response = send(&router, request("POST", "/api/v1/psbt", Some(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lock_export_and_unlock_flow() {
        let router = sample_router();
        let connected = connect_fixture(&router).await;
        assert_eq!(connected["session"]["provider"], "fixture");
        assert_eq!(connected["utxos"]["status"], "listed");
        assert_eq!(connected["utxos"]["count"], 2);

        let response = send(&router, request("POST", "/api/v1/lock", Some(lock_body()))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let receipt = response_body_json(response).await;
        let lock_height = receipt["lock_height"].as_u64().expect("lock height") as u32;
        let signed = receipt["signed_transaction"]
            .as_str()
            .expect("signed transaction")
            .to_owned();

        let response = send(
            &router,
            request("GET", &format!("/api/v1/locked/{SAMPLE_TXID}:0/export"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(response_body_text(response).await, signed);

        let response = send(&router, request("POST", "/api/v1/lock", Some(lock_body()))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let early = json!({ "txid": SAMPLE_TXID, "vout": 0, "current_height": lock_height - 1 });
        let response = send(&router, request("POST", "/api/v1/unlock", Some(early))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let mature = json!({ "txid": SAMPLE_TXID, "vout": 0, "current_height": lock_height });
        let response = send(&router, request("POST", "/api/v1/unlock", Some(mature))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_body_json(response).await;
        assert_eq!(json["released"]["vout"], 0);
        assert_eq!(json["current_height"].as_u64(), Some(u64::from(lock_height)));

        let response = send(
            &router,
            request("GET", &format!("/api/v1/locked/{SAMPLE_TXID}:0/export"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_rejects_malformed_outpoint() {
        let router = sample_router();
        let response = send(&router, request("GET", "/api/v1/locked/nope/export", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn disconnect_clears_session() {
        let router = sample_router();
        connect_fixture(&router).await;

        let response = send(&router, request("DELETE", "/api/v1/session", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&router, request("GET", "/api/v1/session", None)).await;
        let json = response_body_json(response).await;
        assert!(json["session"].is_null());

        let response = send(&router, request("GET", "/api/v1/providers", None)).await;
        let json = response_body_json(response).await;
        assert_eq!(json["registered"], json!(["fixture"]));
    }
}
