mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::Parser;
use eyre::WrapErr;

use hodlock_core::wallet::{bridged_provider, FixtureWallet, HttpWalletBridge, ProviderRegistry};
use hodlock_core::{LockOrchestrator, LockPolicy};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Generate a random API token for this server session.
    let api_token = {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        hex_encode(bytes)
    };

    let policy = LockPolicy::new(args.lock_years).wrap_err("invalid --lock-years")?;
    let registry = build_registry(&args)?;
    if registry.is_empty() {
        tracing::warn!(
            "no wallet providers registered; \
             pass --wallet <provider>=<url> or --enable-fixture-wallet"
        );
    }
    tracing::info!(
        lock_years = policy.duration_years(),
        providers = ?registry.names(),
        "lock policy ready"
    );

    let state = server::AppState {
        orchestrator: Arc::new(LockOrchestrator::new(registry, policy)),
        api_token: api_token.clone(),
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = HeaderValue::from_str(&format!("http://{}:{}", args.bind, args.port))
        .wrap_err("build allowed CORS origin")?;
    let router = server::build_router(state, origin);

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and is reachable from the network");
    }

    println!();
    println!("  hodlock is running:");
    println!("    API:       http://{bind_addr}/api/v1");
    println!("    Token:     {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    Ok(())
}

fn build_registry(args: &cli::Cli) -> eyre::Result<ProviderRegistry> {
    let timeout = Duration::from_secs(args.wallet_timeout_secs);
    let mut registry = ProviderRegistry::new();

    for endpoint in &args.wallets {
        let bridge = HttpWalletBridge::new(
            &endpoint.url,
            args.wallet_user.as_deref(),
            args.wallet_pass.as_deref(),
            timeout,
        )
        .wrap_err_with(|| format!("configure {} wallet bridge", endpoint.provider))?;
        registry.register(bridged_provider(endpoint.provider, Arc::new(bridge))?);
        tracing::info!(
            provider = %endpoint.provider,
            url = %endpoint.url,
            "wallet bridge registered"
        );
    }

    if args.enable_fixture_wallet {
        registry.register(Arc::new(
            FixtureWallet::builder()
                .network(args.fixture_network)
                .with_sample_utxos()
                .build(),
        ));
        tracing::warn!(
            network = %args.fixture_network,
            "fixture wallet enabled; it lists sample outputs and never signs for real"
        );
    }

    Ok(registry)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Tiny hex-encoding helper to avoid adding a `hex` crate dependency.
fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
