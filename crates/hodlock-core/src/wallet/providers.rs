//! Bridge-backed wallet providers.
//!
//! Each provider maps the [`WalletCapability`] contract onto its own
//! method names and payload shapes:
//!
//! | provider | accounts                      | network      | balance / utxos        | sign              | broadcast         |
//! |----------|-------------------------------|--------------|------------------------|-------------------|-------------------|
//! | Unisat   | `requestAccounts`             | `getNetwork` | `getBalance`/`getUtxos`| `signPsbt`        | `pushPsbt`        |
//!
//! Unisat builds differ in what they expose: listing falls back to
//! `getUnspent`, signing to `signTransaction` then `sign`, and broadcast to
//! `sendTransaction` then `broadcast`, for as long as the wallet answers
//! "method not found".
//! | Xverse   | `requestAccounts`             | `getNetwork` | unsupported            | `signPsbt`        | `pushPsbt`        |
//! | Leather  | `requestAccounts`             | mainnet      | unsupported            | `signPsbt`        | `pushPsbt`        |
//! | Phantom  | `connect` then `getAccounts`  | mainnet      | unsupported            | `signTransaction` | `sendTransaction` |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{Amount, Txid};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CoreError, WalletError};
use crate::types::{ProviderName, UnspentOutput, WalletNetwork};

use super::parsing::{
    parse_accounts, parse_balance, parse_network, parse_signed_psbt, parse_txid, parse_utxos,
};
use super::{WalletBridge, WalletCapability};

/// JSON-RPC "method not found"; the next alias is tried.
const METHOD_NOT_FOUND: i64 = -32601;

const UNISAT_LIST: &[&str] = &["getUtxos", "getUnspent"];
const UNISAT_SIGN: &[&str] = &["signPsbt", "signTransaction", "sign"];
const UNISAT_BROADCAST: &[&str] = &["pushPsbt", "sendTransaction", "broadcast"];

/// Connection state shared by every bridged provider.
struct BridgeSession {
    provider: ProviderName,
    bridge: Arc<dyn WalletBridge>,
    connected: AtomicBool,
}

impl BridgeSession {
    fn new(provider: ProviderName, bridge: Arc<dyn WalletBridge>) -> Self {
        Self {
            provider,
            bridge,
            connected: AtomicBool::new(false),
        }
    }

    fn ensure_connected(&self) -> Result<(), CoreError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(WalletError::NotConnected(self.provider).into())
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, CoreError> {
        debug!(provider = %self.provider, method, "wallet request");
        self.bridge.call(method, params).await
    }

    /// Call `method` only after account access has been granted.
    async fn connected_call(&self, method: &str, params: Vec<Value>) -> Result<Value, CoreError> {
        self.ensure_connected()?;
        self.call(method, params).await
    }

    /// Call the first of `methods` the wallet implements.
    async fn connected_call_any(
        &self,
        methods: &[&str],
        params: Vec<Value>,
    ) -> Result<Value, CoreError> {
        self.ensure_connected()?;
        for method in methods {
            match self.call(method, params.clone()).await {
                Err(CoreError::Wallet(WalletError::Provider {
                    code: METHOD_NOT_FOUND,
                    ..
                })) => {
                    debug!(provider = %self.provider, method, "wallet method not implemented");
                }
                other => return other,
            }
        }
        Err(WalletError::Provider {
            code: METHOD_NOT_FOUND,
            message: format!("wallet implements none of {}", methods.join(", ")),
        }
        .into())
    }

    fn accounts_granted(&self, raw: Value) -> Result<Vec<String>, CoreError> {
        let accounts = parse_accounts(raw)?;
        self.connected.store(true, Ordering::Release);
        Ok(accounts)
    }

    async fn request_accounts(&self) -> Result<Vec<String>, CoreError> {
        let raw = self.call("requestAccounts", Vec::new()).await?;
        self.accounts_granted(raw)
    }

    async fn get_network(&self) -> Result<WalletNetwork, CoreError> {
        parse_network(self.connected_call("getNetwork", Vec::new()).await?)
    }

    async fn sign(&self, methods: &[&str], psbt_base64: &str) -> Result<String, CoreError> {
        let raw = self
            .connected_call_any(methods, vec![json!(psbt_base64)])
            .await?;
        parse_signed_psbt(raw)
    }

    async fn broadcast(&self, methods: &[&str], signed_base64: &str) -> Result<Txid, CoreError> {
        let raw = self
            .connected_call_any(methods, vec![json!(signed_base64)])
            .await?;
        parse_txid(raw)
    }
}

// ==============================================================================
// Unisat
// ==============================================================================

/// Unisat: the only provider that reports a balance and lists UTXOs.
pub struct Unisat(BridgeSession);

impl Unisat {
    pub fn new(bridge: Arc<dyn WalletBridge>) -> Self {
        Self(BridgeSession::new(ProviderName::Unisat, bridge))
    }
}

#[async_trait]
impl WalletCapability for Unisat {
    fn provider(&self) -> ProviderName {
        ProviderName::Unisat
    }

    async fn request_accounts(&self) -> Result<Vec<String>, CoreError> {
        self.0.request_accounts().await
    }

    async fn get_network(&self) -> Result<WalletNetwork, CoreError> {
        self.0.get_network().await
    }

    async fn get_balance(&self) -> Result<Amount, CoreError> {
        parse_balance(self.0.connected_call("getBalance", Vec::new()).await?)
    }

    async fn list_utxos(&self, address: &str) -> Result<Vec<UnspentOutput>, CoreError> {
        let raw = self.0.connected_call_any(UNISAT_LIST, Vec::new()).await?;
        parse_utxos(raw, address)
    }

    async fn sign_transaction(&self, psbt_base64: &str) -> Result<String, CoreError> {
        self.0.sign(UNISAT_SIGN, psbt_base64).await
    }

    async fn broadcast_transaction(&self, signed_base64: &str) -> Result<Txid, CoreError> {
        self.0.broadcast(UNISAT_BROADCAST, signed_base64).await
    }
}

// ==============================================================================
// Xverse
// ==============================================================================

pub struct Xverse(BridgeSession);

impl Xverse {
    pub fn new(bridge: Arc<dyn WalletBridge>) -> Self {
        Self(BridgeSession::new(ProviderName::Xverse, bridge))
    }
}

#[async_trait]
impl WalletCapability for Xverse {
    fn provider(&self) -> ProviderName {
        ProviderName::Xverse
    }

    async fn request_accounts(&self) -> Result<Vec<String>, CoreError> {
        self.0.request_accounts().await
    }

    async fn get_network(&self) -> Result<WalletNetwork, CoreError> {
        self.0.get_network().await
    }

    async fn sign_transaction(&self, psbt_base64: &str) -> Result<String, CoreError> {
        self.0.sign(&["signPsbt"], psbt_base64).await
    }

    async fn broadcast_transaction(&self, signed_base64: &str) -> Result<Txid, CoreError> {
        self.0.broadcast(&["pushPsbt"], signed_base64).await
    }
}

// ==============================================================================
// Leather
// ==============================================================================

/// Leather exposes no network query; it is treated as mainnet.
pub struct Leather(BridgeSession);

impl Leather {
    pub fn new(bridge: Arc<dyn WalletBridge>) -> Self {
        Self(BridgeSession::new(ProviderName::Leather, bridge))
    }
}

#[async_trait]
impl WalletCapability for Leather {
    fn provider(&self) -> ProviderName {
        ProviderName::Leather
    }

    async fn request_accounts(&self) -> Result<Vec<String>, CoreError> {
        self.0.request_accounts().await
    }

    async fn get_network(&self) -> Result<WalletNetwork, CoreError> {
        self.0.ensure_connected()?;
        Ok(WalletNetwork::Mainnet)
    }

    async fn sign_transaction(&self, psbt_base64: &str) -> Result<String, CoreError> {
        self.0.sign(&["signPsbt"], psbt_base64).await
    }

    async fn broadcast_transaction(&self, signed_base64: &str) -> Result<Txid, CoreError> {
        self.0.broadcast(&["pushPsbt"], signed_base64).await
    }
}

// ==============================================================================
// Phantom
// ==============================================================================

/// Phantom grants access with `connect` and lists accounts as objects
/// carrying an `address` field. Treated as mainnet.
pub struct Phantom(BridgeSession);

impl Phantom {
    pub fn new(bridge: Arc<dyn WalletBridge>) -> Self {
        Self(BridgeSession::new(ProviderName::Phantom, bridge))
    }
}

#[async_trait]
impl WalletCapability for Phantom {
    fn provider(&self) -> ProviderName {
        ProviderName::Phantom
    }

    async fn request_accounts(&self) -> Result<Vec<String>, CoreError> {
        self.0.call("connect", Vec::new()).await?;
        let raw = self.0.call("getAccounts", Vec::new()).await?;
        self.0.accounts_granted(raw)
    }

    async fn get_network(&self) -> Result<WalletNetwork, CoreError> {
        self.0.ensure_connected()?;
        Ok(WalletNetwork::Mainnet)
    }

    async fn sign_transaction(&self, psbt_base64: &str) -> Result<String, CoreError> {
        self.0.sign(&["signTransaction"], psbt_base64).await
    }

    async fn broadcast_transaction(&self, signed_base64: &str) -> Result<Txid, CoreError> {
        self.0.broadcast(&["sendTransaction"], signed_base64).await
    }
}
