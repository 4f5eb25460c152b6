//! In-process wallet for demos and tests.
//!
//! `FixtureWallet` never reaches an external signer. It reports a fixed
//! address and network, lists configured outputs, "signs" by echoing a
//! well-formed PSBT and "broadcasts" by recording the transaction id. It
//! is only reachable when explicitly registered; nothing falls back to it
//! when a real provider fails.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bitcoin::{Amount, Psbt, Txid};
use tokio::sync::Mutex;
use tracing::info;

use crate::builder::parse_address;
use crate::error::{CoreError, WalletError};
use crate::types::{ProviderName, UnspentOutput, WalletNetwork, WalletOperation};

use super::WalletCapability;

/// BIP-173 P2WPKH vectors used as the default fixture addresses.
const MAINNET_FIXTURE_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
const TESTNET_FIXTURE_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

/// Demonstration outputs: (txid, vout, sats).
const SAMPLE_OUTPUTS: [(&str, u32, u64); 2] = [
    (
        "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
        0,
        100_000,
    ),
    (
        "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890",
        1,
        50_000,
    ),
];

/// Code reported for simulated provider failures (JSON-RPC server error).
const FIXTURE_ERROR_CODE: i64 = -32000;

pub struct FixtureWallet {
    address: String,
    network: WalletNetwork,
    balance: Option<Amount>,
    utxos: Vec<UnspentOutput>,
    include_samples: bool,
    connect_failure: Option<String>,
    listing_failure: Option<String>,
    reject_signing: bool,
    broadcast_failure: Option<String>,
    connected: AtomicBool,
    broadcasts: Mutex<Vec<Txid>>,
}

impl FixtureWallet {
    pub fn builder() -> FixtureWalletBuilder {
        FixtureWalletBuilder::default()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Transaction ids "broadcast" so far, in order.
    pub async fn broadcasts(&self) -> Vec<Txid> {
        self.broadcasts.lock().await.clone()
    }

    fn ensure_connected(&self) -> Result<(), CoreError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(WalletError::NotConnected(ProviderName::Fixture).into())
        }
    }

    fn sample_outputs(&self) -> Result<Vec<UnspentOutput>, CoreError> {
        let script = parse_address(&self.address, self.network)?.script_pubkey();
        SAMPLE_OUTPUTS
            .iter()
            .map(|(txid, vout, sats)| {
                let txid = Txid::from_str(txid)
                    .map_err(|e| CoreError::Validation(format!("bad sample txid: {e}")))?;
                Ok(UnspentOutput {
                    txid,
                    vout: *vout,
                    value: Amount::from_sat(*sats),
                    script: script.clone(),
                    address: Some(self.address.clone()),
                })
            })
            .collect()
    }
}

fn simulated_failure(message: &str) -> CoreError {
    WalletError::Provider {
        code: FIXTURE_ERROR_CODE,
        message: message.to_owned(),
    }
    .into()
}

fn parse_psbt(base64: &str) -> Result<Psbt, CoreError> {
    Psbt::from_str(base64.trim()).map_err(|e| {
        WalletError::Provider {
            code: -32602,
            message: format!("not a valid psbt: {e}"),
        }
        .into()
    })
}

#[async_trait]
impl WalletCapability for FixtureWallet {
    fn provider(&self) -> ProviderName {
        ProviderName::Fixture
    }

    async fn request_accounts(&self) -> Result<Vec<String>, CoreError> {
        if let Some(message) = &self.connect_failure {
            return Err(simulated_failure(message));
        }
        self.connected.store(true, Ordering::Release);
        Ok(vec![self.address.clone()])
    }

    async fn get_network(&self) -> Result<WalletNetwork, CoreError> {
        self.ensure_connected()?;
        Ok(self.network)
    }

    async fn get_balance(&self) -> Result<Amount, CoreError> {
        self.ensure_connected()?;
        self.balance.ok_or_else(|| {
            CoreError::unsupported(ProviderName::Fixture, WalletOperation::GetBalance)
        })
    }

    async fn list_utxos(&self, _address: &str) -> Result<Vec<UnspentOutput>, CoreError> {
        self.ensure_connected()?;
        if let Some(message) = &self.listing_failure {
            return Err(simulated_failure(message));
        }
        let mut listing = self.utxos.clone();
        if self.include_samples {
            listing.extend(self.sample_outputs()?);
        }
        Ok(listing)
    }

    async fn sign_transaction(&self, psbt_base64: &str) -> Result<String, CoreError> {
        self.ensure_connected()?;
        if self.reject_signing {
            return Err(WalletError::Rejected("User rejected the request.".to_owned()).into());
        }
        parse_psbt(psbt_base64)?;
        Ok(psbt_base64.trim().to_owned())
    }

    async fn broadcast_transaction(&self, signed_base64: &str) -> Result<Txid, CoreError> {
        self.ensure_connected()?;
        if let Some(message) = &self.broadcast_failure {
            return Err(simulated_failure(message));
        }
        let txid = parse_psbt(signed_base64)?.unsigned_tx.compute_txid();
        info!(%txid, "fixture wallet recorded broadcast");
        self.broadcasts.lock().await.push(txid);
        Ok(txid)
    }
}

#[derive(Default)]
pub struct FixtureWalletBuilder {
    address: Option<String>,
    network: WalletNetwork,
    balance: Option<Amount>,
    utxos: Vec<UnspentOutput>,
    include_samples: bool,
    connect_failure: Option<String>,
    listing_failure: Option<String>,
    reject_signing: bool,
    broadcast_failure: Option<String>,
}

impl FixtureWalletBuilder {
    /// Defaults to a well-known P2WPKH address on the chosen network.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn network(mut self, network: WalletNetwork) -> Self {
        self.network = network;
        self
    }

    /// Without a balance the wallet behaves like a provider that cannot
    /// report one.
    pub fn balance(mut self, balance: Amount) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_utxo(mut self, utxo: UnspentOutput) -> Self {
        self.utxos.push(utxo);
        self
    }

    /// List two demonstration outputs (100 000 and 50 000 sats) paying the
    /// fixture address.
    pub fn with_sample_utxos(mut self) -> Self {
        self.include_samples = true;
        self
    }

    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_failure = Some(message.into());
        self
    }

    pub fn fail_listing(mut self, message: impl Into<String>) -> Self {
        self.listing_failure = Some(message.into());
        self
    }

    pub fn reject_signing(mut self) -> Self {
        self.reject_signing = true;
        self
    }

    pub fn fail_broadcast(mut self, message: impl Into<String>) -> Self {
        self.broadcast_failure = Some(message.into());
        self
    }

    pub fn build(self) -> FixtureWallet {
        let address = self.address.unwrap_or_else(|| {
            match self.network {
                WalletNetwork::Mainnet => MAINNET_FIXTURE_ADDRESS,
                WalletNetwork::Testnet => TESTNET_FIXTURE_ADDRESS,
            }
            .to_owned()
        });
        FixtureWallet {
            address,
            network: self.network,
            balance: self.balance,
            utxos: self.utxos,
            include_samples: self.include_samples,
            connect_failure: self.connect_failure,
            listing_failure: self.listing_failure,
            reject_signing: self.reject_signing,
            broadcast_failure: self.broadcast_failure,
            connected: AtomicBool::new(false),
            broadcasts: Mutex::new(Vec::new()),
        }
    }
}
