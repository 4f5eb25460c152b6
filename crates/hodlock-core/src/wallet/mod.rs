//! External wallet abstraction layer.
//!
//! Defines the [`WalletCapability`] trait with one implementing type per
//! supported provider, the [`WalletBridge`] transport those providers talk
//! through (an HTTP JSON-RPC implementation is provided as
//! [`HttpWalletBridge`]), the opt-in [`FixtureWallet`], and the
//! [`ProviderRegistry`] that maps provider names to implementations.

pub mod fixture;
mod http_bridge;
#[cfg(test)]
pub(crate) mod mock;
mod parsing;
mod providers;
mod registry;

pub use fixture::FixtureWallet;
pub use http_bridge::HttpWalletBridge;
pub use providers::{Leather, Phantom, Unisat, Xverse};
pub use registry::{bridged_provider, ProviderRegistry};

use async_trait::async_trait;
use bitcoin::{Amount, Txid};

use crate::error::CoreError;
use crate::types::{ProviderName, UnspentOutput, WalletNetwork, WalletOperation};

/// The operations hodlock needs from an external wallet.
///
/// Every call may block on an approval prompt inside the wallet, so each
/// one is a suspension point for the caller. `request_accounts` must
/// succeed before any other operation; implementations answer earlier
/// calls with [`WalletError::NotConnected`](crate::error::WalletError).
/// Operations a provider does not offer fail with
/// [`CoreError::UnsupportedOperation`].
#[async_trait]
pub trait WalletCapability: Send + Sync {
    fn provider(&self) -> ProviderName;

    /// Ask the wallet for account access. The first address becomes the
    /// session address.
    async fn request_accounts(&self) -> Result<Vec<String>, CoreError>;

    async fn get_network(&self) -> Result<WalletNetwork, CoreError>;

    async fn get_balance(&self) -> Result<Amount, CoreError> {
        Err(CoreError::unsupported(
            self.provider(),
            WalletOperation::GetBalance,
        ))
    }

    async fn list_utxos(&self, _address: &str) -> Result<Vec<UnspentOutput>, CoreError> {
        Err(CoreError::unsupported(
            self.provider(),
            WalletOperation::ListUtxos,
        ))
    }

    /// Sign a base64 PSBT and return the signed base64 PSBT.
    async fn sign_transaction(&self, psbt_base64: &str) -> Result<String, CoreError>;

    async fn broadcast_transaction(&self, signed_base64: &str) -> Result<Txid, CoreError>;
}

/// Raw transport to a wallet: one named method call with JSON parameters.
///
/// Providers translate the capability contract into their own method
/// names and payload shapes on top of this.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError>;
}
