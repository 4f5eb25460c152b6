use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::types::ProviderName;

use super::providers::{Leather, Phantom, Unisat, Xverse};
use super::{WalletBridge, WalletCapability};

/// Maps provider names to wallet implementations.
///
/// Only registered providers can be connected. The fixture wallet is
/// never registered implicitly.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderName, Arc<dyn WalletCapability>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, wallet: Arc<dyn WalletCapability>) -> Self {
        self.register(wallet);
        self
    }

    /// Register `wallet` under its own provider name, replacing any earlier
    /// registration.
    pub fn register(&mut self, wallet: Arc<dyn WalletCapability>) {
        self.providers.insert(wallet.provider(), wallet);
    }

    pub fn resolve(&self, name: ProviderName) -> Result<Arc<dyn WalletCapability>, CoreError> {
        self.providers
            .get(&name)
            .cloned()
            .ok_or(CoreError::ProviderNotRegistered(name))
    }

    pub fn names(&self) -> Vec<ProviderName> {
        self.providers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Construct the bridged implementation for `name`.
pub fn bridged_provider(
    name: ProviderName,
    bridge: Arc<dyn WalletBridge>,
) -> Result<Arc<dyn WalletCapability>, CoreError> {
    let wallet: Arc<dyn WalletCapability> = match name {
        ProviderName::Unisat => Arc::new(Unisat::new(bridge)),
        ProviderName::Xverse => Arc::new(Xverse::new(bridge)),
        ProviderName::Leather => Arc::new(Leather::new(bridge)),
        ProviderName::Phantom => Arc::new(Phantom::new(bridge)),
        ProviderName::Fixture => {
            return Err(CoreError::Validation(
                "the fixture wallet runs in-process and cannot use a bridge".to_owned(),
            ))
        }
    };
    Ok(wallet)
}
