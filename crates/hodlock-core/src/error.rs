use std::time::Duration;

use bitcoin::{Amount, OutPoint};

use crate::types::{BlockHeight, ProviderName, WalletOperation};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("could not connect to {provider} wallet: {source}")]
    WalletConnection {
        provider: ProviderName,
        #[source]
        source: Box<CoreError>,
    },

    #[error("{provider} wallet does not support `{operation}`")]
    UnsupportedOperation {
        provider: ProviderName,
        operation: WalletOperation,
    },

    #[error("wallet provider `{0}` is not registered")]
    ProviderNotRegistered(ProviderName),

    #[error("no wallet session; connect a wallet first")]
    NoSession,

    #[error("insufficient funds: inputs total {available}, need {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("no inputs selected")]
    EmptyInputs,

    #[error("invalid transaction encoding: {0}")]
    TxEncoding(String),

    #[error("signing with {provider} failed: {source}")]
    Signing {
        provider: ProviderName,
        #[source]
        source: Box<CoreError>,
    },

    #[error("broadcast through {provider} failed: {source}")]
    Broadcast {
        provider: ProviderName,
        #[source]
        source: Box<CoreError>,
    },

    #[error("output {0} is not available")]
    NotAvailable(OutPoint),

    #[error("output {0} is not locked")]
    NotLocked(OutPoint),

    #[error("output {outpoint} unlocks at height {lock_height}, chain is at {current_height}")]
    NotMatured {
        outpoint: OutPoint,
        lock_height: BlockHeight,
        current_height: BlockHeight,
    },

    #[error("{0} lock sequence(s) still in flight")]
    SequenceInFlight(usize),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Failures raised while talking to an external wallet.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("bridge transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("wallet error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("request rejected in wallet: {0}")]
    Rejected(String),

    #[error("wallet did not answer within {0:?}")]
    Timeout(Duration),

    #[error("invalid wallet response: {0}")]
    InvalidResponse(String),

    #[error("{0} wallet has not granted account access yet")]
    NotConnected(ProviderName),
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::Transport(err)
    }
}

impl CoreError {
    pub(crate) fn unsupported(provider: ProviderName, operation: WalletOperation) -> Self {
        CoreError::UnsupportedOperation {
            provider,
            operation,
        }
    }
}
