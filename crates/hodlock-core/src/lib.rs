pub mod builder;
pub mod error;
pub mod inspect;
pub mod orchestrator;
pub mod policy;
pub mod repository;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod test_util;

pub use error::{CoreError, WalletError};
pub use orchestrator::{LockOrchestrator, LockReceipt, LockRequest, Snapshot, UtxoRefresh};
pub use policy::LockPolicy;
