//! Lock orchestration: session lifecycle and the lock/unlock protocol.
//!
//! A lock runs `reserve → build → sign → verify → broadcast → record`.
//! The repository is mutated only after the wallet reports a broadcast
//! txid; every earlier failure releases the reservation and leaves the
//! available and locked collections exactly as they were.
//!
//! Lock ordering: when both locks are needed the repository lock is taken
//! before the session lock. Neither is held across a wallet call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bitcoin::{Amount, OutPoint, Txid};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::builder::{self, LockPlan, UnsignedTransaction};
use crate::error::{CoreError, WalletError};
use crate::policy::{self, LockPolicy};
use crate::repository::{LockTerms, UtxoRepository};
use crate::types::{
    BlockHeight, LockPhase, LockedOutput, ProviderName, SignedTransaction, UnspentOutput,
    UtxoState, WalletSession,
};
use crate::wallet::{ProviderRegistry, WalletCapability};

// ==============================================================================
// Requests and Results
// ==============================================================================

/// Operator intent for one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub outpoint: OutPoint,
    pub amount: Amount,
    pub fee: Amount,
    /// Address the locked amount pays to; recorded as the unlock address.
    pub destination: String,
    pub change_address: String,
}

impl LockRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.amount == Amount::ZERO {
            return Err(CoreError::Validation("amount must be positive".to_owned()));
        }
        if self.destination.trim().is_empty() {
            return Err(CoreError::Validation("destination is required".to_owned()));
        }
        if self.change_address.trim().is_empty() {
            return Err(CoreError::Validation(
                "change address is required".to_owned(),
            ));
        }
        Ok(())
    }

    fn plan(&self, lock_height: BlockHeight) -> LockPlan {
        LockPlan {
            amount: self.amount,
            fee: self.fee,
            lock_height,
            destination: self.destination.trim().to_owned(),
            change_address: self.change_address.trim().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LockReceipt {
    pub txid: Txid,
    pub lock_height: BlockHeight,
    pub signed_transaction: SignedTransaction,
    pub locked: LockedOutput,
}

/// Outcome of re-listing the wallet's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UtxoRefresh {
    Listed { count: usize },
    /// The wallet could not list outputs; the available set is now empty.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingView {
    pub outpoint: OutPoint,
    pub state: UtxoState,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockedView {
    #[serde(flatten)]
    pub locked: LockedOutput,
    pub state: UtxoState,
    pub blocks_remaining: u32,
}

/// Read model for a UI: everything the session currently tracks.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub session: Option<WalletSession>,
    pub current_height: BlockHeight,
    pub available: Vec<UnspentOutput>,
    pub pending: Vec<PendingView>,
    pub locked: Vec<LockedView>,
    pub is_loading: bool,
}

// ==============================================================================
// Orchestrator
// ==============================================================================

#[derive(Clone)]
struct ActiveSession {
    id: u64,
    session: WalletSession,
    wallet: Arc<dyn WalletCapability>,
}

pub struct LockOrchestrator {
    registry: ProviderRegistry,
    policy: LockPolicy,
    session: RwLock<Option<ActiveSession>>,
    repository: RwLock<UtxoRepository>,
    next_session_id: AtomicU64,
}

impl LockOrchestrator {
    pub fn new(registry: ProviderRegistry, policy: LockPolicy) -> Self {
        Self {
            registry,
            policy,
            session: RwLock::new(None),
            repository: RwLock::new(UtxoRepository::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Connect to `provider`, replacing any current session.
    ///
    /// The previous session and all tracked outputs are dropped before the
    /// wallet is asked for access, so a failed connect leaves no session.
    pub async fn connect(&self, provider: ProviderName) -> Result<WalletSession, CoreError> {
        let wallet = self.registry.resolve(provider)?;
        self.end_session().await?;

        info!(provider = %provider, "connecting wallet");
        let connection_error = |source: CoreError| CoreError::WalletConnection {
            provider,
            source: Box::new(source),
        };

        let address = wallet
            .request_accounts()
            .await
            .map_err(connection_error)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                connection_error(
                    WalletError::InvalidResponse("wallet returned no accounts".to_owned()).into(),
                )
            })?;
        let network = wallet.get_network().await.map_err(connection_error)?;
        let balance = match wallet.get_balance().await {
            Ok(balance) => Some(balance),
            Err(err) => {
                debug!(provider = %provider, error = %err, "balance unavailable");
                None
            }
        };

        let session = WalletSession {
            provider,
            address,
            network,
            balance,
        };
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        *self.session.write().await = Some(ActiveSession {
            id,
            session: session.clone(),
            wallet,
        });
        info!(provider = %provider, address = %session.address, %network, "wallet connected");
        Ok(session)
    }

    pub async fn disconnect(&self) -> Result<(), CoreError> {
        if let Some(previous) = self.end_session().await? {
            info!(provider = %previous.provider, "wallet disconnected");
        }
        Ok(())
    }

    pub async fn session(&self) -> Option<WalletSession> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|active| active.session.clone())
    }

    /// Drop the session and clear the repository, unless a lock sequence
    /// is still in flight.
    async fn end_session(&self) -> Result<Option<WalletSession>, CoreError> {
        let mut repo = self.repository.write().await;
        let pending = repo.pending_count();
        if pending > 0 {
            return Err(CoreError::SequenceInFlight(pending));
        }
        let previous = self.session.write().await.take();
        repo.clear();
        Ok(previous.map(|active| active.session))
    }

    async fn active(&self) -> Result<ActiveSession, CoreError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(CoreError::NoSession)
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    /// Re-list the session address's outputs from the wallet.
    ///
    /// A listing failure empties the available set and is reported as
    /// [`UtxoRefresh::Unavailable`]; stale outputs are never kept. A
    /// listing that finishes after its session was replaced is discarded.
    pub async fn refresh_utxos(&self) -> Result<UtxoRefresh, CoreError> {
        let active = self.active().await?;
        self.repository.write().await.begin_listing();

        let listing = active.wallet.list_utxos(&active.session.address).await;

        let mut repo = self.repository.write().await;
        repo.finish_listing();
        let current_id = self.session.read().await.as_ref().map(|s| s.id);
        if current_id != Some(active.id) {
            debug!(
                provider = %active.session.provider,
                "discarding listing from a replaced session"
            );
            return Ok(UtxoRefresh::Unavailable {
                reason: "wallet session changed while listing".to_owned(),
            });
        }

        match listing {
            Ok(outputs) => {
                let count = repo.replace_available(outputs);
                info!(provider = %active.session.provider, count, "utxos refreshed");
                Ok(UtxoRefresh::Listed { count })
            }
            Err(err) => {
                repo.replace_available(Vec::new());
                warn!(provider = %active.session.provider, error = %err, "utxo listing failed");
                Ok(UtxoRefresh::Unavailable {
                    reason: err.to_string(),
                })
            }
        }
    }

    pub fn target_height(&self) -> Result<BlockHeight, CoreError> {
        self.policy.target_height(SystemTime::now())
    }

    /// Approximate current chain height from the wall clock.
    pub fn approx_height(&self) -> Result<BlockHeight, CoreError> {
        policy::approx_height(SystemTime::now())
    }

    // ========================================================================
    // Lock protocol
    // ========================================================================

    /// Build the unsigned lock transaction for `request` without reserving
    /// the output or contacting the wallet.
    pub async fn preview(&self, request: &LockRequest) -> Result<UnsignedTransaction, CoreError> {
        request.validate()?;
        let active = self.active().await?;
        let lock_height = self.target_height()?;
        let input = self
            .repository
            .read()
            .await
            .available()
            .find(|output| output.outpoint() == request.outpoint)
            .cloned()
            .ok_or(CoreError::NotAvailable(request.outpoint))?;

        builder::build(
            std::slice::from_ref(&input),
            &request.plan(lock_height),
            active.session.network,
        )
    }

    /// Run the full lock protocol for one output.
    ///
    /// A second call for the same outpoint fails with `NotAvailable` while
    /// the first is in flight.
    pub async fn lock(&self, request: &LockRequest) -> Result<LockReceipt, CoreError> {
        request.validate()?;
        let active = self.active().await?;
        let lock_height = self.target_height()?;
        let outpoint = request.outpoint;

        let input = self.repository.write().await.reserve(&outpoint)?;
        info!(
            provider = %active.session.provider,
            outpoint = %outpoint,
            lock_height = *lock_height,
            "lock sequence started"
        );

        match self.run_sequence(&active, input, request, lock_height).await {
            Ok(receipt) => {
                info!(
                    outpoint = %outpoint,
                    txid = %receipt.txid,
                    lock_height = *lock_height,
                    "output locked"
                );
                Ok(receipt)
            }
            Err(err) => {
                self.repository.write().await.release(&outpoint);
                warn!(outpoint = %outpoint, error = %err, "lock sequence failed");
                Err(err)
            }
        }
    }

    async fn run_sequence(
        &self,
        active: &ActiveSession,
        input: UnspentOutput,
        request: &LockRequest,
        lock_height: BlockHeight,
    ) -> Result<LockReceipt, CoreError> {
        let outpoint = input.outpoint();
        let provider = active.session.provider;
        let plan = request.plan(lock_height);

        let unsigned = builder::build(
            std::slice::from_ref(&input),
            &plan,
            active.session.network,
        )?;
        self.advance(&outpoint, LockPhase::AwaitingSignature).await?;

        let signing_error = |source: CoreError| CoreError::Signing {
            provider,
            source: Box::new(source),
        };
        let signed = active
            .wallet
            .sign_transaction(&unsigned.to_base64())
            .await
            .map_err(signing_error)?;
        builder::verify_signed(&unsigned, &signed).map_err(signing_error)?;
        self.advance(&outpoint, LockPhase::AwaitingBroadcast).await?;

        let txid = active
            .wallet
            .broadcast_transaction(&signed)
            .await
            .map_err(|source| CoreError::Broadcast {
                provider,
                source: Box::new(source),
            })?;

        let signed_transaction = SignedTransaction(signed);
        let locked = self
            .repository
            .write()
            .await
            .mark_locked(
                &outpoint,
                LockTerms {
                    lock_height,
                    unlock_address: plan.destination,
                    lock_txid: Some(txid),
                    signed_transaction: Some(signed_transaction.clone()),
                },
            )?
            .clone();

        Ok(LockReceipt {
            txid,
            lock_height,
            signed_transaction,
            locked,
        })
    }

    async fn advance(&self, outpoint: &OutPoint, phase: LockPhase) -> Result<(), CoreError> {
        self.repository.write().await.advance(outpoint, phase)?;
        debug!(outpoint = %outpoint, ?phase, "lock sequence advanced");
        Ok(())
    }

    /// Release a matured lock. The maturity check runs against
    /// `current_height` on every call.
    pub async fn unlock(
        &self,
        outpoint: &OutPoint,
        current_height: BlockHeight,
    ) -> Result<UnspentOutput, CoreError> {
        self.active().await?;
        let released = self
            .repository
            .write()
            .await
            .mark_unlocked(outpoint, current_height)?;
        info!(outpoint = %outpoint, current_height = *current_height, "output unlocked");
        Ok(released)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn status(
        &self,
        outpoint: &OutPoint,
        current_height: BlockHeight,
    ) -> Option<UtxoState> {
        self.repository.read().await.state(outpoint, current_height)
    }

    /// The signed container recorded for a locked output.
    pub async fn export(&self, outpoint: &OutPoint) -> Result<SignedTransaction, CoreError> {
        let repo = self.repository.read().await;
        let locked = repo
            .get_locked(outpoint)
            .ok_or(CoreError::NotLocked(*outpoint))?;
        locked.signed_transaction.clone().ok_or_else(|| {
            CoreError::Validation(format!("no signed transaction recorded for {outpoint}"))
        })
    }

    pub async fn snapshot(&self, current_height: BlockHeight) -> Snapshot {
        let session = self.session().await;
        let repo = self.repository.read().await;

        let pending = repo
            .pending()
            .map(|(outpoint, phase)| PendingView {
                outpoint: *outpoint,
                state: phase.into(),
            })
            .collect();
        let locked = repo
            .locked()
            .map(|locked| LockedView {
                state: if locked.is_mature(current_height) {
                    UtxoState::MatureUnclaimed
                } else {
                    UtxoState::Locked
                },
                blocks_remaining: current_height.blocks_until(locked.lock_height),
                locked: locked.clone(),
            })
            .collect();

        Snapshot {
            session,
            current_height,
            available: repo.available().cloned().collect(),
            pending,
            locked,
            is_loading: repo.is_loading(),
        }
    }
}
