//! `UtxoRepository`: the session's available and locked outputs.
//!
//! Three views over the wallet's outputs:
//! - **available**: spendable outputs from the last wallet listing.
//! - **pending**: available outputs reserved by an in-flight lock
//!   sequence, tagged with the sequence's current phase.
//! - **locked**: outputs committed to a broadcast timelock transaction.
//!
//! An outpoint is never both available and locked. Pending is a subset of
//! available; it only marks outputs that cannot be selected again yet.
//! A reserved output the latest listing no longer reports is kept only
//! for its in-flight sequence and is dropped when that sequence releases.

use std::collections::{BTreeMap, BTreeSet};

use bitcoin::{OutPoint, Txid};

use crate::error::CoreError;
use crate::types::{
    BlockHeight, LockPhase, LockedOutput, SignedTransaction, UnspentOutput, UtxoState,
};

/// What a successful lock records next to the output.
#[derive(Debug, Clone)]
pub struct LockTerms {
    pub lock_height: BlockHeight,
    pub unlock_address: String,
    pub lock_txid: Option<Txid>,
    pub signed_transaction: Option<SignedTransaction>,
}

#[derive(Debug, Default)]
pub struct UtxoRepository {
    available: BTreeMap<OutPoint, UnspentOutput>,
    pending: BTreeMap<OutPoint, LockPhase>,
    locked: BTreeMap<OutPoint, LockedOutput>,
    /// Reserved outpoints missing from the latest listing.
    unlisted: BTreeSet<OutPoint>,
    listings_in_flight: usize,
}

impl UtxoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Wallet listing
    // ========================================================================

    /// Install a fresh wallet listing as the available set.
    ///
    /// Outputs already locked are skipped (the wallet keeps reporting them
    /// until the lock transaction confirms). A reserved output the listing
    /// omits stays recordable by its sequence but will not become
    /// selectable again on release. Returns the number of selectable
    /// outputs.
    pub fn replace_available(&mut self, listing: Vec<UnspentOutput>) -> usize {
        let mut fresh = BTreeMap::new();
        for output in listing {
            let outpoint = output.outpoint();
            if self.locked.contains_key(&outpoint) {
                continue;
            }
            fresh.entry(outpoint).or_insert(output);
        }

        self.unlisted.clear();
        for outpoint in self.pending.keys() {
            if fresh.contains_key(outpoint) {
                continue;
            }
            if let Some(output) = self.available.remove(outpoint) {
                fresh.insert(*outpoint, output);
                self.unlisted.insert(*outpoint);
            }
        }

        self.available = fresh;
        self.available().count()
    }

    /// Note that a wallet listing has started. Every call is paired with
    /// one [`finish_listing`](Self::finish_listing).
    pub fn begin_listing(&mut self) {
        self.listings_in_flight += 1;
    }

    pub fn finish_listing(&mut self) {
        self.listings_in_flight = self.listings_in_flight.saturating_sub(1);
    }

    pub fn is_loading(&self) -> bool {
        self.listings_in_flight > 0
    }

    /// Drop every tracked output. Used when the session ends; listings
    /// already in flight still finish and are counted down.
    pub fn clear(&mut self) {
        self.available.clear();
        self.pending.clear();
        self.locked.clear();
        self.unlisted.clear();
    }

    // ========================================================================
    // Lock sequence reservations
    // ========================================================================

    /// `Available → Building`. The outpoint stays in the available set but
    /// cannot be reserved again until [`release`](Self::release) or
    /// [`mark_locked`](Self::mark_locked).
    pub fn reserve(&mut self, outpoint: &OutPoint) -> Result<UnspentOutput, CoreError> {
        if self.pending.contains_key(outpoint) {
            return Err(CoreError::NotAvailable(*outpoint));
        }
        let output = self
            .available
            .get(outpoint)
            .cloned()
            .ok_or(CoreError::NotAvailable(*outpoint))?;
        self.pending.insert(*outpoint, LockPhase::Building);
        Ok(output)
    }

    /// Record the phase an in-flight sequence has reached.
    pub fn advance(&mut self, outpoint: &OutPoint, phase: LockPhase) -> Result<(), CoreError> {
        let slot = self
            .pending
            .get_mut(outpoint)
            .ok_or(CoreError::NotAvailable(*outpoint))?;
        *slot = phase;
        Ok(())
    }

    /// Abandon an in-flight sequence. The output is selectable again
    /// unless the latest listing no longer reported it.
    pub fn release(&mut self, outpoint: &OutPoint) {
        self.pending.remove(outpoint);
        if self.unlisted.remove(outpoint) {
            self.available.remove(outpoint);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ========================================================================
    // Lock / unlock
    // ========================================================================

    /// Move `outpoint` from available to locked.
    pub fn mark_locked(
        &mut self,
        outpoint: &OutPoint,
        terms: LockTerms,
    ) -> Result<&LockedOutput, CoreError> {
        if self.locked.contains_key(outpoint) {
            return Err(CoreError::NotAvailable(*outpoint));
        }
        let output = self
            .available
            .remove(outpoint)
            .ok_or(CoreError::NotAvailable(*outpoint))?;
        self.pending.remove(outpoint);
        self.unlisted.remove(outpoint);

        let locked = LockedOutput {
            output,
            lock_height: terms.lock_height,
            unlock_address: terms.unlock_address,
            is_locked: true,
            lock_txid: terms.lock_txid,
            signed_transaction: terms.signed_transaction,
        };
        Ok(self.locked.entry(*outpoint).or_insert(locked))
    }

    /// Release a matured lock. The output is returned to the caller and is
    /// not re-added to the available set: it is presumed spent by the lock
    /// transaction.
    pub fn mark_unlocked(
        &mut self,
        outpoint: &OutPoint,
        current_height: BlockHeight,
    ) -> Result<UnspentOutput, CoreError> {
        let entry = self
            .locked
            .get(outpoint)
            .ok_or(CoreError::NotLocked(*outpoint))?;
        if !entry.is_mature(current_height) {
            return Err(CoreError::NotMatured {
                outpoint: *outpoint,
                lock_height: entry.lock_height,
                current_height,
            });
        }

        self.locked
            .remove(outpoint)
            .map(|locked| locked.output)
            .ok_or(CoreError::NotLocked(*outpoint))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Available outputs that are not reserved by an in-flight sequence.
    pub fn available(&self) -> impl Iterator<Item = &UnspentOutput> {
        self.available
            .iter()
            .filter(|(outpoint, _)| !self.pending.contains_key(outpoint))
            .map(|(_, output)| output)
    }

    pub fn pending(&self) -> impl Iterator<Item = (&OutPoint, LockPhase)> {
        self.pending.iter().map(|(outpoint, phase)| (outpoint, *phase))
    }

    pub fn locked(&self) -> impl Iterator<Item = &LockedOutput> {
        self.locked.values()
    }

    pub fn get_locked(&self, outpoint: &OutPoint) -> Option<&LockedOutput> {
        self.locked.get(outpoint)
    }

    pub fn state(&self, outpoint: &OutPoint, current_height: BlockHeight) -> Option<UtxoState> {
        if let Some(locked) = self.locked.get(outpoint) {
            return Some(if locked.is_mature(current_height) {
                UtxoState::MatureUnclaimed
            } else {
                UtxoState::Locked
            });
        }
        if let Some(phase) = self.pending.get(outpoint) {
            return Some((*phase).into());
        }
        self.available
            .contains_key(outpoint)
            .then_some(UtxoState::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    const H: BlockHeight = BlockHeight(2_900_000);

    fn terms(lock_height: BlockHeight) -> LockTerms {
        LockTerms {
            lock_height,
            unlock_address: MAINNET_ADDR.to_owned(),
            lock_txid: None,
            signed_transaction: None,
        }
    }

    fn repo_with(outputs: Vec<UnspentOutput>) -> UtxoRepository {
        let mut repo = UtxoRepository::new();
        repo.replace_available(outputs);
        repo
    }

    fn available_outpoints(repo: &UtxoRepository) -> Vec<OutPoint> {
        repo.available().map(UnspentOutput::outpoint).collect()
    }

    #[test]
    fn mark_locked_moves_output_between_collections() {
        let output = utxo(1, 0, 100_000);
        let mut repo = repo_with(vec![output.clone(), utxo(2, 0, 5_000)]);

        let locked = repo
            .mark_locked(&output.outpoint(), terms(BlockHeight(3_000_000)))
            .expect("lock must succeed");
        assert!(locked.is_locked);
        assert_eq!(locked.output, output);

        assert_eq!(available_outpoints(&repo), vec![utxo(2, 0, 5_000).outpoint()]);
        assert_eq!(repo.locked().count(), 1);
    }

    #[test]
    fn second_mark_locked_fails_not_available() {
        let output = utxo(1, 0, 100_000);
        let mut repo = repo_with(vec![output.clone()]);

        repo.mark_locked(&output.outpoint(), terms(H)).unwrap();
        let err = repo.mark_locked(&output.outpoint(), terms(H)).unwrap_err();
        assert!(matches!(err, CoreError::NotAvailable(op) if op == output.outpoint()));
        assert_eq!(repo.locked().count(), 1);
    }

    #[test]
    fn mark_locked_unknown_outpoint_fails() {
        let mut repo = repo_with(vec![]);
        let err = repo
            .mark_locked(&utxo(9, 0, 1).outpoint(), terms(H))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAvailable(_)));
    }

    #[test]
    fn unlock_before_maturity_fails_and_keeps_the_lock() {
        let output = utxo(1, 0, 100_000);
        let mut repo = repo_with(vec![output.clone()]);
        let lock_height = H.checked_add(52_560).unwrap();
        repo.mark_locked(&output.outpoint(), terms(lock_height)).unwrap();

        let err = repo
            .mark_unlocked(&output.outpoint(), H.checked_add(1).unwrap())
            .unwrap_err();
        match err {
            CoreError::NotMatured {
                lock_height: lh,
                current_height,
                ..
            } => {
                assert_eq!(lh, lock_height);
                assert_eq!(current_height, BlockHeight(2_900_001));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(repo.get_locked(&output.outpoint()).is_some());
    }

    #[test]
    fn unlock_at_lock_height_releases_the_output() {
        let output = utxo(1, 0, 100_000);
        let mut repo = repo_with(vec![output.clone()]);
        let lock_height = H.checked_add(52_560).unwrap();
        repo.mark_locked(&output.outpoint(), terms(lock_height)).unwrap();

        let released = repo
            .mark_unlocked(&output.outpoint(), lock_height)
            .expect("mature unlock must succeed");
        assert_eq!(released, output);
        assert!(repo.get_locked(&output.outpoint()).is_none());
        assert!(available_outpoints(&repo).is_empty());
        assert_eq!(repo.state(&output.outpoint(), lock_height), None);
    }

    #[test]
    fn unlock_of_untracked_output_is_not_locked() {
        let mut repo = repo_with(vec![utxo(1, 0, 1_000)]);
        let err = repo.mark_unlocked(&utxo(1, 0, 1_000).outpoint(), H).unwrap_err();
        assert!(matches!(err, CoreError::NotLocked(_)));
    }

    #[test]
    fn reservation_excludes_reselection_until_released() {
        let output = utxo(1, 0, 100_000);
        let outpoint = output.outpoint();
        let mut repo = repo_with(vec![output.clone()]);

        assert_eq!(repo.reserve(&outpoint).unwrap(), output);
        assert!(matches!(repo.reserve(&outpoint), Err(CoreError::NotAvailable(_))));
        assert!(available_outpoints(&repo).is_empty());
        assert_eq!(repo.state(&outpoint, H), Some(UtxoState::Building));

        repo.advance(&outpoint, LockPhase::AwaitingSignature).unwrap();
        assert_eq!(repo.state(&outpoint, H), Some(UtxoState::AwaitingSignature));

        repo.release(&outpoint);
        assert_eq!(available_outpoints(&repo), vec![outpoint]);
        assert_eq!(repo.state(&outpoint, H), Some(UtxoState::Available));
    }

    #[test]
    fn reserved_output_can_be_locked() {
        let output = utxo(1, 0, 100_000);
        let outpoint = output.outpoint();
        let mut repo = repo_with(vec![output]);

        repo.reserve(&outpoint).unwrap();
        repo.advance(&outpoint, LockPhase::AwaitingBroadcast).unwrap();
        repo.mark_locked(&outpoint, terms(BlockHeight(3_000_000))).unwrap();

        assert_eq!(repo.pending_count(), 0);
        assert_eq!(repo.state(&outpoint, H), Some(UtxoState::Locked));
        assert_eq!(
            repo.state(&outpoint, BlockHeight(3_000_000)),
            Some(UtxoState::MatureUnclaimed)
        );
    }

    #[test]
    fn refresh_skips_locked_and_keeps_reserved_outputs() {
        let locked = utxo(1, 0, 100_000);
        let reserved = utxo(2, 0, 50_000);
        let mut repo = repo_with(vec![locked.clone(), reserved.clone()]);
        repo.mark_locked(&locked.outpoint(), terms(BlockHeight(3_000_000))).unwrap();
        repo.reserve(&reserved.outpoint()).unwrap();

        // The wallet still reports the locked output and no longer lists the
        // reserved one.
        let count = repo.replace_available(vec![
            locked.clone(),
            utxo(3, 1, 7_000),
            utxo(3, 1, 7_000),
        ]);

        assert_eq!(count, 1);
        assert_eq!(available_outpoints(&repo), vec![utxo(3, 1, 7_000).outpoint()]);
        assert_eq!(repo.state(&reserved.outpoint(), H), Some(UtxoState::Building));
        assert!(repo
            .mark_locked(&reserved.outpoint(), terms(BlockHeight(3_000_000)))
            .is_ok());
    }

    #[test]
    fn released_output_missing_from_listing_is_dropped() {
        let output = utxo(1, 0, 100_000);
        let outpoint = output.outpoint();
        let mut repo = repo_with(vec![output, utxo(2, 0, 5_000)]);
        repo.reserve(&outpoint).unwrap();

        assert_eq!(repo.replace_available(Vec::new()), 0);
        assert_eq!(repo.state(&outpoint, H), Some(UtxoState::Building));

        repo.release(&outpoint);
        assert!(available_outpoints(&repo).is_empty());
        assert_eq!(repo.state(&outpoint, H), None);
        assert!(matches!(repo.reserve(&outpoint), Err(CoreError::NotAvailable(_))));
    }

    #[test]
    fn relisted_reserved_output_is_selectable_after_release() {
        let output = utxo(1, 0, 100_000);
        let outpoint = output.outpoint();
        let mut repo = repo_with(vec![output.clone()]);
        repo.reserve(&outpoint).unwrap();

        repo.replace_available(Vec::new());
        repo.replace_available(vec![output]);
        repo.release(&outpoint);

        assert_eq!(available_outpoints(&repo), vec![outpoint]);
    }

    #[test]
    fn loading_lasts_until_every_listing_finishes() {
        let mut repo = UtxoRepository::new();
        assert!(!repo.is_loading());

        repo.begin_listing();
        repo.begin_listing();
        repo.finish_listing();
        assert!(repo.is_loading());

        repo.finish_listing();
        assert!(!repo.is_loading());

        repo.finish_listing();
        assert!(!repo.is_loading());
    }

    #[test]
    fn clear_drops_all_collections() {
        let output = utxo(1, 0, 100_000);
        let mut repo = repo_with(vec![output.clone(), utxo(2, 0, 1_000)]);
        repo.mark_locked(&output.outpoint(), terms(H)).unwrap();

        repo.clear();
        assert_eq!(repo.available().count(), 0);
        assert_eq!(repo.locked().count(), 0);
    }
}
