//! Transaction inspection utilities.
//!
//! Script classification, locktime interpretation and a compact summary of
//! a PSBT, used to check the timelock before it reaches a wallet and to
//! describe previews to the operator.

use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::{Amount, Script, Transaction};
use serde::{Deserialize, Serialize};

use crate::types::ScriptType;

// ==============================================================================
// Script Classification
// ==============================================================================

/// Classify a script using the `bitcoin` crate's built-in detection methods.
#[must_use]
pub fn classify_script(script: &Script) -> ScriptType {
    if script.is_p2pkh() {
        ScriptType::P2pkh
    } else if script.is_p2sh() {
        ScriptType::P2sh
    } else if script.is_p2wpkh() {
        ScriptType::P2wpkh
    } else if script.is_p2wsh() {
        ScriptType::P2wsh
    } else if script.is_p2tr() {
        ScriptType::P2tr
    } else if script.is_op_return() {
        ScriptType::OpReturn
    } else {
        ScriptType::Unknown
    }
}

// ==============================================================================
// Locktime
// ==============================================================================

/// Decoded locktime information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocktimeInfo {
    pub raw: u32,
    pub kind: LocktimeKind,
    /// A locktime only binds when it is non-zero and at least one input
    /// carries a non-final sequence number.
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocktimeKind {
    Disabled,
    BlockHeight,
    Timestamp,
}

#[must_use]
pub fn locktime_info(lock_time: LockTime, has_non_final_sequence: bool) -> LocktimeInfo {
    let raw = lock_time.to_consensus_u32();
    if raw == 0 {
        return LocktimeInfo {
            raw,
            kind: LocktimeKind::Disabled,
            active: false,
        };
    }

    let kind = match lock_time {
        LockTime::Blocks(_) => LocktimeKind::BlockHeight,
        LockTime::Seconds(_) => LocktimeKind::Timestamp,
    };

    LocktimeInfo {
        raw,
        kind,
        active: has_non_final_sequence,
    }
}

/// Locktime information for a whole transaction.
#[must_use]
pub fn transaction_locktime(tx: &Transaction) -> LocktimeInfo {
    let non_final = tx
        .input
        .iter()
        .any(|input| input.sequence.enables_absolute_lock_time());
    locktime_info(tx.lock_time, non_final)
}

/// `true` when a height locktime is set and every input leaves it enforceable.
#[must_use]
pub fn is_height_locked(tx: &Transaction) -> bool {
    let info = transaction_locktime(tx);
    info.kind == LocktimeKind::BlockHeight
        && tx
            .input
            .iter()
            .all(|input| input.sequence.enables_absolute_lock_time())
}

// ==============================================================================
// PSBT Summary
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OutputSummary {
    pub value: Amount,
    pub script_type: ScriptType,
}

/// What the operator is about to sign.
#[derive(Debug, Clone, Serialize)]
pub struct PsbtSummary {
    pub txid: bitcoin::Txid,
    pub input_count: usize,
    pub outputs: Vec<OutputSummary>,
    /// `None` when an input lacks its spent-output data.
    pub fee: Option<Amount>,
    pub locktime: LocktimeInfo,
}

#[must_use]
pub fn summarize(psbt: &Psbt) -> PsbtSummary {
    let tx = &psbt.unsigned_tx;
    PsbtSummary {
        txid: tx.compute_txid(),
        input_count: tx.input.len(),
        outputs: tx
            .output
            .iter()
            .map(|out| OutputSummary {
                value: out.value,
                script_type: classify_script(&out.script_pubkey),
            })
            .collect(),
        fee: psbt.fee().ok(),
        locktime: transaction_locktime(tx),
    }
}
