//! Timelocked transaction builder.
//!
//! Turns selected outputs plus a [`LockPlan`] into an unsigned PSBT whose
//! absolute locktime is the plan's lock height. Every input carries
//! sequence `0xFFFFFFFE`: with a final sequence (`0xFFFFFFFF`) on all
//! inputs consensus ignores the locktime and the "lock" would be spendable
//! immediately.

use std::collections::HashSet;
use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::inspect::{self, PsbtSummary};
use crate::types::{BlockHeight, UnspentOutput, WalletNetwork};

/// Sequence used on every input; non-final so the locktime binds, and
/// not RBF-signaling.
pub const LOCKTIME_SEQUENCE: Sequence = Sequence::ENABLE_LOCKTIME_NO_RBF;

/// Change at or below this value is not created and is left to the fee.
/// A lock amount below it is refused.
pub const DUST_THRESHOLD: Amount = Amount::from_sat(546);

/// Amounts and destinations for one lock transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPlan {
    pub amount: Amount,
    pub fee: Amount,
    pub lock_height: BlockHeight,
    pub destination: String,
    /// Receives the change when it clears the dust threshold. Passing the
    /// lock destination here re-locks the change along with the amount.
    pub change_address: String,
}

/// An unsigned, timelocked PSBT ready for a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    psbt: Psbt,
    change: Option<Amount>,
}

impl UnsignedTransaction {
    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    pub fn inputs(&self) -> &[TxIn] {
        &self.psbt.unsigned_tx.input
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.psbt.unsigned_tx.output
    }

    pub fn lock_time(&self) -> LockTime {
        self.psbt.unsigned_tx.lock_time
    }

    /// The change output's value, if one was created.
    pub fn change(&self) -> Option<Amount> {
        self.change
    }

    pub fn total_output_value(&self) -> Amount {
        self.outputs().iter().map(|out| out.value).sum()
    }

    /// Base64 PSBT, the exchange format handed to wallets.
    pub fn to_base64(&self) -> String {
        self.psbt.to_string()
    }

    pub fn summary(&self) -> PsbtSummary {
        inspect::summarize(&self.psbt)
    }
}

/// Build the unsigned lock transaction.
///
/// Checks run in a fixed order: empty inputs, lock height, addresses,
/// amounts. The first failure is returned.
pub fn build(
    inputs: &[UnspentOutput],
    plan: &LockPlan,
    network: WalletNetwork,
) -> Result<UnsignedTransaction, CoreError> {
    if inputs.is_empty() {
        return Err(CoreError::EmptyInputs);
    }

    let lock_time = lock_time_for(plan.lock_height)?;
    let destination = parse_address(&plan.destination, network)?;
    let change_address = parse_address(&plan.change_address, network)?;

    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.outpoint()) {
            return Err(CoreError::Validation(format!(
                "output {} selected more than once",
                input.outpoint()
            )));
        }
    }

    if plan.amount < DUST_THRESHOLD {
        return Err(CoreError::Validation(format!(
            "amount {} is below the {} dust threshold",
            plan.amount, DUST_THRESHOLD
        )));
    }

    let available = inputs
        .iter()
        .try_fold(Amount::ZERO, |acc, input| acc.checked_add(input.value))
        .ok_or_else(|| CoreError::Validation("input values overflow".to_owned()))?;
    let required = plan
        .amount
        .checked_add(plan.fee)
        .ok_or_else(|| CoreError::Validation("amount plus fee overflows".to_owned()))?;
    let change = available
        .checked_sub(required)
        .ok_or(CoreError::InsufficientFunds {
            available,
            required,
        })?;

    let tx_inputs = inputs
        .iter()
        .map(|input| TxIn {
            previous_output: input.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: LOCKTIME_SEQUENCE,
            witness: Witness::default(),
        })
        .collect();

    let mut tx_outputs = vec![TxOut {
        value: plan.amount,
        script_pubkey: destination.script_pubkey(),
    }];
    let change = (change > DUST_THRESHOLD).then_some(change);
    if let Some(value) = change {
        tx_outputs.push(TxOut {
            value,
            script_pubkey: change_address.script_pubkey(),
        });
    }

    let unsigned_tx = Transaction {
        version: Version::TWO,
        lock_time,
        input: tx_inputs,
        output: tx_outputs,
    };

    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)
        .map_err(|e| CoreError::TxEncoding(format!("create psbt: {e}")))?;
    for (psbt_input, input) in psbt.inputs.iter_mut().zip(inputs) {
        psbt_input.witness_utxo = Some(TxOut {
            value: input.value,
            script_pubkey: input.script.clone(),
        });
    }

    debug_assert!(inspect::is_height_locked(&psbt.unsigned_tx));
    debug!(
        inputs = inputs.len(),
        amount = plan.amount.to_sat(),
        change = change.map(Amount::to_sat),
        lock_height = *plan.lock_height,
        "built lock transaction"
    );

    Ok(UnsignedTransaction { psbt, change })
}

/// Parse a base64 signed PSBT and check that it commits to exactly the
/// transaction we built. Only signature material may differ.
pub fn verify_signed(
    unsigned: &UnsignedTransaction,
    signed_base64: &str,
) -> Result<Psbt, CoreError> {
    let signed = Psbt::from_str(signed_base64.trim())
        .map_err(|e| CoreError::TxEncoding(format!("signed psbt does not parse: {e}")))?;

    if signed.unsigned_tx != unsigned.psbt.unsigned_tx {
        return Err(CoreError::TxEncoding(format!(
            "signed psbt commits to {} but the lock template is {}",
            signed.unsigned_tx.compute_txid(),
            unsigned.psbt.unsigned_tx.compute_txid()
        )));
    }
    if !inspect::is_height_locked(&signed.unsigned_tx) {
        return Err(CoreError::TxEncoding(
            "signed psbt no longer enforces its locktime".to_owned(),
        ));
    }
    Ok(signed)
}

fn lock_time_for(height: BlockHeight) -> Result<LockTime, CoreError> {
    if *height == 0 {
        return Err(CoreError::Validation(
            "lock height must be above zero".to_owned(),
        ));
    }
    LockTime::from_height(*height).map_err(|e| {
        CoreError::Validation(format!("lock height {height} is not a block height: {e}"))
    })
}

/// Parse `address` and require it to belong to `network`.
pub fn parse_address(address: &str, network: WalletNetwork) -> Result<Address, CoreError> {
    let trimmed = address.trim();
    let unchecked = Address::from_str(trimmed).map_err(|e| CoreError::InvalidAddress {
        address: trimmed.to_owned(),
        reason: e.to_string(),
    })?;
    unchecked
        .require_network(network.bitcoin_network())
        .map_err(|e| CoreError::InvalidAddress {
            address: trimmed.to_owned(),
            reason: format!("not a {network} address ({e})"),
        })
}
