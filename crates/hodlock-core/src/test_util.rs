//! Shared test helpers for `hodlock-core` unit tests.
//!
//! Deterministic txids, sample outputs and well-known addresses so that
//! tests across modules share a single source of truth for dummy data.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::types::UnspentOutput;

// ==============================================================================
// Addresses and Scripts
// ==============================================================================

/// BIP-173 mainnet P2WPKH test vector.
pub const MAINNET_ADDR: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

/// BIP-173 mainnet P2WSH test vector.
pub const MAINNET_ADDR_2: &str = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";

/// BIP-173 testnet P2WPKH test vector.
pub const TESTNET_ADDR: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

/// scriptPubKey of [`MAINNET_ADDR`].
pub const WPKH_SCRIPT_HEX: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";

// ==============================================================================
// Txid and Output Builders
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

/// A P2WPKH output of `sats` at `txid_from_byte(b):vout`.
pub fn utxo(b: u8, vout: u32, sats: u64) -> UnspentOutput {
    UnspentOutput {
        txid: txid_from_byte(b),
        vout,
        value: Amount::from_sat(sats),
        script: ScriptBuf::from_hex(WPKH_SCRIPT_HEX).expect("static script hex"),
        address: Some(MAINNET_ADDR.to_owned()),
    }
}

/// A one-input, one-output transaction with the given raw locktime and
/// input sequence.
pub fn spending_tx(locktime: u32, sequence: Sequence) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::from_consensus(locktime),
        input: vec![TxIn {
            previous_output: OutPoint::new(txid_from_byte(1), 0),
            script_sig: ScriptBuf::new(),
            sequence,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::from_hex(WPKH_SCRIPT_HEX).expect("static script hex"),
        }],
    }
}
