//! Domain types for hodlock's lock model.
//!
//! Contains the wallet-facing output types (`UnspentOutput`, `LockedOutput`),
//! the session identity (`WalletSession`, `ProviderName`, `WalletNetwork`),
//! the per-output state machine (`LockPhase`, `UtxoState`), and shared
//! newtypes like `BlockHeight` and `SignedTransaction`.

use std::str::FromStr;

use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Script Type Classification
// ==============================================================================

/// Classifies a script output type. Detection is delegated to the `bitcoin`
/// crate's `Script::is_p2pkh()`, `is_p2sh()`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    OpReturn,
    Unknown,
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P2pkh => write!(f, "p2pkh"),
            Self::P2sh => write!(f, "p2sh"),
            Self::P2wpkh => write!(f, "p2wpkh"),
            Self::P2wsh => write!(f, "p2wsh"),
            Self::P2tr => write!(f, "p2tr"),
            Self::OpReturn => write!(f, "op_return"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ==============================================================================
// Block Height
// ==============================================================================

/// A Bitcoin block height, wrapped for type safety.
///
/// `#[serde(transparent)]` preserves the JSON representation as a bare
/// integer, so this newtype is wire-compatible with plain `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl BlockHeight {
    pub fn checked_add(self, blocks: u32) -> Option<BlockHeight> {
        self.0.checked_add(blocks).map(BlockHeight)
    }

    /// Blocks left until `target`; zero once `target` has been reached.
    pub fn blocks_until(self, target: BlockHeight) -> u32 {
        target.0.saturating_sub(self.0)
    }
}

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::ops::Deref for BlockHeight {
    type Target = u32;
    fn deref(&self) -> &u32 {
        &self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Wallet Identity
// ==============================================================================

/// External wallet providers hodlock knows how to drive.
///
/// `Fixture` is the in-process sample wallet; it is only reachable when
/// it has been registered explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Unisat,
    Xverse,
    Leather,
    Phantom,
    Fixture,
}

impl ProviderName {
    pub const ALL: [ProviderName; 5] = [
        ProviderName::Unisat,
        ProviderName::Xverse,
        ProviderName::Leather,
        ProviderName::Phantom,
        ProviderName::Fixture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unisat => "unisat",
            Self::Xverse => "xverse",
            Self::Leather => "leather",
            Self::Phantom => "phantom",
            Self::Fixture => "fixture",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown wallet provider `{s}`"))
    }
}

/// Network a wallet session operates on. Addresses are validated against
/// the session network; cross-network mixing is rejected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletNetwork {
    #[default]
    Mainnet,
    Testnet,
}

impl WalletNetwork {
    pub fn bitcoin_network(self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
        }
    }
}

impl std::fmt::Display for WalletNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for WalletNetwork {
    type Err = String;

    /// Accepts the spellings used by the supported wallets
    /// (`livenet` is Unisat's name for mainnet).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "livenet" | "bitcoin" | "main" => Ok(Self::Mainnet),
            "testnet" | "testnet3" | "testnet4" | "signet" | "test" => Ok(Self::Testnet),
            other => Err(format!("unrecognized network `{other}`")),
        }
    }
}

/// The operations of the wallet capability contract, used to name the
/// missing operation in `UnsupportedOperation` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletOperation {
    RequestAccounts,
    GetNetwork,
    GetBalance,
    ListUtxos,
    SignTransaction,
    BroadcastTransaction,
}

impl std::fmt::Display for WalletOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RequestAccounts => "request_accounts",
            Self::GetNetwork => "get_network",
            Self::GetBalance => "get_balance",
            Self::ListUtxos => "list_utxos",
            Self::SignTransaction => "sign_transaction",
            Self::BroadcastTransaction => "broadcast_transaction",
        };
        f.write_str(name)
    }
}

/// The active signer. Exists only between a successful connect and the
/// next disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSession {
    pub provider: ProviderName,
    pub address: String,
    pub network: WalletNetwork,
    /// `None` when the provider cannot report a balance.
    pub balance: Option<Amount>,
}

// ==============================================================================
// Outputs
// ==============================================================================

/// A spendable output as reported by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    pub value: Amount,
    pub script: ScriptBuf,
    pub address: Option<String>,
}

impl UnspentOutput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// Base64 serialized signed PSBT. Doubles as the export artifact that the
/// holder must keep to prove the commitment later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedTransaction(pub String);

impl SignedTransaction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An output committed to a timelocked transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedOutput {
    #[serde(flatten)]
    pub output: UnspentOutput,
    pub lock_height: BlockHeight,
    pub unlock_address: String,
    /// Always `true` while the entry sits in the locked collection.
    pub is_locked: bool,
    /// Txid returned by the broadcast, when the lock went through a wallet.
    pub lock_txid: Option<Txid>,
    pub signed_transaction: Option<SignedTransaction>,
}

impl LockedOutput {
    pub fn outpoint(&self) -> OutPoint {
        self.output.outpoint()
    }

    pub fn is_mature(&self, current_height: BlockHeight) -> bool {
        current_height >= self.lock_height
    }
}

// ==============================================================================
// Lock State Machine
// ==============================================================================

/// Phases of an in-flight lock sequence. An outpoint in one of these
/// phases cannot be selected again until the sequence resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPhase {
    Building,
    AwaitingSignature,
    AwaitingBroadcast,
}

/// Observable state of a tracked output. `Released` outputs leave the
/// repository entirely, so they have no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxoState {
    Available,
    Building,
    AwaitingSignature,
    AwaitingBroadcast,
    Locked,
    MatureUnclaimed,
}

impl From<LockPhase> for UtxoState {
    fn from(phase: LockPhase) -> Self {
        match phase {
            LockPhase::Building => UtxoState::Building,
            LockPhase::AwaitingSignature => UtxoState::AwaitingSignature,
            LockPhase::AwaitingBroadcast => UtxoState::AwaitingBroadcast,
        }
    }
}
