use bitcoin::{Amount, ScriptBuf, Txid};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, WalletError};
use crate::types::{UnspentOutput, WalletNetwork};

fn invalid(message: String) -> CoreError {
    WalletError::InvalidResponse(message).into()
}

/// Accounts come back either as bare address strings or as objects with
/// an `address` field (Phantom's shape).
pub(super) fn parse_accounts(raw: Value) -> Result<Vec<String>, CoreError> {
    let items = match raw {
        Value::Array(items) => items,
        other => return Err(invalid(format!("expected account list, got {other}"))),
    };

    let accounts = items
        .into_iter()
        .map(|item| match item {
            Value::String(address) => Ok(address),
            Value::Object(mut fields) => match fields.remove("address") {
                Some(Value::String(address)) => Ok(address),
                _ => Err(invalid("account object without an address".to_owned())),
            },
            other => Err(invalid(format!("unexpected account entry {other}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if accounts.is_empty() {
        return Err(invalid("wallet returned no accounts".to_owned()));
    }
    Ok(accounts)
}

pub(super) fn parse_network(raw: Value) -> Result<WalletNetwork, CoreError> {
    let name = raw
        .as_str()
        .ok_or_else(|| invalid(format!("expected network name, got {raw}")))?;
    name.parse().map_err(invalid)
}

/// A balance is either a bare satoshi count or an object with `total`
/// and/or `confirmed` satoshi fields. `total` wins when both are present.
pub(super) fn parse_balance(raw: Value) -> Result<Amount, CoreError> {
    if let Some(sats) = raw.as_u64() {
        return Ok(Amount::from_sat(sats));
    }
    ["total", "confirmed"]
        .iter()
        .find_map(|field| raw.get(field).and_then(Value::as_u64))
        .map(Amount::from_sat)
        .ok_or_else(|| invalid(format!("unrecognized balance payload {raw}")))
}

#[derive(Deserialize)]
struct WalletUtxo {
    #[serde(alias = "hash")]
    txid: String,
    #[serde(alias = "n")]
    vout: u32,
    #[serde(alias = "value")]
    satoshis: u64,
    #[serde(alias = "scriptPubKey", alias = "scriptPk")]
    script: String,
    address: Option<String>,
}

/// Parse a wallet UTXO listing. Entries without an address are attributed
/// to `owner`, the address the listing was requested for.
pub(super) fn parse_utxos(raw: Value, owner: &str) -> Result<Vec<UnspentOutput>, CoreError> {
    let entries: Vec<WalletUtxo> = serde_json::from_value(raw)
        .map_err(|e| invalid(format!("invalid utxo listing: {e}")))?;

    entries
        .into_iter()
        .map(|entry| {
            let txid: Txid = entry
                .txid
                .parse()
                .map_err(|e| invalid(format!("invalid utxo txid `{}`: {e}", entry.txid)))?;
            let script = ScriptBuf::from_hex(&entry.script)
                .map_err(|e| invalid(format!("invalid utxo script `{}`: {e}", entry.script)))?;
            Ok(UnspentOutput {
                txid,
                vout: entry.vout,
                value: Amount::from_sat(entry.satoshis),
                script,
                address: Some(entry.address.unwrap_or_else(|| owner.to_owned())),
            })
        })
        .collect()
}

pub(super) fn parse_txid(raw: Value) -> Result<Txid, CoreError> {
    let text = raw
        .as_str()
        .ok_or_else(|| invalid(format!("expected txid string, got {raw}")))?;
    text.trim()
        .parse()
        .map_err(|e| invalid(format!("invalid broadcast txid `{text}`: {e}")))
}

/// Signed PSBTs come back as a bare string or wrapped as `{"psbt": ...}`.
pub(super) fn parse_signed_psbt(raw: Value) -> Result<String, CoreError> {
    match raw {
        Value::String(psbt) => Ok(psbt),
        Value::Object(mut fields) => match fields.remove("psbt") {
            Some(Value::String(psbt)) => Ok(psbt),
            _ => Err(invalid("signed payload without a psbt field".to_owned())),
        },
        other => Err(invalid(format!("expected signed psbt, got {other}"))),
    }
}
