//! Insight-style block explorer REST API.
//!
//! Endpoints used: `GET /addr/{address}/utxo`, `POST /tx/send`,
//! `GET /status?q=getInfo`, `GET /tx/{txid}`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use zinc_core::address::Address;
use zinc_core::error::ProviderError;
use zinc_core::traits::{ChainProvider, TxLookup, UtxoProvider};
use zinc_core::types::{Hash256, Utxo};

use crate::http::{
    build_client, join_url, network_error, parse_broadcast_response, read_json, u64_field,
};

pub struct InsightProvider {
    name: String,
    base_url: String,
    client: Client,
}

impl InsightProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            name: format!("insight({base_url})"),
            base_url: base_url.to_owned(),
            client: build_client(timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl UtxoProvider for InsightProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        let resp = self
            .client
            .get(self.url(&format!("addr/{address}/utxo")))
            .send()
            .await
            .map_err(network_error)?;
        let json: Value = read_json(resp).await?;
        let utxos = parse_utxos(&json, address)?;
        debug!(provider = %self.name, %address, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, ProviderError> {
        let resp = self
            .client
            .post(self.url("tx/send"))
            .json(&json!({ "rawtx": hex::encode(raw_tx) }))
            .send()
            .await
            .map_err(network_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network_error)?;
        parse_broadcast_response(status, &body)
    }
}

#[async_trait]
impl ChainProvider for InsightProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chain_height(&self) -> Result<u64, ProviderError> {
        let resp = self
            .client
            .get(self.url("status?q=getInfo"))
            .send()
            .await
            .map_err(network_error)?;
        let json: Value = read_json(resp).await?;
        parse_status_height(&json)
    }

    async fn lookup_transaction(&self, txid: &Hash256) -> Result<TxLookup, ProviderError> {
        let resp = self
            .client
            .get(self.url(&format!("tx/{txid}")))
            .send()
            .await
            .map_err(network_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(TxLookup::NotFound);
        }
        let json: Value = read_json(resp).await?;
        parse_tx_lookup(&json)
    }
}

/// Parse a UTXO listing.
///
/// Accepts a bare array or an object with a `utxos` array. Each entry needs
/// `txid`, `vout`, and a satoshi value (`satoshis`, or `value` as a fallback).
/// A single malformed entry rejects the whole response.
pub fn parse_utxos(json: &Value, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
    let entries = match json {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("utxos") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(ProviderError::Malformed("utxos is not an array".into())),
        },
        _ => return Err(ProviderError::Malformed("expected a utxo array".into())),
    };

    entries
        .iter()
        .map(|entry| {
            let txid = entry
                .get("txid")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::Malformed("utxo missing txid".into()))?;
            let txid = Hash256::from_hex(txid).map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let output_index = entry
                .get("vout")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| ProviderError::Malformed("utxo missing vout".into()))?;
            let value = u64_field(entry, &["satoshis", "value"])
                .ok_or_else(|| ProviderError::Malformed("utxo missing satoshis".into()))?;
            Ok(Utxo {
                txid,
                output_index,
                value,
                address: *address,
            })
        })
        .collect()
}

/// Height from a `status?q=getInfo` response: `{"info": {"blocks": N}}`.
pub fn parse_status_height(json: &Value) -> Result<u64, ProviderError> {
    json.get("info")
        .and_then(|info| info.get("blocks"))
        .and_then(Value::as_u64)
        .ok_or_else(|| ProviderError::Malformed("status missing info.blocks".into()))
}

/// A transaction with a positive `blockheight` is mined; `-1`, zero or an
/// absent height means it sits in the mempool.
pub fn parse_tx_lookup(json: &Value) -> Result<TxLookup, ProviderError> {
    if !json.is_object() {
        return Err(ProviderError::Malformed("expected a transaction object".into()));
    }
    match json.get("blockheight").and_then(Value::as_i64) {
        Some(height) if height > 0 => Ok(TxLookup::Mined {
            height: height as u64,
        }),
        _ => Ok(TxLookup::Mempool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zinc_core::address::{AddressKind, Network};

    const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    fn addr() -> Address {
        Address::new(AddressKind::P2pkh, Network::Mainnet, [0x11; 20])
    }

    #[test]
    fn parses_bare_array() {
        let json = json!([
            {"txid": TXID, "vout": 1, "satoshis": 150_000, "scriptPubKey": "76a9"},
            {"txid": TXID, "vout": 2, "satoshis": 50_000}
        ]);
        let utxos = parse_utxos(&json, &addr()).unwrap();
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[0].output_index, 1);
        assert_eq!(utxos[0].value, 150_000);
        assert_eq!(utxos[0].txid.to_string(), TXID);
        assert_eq!(utxos[1].address, addr());
    }

    #[test]
    fn parses_wrapped_object() {
        let json = json!({"utxos": [{"txid": TXID, "vout": 0, "value": 7}]});
        let utxos = parse_utxos(&json, &addr()).unwrap();
        assert_eq!(utxos[0].value, 7);
    }

    #[test]
    fn missing_utxos_key_is_empty() {
        assert!(parse_utxos(&json!({"balance": 0}), &addr()).unwrap().is_empty());
        assert!(parse_utxos(&json!([]), &addr()).unwrap().is_empty());
    }

    #[test]
    fn malformed_entry_rejects_response() {
        let json = json!([{"txid": TXID, "satoshis": 5}]);
        assert!(matches!(parse_utxos(&json, &addr()), Err(ProviderError::Malformed(_))));
        let json = json!([{"txid": "nothex", "vout": 0, "satoshis": 5}]);
        assert!(parse_utxos(&json, &addr()).is_err());
        assert!(parse_utxos(&json!("oops"), &addr()).is_err());
    }

    #[test]
    fn status_height() {
        let json = json!({"info": {"blocks": 2_700_000, "version": 5}});
        assert_eq!(parse_status_height(&json).unwrap(), 2_700_000);
        assert!(parse_status_height(&json!({})).is_err());
    }

    #[test]
    fn tx_lookup_states() {
        assert_eq!(
            parse_tx_lookup(&json!({"txid": TXID, "blockheight": 2_500_000})).unwrap(),
            TxLookup::Mined { height: 2_500_000 }
        );
        assert_eq!(
            parse_tx_lookup(&json!({"txid": TXID, "blockheight": -1})).unwrap(),
            TxLookup::Mempool
        );
        assert_eq!(parse_tx_lookup(&json!({"txid": TXID})).unwrap(), TxLookup::Mempool);
        assert!(parse_tx_lookup(&json!(null)).is_err());
    }
}
