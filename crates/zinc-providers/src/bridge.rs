//! REST bridge in front of a lightwalletd instance.
//!
//! Endpoints used: `POST /address/balance`, `POST /tx/submit`,
//! `GET /blocks/head`, `GET /tx/{txid}`.

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

pub struct BridgeProvider {
    name: String,
    base_url: String,
    client: Client,
}

impl BridgeProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            name: format!("bridge({base_url})"),
            base_url: base_url.to_owned(),
            client: build_client(timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl UtxoProvider for BridgeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        let resp = self
            .client
            .post(self.url("address/balance"))
            .json(&json!({ "addresses": [address.encode()] }))
            .send()
            .await
            .map_err(network_error)?;
        let json: Value = read_json(resp).await?;
        let utxos = parse_balance_utxos(&json, address)?;
        debug!(provider = %self.name, %address, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, ProviderError> {
        let resp = self
            .client
            .post(self.url("tx/submit"))
            .json(&json!({ "rawTxHex": hex::encode(raw_tx) }))
            .send()
            .await
            .map_err(network_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network_error)?;
        parse_broadcast_response(status, &body)
    }
}

#[async_trait]
impl ChainProvider for BridgeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chain_height(&self) -> Result<u64, ProviderError> {
        let resp = self
            .client
            .get(self.url("blocks/head"))
            .send()
            .await
            .map_err(network_error)?;
        let json: Value = read_json(resp).await?;
        json.get("height")
            .and_then(Value::as_u64)
            .ok_or_else(|| ProviderError::Malformed("block head missing height".into()))
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

/// Parse the `/address/balance` reply: an array of per-address balances, of
/// which the first is ours. Each UTXO carries `txid`, `index` (or `vout`) and
/// `valueZat` (or `value`).
pub fn parse_balance_utxos(json: &Value, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
    let entry = match json {
        Value::Array(items) => match items.first() {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        },
        Value::Object(_) => json,
        _ => return Err(ProviderError::Malformed("expected a balance array".into())),
    };

    let utxos = match entry.get("utxos") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => return Err(ProviderError::Malformed("utxos is not an array".into())),
    };

    utxos
        .iter()
        .map(|u| {
            let txid = u
                .get("txid")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::Malformed("utxo missing txid".into()))?;
            let txid = Hash256::from_hex(txid).map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let output_index = u64_field(u, &["index", "vout"])
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| ProviderError::Malformed("utxo missing index".into()))?;
            let value = u64_field(u, &["valueZat", "value"])
                .ok_or_else(|| ProviderError::Malformed("utxo missing valueZat".into()))?;
            Ok(Utxo {
                txid,
                output_index,
                value,
                address: *address,
            })
        })
        .collect()
}

/// lightwalletd reports height 0 for mempool transactions.
pub fn parse_tx_lookup(json: &Value) -> Result<TxLookup, ProviderError> {
    if !json.is_object() {
        return Err(ProviderError::Malformed("expected a transaction object".into()));
    }
    match json.get("height").and_then(Value::as_u64) {
        Some(height) if height > 0 => Ok(TxLookup::Mined { height }),
        _ => Ok(TxLookup::Mempool),
    }
}
