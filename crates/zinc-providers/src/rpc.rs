//! zcashd / zebrad JSON-RPC.
//!
//! Methods used: `getaddressutxos`, `sendrawtransaction`, `getblockcount`,
//! `getrawtransaction` (verbose). `getaddressutxos` requires the node to run
//! with the address index enabled.

use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use zinc_core::address::Address;
use zinc_core::error::ProviderError;
use zinc_core::traits::{ChainProvider, TxLookup, UtxoProvider};
use zinc_core::types::{Hash256, Utxo};

use crate::http::u64_field;

/// `RPC_INVALID_ADDRESS_OR_KEY`, returned for unknown transactions.
const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;

pub struct NodeRpcProvider {
    name: String,
    client: HttpClient,
}

impl NodeRpcProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self {
            name: format!("rpc({endpoint})"),
            client,
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
    ) -> Result<T, ClientError> {
        self.client.request(method, params).await
    }
}

fn params<P: Serialize>(values: &[P]) -> Result<ArrayParams, ProviderError> {
    let mut params = ArrayParams::new();
    for v in values {
        params
            .insert(v)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
    }
    Ok(params)
}

/// Node-side errors with a JSON-RPC error object are explicit refusals;
/// everything else is transport.
fn classify(e: ClientError) -> ProviderError {
    match e {
        ClientError::Call(err) => ProviderError::Rejected(format!("{} ({})", err.message(), err.code())),
        ClientError::ParseError(err) => ProviderError::Malformed(err.to_string()),
        ClientError::RequestTimeout => ProviderError::Network("request timed out".into()),
        other => ProviderError::Network(other.to_string()),
    }
}

#[async_trait]
impl UtxoProvider for NodeRpcProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        let query = json!({ "addresses": [address.encode()] });
        let json: Value = self
            .call("getaddressutxos", params(&[query])?)
            .await
            .map_err(|e| match classify(e) {
                // A refused query is not a refused transaction.
                ProviderError::Rejected(m) => ProviderError::Network(m),
                other => other,
            })?;
        let utxos = parse_address_utxos(&json, address)?;
        debug!(provider = %self.name, %address, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<Hash256, ProviderError> {
        let txid: String = self
            .call("sendrawtransaction", params(&[hex::encode(raw_tx)])?)
            .await
            .map_err(classify)?;
        Hash256::from_hex(&txid).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ChainProvider for NodeRpcProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chain_height(&self) -> Result<u64, ProviderError> {
        self.call("getblockcount", ArrayParams::new())
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }

    async fn lookup_transaction(&self, txid: &Hash256) -> Result<TxLookup, ProviderError> {
        let mut p = params(&[txid.to_string()])?;
        p.insert(1).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        match self.call::<Value>("getrawtransaction", p).await {
            Ok(json) => parse_raw_transaction(&json),
            Err(ClientError::Call(err)) if err.code() == RPC_INVALID_ADDRESS_OR_KEY => {
                Ok(TxLookup::NotFound)
            }
            Err(e) => Err(ProviderError::Network(e.to_string())),
        }
    }
}

/// Parse `getaddressutxos` output: entries with `txid`, `outputIndex` and
/// `satoshis`.
pub fn parse_address_utxos(json: &Value, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
    let items = json
        .as_array()
        .ok_or_else(|| ProviderError::Malformed("expected a utxo array".into()))?;
    items
        .iter()
        .map(|u| {
            let txid = u
                .get("txid")
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::Malformed("utxo missing txid".into()))?;
            let txid = Hash256::from_hex(txid).map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let output_index = u64_field(u, &["outputIndex", "vout"])
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| ProviderError::Malformed("utxo missing outputIndex".into()))?;
            let value = u64_field(u, &["satoshis"])
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

/// Verbose `getrawtransaction`: a `height` field is present once mined.
pub fn parse_raw_transaction(json: &Value) -> Result<TxLookup, ProviderError> {
    if !json.is_object() {
        return Err(ProviderError::Malformed("expected a transaction object".into()));
    }
    match json.get("height").and_then(Value::as_i64) {
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
        Address::new(AddressKind::P2pkh, Network::Mainnet, [0x33; 20])
    }

    #[test]
    fn address_utxos() {
        let json = json!([
            {"address": addr().encode(), "txid": TXID, "outputIndex": 2,
             "script": "76a914", "satoshis": 125_000, "height": 2_000_000}
        ]);
        let utxos = parse_address_utxos(&json, &addr()).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].output_index, 2);
        assert_eq!(utxos[0].value, 125_000);
    }

    #[test]
    fn address_utxos_rejects_non_array() {
        assert!(parse_address_utxos(&json!({"error": "x"}), &addr()).is_err());
    }

    #[test]
    fn raw_transaction_states() {
        assert_eq!(
            parse_raw_transaction(&json!({"txid": TXID, "height": 10, "confirmations": 3})).unwrap(),
            TxLookup::Mined { height: 10 }
        );
        assert_eq!(
            parse_raw_transaction(&json!({"txid": TXID})).unwrap(),
            TxLookup::Mempool
        );
        assert_eq!(
            parse_raw_transaction(&json!({"txid": TXID, "height": -1})).unwrap(),
            TxLookup::Mempool
        );
    }

    #[test]
    fn builds_against_unreachable_endpoint() {
        // Construction does not touch the network.
        let p = NodeRpcProvider::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert!(UtxoProvider::name(&p).starts_with("rpc("));
    }
}
