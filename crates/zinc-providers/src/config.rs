//! Provider list configuration.
//!
//! A provider is written `kind=url`, e.g.
//! `insight=https://explorer.example/api,bridge=http://127.0.0.1:3000`.
//! Order in the list is fallback order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use zinc_core::error::ProviderError;
use zinc_core::traits::{ChainProvider, UtxoProvider};

use crate::bridge::BridgeProvider;
use crate::insight::InsightProvider;
use crate::rpc::NodeRpcProvider;
use crate::source::{ChainSource, UtxoSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfigError {
    #[error("provider entry {0:?} is not of the form kind=url")]
    MissingSeparator(String),
    #[error("unknown provider kind {0:?} (expected insight, bridge or rpc)")]
    UnknownKind(String),
    #[error("provider url {0:?} must start with http:// or https://")]
    InvalidUrl(String),
    #[error("failed to construct provider: {0}")]
    Build(#[from] ProviderError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Insight,
    Bridge,
    Rpc,
}

impl FromStr for ProviderKind {
    type Err = ProviderConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insight" => Ok(Self::Insight),
            "bridge" => Ok(Self::Bridge),
            "rpc" => Ok(Self::Rpc),
            other => Err(ProviderConfigError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insight => "insight",
            Self::Bridge => "bridge",
            Self::Rpc => "rpc",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub url: String,
}

impl ProviderSpec {
    /// Parse a comma-separated list. Blank entries are skipped.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, ProviderConfigError> {
        s.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for ProviderSpec {
    type Err = ProviderConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, url) = s
            .split_once('=')
            .ok_or_else(|| ProviderConfigError::MissingSeparator(s.to_string()))?;
        let kind = kind.parse()?;
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ProviderConfigError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            kind,
            url: url.to_string(),
        })
    }
}

impl fmt::Display for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.url)
    }
}

/// Construct the UTXO and chain sources for a provider list.
///
/// Every provider kind serves both roles, in the same order.
pub fn build_sources(
    specs: &[ProviderSpec],
    timeout: Duration,
) -> Result<(UtxoSource, ChainSource), ProviderConfigError> {
    let mut utxo: Vec<Arc<dyn UtxoProvider>> = Vec::with_capacity(specs.len());
    let mut chain: Vec<Arc<dyn ChainProvider>> = Vec::with_capacity(specs.len());

    for spec in specs {
        match spec.kind {
            ProviderKind::Insight => {
                let p = Arc::new(InsightProvider::new(&spec.url, timeout)?);
                utxo.push(p.clone());
                chain.push(p);
            }
            ProviderKind::Bridge => {
                let p = Arc::new(BridgeProvider::new(&spec.url, timeout)?);
                utxo.push(p.clone());
                chain.push(p);
            }
            ProviderKind::Rpc => {
                let p = Arc::new(NodeRpcProvider::new(&spec.url, timeout)?);
                utxo.push(p.clone());
                chain.push(p);
            }
        }
    }

    Ok((UtxoSource::new(utxo, timeout), ChainSource::new(chain, timeout)))
}
