//! # zinc-providers
//! External data providers for the Zinc engine.
//!
//! Each provider speaks one upstream API and performs a single attempt per
//! call. [`UtxoSource`] and [`ChainSource`] put an ordered list of providers
//! behind a per-call timeout and fall through to the next provider on
//! failure.

pub mod bridge;
pub mod config;
pub mod http;
pub mod insight;
pub mod rpc;
pub mod source;

pub use bridge::BridgeProvider;
pub use config::{ProviderConfigError, ProviderKind, ProviderSpec, build_sources};
pub use insight::InsightProvider;
pub use rpc::NodeRpcProvider;
pub use source::{ChainSource, DEFAULT_PROVIDER_TIMEOUT, UtxoSource};
