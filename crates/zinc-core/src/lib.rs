//! # zinc-core
//! Foundation types, address codec, and signing primitives for the Zinc
//! transparent-address transaction engine.

pub mod address;
pub mod amount;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod traits;
pub mod types;
