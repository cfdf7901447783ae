//! Seed-to-key derivation and key export.
//!
//! An account identifier (the "seed") deterministically yields one secp256k1
//! key. Two modes exist:
//!
//! - [`KeyDerivation::legacy`]: SHA-256 of the seed bytes is the secret
//!   scalar. Anyone who knows the identifier can recompute the spending key,
//!   so this mode exists only to keep previously issued addresses spendable.
//! - [`KeyDerivation::salted`]: HMAC-SHA256 keyed with a server-held salt.
//!   Same determinism, but the identifier alone no longer reveals the key.
//!
//! Derivation never fails. A digest that is not a valid scalar (zero or not
//! below the curve order) is hashed again until it is.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

use zinc_core::address::{Address, Network, base58check_encode, base58check_payload};
use zinc_core::crypto::KeyMaterial;
use zinc_core::error::CryptoError;

use crate::error::WalletError;

/// Seed-to-key derivation policy.
#[derive(Clone)]
pub struct KeyDerivation {
    salt: Option<Zeroizing<Vec<u8>>>,
}

impl KeyDerivation {
    /// Plain SHA-256 of the seed.
    pub fn legacy() -> Self {
        Self { salt: None }
    }

    /// HMAC-SHA256 of the seed keyed with a private salt.
    pub fn salted(salt: impl Into<Vec<u8>>) -> Self {
        Self {
            salt: Some(Zeroizing::new(salt.into())),
        }
    }

    /// Whether the seed alone is insufficient to recover keys.
    pub fn is_hardened(&self) -> bool {
        self.salt.is_some()
    }

    /// Derive the key for `seed`. Identical seeds always yield identical keys.
    pub fn derive(&self, seed: &str) -> KeyMaterial {
        let mut digest: [u8; 32] = match &self.salt {
            None => Sha256::digest(seed.as_bytes()).into(),
            Some(salt) => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(salt)
                    .expect("HMAC accepts keys of any length");
                mac.update(seed.as_bytes());
                mac.finalize().into_bytes().into()
            }
        };

        loop {
            match KeyMaterial::from_secret_bytes(digest) {
                Ok(key) => {
                    digest.zeroize();
                    return key;
                }
                Err(_) => digest = Sha256::digest(digest).into(),
            }
        }
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::legacy()
    }
}

impl fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_hardened() { "salted" } else { "legacy" };
        f.debug_struct("KeyDerivation")
            .field("mode", &mode)
            .finish_non_exhaustive()
    }
}

/// The addresses a key can receive at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAddresses {
    /// Base58Check pay-to-pubkey-hash form (`t1...`).
    pub transparent: Address,
    /// ZIP-320 form of the same hash (`tex1...`).
    pub tex: Address,
}

/// P2PKH address of HASH160 of the key's compressed public key.
pub fn address_for(key: &KeyMaterial, network: Network) -> Address {
    Address::from_public_key(key.public_key(), network)
}

/// Both receiving forms of a key's address.
pub fn addresses_for(key: &KeyMaterial, network: Network) -> WalletAddresses {
    let transparent = address_for(key, network);
    // P2PKH always has a TEX form
    let tex = transparent.to_tex().unwrap_or(transparent);
    WalletAddresses { transparent, tex }
}

/// Wallet Import Format: `version ‖ scalar ‖ 0x01`, Base58Check encoded.
///
/// The trailing `0x01` marks the key as using a compressed public key.
pub fn export_wif(key: &KeyMaterial, network: Network) -> Zeroizing<String> {
    let mut payload = Zeroizing::new(Vec::with_capacity(33));
    payload.extend_from_slice(key.secret_bytes());
    payload.push(0x01);
    Zeroizing::new(base58check_encode(&[network.wif_prefix()], &payload))
}

/// Parse a compressed-key WIF string.
pub fn import_wif(wif: &str) -> Result<(KeyMaterial, Network), WalletError> {
    let payload = Zeroizing::new(base58check_payload(wif.trim())?);
    if payload.len() != 34 || payload[33] != 0x01 {
        return Err(CryptoError::InvalidSecretKey.into());
    }
    let network = if payload[0] == Network::Mainnet.wif_prefix() {
        Network::Mainnet
    } else if payload[0] == Network::Testnet.wif_prefix() {
        Network::Testnet
    } else {
        return Err(CryptoError::InvalidSecretKey.into());
    };
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&payload[1..33]);
    let key = KeyMaterial::from_secret_bytes(secret);
    secret.zeroize();
    Ok((key?, network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zinc_core::address::AddressKind;

    // --- Legacy derivation ---

    #[test]
    fn legacy_is_sha256_of_seed() {
        let key = KeyDerivation::legacy().derive("user-42");
        let expected: [u8; 32] = Sha256::digest(b"user-42").into();
        assert_eq!(key.secret_bytes(), &expected);
    }

    #[test]
    fn legacy_same_seed_same_key() {
        let d = KeyDerivation::legacy();
        assert_eq!(d.derive("user-42"), d.derive("user-42"));
    }

    #[test]
    fn different_seeds_different_keys() {
        let d = KeyDerivation::legacy();
        assert_ne!(d.derive("user-42").public_key(), d.derive("user-43").public_key());
    }

    #[test]
    fn empty_seed_is_valid() {
        let key = KeyDerivation::legacy().derive("");
        assert_eq!(key.public_key().len(), 33);
    }

    // --- Salted derivation ---

    #[test]
    fn salted_differs_from_legacy() {
        let legacy = KeyDerivation::legacy().derive("user-42");
        let salted = KeyDerivation::salted(b"server-secret".to_vec()).derive("user-42");
        assert_ne!(legacy, salted);
    }

    #[test]
    fn salted_depends_on_salt() {
        let a = KeyDerivation::salted("salt-a").derive("user-42");
        let b = KeyDerivation::salted("salt-b").derive("user-42");
        assert_ne!(a, b);
        assert_eq!(a, KeyDerivation::salted("salt-a").derive("user-42"));
    }

    #[test]
    fn hardened_flag() {
        assert!(!KeyDerivation::legacy().is_hardened());
        assert!(KeyDerivation::salted("x").is_hardened());
        assert!(!KeyDerivation::default().is_hardened());
    }

    #[test]
    fn debug_hides_salt() {
        let d = KeyDerivation::salted("super-secret-salt");
        let debug = format!("{d:?}");
        assert!(debug.contains("salted"));
        assert!(!debug.contains("super-secret-salt"));
    }

    // --- Addresses ---

    #[test]
    fn address_is_hash160_of_pubkey() {
        let key = KeyDerivation::legacy().derive("user-42");
        let addr = address_for(&key, Network::Mainnet);
        assert_eq!(addr.kind(), AddressKind::P2pkh);
        assert_eq!(addr.hash(), &key.pubkey_hash());
        assert!(addr.encode().starts_with("t1"));
    }

    #[test]
    fn addresses_share_hash() {
        let key = KeyDerivation::legacy().derive("user-42");
        let addrs = addresses_for(&key, Network::Testnet);
        assert!(addrs.transparent.encode().starts_with("tm"));
        assert!(addrs.tex.encode().starts_with("textest1"));
        assert_eq!(addrs.transparent.hash(), addrs.tex.hash());
    }

    // --- WIF ---

    #[test]
    fn wif_known_vector() {
        let mut one = [0u8; 32];
        one[31] = 1;
        let key = KeyMaterial::from_secret_bytes(one).unwrap();
        assert_eq!(
            export_wif(&key, Network::Mainnet).as_str(),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
    }

    #[test]
    fn wif_import_recovers_key() {
        let key = KeyDerivation::legacy().derive("user-42");
        for network in [Network::Mainnet, Network::Testnet] {
            let wif = export_wif(&key, network);
            let (imported, net) = import_wif(&wif).unwrap();
            assert_eq!(imported, key);
            assert_eq!(net, network);
        }
    }

    #[test]
    fn wif_import_rejects_uncompressed_and_garbage() {
        let mut one = [0u8; 32];
        one[31] = 1;
        // uncompressed form: no 0x01 suffix
        let uncompressed = base58check_encode(&[0x80], &one);
        assert!(import_wif(&uncompressed).is_err());
        assert!(import_wif("not-a-wif").is_err());
        assert!(import_wif("").is_err());
    }

    proptest! {
        #[test]
        fn derive_is_idempotent(seed in ".{0,64}") {
            let d = KeyDerivation::legacy();
            prop_assert_eq!(d.derive(&seed), d.derive(&seed));
        }
    }
}
