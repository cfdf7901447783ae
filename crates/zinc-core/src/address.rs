//! Transparent address encoding.
//!
//! Two families are supported:
//! - Base58Check P2PKH and P2SH addresses (`t1...`/`t3...` on mainnet,
//!   `tm...`/`t2...` on testnet). The payload is a 2-byte prefix followed by a
//!   20-byte hash, with the first 4 bytes of its double SHA-256 appended.
//! - ZIP-320 TEX addresses (`tex1...`, testnet `textest1...`): the same
//!   20-byte pubkey hash as a P2PKH address, re-encoded with Bech32m
//!   ([BIP-350]) and no version byte. Funds sent to a TEX address are paid to
//!   the ordinary P2PKH script of that hash.
//!
//! [BIP-350]: https://github.com/bitcoin/bips/blob/master/bip-0350.mediawiki

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    MAINNET_P2PKH_PREFIX, MAINNET_P2SH_PREFIX, TESTNET_P2PKH_PREFIX, TESTNET_P2SH_PREFIX,
    TEX_HRP_MAINNET, TEX_HRP_TESTNET, TEX_MAX_LEN, TEX_MIN_LEN, WIF_MAINNET_PREFIX,
    WIF_TESTNET_PREFIX,
};
use crate::crypto::{double_sha256, hash160};
use crate::error::AddressError;
use crate::script::{p2pkh_script, p2sh_script};

/// Bech32m checksum constant (BIP-350).
const BECH32M_CONST: u32 = 0x2bc830a3;

/// Bech32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Network identifier determining prefixes and human-readable parts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn p2pkh_prefix(&self) -> [u8; 2] {
        match self {
            Network::Mainnet => MAINNET_P2PKH_PREFIX,
            Network::Testnet => TESTNET_P2PKH_PREFIX,
        }
    }

    pub fn p2sh_prefix(&self) -> [u8; 2] {
        match self {
            Network::Mainnet => MAINNET_P2SH_PREFIX,
            Network::Testnet => TESTNET_P2SH_PREFIX,
        }
    }

    /// Human-readable part for TEX addresses.
    pub fn tex_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => TEX_HRP_MAINNET,
            Network::Testnet => TEX_HRP_TESTNET,
        }
    }

    /// Version byte for WIF private key export.
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => WIF_MAINNET_PREFIX,
            Network::Testnet => WIF_TESTNET_PREFIX,
        }
    }

    /// Look up network from a TEX human-readable part.
    pub fn from_tex_hrp(hrp: &str) -> Result<Self, AddressError> {
        match hrp {
            TEX_HRP_MAINNET => Ok(Network::Mainnet),
            TEX_HRP_TESTNET => Ok(Network::Testnet),
            _ => Err(AddressError::InvalidHrp),
        }
    }

    fn from_prefix(prefix: [u8; 2]) -> Result<(AddressKind, Self), AddressError> {
        match prefix {
            MAINNET_P2PKH_PREFIX => Ok((AddressKind::P2pkh, Network::Mainnet)),
            MAINNET_P2SH_PREFIX => Ok((AddressKind::P2sh, Network::Mainnet)),
            TESTNET_P2PKH_PREFIX => Ok((AddressKind::P2pkh, Network::Testnet)),
            TESTNET_P2SH_PREFIX => Ok((AddressKind::P2sh, Network::Testnet)),
            [a, b] => Err(AddressError::UnknownPrefix(a, b)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// The address family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    P2pkh,
    P2sh,
    /// ZIP-320 transparent-source-only address.
    Tex,
}

/// A decoded transparent address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    kind: AddressKind,
    network: Network,
    hash: [u8; 20],
}

impl Address {
    pub fn new(kind: AddressKind, network: Network, hash: [u8; 20]) -> Self {
        Self {
            kind,
            network,
            hash,
        }
    }

    /// P2PKH address for a compressed public key.
    pub fn from_public_key(pubkey: &[u8; 33], network: Network) -> Self {
        Self::new(AddressKind::P2pkh, network, hash160(pubkey))
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Pubkey hash (P2PKH, TEX) or script hash (P2SH).
    pub fn hash(&self) -> &[u8; 20] {
        &self.hash
    }

    /// The same hash re-encoded as a TEX address. `None` for P2SH.
    pub fn to_tex(&self) -> Option<Self> {
        match self.kind {
            AddressKind::P2sh => None,
            _ => Some(Self::new(AddressKind::Tex, self.network, self.hash)),
        }
    }

    /// The P2PKH form of a P2PKH or TEX address. `None` for P2SH.
    pub fn to_p2pkh(&self) -> Option<Self> {
        match self.kind {
            AddressKind::P2sh => None,
            _ => Some(Self::new(AddressKind::P2pkh, self.network, self.hash)),
        }
    }

    /// Locking script paying to this address.
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self.kind {
            AddressKind::P2pkh | AddressKind::Tex => p2pkh_script(&self.hash),
            AddressKind::P2sh => p2sh_script(&self.hash),
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.hash, self.kind, self.network)
    }

    pub fn decode(s: &str) -> Result<Self, AddressError> {
        decode(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Encode a 20-byte hash as an address string of the given family.
pub fn encode(hash: &[u8; 20], kind: AddressKind, network: Network) -> String {
    match kind {
        AddressKind::P2pkh => base58check_encode(&network.p2pkh_prefix(), hash),
        AddressKind::P2sh => base58check_encode(&network.p2sh_prefix(), hash),
        AddressKind::Tex => tex_encode(network.tex_hrp(), hash),
    }
}

/// Decode any supported address string.
pub fn decode(s: &str) -> Result<Address, AddressError> {
    if s.is_empty() {
        return Err(AddressError::Empty);
    }
    if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
        return Err(AddressError::InvalidCharacter(c));
    }

    let lower = s.to_ascii_lowercase();
    if lower.starts_with("tex1") || lower.starts_with("textest1") {
        tex_decode(s)
    } else {
        base58check_decode(s)
    }
}

/// `true` iff `s` decodes as a supported address. Never panics.
pub fn validate(s: &str) -> bool {
    decode(s).is_ok()
}

/// Base58Check encoding of `prefix ‖ payload`.
pub fn base58check_encode(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len() + 4);
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    let checksum = double_sha256(&data);
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Decode Base58 and strip a verified 4-byte checksum.
pub fn base58check_payload(s: &str) -> Result<Vec<u8>, AddressError> {
    let raw = bs58::decode(s)
        .into_vec()
        .map_err(|_| AddressError::InvalidBase58)?;
    if raw.len() < 4 {
        return Err(AddressError::InvalidLength(raw.len()));
    }
    let (payload, checksum) = raw.split_at(raw.len() - 4);
    if double_sha256(payload)[..4] != *checksum {
        return Err(AddressError::InvalidChecksum);
    }
    Ok(payload.to_vec())
}

fn base58check_decode(s: &str) -> Result<Address, AddressError> {
    let payload = base58check_payload(s)?;
    if payload.len() != 22 {
        return Err(AddressError::InvalidLength(payload.len()));
    }
    let (kind, network) = Network::from_prefix([payload[0], payload[1]])?;
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[2..]);
    Ok(Address::new(kind, network, hash))
}

fn tex_encode(hrp: &str, hash: &[u8; 20]) -> String {
    // 20 bytes always convert to 32 five-bit groups
    let data = convert_bits(hash, 8, 5, true).unwrap_or_default();
    let checksum = bech32m_create_checksum(hrp, &data);

    let mut result = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    result.push_str(hrp);
    result.push('1');
    for &d in data.iter().chain(checksum.iter()) {
        result.push(CHARSET[d as usize] as char);
    }
    result
}

fn tex_decode(s: &str) -> Result<Address, AddressError> {
    if !(TEX_MIN_LEN..=TEX_MAX_LEN).contains(&s.len()) {
        return Err(AddressError::InvalidLength(s.len()));
    }

    // Bech32: all alpha chars must be same case
    let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(AddressError::MixedCase);
    }
    let s = s.to_ascii_lowercase();

    let sep_pos = s.rfind('1').ok_or(AddressError::MissingSeparator)?;
    let hrp = &s[..sep_pos];
    let network = Network::from_tex_hrp(hrp)?;

    let mut data = Vec::with_capacity(s.len() - sep_pos - 1);
    for c in s[sep_pos + 1..].chars() {
        let pos = CHARSET
            .iter()
            .position(|&ch| ch as char == c)
            .ok_or(AddressError::InvalidCharacter(c))?;
        data.push(pos as u8);
    }
    if data.len() < 6 {
        return Err(AddressError::InvalidLength(s.len()));
    }
    if !bech32m_verify_checksum(hrp, &data) {
        return Err(AddressError::InvalidChecksum);
    }

    let bytes = convert_bits(&data[..data.len() - 6], 5, 8, false)
        .ok_or(AddressError::InvalidPadding)?;
    let hash: [u8; 20] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
    Ok(Address::new(AddressKind::Tex, network, hash))
}

// --- Bech32m internals ---

/// Compute the Bech32m polymod over a sequence of 5-bit values.
fn bech32m_polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (v as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }
    chk
}

fn bech32m_hrp_expand(hrp: &str) -> Vec<u8> {
    let mut ret: Vec<u8> = hrp.bytes().map(|c| c >> 5).collect();
    ret.push(0);
    ret.extend(hrp.bytes().map(|c| c & 31));
    ret
}

fn bech32m_create_checksum(hrp: &str, data: &[u8]) -> [u8; 6] {
    let mut values = bech32m_hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32m_polymod(&values) ^ BECH32M_CONST;
    let mut out = [0u8; 6];
    for (i, v) in out.iter_mut().enumerate() {
        *v = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    out
}

fn bech32m_verify_checksum(hrp: &str, data: &[u8]) -> bool {
    let mut values = bech32m_hrp_expand(hrp);
    values.extend_from_slice(data);
    bech32m_polymod(&values) == BECH32M_CONST
}

/// Convert between bit widths (e.g. 8-bit bytes to 5-bit Bech32 groups).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// HASH160 of the compressed generator point.
    const G_HASH: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";

    fn g_hash() -> [u8; 20] {
        hex::decode(G_HASH).unwrap().try_into().unwrap()
    }

    fn mutate_last_char(s: &str) -> String {
        let mut out = s.to_string();
        let last = out.pop().unwrap();
        out.push(if last == 'q' || last == '2' { 'p' } else { '2' });
        out
    }

    // --- Known vectors ---

    #[test]
    fn encode_known_base58_vectors() {
        let h = g_hash();
        assert_eq!(
            encode(&h, AddressKind::P2pkh, Network::Mainnet),
            "t1UYsZVJkLPeMjxEtACvSxfWuNmddpWfxzs"
        );
        assert_eq!(
            encode(&h, AddressKind::P2sh, Network::Mainnet),
            "t3VEtV2oBtHxjq7wKHJb3PHsqXHvMRgUmVw"
        );
        assert_eq!(
            encode(&h, AddressKind::P2pkh, Network::Testnet),
            "tmLPctKo9j49rtCSKpwEBpLBeykiTGomGQs"
        );
        assert_eq!(
            encode(&h, AddressKind::P2sh, Network::Testnet),
            "t2HE5XhuKkka7NpX4D3b5vv4Udn9XGqUwEt"
        );
    }

    #[test]
    fn encode_known_tex_vectors() {
        let h = g_hash();
        assert_eq!(
            encode(&h, AddressKind::Tex, Network::Mainnet),
            "tex1w508d6qejxtdg4y5r3zarvary0c5xw7kccm6wm"
        );
        assert_eq!(
            encode(&h, AddressKind::Tex, Network::Testnet),
            "textest1w508d6qejxtdg4y5r3zarvary0c5xw7kpkyvtq"
        );
    }

    #[test]
    fn zip320_example_pair() {
        let t1 = decode("t1VmmGiyjVNeCjxDZzg7vZmd99WyzVby9yC").unwrap();
        let tex = decode("tex1s2rt77ggv6q989lr49rkgzmh5slsksa9khdgte").unwrap();
        assert_eq!(t1.hash(), tex.hash());
        assert_eq!(t1.to_tex().unwrap(), tex);
        assert_eq!(tex.to_p2pkh().unwrap(), t1);
        assert_eq!(t1.script_pubkey(), tex.script_pubkey());
    }

    // --- Base58 decoding ---

    #[test]
    fn decode_reports_kind_and_network() {
        let a = decode("t3VEtV2oBtHxjq7wKHJb3PHsqXHvMRgUmVw").unwrap();
        assert_eq!(a.kind(), AddressKind::P2sh);
        assert_eq!(a.network(), Network::Mainnet);
        let b = decode("tmLPctKo9j49rtCSKpwEBpLBeykiTGomGQs").unwrap();
        assert_eq!(b.kind(), AddressKind::P2pkh);
        assert_eq!(b.network(), Network::Testnet);
    }

    #[test]
    fn decode_rejects_mutated_checksum_byte() {
        let addr = Address::new(AddressKind::P2pkh, Network::Mainnet, [0xAA; 20]);
        let mut raw = bs58::decode(addr.encode()).into_vec().unwrap();
        let n = raw.len();
        for i in n - 4..n {
            raw[i] ^= 0x01;
            let s = bs58::encode(&raw).into_string();
            assert_eq!(decode(&s).unwrap_err(), AddressError::InvalidChecksum);
            assert!(!validate(&s));
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn decode_rejects_wrong_payload_length() {
        for len in [0usize, 21, 23, 32] {
            let s = base58check_encode(&[], &vec![0x1C; len]);
            assert_eq!(decode(&s).unwrap_err(), AddressError::InvalidLength(len));
            assert!(!validate(&s));
        }
    }

    #[test]
    fn decode_rejects_unknown_prefix() {
        let s = base58check_encode(&[0x00, 0x01], &[0u8; 20]);
        assert_eq!(decode(&s).unwrap_err(), AddressError::UnknownPrefix(0x00, 0x01));
    }

    #[test]
    fn decode_rejects_non_base58() {
        assert_eq!(
            decode("t1O0Il").unwrap_err(),
            AddressError::InvalidBase58
        );
    }

    // --- TEX decoding ---

    #[test]
    fn tex_uppercase_valid() {
        let a = Address::new(AddressKind::Tex, Network::Mainnet, [7; 20]);
        assert_eq!(decode(&a.encode().to_ascii_uppercase()).unwrap(), a);
    }

    #[test]
    fn tex_mixed_case_fails() {
        let s = "tex1W508d6qejxtdg4y5r3zarvary0c5xw7kccm6wm";
        assert_eq!(decode(s).unwrap_err(), AddressError::MixedCase);
    }

    #[test]
    fn tex_bad_checksum_fails() {
        let s = mutate_last_char("tex1w508d6qejxtdg4y5r3zarvary0c5xw7kccm6wm");
        assert_eq!(decode(&s).unwrap_err(), AddressError::InvalidChecksum);
    }

    #[test]
    fn tex_invalid_character_fails() {
        // 'b' is not in the bech32 charset
        let s = "tex1b508d6qejxtdg4y5r3zarvary0c5xw7kccm6wm";
        assert_eq!(decode(s).unwrap_err(), AddressError::InvalidCharacter('b'));
    }

    #[test]
    fn tex_length_bounds() {
        assert_eq!(decode("tex1qqqq").unwrap_err(), AddressError::InvalidLength(8));
        let long = format!("tex1{}", "q".repeat(90));
        assert_eq!(decode(&long).unwrap_err(), AddressError::InvalidLength(94));
    }

    #[test]
    fn tex_wrong_payload_size_fails() {
        // valid Bech32m checksum over a 24-byte payload
        let data = convert_bits(&[0u8; 24], 8, 5, true).unwrap();
        let checksum = bech32m_create_checksum("tex", &data);
        let mut s = String::from("tex1");
        for &d in data.iter().chain(checksum.iter()) {
            s.push(CHARSET[d as usize] as char);
        }
        assert_eq!(decode(&s).unwrap_err(), AddressError::InvalidLength(24));
    }

    // --- validate ---

    #[test]
    fn validate_rejects_garbage() {
        for s in ["", " ", "t1", "hello world", "tex1", "zs1abc", "t1✓✓✓", "\u{0}"] {
            assert!(!validate(s), "{s:?}");
        }
    }

    #[test]
    fn validate_accepts_all_families() {
        assert!(validate("t1VmmGiyjVNeCjxDZzg7vZmd99WyzVby9yC"));
        assert!(validate("t3VEtV2oBtHxjq7wKHJb3PHsqXHvMRgUmVw"));
        assert!(validate("tex1s2rt77ggv6q989lr49rkgzmh5slsksa9khdgte"));
    }

    // --- Scripts ---

    #[test]
    fn p2sh_address_pays_to_script_hash() {
        let a = Address::new(AddressKind::P2sh, Network::Mainnet, [3; 20]);
        assert_eq!(a.script_pubkey(), p2sh_script(&[3; 20]));
        assert!(a.to_tex().is_none());
    }

    // --- Display / FromStr / Serde ---

    #[test]
    fn display_matches_encode() {
        let a = Address::new(AddressKind::P2pkh, Network::Mainnet, [9; 20]);
        assert_eq!(format!("{a}"), a.encode());
        assert_eq!(a.encode().parse::<Address>().unwrap(), a);
    }

    #[test]
    fn serde_json_as_string() {
        let a = Address::new(AddressKind::Tex, Network::Testnet, [1; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.starts_with("\"textest1"));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn network_parse() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
        assert!("regtest".parse::<Network>().is_err());
    }

    // --- Round trips ---

    fn any_kind() -> impl Strategy<Value = AddressKind> {
        prop_oneof![
            Just(AddressKind::P2pkh),
            Just(AddressKind::P2sh),
            Just(AddressKind::Tex)
        ]
    }

    fn any_network() -> impl Strategy<Value = Network> {
        prop_oneof![Just(Network::Mainnet), Just(Network::Testnet)]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            hash in any::<[u8; 20]>(),
            kind in any_kind(),
            network in any_network(),
        ) {
            let s = encode(&hash, kind, network);
            let a = decode(&s).unwrap();
            prop_assert_eq!(a, Address::new(kind, network, hash));
            prop_assert!(validate(&s));
        }

        #[test]
        fn validate_never_panics(s in "\\PC{0,100}") {
            let _ = validate(&s);
        }
    }
}
