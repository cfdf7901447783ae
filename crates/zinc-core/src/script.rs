//! Transparent script templates.

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_EQUAL: u8 = 0x87;
const OP_CHECKSIG: u8 = 0xac;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// `OP_HASH160 <20> OP_EQUAL`
pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    script
}

/// Append a minimal data push.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        n if n < OP_PUSHDATA1 as usize => script.push(n as u8),
        n if n <= 0xFF => {
            script.push(OP_PUSHDATA1);
            script.push(n as u8);
        }
        n => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(n as u16).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
}

/// `<signature ‖ hashtype> <pubkey>`
pub fn p2pkh_script_sig(signature_with_hashtype: &[u8], pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(signature_with_hashtype.len() + pubkey.len() + 2);
    push_data(&mut script, signature_with_hashtype);
    push_data(&mut script, pubkey);
    script
}

/// Split a push-only script into its pushed items. Returns `None` if the
/// script contains anything other than data pushes or is truncated.
pub fn parse_pushes(script: &[u8]) -> Option<Vec<&[u8]>> {
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < script.len() {
        let op = script[pos];
        pos += 1;
        let len = match op {
            n if n < OP_PUSHDATA1 => n as usize,
            OP_PUSHDATA1 => {
                let n = *script.get(pos)? as usize;
                pos += 1;
                n
            }
            OP_PUSHDATA2 => {
                let bytes = script.get(pos..pos + 2)?;
                pos += 2;
                u16::from_le_bytes([bytes[0], bytes[1]]) as usize
            }
            _ => return None,
        };
        items.push(script.get(pos..pos + len)?);
        pos += len;
    }
    Some(items)
}
