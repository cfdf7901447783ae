//! Criterion benchmarks for zinc-core hot paths.
//!
//! Covers: address encode/decode for both families, ZIP-243 signing of a
//! multi-input transaction, and wire encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use zinc_core::address::{self, AddressKind, Network};
use zinc_core::constants::DEFAULT_BRANCH_ID;
use zinc_core::crypto::{sign_all_inputs, KeyMaterial};
use zinc_core::script::p2pkh_script;
use zinc_core::types::{Hash256, OutPoint, Transaction, TxIn, TxOut};

fn sample_transaction(n_inputs: usize) -> Transaction {
    Transaction {
        inputs: (0..n_inputs)
            .map(|i| {
                TxIn::new(OutPoint {
                    txid: Hash256([i as u8; 32]),
                    index: i as u32,
                })
            })
            .collect(),
        outputs: vec![
            TxOut {
                value: 1_000_000,
                script_pubkey: p2pkh_script(&[0xCC; 20]),
            },
            TxOut {
                value: 150_000,
                script_pubkey: p2pkh_script(&[0xDD; 20]),
            },
        ],
        lock_time: 0,
        expiry_height: 0,
    }
}

fn bench_address(c: &mut Criterion) {
    let hash = [0x5A; 20];
    let t1 = address::encode(&hash, AddressKind::P2pkh, Network::Mainnet);
    let tex = address::encode(&hash, AddressKind::Tex, Network::Mainnet);

    c.bench_function("address_encode_p2pkh", |b| {
        b.iter(|| address::encode(black_box(&hash), AddressKind::P2pkh, Network::Mainnet))
    });
    c.bench_function("address_decode_p2pkh", |b| {
        b.iter(|| address::decode(black_box(&t1)))
    });
    c.bench_function("address_decode_tex", |b| {
        b.iter(|| address::decode(black_box(&tex)))
    });
}

fn bench_signing(c: &mut Criterion) {
    let key = KeyMaterial::from_secret_bytes([0x42; 32]).unwrap();
    let unsigned = sample_transaction(10);
    let amounts = vec![200_000u64; 10];

    c.bench_function("sign_10_inputs", |b| {
        b.iter(|| {
            let mut tx = unsigned.clone();
            sign_all_inputs(&mut tx, &key, black_box(&amounts), DEFAULT_BRANCH_ID).unwrap();
            tx
        })
    });
}

fn bench_encoding(c: &mut Criterion) {
    let key = KeyMaterial::from_secret_bytes([0x42; 32]).unwrap();
    let mut tx = sample_transaction(10);
    sign_all_inputs(&mut tx, &key, &[200_000; 10], DEFAULT_BRANCH_ID).unwrap();

    c.bench_function("tx_encode", |b| b.iter(|| black_box(&tx).encode()));
    c.bench_function("tx_txid", |b| b.iter(|| black_box(&tx).txid()));
}

criterion_group!(benches, bench_address, bench_signing, bench_encoding);
criterion_main!(benches);
