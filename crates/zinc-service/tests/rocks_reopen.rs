//! RocksDB transaction store durability across process restarts.

use zinc_core::traits::TransactionStore;
use zinc_core::types::{Direction, Hash256, NewTransactionRecord, TxStatus};
use zinc_service::RocksTxStore;

fn record(user: &str, tag: u8, submitted_at: u64) -> NewTransactionRecord {
    NewTransactionRecord {
        user: user.to_string(),
        txid: Hash256([tag; 32]),
        direction: Direction::Outgoing,
        amount: 50_000 * tag as u64,
        to_address: Some("t1UYsZVJkLPeMjxEtACvSxfWuNmddpWfxzs".into()),
        memo: None,
        status: TxStatus::Pending,
        submitted_at,
    }
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("txdb");

    let (confirmed_id, pending_id) = {
        let store = RocksTxStore::open(&path).unwrap();
        let a = store.insert(record("alice", 1, 1_000)).unwrap();
        let b = store.insert(record("alice", 2, 2_000)).unwrap();
        store.insert(record("bob", 3, 3_000)).unwrap();
        store
            .update_status(a.id, TxStatus::Confirmed, Some(900), Some(3), 4_000)
            .unwrap();
        store.flush().unwrap();
        (a.id, b.id)
    };

    let store = RocksTxStore::open(&path).unwrap();
    store.health_check().unwrap();

    let confirmed = store.get(confirmed_id).unwrap().unwrap();
    assert_eq!(confirmed.status, TxStatus::Confirmed);
    assert_eq!(confirmed.confirmed_height, Some(900));
    assert_eq!(confirmed.confirmations, Some(3));
    assert_eq!(confirmed.updated_at, 4_000);

    let by_txid = store.get_by_txid(&Hash256([2; 32])).unwrap().unwrap();
    assert_eq!(by_txid.id, pending_id);

    let pending: Vec<u64> = store
        .find_pending_older_than(10_000)
        .unwrap()
        .into_iter()
        .map(|r| r.submitted_at)
        .collect();
    assert_eq!(pending.len(), 2);
    assert!(pending.contains(&2_000) && pending.contains(&3_000));

    let history = store.list_by_user("alice", 10, 0).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, pending_id);
}

#[test]
fn ids_keep_increasing_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("txdb");

    let first = {
        let store = RocksTxStore::open(&path).unwrap();
        store.insert(record("carol", 1, 10)).unwrap().id
    };

    let store = RocksTxStore::open(&path).unwrap();
    let second = store.insert(record("carol", 2, 20)).unwrap().id;
    assert!(second > first);
    assert!(store.insert(record("carol", 1, 30)).is_err());
}
