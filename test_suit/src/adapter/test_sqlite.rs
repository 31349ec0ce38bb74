#[cfg(test)]
use super::*;
#[cfg(test)]
use smartfalcon::{
    AssetLedger, WorldState,
    adapters::sqlite::SqliteWorldState,
};

#[cfg(test)]
async fn setup_ledger() -> AssetLedger {
    let store = SqliteWorldState::new_memory().await.unwrap();

    if let Err(err) = store.init_schema().await {
        panic!("Error: {:#?}", err);
    }

    AssetLedger::new(Box::new(store))
}

#[tokio::test]
async fn test_create_and_query() {
    scenario_create_and_query(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_duplicate_create() {
    scenario_duplicate_create(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_missing_asset() {
    scenario_missing_asset(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_update_and_history() {
    scenario_update_and_history(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_init_is_idempotent() {
    scenario_init_is_idempotent(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_racing_create() {
    scenario_racing_create(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_racing_update() {
    scenario_racing_update(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    scenario_rollback_discards_writes(&setup_ledger().await).await;
}

#[tokio::test]
async fn test_init_schema_twice() {
    let store = SqliteWorldState::new_memory().await.unwrap();
    store.init_schema().await.unwrap();
    store.init_schema().await.unwrap();
}

#[tokio::test]
async fn test_read_your_writes_before_commit() {
    let store = SqliteWorldState::new_memory().await.unwrap();
    store.init_schema().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.put_state("k", b"v1".to_vec()).await.unwrap();
    tx.put_state("k", b"v2".to_vec()).await.unwrap();
    assert_eq!(tx.get_state("k").await.unwrap(), Some(b"v2".to_vec()));

    let mut other = store.begin().await.unwrap();
    assert_eq!(other.get_state("k").await.unwrap(), None);
    other.rollback().await.unwrap();

    tx.commit().await.unwrap();

    let mut reader = store.begin().await.unwrap();
    assert_eq!(reader.get_state("k").await.unwrap(), Some(b"v2".to_vec()));

    let mut cursor = reader.get_history_for_key("k").await.unwrap();
    let entry = cursor.next().await.unwrap().unwrap();
    assert_eq!(entry.value, b"v2".to_vec());
    assert!(cursor.next().await.unwrap().is_none());
    cursor.close().await;
}

#[tokio::test]
async fn test_corrupt_record_is_decoding_error() {
    let store = SqliteWorldState::new_memory().await.unwrap();
    store.init_schema().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.put_state("D500", b"not json".to_vec()).await.unwrap();
    tx.commit().await.unwrap();

    let ledger = AssetLedger::new(Box::new(store));
    assert!(ledger.asset_exists("D500").await.unwrap());
    assert!(matches!(
        ledger.query_asset("D500").await,
        Err(smartfalcon::LedgerError::Decoding(_))
    ));
    assert_eq!(
        ledger.get_transaction_history("D500").await.unwrap(),
        vec!["not json".to_string()]
    );
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world_state.db");
    let path = path.to_str().unwrap();

    {
        let store = SqliteWorldState::new_file(path).await.unwrap();
        store.init_schema().await.unwrap();
        let ledger = AssetLedger::new(Box::new(store));
        ledger.init_ledger().await.unwrap();
        ledger.update_asset("D001", 1500, "active").await.unwrap();
    }

    let store = SqliteWorldState::new_file(path).await.unwrap();
    store.init_schema().await.unwrap();
    let ledger = AssetLedger::new(Box::new(store));

    assert_eq!(ledger.query_asset("D001").await.unwrap().balance, 1500);
    assert_eq!(ledger.get_asset_history("D001").await.unwrap().len(), 2);
}
