use smartfalcon::{
    Asset, AssetLedger, LedgerConfig, LedgerError, StoreConfig, adapters::MemoryWorldState, codec,
};

fn setup() -> AssetLedger {
    AssetLedger::new(Box::new(MemoryWorldState::new()))
}

fn dealer(id: &str, balance: i64) -> Asset {
    Asset::new(id, "9876543210", "1234")
        .with_balance(balance)
        .with_status("active")
        .with_last_transaction(500, "credit", "Initial deposit")
}

#[tokio::test]
async fn test_one_shot_lifecycle() {
    let ledger = setup();

    assert!(!ledger.asset_exists("D001").await.unwrap());
    ledger.create_asset(dealer("D001", 1000)).await.unwrap();
    assert!(ledger.asset_exists("D001").await.unwrap());

    ledger.update_asset("D001", 1500, "active").await.unwrap();
    assert_eq!(ledger.query_asset("D001").await.unwrap().balance, 1500);

    let history = ledger.get_transaction_history("D001").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(codec::decode(history[0].as_bytes()).unwrap().balance, 1000);
    assert_eq!(codec::decode(history[1].as_bytes()).unwrap().balance, 1500);

    let versions = ledger.get_asset_history("D001").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_ne!(versions[0].tx_id, versions[1].tx_id);
}

#[tokio::test]
async fn test_one_shot_errors() {
    let ledger = setup();
    ledger.create_asset(dealer("D001", 1000)).await.unwrap();

    assert!(matches!(
        ledger.create_asset(dealer("D001", 1)).await,
        Err(LedgerError::AlreadyExists(_))
    ));
    assert!(matches!(
        ledger.query_asset("D999").await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        ledger.update_asset("D999", 1, "active").await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(ledger.get_transaction_history("D999").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_atomic_commits_all_operations_together() {
    let ledger = setup();

    let read_back = ledger
        .atomic(|tx| {
            Box::pin(async move {
                tx.create_asset(dealer("D001", 1000)).await?;
                tx.update_asset("D001", 1200, "inactive").await?;
                tx.query_asset("D001").await
            })
        })
        .await
        .unwrap();
    assert_eq!(read_back.balance, 1200);

    // Both writes landed in one transaction, so one history entry.
    let history = ledger.get_asset_history("D001").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].asset.status, "inactive");
}

#[tokio::test]
async fn test_atomic_rolls_back_on_error() {
    let ledger = setup();

    let result = ledger
        .atomic(|tx| {
            Box::pin(async move {
                tx.create_asset(dealer("D001", 1000)).await?;
                tx.update_asset("D404", 1, "active").await
            })
        })
        .await;

    assert!(matches!(result, Err(LedgerError::NotFound(ref id)) if id == "D404"));
    assert!(!ledger.asset_exists("D001").await.unwrap());
}

#[tokio::test]
async fn test_conflict_surfaces_from_commit() {
    let ledger = setup();

    let mut slow = ledger.context().begin().await.unwrap();
    slow.create_asset(dealer("D001", 1)).await.unwrap();

    ledger.create_asset(dealer("D001", 2)).await.unwrap();

    let result = slow.commit().await;
    assert!(matches!(result, Err(LedgerError::Conflict(_))));
    assert_eq!(ledger.query_asset("D001").await.unwrap().balance, 2);
}

#[tokio::test]
async fn test_init_ledger_twice() {
    let ledger = setup();

    assert_eq!(ledger.init_ledger().await.unwrap(), vec!["D001", "D002"]);
    assert!(ledger.init_ledger().await.unwrap().is_empty());
    assert_eq!(ledger.get_transaction_history("D001").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_connect_memory_with_seed() {
    let config = LedgerConfig {
        store: StoreConfig::Memory,
        seed_on_start: true,
    };

    let ledger = AssetLedger::connect(&config).await.unwrap();
    assert_eq!(ledger.query_asset("D002").await.unwrap().status, "inactive");
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_connect_sqlite_memory() {
    let config = LedgerConfig::from_json(
        r#"{"store":{"backend":"sqlite","url":"sqlite::memory:"},"seed_on_start":true}"#,
    )
    .unwrap();

    let ledger = AssetLedger::connect(&config).await.unwrap();
    assert_eq!(ledger.query_asset("D001").await.unwrap().balance, 1000);

    ledger.update_asset("D001", 1500, "active").await.unwrap();
    let history = ledger.get_transaction_history("D001").await.unwrap();
    assert_eq!(history.len(), 2);
}
