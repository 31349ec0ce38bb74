use smartfalcon::{Asset, AssetLedger, LedgerError, codec};

pub mod test_postgres;
pub mod test_sqlite;

pub fn dealer(dealer_id: &str, balance: i64) -> Asset {
    Asset::new(dealer_id, "9876543210", "1234")
        .with_balance(balance)
        .with_status("active")
        .with_last_transaction(500, "credit", "Initial deposit")
}

// Scenarios shared by every backend. Each takes a ledger over an empty,
// schema-initialised store.

pub async fn scenario_create_and_query(ledger: &AssetLedger) {
    let asset = dealer("D100", 1000);
    ledger.create_asset(asset.clone()).await.unwrap();

    assert!(ledger.asset_exists("D100").await.unwrap());
    assert_eq!(ledger.query_asset("D100").await.unwrap(), asset);
    assert!(!ledger.asset_exists("d100").await.unwrap());
}

pub async fn scenario_duplicate_create(ledger: &AssetLedger) {
    ledger.create_asset(dealer("D100", 1000)).await.unwrap();

    let err = ledger.create_asset(dealer("D100", 7)).await.unwrap_err();
    assert_eq!(err, LedgerError::AlreadyExists("D100".to_string()));

    assert_eq!(ledger.query_asset("D100").await.unwrap().balance, 1000);
    assert_eq!(ledger.get_transaction_history("D100").await.unwrap().len(), 1);
}

pub async fn scenario_missing_asset(ledger: &AssetLedger) {
    assert!(!ledger.asset_exists("D404").await.unwrap());
    assert_eq!(
        ledger.query_asset("D404").await.unwrap_err(),
        LedgerError::NotFound("D404".to_string())
    );
    assert_eq!(
        ledger.update_asset("D404", 1, "active").await.unwrap_err(),
        LedgerError::NotFound("D404".to_string())
    );
    assert!(ledger.get_transaction_history("D404").await.unwrap().is_empty());
}

pub async fn scenario_update_and_history(ledger: &AssetLedger) {
    assert_eq!(ledger.init_ledger().await.unwrap(), vec!["D001", "D002"]);
    ledger.update_asset("D001", 1500, "active").await.unwrap();
    ledger.update_asset("D001", 0, "blocked").await.unwrap();

    let d001 = ledger.query_asset("D001").await.unwrap();
    assert_eq!(d001.balance, 0);
    assert_eq!(d001.status, "blocked");
    assert_eq!(d001.msisdn, "9876543210");
    assert_eq!(d001.trans_amount, 500);
    assert_eq!(d001.trans_type, "credit");
    assert_eq!(d001.remarks, "Initial deposit");

    let history = ledger.get_transaction_history("D001").await.unwrap();
    let balances: Vec<i64> = history
        .iter()
        .map(|raw| codec::decode(raw.as_bytes()).unwrap().balance)
        .collect();
    assert_eq!(balances, vec![1000, 1500, 0]);

    let first: serde_json::Value = serde_json::from_str(&history[0]).unwrap();
    assert_eq!(first["dealerID"], "D001");
    assert_eq!(first["transType"], "credit");

    let versions = ledger.get_asset_history("D001").await.unwrap();
    assert_eq!(versions.len(), 3);
    assert!(versions.windows(2).all(|w| w[0].tx_id != w[1].tx_id));
    assert!(versions.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // D002 was untouched by the D001 updates.
    assert_eq!(ledger.get_transaction_history("D002").await.unwrap().len(), 1);
}

pub async fn scenario_init_is_idempotent(ledger: &AssetLedger) {
    ledger
        .create_asset(dealer("D001", 42))
        .await
        .unwrap();

    assert_eq!(ledger.init_ledger().await.unwrap(), vec!["D002"]);
    assert!(ledger.init_ledger().await.unwrap().is_empty());

    assert_eq!(ledger.query_asset("D001").await.unwrap().balance, 42);
    assert_eq!(ledger.query_asset("D002").await.unwrap().mpin, "5678");
}

pub async fn scenario_racing_create(ledger: &AssetLedger) {
    let mut slow = ledger.context().begin().await.unwrap();
    slow.create_asset(dealer("D200", 1)).await.unwrap();

    ledger.create_asset(dealer("D200", 2)).await.unwrap();

    let err = slow.commit().await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(ledger.query_asset("D200").await.unwrap().balance, 2);
    assert_eq!(ledger.get_transaction_history("D200").await.unwrap().len(), 1);
}

pub async fn scenario_racing_update(ledger: &AssetLedger) {
    ledger.create_asset(dealer("D300", 100)).await.unwrap();

    let mut slow = ledger.context().begin().await.unwrap();
    slow.update_asset("D300", 150, "active").await.unwrap();

    ledger.update_asset("D300", 200, "active").await.unwrap();

    let err = slow.commit().await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(ledger.query_asset("D300").await.unwrap().balance, 200);
    assert_eq!(ledger.get_transaction_history("D300").await.unwrap().len(), 2);
}

pub async fn scenario_rollback_discards_writes(ledger: &AssetLedger) {
    let result = ledger
        .atomic(|tx| {
            Box::pin(async move {
                tx.create_asset(dealer("D400", 1)).await?;
                tx.create_asset(dealer("D400", 2)).await
            })
        })
        .await;

    assert_eq!(result, Err(LedgerError::AlreadyExists("D400".to_string())));
    assert!(!ledger.asset_exists("D400").await.unwrap());
    assert!(ledger.get_transaction_history("D400").await.unwrap().is_empty());
}
