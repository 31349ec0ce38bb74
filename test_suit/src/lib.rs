mod adapter;

#[cfg(test)]
mod test_config {
    use smartfalcon::{AssetLedger, LedgerConfig, StoreConfig};

    #[tokio::test]
    async fn test_connect_sqlite_file_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        let config = LedgerConfig {
            store: StoreConfig::Sqlite {
                url,
                max_connections: 2,
            },
            seed_on_start: true,
        };

        let ledger = AssetLedger::connect(&config).await.unwrap();
        ledger.update_asset("D002", 2500, "active").await.unwrap();
        drop(ledger);

        // Reconnecting re-runs the schema and the seed; both are no-ops now.
        let ledger = AssetLedger::connect(&config).await.unwrap();
        let d002 = ledger.query_asset("D002").await.unwrap();
        assert_eq!(d002.balance, 2500);
        assert_eq!(d002.status, "active");
        assert_eq!(ledger.get_transaction_history("D002").await.unwrap().len(), 2);
    }
}
