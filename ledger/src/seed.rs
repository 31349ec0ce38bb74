// ledger/src/seed.rs
use crate::Asset;

/// Sample dealers written by `init_ledger` in bootstrap and test environments.
pub fn sample_assets() -> Vec<Asset> {
    vec![
        Asset::new("D001", "9876543210", "1234")
            .with_balance(1000)
            .with_status("active")
            .with_last_transaction(500, "credit", "Initial deposit"),
        Asset::new("D002", "8765432109", "5678")
            .with_balance(2000)
            .with_status("inactive")
            .with_last_transaction(1000, "debit", "Withdrawal"),
    ]
}
