// ledger/src/asset.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dealer account record. The dealer id doubles as the world state key.
///
/// `mpin` is stored exactly as supplied; no hashing is applied here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "dealerID")]
    pub dealer_id: String,
    pub msisdn: String,
    pub mpin: String,
    pub balance: i64,
    pub status: String,
    #[serde(rename = "transAmount")]
    pub trans_amount: i64,
    #[serde(rename = "transType")]
    pub trans_type: String,
    pub remarks: String,
}

impl Asset {
    /// Start a record with zero balance and empty metadata.
    pub fn new(dealer_id: &str, msisdn: &str, mpin: &str) -> Self {
        Self {
            dealer_id: dealer_id.to_string(),
            msisdn: msisdn.to_string(),
            mpin: mpin.to_string(),
            balance: 0,
            status: String::new(),
            trans_amount: 0,
            trans_type: String::new(),
            remarks: String::new(),
        }
    }

    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    /// Describe the transaction that produced this state.
    pub fn with_last_transaction(mut self, amount: i64, trans_type: &str, remarks: &str) -> Self {
        self.trans_amount = amount;
        self.trans_type = trans_type.to_string();
        self.remarks = remarks.to_string();
        self
    }

    /// Replace balance and status, carrying every other field over.
    pub(crate) fn apply_update(&mut self, balance: i64, status: String) {
        self.balance = balance;
        self.status = status;
    }
}

/// One committed version of an asset, as recovered from key history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetVersion {
    pub tx_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub asset: Asset,
}
