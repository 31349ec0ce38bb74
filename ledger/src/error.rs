// ledger/src/error.rs
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The world state could not be read, or a history cursor failed.
    StoreRead(String),
    /// The world state rejected a write or a commit.
    StoreWrite(String),
    /// No current record for the dealer id.
    NotFound(String),
    /// Create attempted on a dealer id that already has a record.
    AlreadyExists(String),
    Encoding(String),
    Decoding(String),
    /// A key observed by the transaction changed before commit.
    Conflict(String),
}

impl LedgerError {
    /// Whether the caller may retry the whole transaction.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreRead(msg) => write!(f, "failed to read from world state: {}", msg),
            Self::StoreWrite(msg) => write!(f, "failed to write world state: {}", msg),
            Self::NotFound(dealer_id) => write!(f, "asset {} does not exist", dealer_id),
            Self::AlreadyExists(dealer_id) => write!(f, "asset {} already exists", dealer_id),
            Self::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Self::Decoding(msg) => write!(f, "Decoding error: {}", msg),
            Self::Conflict(key) => write!(f, "Conflict: key {} changed since it was read", key),
        }
    }
}

impl std::error::Error for LedgerError {}
