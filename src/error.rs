use crate::config::ConfigError;
use ledger::LedgerError;
use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Ledger(LedgerError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(err) => write!(f, "{}", err),
            Error::Ledger(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Ledger(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        Error::Ledger(err)
    }
}
