use serde::Deserialize;
use std::fmt;

pub const ENV_STORE_URL: &str = "SMARTFALCON_STORE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "SMARTFALCON_MAX_CONNECTIONS";
pub const ENV_SEED_ON_START: &str = "SMARTFALCON_SEED_ON_START";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Where the world state lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Sqlite {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
    Postgres {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    pub store: StoreConfig,
    /// Write the sample dealers when connecting.
    #[serde(default)]
    pub seed_on_start: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::Memory,
            seed_on_start: false,
        }
    }
}

impl LedgerConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read `SMARTFALCON_*` variables. Unset variables fall back to an
    /// unseeded in-memory store.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_connections = match lookup(ENV_MAX_CONNECTIONS) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_CONNECTIONS,
                value: raw,
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let store = match lookup(ENV_STORE_URL) {
            None => StoreConfig::Memory,
            Some(url) if url.trim() == "memory" => StoreConfig::Memory,
            Some(url) if url.starts_with("sqlite:") => StoreConfig::Sqlite {
                url,
                max_connections,
            },
            Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
                StoreConfig::Postgres {
                    url,
                    max_connections,
                }
            }
            Some(url) => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_STORE_URL,
                    value: url,
                });
            }
        };

        let seed_on_start = match lookup(ENV_SEED_ON_START).as_deref().map(str::trim) {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_SEED_ON_START,
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            store,
            seed_on_start,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    InvalidValue { key: &'static str, value: String },
    /// The configured backend was compiled out.
    BackendDisabled(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "Invalid ledger config: {}", msg),
            Self::InvalidValue { key, value } => write!(f, "Invalid value for {}: {:?}", key, value),
            Self::BackendDisabled(backend) => {
                write!(f, "Backend {} requires the `{}` feature", backend, backend)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
