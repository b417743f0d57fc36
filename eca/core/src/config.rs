use std::path::{Path, PathBuf};
use std::time::Duration;

use eca_spec::{Address, ParseError};
use eca_transport::{AbiError, ContractAbi, RpcSettings};
use thiserror::Error;
use tracing::debug;

/// Node endpoint variable.
pub const ENV_RPC_URL: &str = "WEB_PROVIDER_URI";
/// Deployed contract variable.
pub const ENV_CONTRACT_ADDRESS: &str = "CONTRACT_ADDRESS";
/// ABI artifact path variable.
pub const ENV_ABI_PATH: &str = "ECA_ABI_PATH";
/// Receipt timeout variable, in seconds.
pub const ENV_RECEIPT_TIMEOUT_SECS: &str = "ECA_RECEIPT_TIMEOUT_SECS";
/// Receipt poll interval variable, in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "ECA_POLL_INTERVAL_MS";
/// ABI artifact looked up when none is configured.
pub const DEFAULT_ABI_PATH: &str = "abi.json";
/// Receipt timeout when none is configured.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
/// Poll interval when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No node endpoint configured.
    #[error("missing node endpoint (set WEB_PROVIDER_URI or --rpc-url)")]
    MissingRpcUrl,
    /// Endpoint is not an http(s) URL.
    #[error("node endpoint {0:?} must be an http:// or https:// URL")]
    InvalidRpcUrl(String),
    /// No contract address configured.
    #[error("missing contract address (set CONTRACT_ADDRESS or --contract)")]
    MissingContract,
    /// Contract address could not be parsed.
    #[error("invalid contract address: {0}")]
    Address(#[from] ParseError),
    /// ABI artifact could not be loaded.
    #[error("failed to load abi from {path}: {source}")]
    Abi {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: AbiError,
    },
    /// `.env` file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// `.env` line is not `KEY=value`.
    #[error("line {line} of dotenv file: {reason}")]
    Dotenv {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
}

/// Resolved studio configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    /// Node endpoint.
    pub rpc_url: String,
    /// Deployed artwork contract, as configured.
    pub contract_address: String,
    /// ABI artifact path.
    pub abi_path: PathBuf,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// Give up waiting for a receipt after this long.
    pub receipt_timeout: Duration,
}

impl StudioConfig {
    /// Configuration with default ABI path and timings.
    pub fn new(rpc_url: impl Into<String>, contract_address: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            abi_path: PathBuf::from(DEFAULT_ABI_PATH),
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    /// Check the endpoint and contract address.
    pub fn validate(&self) -> Result<Address, ConfigError> {
        let url = self.rpc_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingRpcUrl);
        }
        let scheme = url.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
        if !matches!(scheme.as_deref(), Some("http") | Some("https")) {
            return Err(ConfigError::InvalidRpcUrl(url.to_string()));
        }
        let contract = self.contract_address.trim();
        if contract.is_empty() {
            return Err(ConfigError::MissingContract);
        }
        Ok(contract.parse()?)
    }

    /// Validated settings for the JSON-RPC client.
    pub fn rpc_settings(&self) -> Result<RpcSettings, ConfigError> {
        let contract = self.validate()?;
        Ok(RpcSettings {
            endpoint: self.rpc_url.trim().to_string(),
            contract,
            poll_interval: self.poll_interval,
            receipt_timeout: self.receipt_timeout,
        })
    }

    /// Load the contract ABI artifact.
    pub fn load_abi(&self) -> Result<ContractAbi, ConfigError> {
        ContractAbi::from_path(&self.abi_path).map_err(|source| ConfigError::Abi {
            path: self.abi_path.clone(),
            source,
        })
    }
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed, and values may be single- or double-quoted.
pub fn parse_dotenv(text: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut pairs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let invalid = |reason: &str| ConfigError::Dotenv {
            line: idx + 1,
            reason: reason.to_string(),
        };
        let (key, value) = line.split_once('=').ok_or_else(|| invalid("expected KEY=value"))?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("invalid variable name"));
        }
        pairs.push((key.to_string(), unquote(value.trim()).map_err(invalid)?));
    }
    Ok(pairs)
}

fn unquote(value: &str) -> Result<String, &'static str> {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            let end = rest.find(quote).ok_or("unterminated quote")?;
            return Ok(rest[..end].to_string());
        }
    }
    let value = match value.find(" #") {
        Some(at) => &value[..at],
        None => value,
    };
    Ok(value.trim_end().to_string())
}

/// Apply a `.env` file to the process environment without overriding
/// variables that are already set. A missing file is not an error; returns
/// the number of variables applied.
pub fn load_dotenv(path: &Path) -> Result<usize, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let mut applied = 0;
    for (key, value) in parse_dotenv(&text)? {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            applied += 1;
        }
    }
    debug!(path = %path.display(), applied, "loaded dotenv");
    Ok(applied)
}
