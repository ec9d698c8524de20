//! Configuration for the Lit PKP client
//!
//! Values come from a JSON file, from environment variables, or from
//! `Default`. Environment variables:
//!
//! ```bash
//! export LIT_NETWORK="datil-dev"        # datil-dev | datil-test | datil
//! export LIT_DEBUG="true"
//! export LIT_RPC_URL="https://yellowstone-rpc.litprotocol.com"
//! export LIT_STORAGE_DIR="$HOME/.lit-pkp" # omit for in-memory storage
//! export LIT_PRIVATE_KEY="0x..."          # never written to config files
//! export LIT_NODE_URLS="https://node-a:7470,https://node-b:7470"
//! export LIT_PKP_NFT_ADDRESS="0x..."
//! export LIT_PKP_HELPER_ADDRESS="0x..."
//! ```

pub mod network;

use crate::auth::siwe;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use network::{LitNetwork, CHRONICLE_YELLOWSTONE_RPC};

/// Environment variable names
pub mod env_vars {
    pub const LIT_NETWORK: &str = "LIT_NETWORK";
    pub const LIT_DEBUG: &str = "LIT_DEBUG";
    pub const LIT_RPC_URL: &str = "LIT_RPC_URL";
    pub const LIT_STORAGE_DIR: &str = "LIT_STORAGE_DIR";
    pub const LIT_PRIVATE_KEY: &str = "LIT_PRIVATE_KEY";
    pub const LIT_NODE_URLS: &str = "LIT_NODE_URLS";
    pub const LIT_PKP_NFT_ADDRESS: &str = "LIT_PKP_NFT_ADDRESS";
    pub const LIT_PKP_HELPER_ADDRESS: &str = "LIT_PKP_HELPER_ADDRESS";
}

/// Session signatures and mint challenges expire after ten minutes.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Longest session lifetime a config may ask for (one week)
pub const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Where the PKP record is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process-local only; lost on exit
    #[default]
    Memory,
    /// One file per key under `dir`
    File { dir: PathBuf },
}

/// Addresses of the PKP contracts on Chronicle Yellowstone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// PKPNFT; quotes the mint cost and emits `PKPMinted`
    #[serde(default)]
    pub pkp_nft: Option<String>,
    /// PKPHelper; mints and registers auth methods in one transaction
    #[serde(default)]
    pub pkp_helper: Option<String>,
}

/// Fields of the Sign-In with Ethereum challenge that are not per-request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiweConfig {
    #[serde(default = "default_siwe_domain")]
    pub domain: String,
    #[serde(default = "default_siwe_statement")]
    pub statement: String,
    #[serde(default = "default_siwe_chain_id")]
    pub chain_id: u64,
}

fn default_siwe_domain() -> String {
    siwe::DEFAULT_DOMAIN.to_string()
}

fn default_siwe_statement() -> String {
    siwe::DEFAULT_STATEMENT.to_string()
}

fn default_siwe_chain_id() -> u64 {
    1
}

impl Default for SiweConfig {
    fn default() -> Self {
        Self {
            domain: default_siwe_domain(),
            statement: default_siwe_statement(),
            chain_id: default_siwe_chain_id(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LitConfig {
    /// Lit network to connect to
    #[serde(default)]
    pub network: LitNetwork,
    /// Verbose logging and debug mode for the contracts client
    #[serde(default)]
    pub debug: bool,
    /// RPC endpoint the wallet credential is bound to
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Storage backend for the PKP record
    #[serde(default)]
    pub storage: StorageConfig,
    /// How long `wait_until_ready` polls before giving up (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Lifetime of session signatures and mint challenges (seconds)
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Base URLs of the Lit nodes to talk to
    #[serde(default)]
    pub node_urls: Vec<String>,
    /// Nodes that must agree for a request to succeed; two thirds when unset
    #[serde(default)]
    pub min_node_count: Option<usize>,
    /// Per-request HTTP timeout for node calls (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub contracts: ContractAddresses,
    #[serde(default)]
    pub siwe: SiweConfig,
    /// Wallet private key; only ever read from the environment
    #[serde(skip)]
    pub private_key: Option<SecretString>,
}

fn default_rpc_url() -> String {
    LitNetwork::default().rpc_url().to_string()
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Default for LitConfig {
    fn default() -> Self {
        Self {
            network: LitNetwork::default(),
            debug: false,
            rpc_url: default_rpc_url(),
            storage: StorageConfig::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            node_urls: Vec::new(),
            min_node_count: None,
            request_timeout_ms: default_request_timeout_ms(),
            contracts: ContractAddresses::default(),
            siwe: SiweConfig::default(),
            private_key: None,
        }
    }
}

impl LitConfig {
    /// Build a config from `Default` overlaid with environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay environment variables on top of this config
    ///
    /// Used after loading a JSON config file so the private key (which is
    /// never part of the file) and per-deployment overrides still apply.
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        if let Ok(network) = std::env::var(env_vars::LIT_NETWORK) {
            self.network = network.parse()?;
            tracing::debug!(network = %self.network, "Using LIT_NETWORK");
        }
        if let Ok(debug) = std::env::var(env_vars::LIT_DEBUG) {
            self.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(url) = std::env::var(env_vars::LIT_RPC_URL) {
            tracing::debug!("Using LIT_RPC_URL");
            self.rpc_url = url;
        }
        if let Ok(dir) = std::env::var(env_vars::LIT_STORAGE_DIR) {
            self.storage = StorageConfig::File { dir: dir.into() };
        }
        if let Ok(key) = std::env::var(env_vars::LIT_PRIVATE_KEY) {
            self.private_key = Some(SecretString::from(key));
        }
        if let Ok(urls) = std::env::var(env_vars::LIT_NODE_URLS) {
            self.node_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(address) = std::env::var(env_vars::LIT_PKP_NFT_ADDRESS) {
            self.contracts.pkp_nft = Some(address);
        }
        if let Ok(address) = std::env::var(env_vars::LIT_PKP_HELPER_ADDRESS) {
            self.contracts.pkp_helper = Some(address);
        }

        if self.private_key.is_none() {
            tracing::warn!(
                "No {} set - minting and session signatures are unavailable",
                env_vars::LIT_PRIVATE_KEY
            );
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(crate::Error::Config(format!(
                "session_ttl_secs must be between 1 and {}, got {}",
                MAX_SESSION_TTL_SECS, self.session_ttl_secs
            )));
        }
        if self.min_node_count == Some(0) {
            return Err(crate::Error::Config("min_node_count must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Session lifetime, capped at [`MAX_SESSION_TTL_SECS`]
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64;
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::zero())
    }
}
