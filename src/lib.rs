//! Lit Protocol PKP client
//!
//! A thin client over the Lit Protocol network that:
//! - Authorizes sessions by signing SIWE challenges with a local wallet
//! - Executes Lit Actions (JavaScript run on the Lit nodes)
//! - Mints Programmable Key Pairs (PKPs) and signs with them
//!
//! # Security Model
//!
//! - The wallet private key is held in a `SecretString` and never serialized
//! - Session signatures are requested per call and expire after ten minutes
//! - The only persisted state is the public PKP record
//!
//! The network and contracts are reached through the traits in [`network`].
//! [`LitClient::from_config`] uses the HTTP node transport and the alloy PKP
//! contracts client; [`LitClient::new`] accepts any other implementation.

pub mod auth;
pub mod client;
pub mod config;
pub mod network;
pub mod storage;
pub mod types;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use client::{ClientState, LitClient, CREATE_WALLET_URI};
pub use config::{LitConfig, LitNetwork, SiweConfig, StorageConfig};
pub use network::{LitNodeConnector, PkpContracts};
pub use error::{Error, ErrorKind, RemoteError, Result};
pub use storage::{CredentialStore, KeyValueStore, PKP_STORAGE_KEY};
pub use types::{ExecuteJsResponse, MintInfo, PkpRecord, SignResult};
pub use wallet::WalletCredential;
