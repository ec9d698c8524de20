//! Wallet credential implementation
//!
//! SECURITY: This is the ONLY place where the private key exists.
//! - Keys are held in alloy's PrivateKeySigner which handles crypto securely
//! - Keys are never serialized to JSON or written to the credential store
//! - Keys are never logged

use crate::types::AuthSig;
use crate::{Error, Result};
use alloy::network::EthereumWallet;
use alloy::primitives::{eip191_hash_message, hex, Address};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// How an [`AuthSig`] produced by this wallet was derived
pub const DERIVED_VIA_PERSONAL_SIGN: &str = "web3.eth.personal.sign";

/// Externally-owned wallet that authorizes sessions and PKP mints
///
/// The private key is:
/// - Stored in alloy's PrivateKeySigner
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations
pub struct WalletCredential {
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
    /// RPC endpoint of the chain the Lit contracts live on
    rpc_url: Url,
}

impl WalletCredential {
    /// Create a wallet from a hex-encoded private key bound to an RPC endpoint
    pub fn from_hex(key_hex: &str, rpc_url: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Wallet(format!("Invalid private key: {}", e)))?;

        let rpc_url = Url::parse(rpc_url)
            .map_err(|e| Error::Wallet(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

        let address = signer.address();
        Ok(Self {
            signer,
            address,
            rpc_url,
        })
    }

    /// Create a wallet from a key held in a [`SecretString`]
    pub fn from_secret(key: &SecretString, rpc_url: &str) -> Result<Self> {
        Self::from_hex(key.expose_secret(), rpc_url)
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as an EIP-55 checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Transaction signer for alloy providers; never exposes the key
    pub(crate) fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    /// Sign a message with EIP-191 `personal_sign` semantics
    pub fn sign_message(&self, message: &str) -> Result<String> {
        let hash = eip191_hash_message(message.as_bytes());
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))?;

        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    /// Sign a challenge and package it the way Lit nodes expect
    pub fn auth_sig(&self, message: &str) -> Result<AuthSig> {
        Ok(AuthSig {
            sig: self.sign_message(message)?,
            derived_via: DERIVED_VIA_PERSONAL_SIGN.to_string(),
            signed_message: message.to_string(),
            address: self.address_string(),
            algo: None,
        })
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for WalletCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredential")
            .field("address", &self.address)
            .field("rpc_url", &self.rpc_url.as_str())
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
