//! Request and response shapes exchanged with the Lit network
//!
//! Field names follow the network's camelCase JSON. Records that the network
//! owns keep every field they were issued with via a flattened `extra` map, so
//! round-tripping through storage never drops data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::auth::ResourceAbilityRequest;

/// Signature over a challenge message, proving control of `address`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    pub sig: String,
    pub derived_via: String,
    pub signed_message: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
}

/// Short-lived session authorization bundle, one signature per node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSigs(pub BTreeMap<String, AuthSig>);

impl SessionSigs {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the client asks the network for when requesting session signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSigsRequest {
    pub chain: String,
    /// ISO-8601 expiration timestamp
    pub expiration: String,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
}

/// Parameters the network hands back when it needs a wallet signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCallbackParams {
    pub uri: String,
    pub expiration: String,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
}

/// Kind of credential used to authenticate a PKP mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum AuthMethodType {
    EthWallet,
}

impl From<AuthMethodType> for u32 {
    fn from(value: AuthMethodType) -> Self {
        match value {
            AuthMethodType::EthWallet => 1,
        }
    }
}

impl TryFrom<u32> for AuthMethodType {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AuthMethodType::EthWallet),
            other => Err(format!("unsupported auth method type {}", other)),
        }
    }
}

/// Permission granted to an auth method over a minted PKP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum AuthMethodScope {
    NoPermissions,
    SignAnything,
    PersonalSign,
}

impl From<AuthMethodScope> for u32 {
    fn from(value: AuthMethodScope) -> Self {
        match value {
            AuthMethodScope::NoPermissions => 0,
            AuthMethodScope::SignAnything => 1,
            AuthMethodScope::PersonalSign => 2,
        }
    }
}

impl TryFrom<u32> for AuthMethodScope {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AuthMethodScope::NoPermissions),
            1 => Ok(AuthMethodScope::SignAnything),
            2 => Ok(AuthMethodScope::PersonalSign),
            other => Err(format!("unsupported auth method scope {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMethod {
    pub auth_method_type: AuthMethodType,
    /// JSON-encoded [`AuthSig`] for wallet auth
    pub access_token: String,
}

impl AuthMethod {
    /// Package a wallet signature as an "external wallet" auth method
    pub fn eth_wallet(auth_sig: &AuthSig) -> serde_json::Result<Self> {
        Ok(Self {
            auth_method_type: AuthMethodType::EthWallet,
            access_token: serde_json::to_string(auth_sig)?,
        })
    }
}

/// Descriptor of a minted programmable key pair
///
/// Only `public_key` is interpreted by this crate; everything else the
/// network returns is carried in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkpRecord {
    pub public_key: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PkpRecord {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            extra: Map::new(),
        }
    }

    pub fn token_id(&self) -> Option<&str> {
        self.extra.get("tokenId").and_then(Value::as_str)
    }

    pub fn eth_address(&self) -> Option<&str> {
        self.extra.get("ethAddress").and_then(Value::as_str)
    }
}

/// Result of a successful PKP mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintInfo {
    pub pkp: PkpRecord,
    /// Transaction details (`tx`, `res`, ...) as reported by the contracts client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of a Lit Action execution, returned verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteJsResponse {
    #[serde(default)]
    pub success: Option<bool>,
    /// Value set by `Lit.Actions.setResponse`
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub signatures: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Threshold signature produced by a PKP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkpSignature {
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_signed: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignResult {
    pub signature: PkpSignature,
}
