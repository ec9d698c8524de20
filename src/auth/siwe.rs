//! EIP-4361 (Sign-In with Ethereum) challenges carrying ReCap capabilities
//!
//! The abilities a session asks for are encoded twice, as ReCap (EIP-5573)
//! requires: once as a human-readable sentence appended to the statement, and
//! once as a `urn:recap:` resource holding base64url JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::ResourceAbilityRequest;
use crate::config::SiweConfig;
use crate::{Error, Result};

pub const DEFAULT_DOMAIN: &str = "localhost";
pub const DEFAULT_STATEMENT: &str = "Lit Protocol PKP client session.";
pub const SIWE_VERSION: &str = "1";
pub const RECAP_URN_PREFIX: &str = "urn:recap:";

/// Format a timestamp the way the network expects (`toISOString` style)
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Expiration timestamp `ttl` from now, saturating at the latest
/// representable time
pub fn expiration_in(ttl: chrono::Duration) -> String {
    let at = Utc::now()
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    iso_timestamp(at)
}

/// A challenge message for the wallet to sign
#[derive(Debug, Clone)]
pub struct SiweChallenge {
    pub domain: String,
    /// EIP-55 checksummed wallet address
    pub address: String,
    pub statement: String,
    pub uri: String,
    pub chain_id: u64,
    /// Freshness value; the network's latest blockhash
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration: String,
    pub resources: Vec<ResourceAbilityRequest>,
}

impl SiweChallenge {
    pub fn new(
        address: impl Into<String>,
        uri: impl Into<String>,
        nonce: impl Into<String>,
        expiration: impl Into<String>,
    ) -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            address: address.into(),
            statement: DEFAULT_STATEMENT.to_string(),
            uri: uri.into(),
            chain_id: 1,
            nonce: nonce.into(),
            issued_at: Utc::now(),
            expiration: expiration.into(),
            resources: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Vec<ResourceAbilityRequest>) -> Self {
        self.resources = resources;
        self
    }

    /// Apply the deployment's domain, statement and chain id
    pub fn with_config(mut self, config: &SiweConfig) -> Self {
        self.domain = config.domain.clone();
        self.statement = config.statement.clone();
        self.chain_id = config.chain_id;
        self
    }

    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }

    /// Render the message text that gets signed
    pub fn render(&self) -> Result<String> {
        if self.uri.is_empty() {
            return Err(Error::InvalidArgument("SIWE challenge requires a URI".to_string()));
        }
        if self.nonce.is_empty() {
            return Err(Error::InvalidArgument("SIWE challenge requires a nonce".to_string()));
        }
        if self.address.is_empty() {
            return Err(Error::InvalidArgument(
                "SIWE challenge requires a wallet address".to_string(),
            ));
        }

        let attenuations = recap_attenuations(&self.resources);

        let mut statement = self.statement.clone();
        if !attenuations.is_empty() {
            if !statement.is_empty() {
                statement.push(' ');
            }
            statement.push_str(&recap_statement(&attenuations));
        }

        let mut message = format!(
            "{} wants you to sign in with your Ethereum account:\n{}\n",
            self.domain, self.address
        );
        if !statement.is_empty() {
            message.push_str(&format!("\n{}\n", statement));
        }
        message.push_str(&format!(
            "\nURI: {}\nVersion: {}\nChain ID: {}\nNonce: {}\nIssued At: {}\nExpiration Time: {}",
            self.uri,
            SIWE_VERSION,
            self.chain_id,
            self.nonce,
            iso_timestamp(self.issued_at),
            self.expiration
        ));
        if !attenuations.is_empty() {
            message.push_str(&format!("\nResources:\n- {}", recap_urn(&attenuations)?));
        }

        Ok(message)
    }
}

/// resource key -> ability ("Namespace/Name") -> caveats
type Attenuations = BTreeMap<String, BTreeMap<String, Vec<Value>>>;

fn recap_attenuations(resources: &[ResourceAbilityRequest]) -> Attenuations {
    let mut att = Attenuations::new();
    for request in resources {
        let (namespace, name) = request.ability.recap();
        att.entry(request.resource.resource_key())
            .or_default()
            .insert(format!("{}/{}", namespace, name), vec![json!({})]);
    }
    att
}

fn recap_statement(att: &Attenuations) -> String {
    let mut clauses = Vec::new();
    for (resource, abilities) in att {
        for ability in abilities.keys() {
            let (namespace, name) = ability.split_once('/').unwrap_or((ability.as_str(), ""));
            clauses.push(format!(
                "({}) '{}': '{}' for '{}'.",
                clauses.len() + 1,
                namespace,
                name,
                resource
            ));
        }
    }
    format!(
        "I further authorize the stated URI to perform the following actions on my behalf: {}",
        clauses.join(" ")
    )
}

fn recap_urn(att: &Attenuations) -> Result<String> {
    let mut body = Map::new();
    body.insert("att".to_string(), serde_json::to_value(att)?);
    body.insert("prf".to_string(), Value::Array(Vec::new()));
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Value::Object(body))?);
    Ok(format!("{}{}", RECAP_URN_PREFIX, encoded))
}

/// Decode the ReCap resource of a rendered challenge, if it has one
pub fn decode_recap(message: &str) -> Option<Value> {
    let encoded = message
        .lines()
        .filter_map(|line| line.strip_prefix("- "))
        .find_map(|resource| resource.strip_prefix(RECAP_URN_PREFIX))?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}
