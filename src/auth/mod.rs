//! Session authorization
//!
//! Resources and abilities a session can be scoped to, the SIWE challenge
//! that proves wallet ownership, and the authorizer that turns a wallet
//! signature into a session signature bundle.

mod session;
pub mod siwe;

pub use session::SessionAuthorizer;
pub use siwe::SiweChallenge;

pub(crate) use session::wallet_auth_sig;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of Lit resources a capability applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LitResourcePrefix {
    #[serde(rename = "lit-litaction")]
    LitAction,
    #[serde(rename = "lit-pkp")]
    Pkp,
}

impl LitResourcePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            LitResourcePrefix::LitAction => "lit-litaction",
            LitResourcePrefix::Pkp => "lit-pkp",
        }
    }
}

/// A Lit resource, e.g. `lit-pkp://*`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LitResource {
    pub resource_prefix: LitResourcePrefix,
    pub resource: String,
}

impl LitResource {
    /// Any Lit Action, identified by IPFS CID or `*`
    pub fn lit_action(resource: impl Into<String>) -> Self {
        Self {
            resource_prefix: LitResourcePrefix::LitAction,
            resource: resource.into(),
        }
    }

    /// Any PKP, identified by token id or `*`
    pub fn pkp(resource: impl Into<String>) -> Self {
        Self {
            resource_prefix: LitResourcePrefix::Pkp,
            resource: resource.into(),
        }
    }

    /// `prefix://resource`, the key used inside ReCap attenuations
    pub fn resource_key(&self) -> String {
        format!("{}://{}", self.resource_prefix.as_str(), self.resource)
    }
}

impl fmt::Display for LitResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_key())
    }
}

/// Operation a session is allowed to perform on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LitAbility {
    LitActionExecution,
    PkpSigning,
}

impl LitAbility {
    pub fn as_str(&self) -> &'static str {
        match self {
            LitAbility::LitActionExecution => "lit-action-execution",
            LitAbility::PkpSigning => "pkp-signing",
        }
    }

    /// ReCap `(namespace, name)` this ability is encoded as
    pub fn recap(&self) -> (&'static str, &'static str) {
        match self {
            LitAbility::LitActionExecution => ("Threshold", "Execution"),
            LitAbility::PkpSigning => ("Threshold", "Signing"),
        }
    }

    /// Resource family the ability applies to
    pub fn resource_prefix(&self) -> LitResourcePrefix {
        match self {
            LitAbility::LitActionExecution => LitResourcePrefix::LitAction,
            LitAbility::PkpSigning => LitResourcePrefix::Pkp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAbilityRequest {
    pub resource: LitResource,
    pub ability: LitAbility,
}

impl ResourceAbilityRequest {
    pub fn new(resource: LitResource, ability: LitAbility) -> Self {
        Self { resource, ability }
    }
}

/// Abilities every session and mint challenge is scoped to: execute any Lit
/// Action and sign with any PKP.
pub fn default_resource_abilities() -> Vec<ResourceAbilityRequest> {
    vec![
        ResourceAbilityRequest::new(LitResource::lit_action("*"), LitAbility::LitActionExecution),
        ResourceAbilityRequest::new(LitResource::pkp("*"), LitAbility::PkpSigning),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_keys() {
        assert_eq!(LitResource::lit_action("*").resource_key(), "lit-litaction://*");
        assert_eq!(LitResource::pkp("*").to_string(), "lit-pkp://*");
    }

    #[test]
    fn default_abilities_match_their_resources() {
        for request in default_resource_abilities() {
            assert_eq!(
                request.ability.resource_prefix(),
                request.resource.resource_prefix
            );
        }
    }

    #[test]
    fn resource_ability_request_json_shape() {
        let value = serde_json::to_value(&default_resource_abilities()[1]).unwrap();
        assert_eq!(
            value,
            json!({
                "resource": { "resourcePrefix": "lit-pkp", "resource": "*" },
                "ability": "pkp-signing"
            })
        );
    }
}
