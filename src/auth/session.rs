//! Session signature acquisition

use async_trait::async_trait;
use std::sync::Arc;

use super::siwe::{expiration_in, SiweChallenge};
use super::{default_resource_abilities, ResourceAbilityRequest};
use crate::config::SiweConfig;
use crate::network::{AuthNeededCallback, SigningNetwork};
use crate::types::{AuthCallbackParams, AuthSig, SessionSigs, SessionSigsRequest};
use crate::wallet::WalletCredential;
use crate::{Error, Result};

/// Chain the session challenge is issued for
pub const SESSION_CHAIN: &str = "ethereum";

/// Sign a SIWE challenge for `uri` with the wallet, using the network's latest
/// blockhash as nonce.
pub(crate) async fn wallet_auth_sig(
    wallet: &WalletCredential,
    network: &dyn SigningNetwork,
    siwe: &SiweConfig,
    uri: &str,
    expiration: &str,
    resources: Vec<ResourceAbilityRequest>,
) -> Result<AuthSig> {
    let nonce = network.latest_blockhash().await?;

    let message = SiweChallenge::new(wallet.address_string(), uri, nonce, expiration)
        .with_config(siwe)
        .with_resources(resources)
        .render()?;

    wallet.auth_sig(&message)
}

/// Answers the network's auth callback by signing with the held wallet
struct WalletAuthCallback {
    wallet: Arc<WalletCredential>,
    network: Arc<dyn SigningNetwork>,
    siwe: SiweConfig,
}

#[async_trait]
impl AuthNeededCallback for WalletAuthCallback {
    async fn auth_sig(&self, params: AuthCallbackParams) -> Result<AuthSig> {
        tracing::debug!(
            uri = %params.uri,
            expiration = %params.expiration,
            "Signing session challenge"
        );

        wallet_auth_sig(
            &self.wallet,
            self.network.as_ref(),
            &self.siwe,
            &params.uri,
            &params.expiration,
            params.resource_ability_requests,
        )
        .await
    }
}

/// Builds a fresh session signature bundle for every call
///
/// Bundles are never cached; each one is scoped to Lit Action execution and
/// PKP signing and expires after the configured TTL.
pub struct SessionAuthorizer {
    wallet: Option<Arc<WalletCredential>>,
    network: Option<Arc<dyn SigningNetwork>>,
    ttl: chrono::Duration,
    siwe: SiweConfig,
}

impl SessionAuthorizer {
    pub fn new(
        wallet: Option<Arc<WalletCredential>>,
        network: Option<Arc<dyn SigningNetwork>>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            wallet,
            network,
            ttl,
            siwe: SiweConfig::default(),
        }
    }

    /// Sign challenges with a non-default domain, statement or chain id
    pub fn with_siwe(mut self, siwe: SiweConfig) -> Self {
        self.siwe = siwe;
        self
    }

    /// The request sent to the network, with an expiration `ttl` from now
    pub fn request(&self) -> SessionSigsRequest {
        SessionSigsRequest {
            chain: SESSION_CHAIN.to_string(),
            expiration: expiration_in(self.ttl),
            resource_ability_requests: default_resource_abilities(),
        }
    }

    pub async fn authorize(&self) -> Result<SessionSigs> {
        let wallet = self
            .wallet
            .clone()
            .ok_or_else(|| Error::Authorization("no wallet credential available".to_string()))?;
        let network = self
            .network
            .clone()
            .ok_or_else(|| Error::Authorization("no network connection available".to_string()))?;

        let request = self.request();
        let callback = WalletAuthCallback {
            wallet,
            network: network.clone(),
            siwe: self.siwe.clone(),
        };

        let sigs = network.session_sigs(request, &callback).await?;
        if sigs.is_empty() {
            return Err(Error::Authorization(
                "network returned no session signatures".to_string(),
            ));
        }

        tracing::debug!(nodes = sigs.len(), "Obtained session signatures");
        Ok(sigs)
    }
}
