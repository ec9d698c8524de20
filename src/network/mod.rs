//! Boundary with the Lit network
//!
//! Threshold signing, node consensus, Lit Action execution and PKP minting
//! all happen remotely. The traits here are what the client drives;
//! [`node`] talks to the nodes over HTTP and [`contracts`] mints through
//! the PKP contracts.

pub mod contracts;
#[cfg(test)]
pub(crate) mod mock;
pub mod node;
pub mod shares;

pub use contracts::PkpContracts;
pub use node::{LitNodeConnector, LitNodeNetwork};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::LitNetwork;
use crate::types::{
    AuthCallbackParams, AuthMethod, AuthMethodScope, AuthSig, ExecuteJsResponse, MintInfo,
    PkpSignature, SessionSigs, SessionSigsRequest,
};
use crate::wallet::WalletCredential;
use crate::Result;

/// Opens connections to a Lit network
#[async_trait]
pub trait NetworkConnector: Send + Sync {
    async fn connect(&self, network: LitNetwork) -> Result<Arc<dyn SigningNetwork>>;
}

/// Produces a wallet signature when the network needs to authenticate a
/// session request
#[async_trait]
pub trait AuthNeededCallback: Send + Sync {
    async fn auth_sig(&self, params: AuthCallbackParams) -> Result<AuthSig>;
}

/// A live connection to the Lit node quorum
#[async_trait]
pub trait SigningNetwork: Send + Sync {
    /// Whether the handshake with enough nodes has completed
    fn is_ready(&self) -> bool;

    /// Latest blockhash seen by the nodes; used as the SIWE nonce
    async fn latest_blockhash(&self) -> Result<String>;

    async fn session_sigs(
        &self,
        request: SessionSigsRequest,
        callback: &dyn AuthNeededCallback,
    ) -> Result<SessionSigs>;

    async fn execute_js(
        &self,
        session_sigs: &SessionSigs,
        code: &str,
        js_params: Value,
    ) -> Result<ExecuteJsResponse>;

    async fn pkp_sign(
        &self,
        public_key: &str,
        session_sigs: &SessionSigs,
        to_sign: &[u8],
    ) -> Result<PkpSignature>;

    async fn disconnect(&self) -> Result<()>;
}

/// Everything a contracts client is bound to
#[derive(Clone)]
pub struct ContractsContext {
    pub network: LitNetwork,
    pub wallet: Arc<WalletCredential>,
    pub node: Arc<dyn SigningNetwork>,
    pub debug: bool,
}

/// Builds contract-interaction clients for the PKP NFT contracts
pub trait ContractsFactory: Send + Sync {
    fn bind(&self, context: ContractsContext) -> Box<dyn ContractClient>;
}

#[async_trait]
pub trait ContractClient: Send + Sync {
    async fn connect(&mut self) -> Result<()>;

    async fn mint_with_auth(
        &self,
        auth_method: AuthMethod,
        scopes: &[AuthMethodScope],
    ) -> Result<MintInfo>;
}
