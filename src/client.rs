//! Lit client facade
//!
//! Owns the network connection and the wallet credential and exposes the
//! operations callers actually use: execute a Lit Action, mint a PKP, and
//! sign with it.
//!
//! ```text
//! Uninitialized --connect--> Connecting --nodes ready--> Ready
//!                                 |                        |
//!                                 +-------disconnect-------+--> Disconnected
//! ```

use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::siwe::expiration_in;
use crate::auth::{default_resource_abilities, wallet_auth_sig, SessionAuthorizer};
use crate::config::LitConfig;
use crate::error::RemoteError;
use crate::network::{
    ContractsContext, ContractsFactory, LitNodeConnector, NetworkConnector, PkpContracts,
    SigningNetwork,
};
use crate::storage::{self, CredentialStore, KeyValueStore};
use crate::types::{
    AuthMethod, AuthMethodScope, ExecuteJsResponse, MintInfo, PkpRecord, SignResult,
};
use crate::wallet::WalletCredential;
use crate::{Error, Result};

/// SIWE URI used for the mint authorization challenge
pub const CREATE_WALLET_URI: &str = "sdk://createWallet";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a [`LitClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No connection has been opened yet
    Uninitialized,
    /// Connection opened, nodes not ready yet
    Connecting,
    Ready,
    Disconnected,
}

struct Connection {
    state: ClientState,
    network: Option<Arc<dyn SigningNetwork>>,
}

/// Session-authenticated client for Lit Actions and PKP wallets
pub struct LitClient {
    config: LitConfig,
    connector: Arc<dyn NetworkConnector>,
    contracts: Arc<dyn ContractsFactory>,
    store: CredentialStore,
    wallet: Option<Arc<WalletCredential>>,
    connection: RwLock<Connection>,
    pkp: RwLock<Option<PkpRecord>>,
    /// Held for the duration of a mint; a second concurrent mint is rejected
    minting: Mutex<()>,
}

impl LitClient {
    /// Create an unconnected client
    ///
    /// Storage is opened from `config.storage` and the wallet is loaded from
    /// `config.private_key` when present; both can be replaced with
    /// [`with_storage`](Self::with_storage) and [`with_wallet`](Self::with_wallet).
    pub fn new(
        config: LitConfig,
        connector: Arc<dyn NetworkConnector>,
        contracts: Arc<dyn ContractsFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let store = CredentialStore::new(storage::open(&config.storage)?);
        let wallet = match &config.private_key {
            Some(key) => Some(Arc::new(WalletCredential::from_secret(key, &config.rpc_url)?)),
            None => None,
        };

        Ok(Self {
            config,
            connector,
            contracts,
            store,
            wallet,
            connection: RwLock::new(Connection {
                state: ClientState::Uninitialized,
                network: None,
            }),
            pkp: RwLock::new(None),
            minting: Mutex::new(()),
        })
    }

    /// Create a client and open its connection
    pub async fn create(
        config: LitConfig,
        connector: Arc<dyn NetworkConnector>,
        contracts: Arc<dyn ContractsFactory>,
    ) -> Result<Self> {
        let client = Self::new(config, connector, contracts)?;
        client.connect().await?;
        Ok(client)
    }

    /// Create an unconnected client that talks to `config.node_urls` over
    /// HTTP and mints through `config.contracts`
    pub fn from_config(config: LitConfig) -> Result<Self> {
        let connector = Arc::new(LitNodeConnector::from_config(&config)?);
        let contracts = Arc::new(PkpContracts::from_config(&config));
        Self::new(config, connector, contracts)
    }

    /// Use a different storage backend for the PKP record
    pub fn with_storage(mut self, backend: Arc<dyn KeyValueStore>) -> Self {
        self.store = CredentialStore::new(backend);
        self
    }

    /// Set the wallet used to authorize sessions and mints
    pub fn with_wallet(mut self, wallet: WalletCredential) -> Self {
        self.wallet = Some(Arc::new(wallet));
        self
    }

    pub fn config(&self) -> &LitConfig {
        &self.config
    }

    pub fn wallet(&self) -> Option<&WalletCredential> {
        self.wallet.as_deref()
    }

    /// Open the network connection and load any stored PKP record
    pub async fn connect(&self) -> Result<()> {
        {
            let mut connection = self.write_connection();
            match connection.state {
                ClientState::Connecting if connection.network.is_none() => {
                    return Err(Error::Precondition(
                        "a connection attempt is already in progress".to_string(),
                    ));
                }
                ClientState::Connecting | ClientState::Ready => return Ok(()),
                ClientState::Uninitialized | ClientState::Disconnected => {}
            }
            connection.state = ClientState::Connecting;
        }

        let opened = async {
            let network = self.connector.connect(self.config.network).await?;
            let pkp = self.store.get().await?;
            Ok::<_, Error>((network, pkp))
        }
        .await;

        let (network, pkp) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.write_connection().state = ClientState::Uninitialized;
                return Err(e.context("Failed to connect"));
            }
        };

        info!(
            network = %self.config.network,
            ready = network.is_ready(),
            has_pkp = pkp.is_some(),
            "Connected to Lit network"
        );

        *self.pkp.write().unwrap_or_else(PoisonError::into_inner) = pkp;
        let mut connection = self.write_connection();
        connection.network = Some(network);
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        let connection = self.read_connection();
        match (&connection.state, &connection.network) {
            (ClientState::Connecting, Some(network)) if network.is_ready() => ClientState::Ready,
            (state, _) => *state,
        }
    }

    /// Whether the nodes are ready; fails if no connection was ever opened
    pub fn is_ready(&self) -> Result<bool> {
        let connection = self.read_connection();
        let network = connection
            .network
            .as_ref()
            .ok_or_else(|| Error::NotInitialized("Lit node client".to_string()))?;
        Ok(network.is_ready())
    }

    /// Poll until the nodes are ready or the configured connect timeout passes
    pub async fn wait_until_ready(&self) -> Result<()> {
        let timeout = self.config.connect_timeout();
        let poll = async {
            loop {
                if self.is_ready()? {
                    return Ok::<_, Error>(());
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::new(format!(
                "Lit nodes not ready after {}ms",
                timeout.as_millis()
            ))
            .with_code("connect_timeout")
            .into()),
        }
    }

    /// Execute a Lit Action and return the network's response verbatim
    pub async fn execute_js(&self, code: &str, js_params: Value) -> Result<ExecuteJsResponse> {
        let span = info_span!("execute_js", request_id = %Uuid::new_v4());
        async {
            if code.trim().is_empty() {
                return Err(Error::InvalidArgument("No code provided".to_string())
                    .context("Failed to execute JS"));
            }
            let network = self.require_ready()?;

            async {
                let session_sigs = self.authorizer(&network).authorize().await?;
                debug!(code_len = code.len(), "Executing Lit Action");
                network.execute_js(&session_sigs, code, js_params).await
            }
            .await
            .map_err(|e| e.context("Failed to execute JS"))
        }
        .instrument(span)
        .await
    }

    /// Mint a PKP controlled by the wallet and persist it
    ///
    /// The record is written to storage only after the mint succeeds. A
    /// second call while a mint is in flight fails immediately.
    pub async fn create_wallet(&self) -> Result<MintInfo> {
        let span = info_span!("create_wallet", request_id = %Uuid::new_v4());
        async {
            let network = self.require_ready()?;
            let wallet = self
                .wallet
                .clone()
                .ok_or_else(|| Error::NotInitialized("Wallet credential".to_string()))?;
            let _minting = self.minting.try_lock().map_err(|_| {
                Error::Precondition("a wallet mint is already in progress".to_string())
            })?;

            if self.config.network.is_paid() {
                warn!(network = %self.config.network, "Minting on a paid network");
            }

            let mint_info = async {
                let mut contracts = self.contracts.bind(ContractsContext {
                    network: self.config.network,
                    wallet: wallet.clone(),
                    node: network.clone(),
                    debug: self.config.debug,
                });
                contracts.connect().await?;

                let expiration = expiration_in(self.config.session_ttl());
                let auth_sig = wallet_auth_sig(
                    &wallet,
                    network.as_ref(),
                    &self.config.siwe,
                    CREATE_WALLET_URI,
                    &expiration,
                    default_resource_abilities(),
                )
                .await?;
                let auth_method = AuthMethod::eth_wallet(&auth_sig)?;

                let mint_info = contracts
                    .mint_with_auth(auth_method, &[AuthMethodScope::SignAnything])
                    .await?;
                if let Err(e) = self.store.put(&mint_info.pkp).await {
                    warn!(
                        public_key = %mint_info.pkp.public_key,
                        token_id = mint_info.pkp.token_id().unwrap_or("unknown"),
                        eth_address = mint_info.pkp.eth_address().unwrap_or("unknown"),
                        error = %e,
                        "Minted PKP could not be persisted"
                    );
                    return Err(e);
                }
                Ok::<_, Error>(mint_info)
            }
            .await
            .map_err(|e| e.context("Failed to create wallet"))?;

            *self.pkp.write().unwrap_or_else(PoisonError::into_inner) =
                Some(mint_info.pkp.clone());

            info!(
                public_key = %mint_info.pkp.public_key,
                token_id = mint_info.pkp.token_id().unwrap_or("unknown"),
                "Minted PKP"
            );
            Ok::<_, Error>(mint_info)
        }
        .instrument(span)
        .await
    }

    /// The stored PKP record, read from storage
    pub async fn get_pkp(&self) -> Result<Option<PkpRecord>> {
        self.store
            .get()
            .await
            .map_err(|e| e.context("Failed to get PKP"))
    }

    /// The PKP record this client signs with, as loaded at connect or mint
    pub fn current_pkp(&self) -> Option<PkpRecord> {
        self.pkp
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sign raw bytes with the PKP
    pub async fn sign(&self, to_sign: &[u8]) -> Result<SignResult> {
        let span = info_span!("sign", request_id = %Uuid::new_v4());
        async {
            let pkp = self.current_pkp().ok_or_else(|| {
                Error::Precondition("PKP not set; mint one with create_wallet first".to_string())
            })?;
            let network = self.require_ready()?;
            if to_sign.is_empty() {
                return Err(
                    Error::InvalidArgument("Nothing to sign".to_string()).context("Failed to sign")
                );
            }

            async {
                let session_sigs = self.authorizer(&network).authorize().await?;
                debug!(
                    public_key = %pkp.public_key,
                    len = to_sign.len(),
                    "Requesting PKP signature"
                );
                network.pkp_sign(&pkp.public_key, &session_sigs, to_sign).await
            }
            .await
            .map(|signature| SignResult { signature })
            .map_err(|e| e.context("Failed to sign"))
        }
        .instrument(span)
        .await
    }

    /// Sign a hex payload (with or without `0x`), e.g. a 32-byte message hash
    pub async fn sign_hex(&self, to_sign: &str) -> Result<SignResult> {
        let trimmed = to_sign.strip_prefix("0x").unwrap_or(to_sign);
        let bytes = alloy::primitives::hex::decode(trimmed).map_err(|e| {
            Error::InvalidArgument(format!("Invalid hex string: {}", e)).context("Failed to sign")
        })?;
        self.sign(&bytes).await
    }

    /// Release the network connection; a no-op when not connected
    pub async fn disconnect(&self) -> Result<()> {
        let network = {
            let mut connection = self.write_connection();
            let network = connection.network.take();
            if network.is_some() {
                connection.state = ClientState::Disconnected;
            }
            network
        };

        match network {
            Some(network) => {
                network
                    .disconnect()
                    .await
                    .map_err(|e| e.context("Failed to disconnect"))?;
                info!(network = %self.config.network, "Disconnected from Lit network");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn require_ready(&self) -> Result<Arc<dyn SigningNetwork>> {
        let connection = self.read_connection();
        match &connection.network {
            Some(network) if network.is_ready() => Ok(network.clone()),
            _ => Err(Error::NotInitialized("Lit node client".to_string())),
        }
    }

    fn authorizer(&self, network: &Arc<dyn SigningNetwork>) -> SessionAuthorizer {
        SessionAuthorizer::new(
            self.wallet.clone(),
            Some(network.clone()),
            self.config.session_ttl(),
        )
        .with_siwe(self.config.siwe.clone())
    }

    fn read_connection(&self) -> std::sync::RwLockReadGuard<'_, Connection> {
        self.connection.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_connection(&self) -> std::sync::RwLockWriteGuard<'_, Connection> {
        self.connection.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LitClient")
            .field("network", &self.config.network)
            .field("state", &self.state())
            .field("wallet", &self.wallet)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
