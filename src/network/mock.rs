//! In-process doubles for the Lit network and contracts client

use alloy::primitives::hex;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{
    AuthNeededCallback, ContractClient, ContractsContext, ContractsFactory, NetworkConnector,
    SigningNetwork,
};
use crate::config::{LitNetwork, CHRONICLE_YELLOWSTONE_RPC};
use crate::error::RemoteError;
use crate::types::{
    AuthCallbackParams, AuthMethod, AuthMethodScope, AuthSig, ExecuteJsResponse, MintInfo,
    PkpRecord, PkpSignature, SessionSigs, SessionSigsRequest,
};
use crate::wallet::WalletCredential;
use crate::{Error, Result};

pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn test_wallet() -> WalletCredential {
    WalletCredential::from_hex(TEST_KEY, CHRONICLE_YELLOWSTONE_RPC).expect("test wallet")
}

pub struct MockNetwork {
    ready: AtomicBool,
    connected: AtomicBool,
    session_requests: AtomicUsize,
    network_calls: AtomicUsize,
    last_auth_sig: Mutex<Option<AuthSig>>,
    last_sign: Mutex<Option<(String, Vec<u8>)>>,
    session_failure: Mutex<Option<String>>,
    js_results: Mutex<HashMap<String, Value>>,
}

impl MockNetwork {
    pub const BLOCKHASH: &'static str =
        "0x8111e78458fec7fb123fdfe3c559a1f7ae33bf21bf81d1bad589e9422c648cbd";
    pub const NODES: [&'static str; 3] = [
        "https://node-0.datil-dev.example",
        "https://node-1.datil-dev.example",
        "https://node-2.datil-dev.example",
    ];

    pub fn ready() -> Self {
        let network = Self::connecting();
        network.set_ready(true);
        network
    }

    /// Connected but still handshaking with the nodes
    pub fn connecting() -> Self {
        Self {
            ready: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            session_requests: AtomicUsize::new(0),
            network_calls: AtomicUsize::new(0),
            last_auth_sig: Mutex::new(None),
            last_sign: Mutex::new(None),
            session_failure: Mutex::new(None),
            js_results: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Result the "sandbox" produces for an exact piece of code
    pub fn with_js_result(self, code: &str, response: Value) -> Self {
        self.js_results
            .lock()
            .unwrap()
            .insert(code.to_string(), response);
        self
    }

    pub fn fail_session_sigs(&self, message: &str) {
        *self.session_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn session_requests(&self) -> usize {
        self.session_requests.load(Ordering::SeqCst)
    }

    /// Every remote round trip, including blockhash lookups
    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub fn last_auth_sig(&self) -> Option<AuthSig> {
        self.last_auth_sig.lock().unwrap().clone()
    }

    pub fn last_sign(&self) -> Option<(String, Vec<u8>)> {
        self.last_sign.lock().unwrap().clone()
    }

    fn record_call(&self) {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SigningNetwork for MockNetwork {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn latest_blockhash(&self) -> Result<String> {
        self.record_call();
        Ok(Self::BLOCKHASH.to_string())
    }

    async fn session_sigs(
        &self,
        request: SessionSigsRequest,
        callback: &dyn AuthNeededCallback,
    ) -> Result<SessionSigs> {
        self.record_call();
        self.session_requests.fetch_add(1, Ordering::SeqCst);

        let auth_sig = callback
            .auth_sig(AuthCallbackParams {
                uri: "lit:session:0a1b2c3d".to_string(),
                expiration: request.expiration.clone(),
                resource_ability_requests: request.resource_ability_requests.clone(),
            })
            .await?;
        *self.last_auth_sig.lock().unwrap() = Some(auth_sig.clone());

        if let Some(message) = self.session_failure.lock().unwrap().clone() {
            return Err(RemoteError::new(message).with_code("invalid_auth_sig").into());
        }

        let sigs: BTreeMap<String, AuthSig> = Self::NODES
            .iter()
            .map(|node| {
                let sig = AuthSig {
                    sig: format!("session-sig-for-{}", node),
                    derived_via: "litSessionSignViaNacl".to_string(),
                    signed_message: serde_json::to_string(&request).unwrap_or_default(),
                    address: auth_sig.address.clone(),
                    algo: Some("ed25519".to_string()),
                };
                (node.to_string(), sig)
            })
            .collect();
        Ok(SessionSigs(sigs))
    }

    async fn execute_js(
        &self,
        session_sigs: &SessionSigs,
        code: &str,
        js_params: Value,
    ) -> Result<ExecuteJsResponse> {
        self.record_call();
        assert!(!session_sigs.is_empty(), "execute_js called without session sigs");

        let response = match self.js_results.lock().unwrap().get(code) {
            Some(response) => response.clone(),
            None if code.contains("invalid") => {
                return Err(RemoteError::new(
                    "There was an error getting the signing shares from the nodes",
                )
                .with_code("unknown_error")
                .into());
            }
            None => json!({ "params": js_params }),
        };

        Ok(ExecuteJsResponse {
            success: Some(true),
            response,
            logs: String::new(),
            signatures: json!({}),
            extra: Map::new(),
        })
    }

    async fn pkp_sign(
        &self,
        public_key: &str,
        session_sigs: &SessionSigs,
        to_sign: &[u8],
    ) -> Result<PkpSignature> {
        self.record_call();
        assert!(!session_sigs.is_empty(), "pkp_sign called without session sigs");

        *self.last_sign.lock().unwrap() = Some((public_key.to_string(), to_sign.to_vec()));
        Ok(PkpSignature {
            signature: format!("0x{}", "ab".repeat(65)),
            public_key: Some(public_key.to_string()),
            data_signed: Some(format!("0x{}", hex::encode(to_sign))),
            extra: Map::new(),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one shared [`MockNetwork`]
pub struct MockConnector {
    network: Arc<MockNetwork>,
    connects: AtomicUsize,
    fail: bool,
}

impl MockConnector {
    pub fn new(network: Arc<MockNetwork>) -> Self {
        Self {
            network,
            connects: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Arc::new(MockNetwork::connecting()))
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkConnector for MockConnector {
    async fn connect(&self, _network: LitNetwork) -> Result<Arc<dyn SigningNetwork>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RemoteError::new("Could not handshake with nodes").into());
        }
        Ok(self.network.clone() as Arc<dyn SigningNetwork>)
    }
}

/// Contracts double that mints sequentially numbered PKPs
#[derive(Default)]
pub struct MockContracts {
    state: Arc<MockContractsState>,
}

#[derive(Default)]
pub struct MockContractsState {
    mints: AtomicUsize,
    fail_mint: AtomicBool,
    last_auth_method: Mutex<Option<(AuthMethod, Vec<AuthMethodScope>)>>,
    last_debug: Mutex<Option<bool>>,
    /// When set, mints wait for `release` after signalling `entered`
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl MockContracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mints(&self) -> usize {
        self.state.mints.load(Ordering::SeqCst)
    }

    pub fn fail_mint(&self) {
        self.state.fail_mint.store(true, Ordering::SeqCst);
    }

    pub fn last_auth_method(&self) -> Option<(AuthMethod, Vec<AuthMethodScope>)> {
        self.state.last_auth_method.lock().unwrap().clone()
    }

    pub fn last_debug(&self) -> Option<bool> {
        *self.state.last_debug.lock().unwrap()
    }

    /// Hold mints in flight; returns `(entered, release)`
    pub fn gate(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.state.gate.lock().unwrap() = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    pub fn public_key_for(n: usize) -> String {
        format!("0x04{:0>128}", n)
    }
}

impl ContractsFactory for MockContracts {
    fn bind(&self, context: ContractsContext) -> Box<dyn ContractClient> {
        *self.state.last_debug.lock().unwrap() = Some(context.debug);
        Box::new(MockContractClient {
            state: self.state.clone(),
            connected: false,
        })
    }
}

struct MockContractClient {
    state: Arc<MockContractsState>,
    connected: bool,
}

#[async_trait]
impl ContractClient for MockContractClient {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn mint_with_auth(
        &self,
        auth_method: AuthMethod,
        scopes: &[AuthMethodScope],
    ) -> Result<MintInfo> {
        if !self.connected {
            return Err(Error::NotInitialized("Contracts client".to_string()));
        }
        *self.state.last_auth_method.lock().unwrap() = Some((auth_method, scopes.to_vec()));

        let gate = self.state.gate.lock().unwrap().clone();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        if self.state.fail_mint.load(Ordering::SeqCst) {
            return Err(RemoteError::new("execution reverted: insufficient funds").into());
        }

        let n = self.state.mints.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pkp = PkpRecord::new(MockContracts::public_key_for(n));
        pkp.extra.insert("tokenId".to_string(), json!(format!("0x{:x}", n)));
        pkp.extra.insert(
            "ethAddress".to_string(),
            json!("0x9D1a5EC58232A894eBFcB5e466E3075b23101B89"),
        );

        let mut extra = Map::new();
        extra.insert("tx".to_string(), json!({ "hash": format!("0x{:064x}", n) }));
        Ok(MintInfo { pkp, extra })
    }
}
