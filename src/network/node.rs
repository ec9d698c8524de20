//! HTTP transport to the Lit nodes
//!
//! Every request fans out to all handshaken nodes concurrently and succeeds
//! once enough of them agree:
//! - handshake: `POST /web/handshake`, yields the latest blockhash and epoch
//! - session signatures: signed locally with a fresh ed25519 session key
//!   whose capability is the wallet's SIWE signature
//! - Lit Actions: `POST /web/execute/v2`, most common response wins
//! - PKP signing: `POST /web/pkp/sign/v2`, shares combined client-side

use alloy::primitives::hex;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use futures::future::join_all;
use rand::rngs::OsRng;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::shares::{combine_ecdsa_shares, SignatureShare};
use super::{AuthNeededCallback, NetworkConnector, SigningNetwork};
use crate::auth::siwe::iso_timestamp;
use crate::config::{env_vars, LitConfig, LitNetwork};
use crate::error::RemoteError;
use crate::types::{
    AuthCallbackParams, AuthSig, ExecuteJsResponse, PkpSignature, SessionSigs,
    SessionSigsRequest,
};
use crate::{Error, Result};

pub const HANDSHAKE_PATH: &str = "/web/handshake";
pub const EXECUTE_JS_PATH: &str = "/web/execute/v2";
pub const PKP_SIGN_PATH: &str = "/web/pkp/sign/v2";

/// How an ed25519 session signature was derived
pub const DERIVED_VIA_SESSION_SIG: &str = "litSessionSignViaNacl";

/// Prefix of the SIWE URI that delegates to a session key
pub const SESSION_URI_PREFIX: &str = "lit:session:";

/// Blockhashes older than this are refreshed before being used as a nonce
const BLOCKHASH_MAX_AGE: Duration = Duration::from_secs(30);

/// Minimum agreeing nodes for `node_count` nodes: two thirds, rounded up
fn default_min_node_count(node_count: usize) -> usize {
    ((node_count * 2 + 2) / 3).max(1)
}

/// The value that occurs most often, with its count; first seen wins ties
fn most_common<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Option<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| *seen == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (item, count) in counts {
        if best.as_ref().map_or(true, |(_, best_count)| count > *best_count) {
            best = Some((item, count));
        }
    }
    best
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<String>,
}

/// Map a failed HTTP response to the error the node reported
fn node_error(node: &str, status: reqwest::StatusCode, body: &str) -> RemoteError {
    match serde_json::from_str::<NodeError>(body) {
        Ok(error) => {
            let message = error
                .message
                .filter(|m| !m.is_empty())
                .or_else(|| error.details.first().cloned())
                .unwrap_or_else(|| format!("{} returned {}", node, status));
            RemoteError {
                message,
                error_code: error.error_code,
            }
        }
        Err(_) => RemoteError::new(format!("{} returned {}", node, status))
            .with_code(status.as_u16().to_string()),
    }
}

async fn post_json<T: DeserializeOwned>(
    http: &Client,
    node: &str,
    path: &str,
    request_id: &str,
    body: &Value,
) -> std::result::Result<T, RemoteError> {
    let response = http
        .post(format!("{}{}", node, path))
        .header("X-Request-Id", request_id)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            RemoteError::new(format!("Request to {} failed: {}", node, e)).with_code("transport")
        })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| {
        RemoteError::new(format!("Failed to read response from {}: {}", node, e))
            .with_code("transport")
    })?;
    if !status.is_success() {
        return Err(node_error(node, status, &text));
    }

    serde_json::from_str(&text).map_err(|e| {
        RemoteError::new(format!("Invalid response from {}: {}", node, e))
            .with_code("invalid_response")
    })
}

/// Keep the successful answers if there are at least `min` of them,
/// otherwise surface the error most nodes reported
fn quorum<T>(
    results: Vec<(String, std::result::Result<T, RemoteError>)>,
    min: usize,
) -> Result<Vec<(String, T)>> {
    let total = results.len();
    let mut ok = Vec::new();
    let mut errors = Vec::new();
    for (node, result) in results {
        match result {
            Ok(value) => ok.push((node, value)),
            Err(e) => {
                warn!(node = %node, error = %e, "Lit node request failed");
                errors.push(e);
            }
        }
    }

    if ok.len() >= min {
        return Ok(ok);
    }
    let succeeded = ok.len();
    Err(match most_common(errors) {
        Some((error, _)) => error.into(),
        None => RemoteError::new(format!(
            "Only {} of {} Lit nodes answered, {} required",
            succeeded, total, min
        ))
        .with_code("insufficient_nodes")
        .into(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeResponse {
    #[serde(default)]
    latest_blockhash: String,
    #[serde(default)]
    epoch: Option<u64>,
    #[serde(default)]
    node_version: Option<String>,
}

async fn handshake_all(
    http: &Client,
    nodes: &[String],
    min: usize,
) -> Result<Vec<(String, HandshakeResponse)>> {
    let request_id = Uuid::new_v4().to_string();
    let body = json!({
        "clientPublicKey": "test",
        "challenge": hex::encode(rand::random::<[u8; 32]>()),
    });

    let results = join_all(nodes.iter().map(|node| {
        let (body, request_id) = (&body, &request_id);
        async move {
            let result = post_json(http, node, HANDSHAKE_PATH, request_id, body).await;
            (node.clone(), result)
        }
    }))
    .await;

    quorum(results, min)
}

/// Connects to a fixed set of Lit nodes over HTTP
pub struct LitNodeConnector {
    http: Client,
    nodes: Vec<String>,
    min_node_count: usize,
}

impl LitNodeConnector {
    pub fn from_config(config: &LitConfig) -> Result<Self> {
        if config.node_urls.is_empty() {
            return Err(Error::Config(format!(
                "No Lit node URLs configured; set {}",
                env_vars::LIT_NODE_URLS
            )));
        }

        let mut nodes = Vec::with_capacity(config.node_urls.len());
        for raw in &config.node_urls {
            let url = Url::parse(raw)
                .map_err(|e| Error::Config(format!("Invalid Lit node URL {}: {}", raw, e)))?;
            nodes.push(url.as_str().trim_end_matches('/').to_string());
        }

        let min_node_count = config
            .min_node_count
            .unwrap_or_else(|| default_min_node_count(nodes.len()));
        if min_node_count == 0 || min_node_count > nodes.len() {
            return Err(Error::Config(format!(
                "min_node_count {} is not satisfiable with {} nodes",
                min_node_count,
                nodes.len()
            )));
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            nodes,
            min_node_count,
        })
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn min_node_count(&self) -> usize {
        self.min_node_count
    }
}

#[async_trait]
impl NetworkConnector for LitNodeConnector {
    async fn connect(&self, network: LitNetwork) -> Result<Arc<dyn SigningNetwork>> {
        let handshakes = handshake_all(&self.http, &self.nodes, self.min_node_count).await?;
        let state = NodeState::from_handshakes(&handshakes);

        info!(
            network = %network,
            nodes = handshakes.len(),
            min_node_count = self.min_node_count,
            epoch = ?state.epoch,
            version = ?handshakes.iter().find_map(|(_, h)| h.node_version.clone()),
            "Handshake with Lit nodes complete"
        );

        Ok(Arc::new(LitNodeNetwork {
            http: self.http.clone(),
            nodes: handshakes.into_iter().map(|(node, _)| node).collect(),
            min_node_count: self.min_node_count,
            state: RwLock::new(state),
            ready: AtomicBool::new(true),
        }))
    }
}

struct NodeState {
    latest_blockhash: Option<String>,
    epoch: Option<u64>,
    fetched_at: Instant,
}

impl NodeState {
    fn from_handshakes(handshakes: &[(String, HandshakeResponse)]) -> Self {
        let latest_blockhash = most_common(
            handshakes
                .iter()
                .map(|(_, h)| h.latest_blockhash.clone())
                .filter(|hash| !hash.is_empty()),
        )
        .map(|(hash, _)| hash);
        let epoch = most_common(handshakes.iter().filter_map(|(_, h)| h.epoch)).map(|(e, _)| e);

        Self {
            latest_blockhash,
            epoch,
            fetched_at: Instant::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeExecuteResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    signed_data: BTreeMap<String, SignatureShare>,
    #[serde(default)]
    response: Value,
    #[serde(default)]
    logs: String,
    #[serde(default)]
    claim_data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeSignResponse {
    #[serde(default)]
    success: bool,
    signature_share: Value,
}

impl NodeSignResponse {
    fn into_share(self, node: &str) -> std::result::Result<SignatureShare, RemoteError> {
        if !self.success {
            return Err(RemoteError::new(format!("{} declined to sign", node)));
        }
        let share = match self.signature_share.get("EcdsaSignedMessageShare") {
            Some(inner) => inner.clone(),
            None => self.signature_share,
        };
        serde_json::from_value(share).map_err(|e| {
            RemoteError::new(format!("Invalid signature share from {}: {}", node, e))
                .with_code("invalid_signature_share")
        })
    }
}

/// Sign the per-node session message with the session key
pub(crate) fn session_sig_for_node(
    session_key: &SigningKey,
    request: &SessionSigsRequest,
    capability: &AuthSig,
    issued_at: &str,
    node: &str,
) -> Result<AuthSig> {
    let session_public = hex::encode(session_key.verifying_key().as_bytes());
    let signed_message = serde_json::to_string(&json!({
        "sessionKey": session_public,
        "resourceAbilityRequests": request.resource_ability_requests,
        "capabilities": [capability],
        "issuedAt": issued_at,
        "expiration": request.expiration,
        "nodeAddress": node,
    }))?;
    let signature = session_key.sign(signed_message.as_bytes());

    Ok(AuthSig {
        sig: hex::encode(signature.to_bytes()),
        derived_via: DERIVED_VIA_SESSION_SIG.to_string(),
        signed_message,
        address: session_public,
        algo: Some("ed25519".to_string()),
    })
}

/// A handshaken set of Lit nodes
pub struct LitNodeNetwork {
    http: Client,
    nodes: Vec<String>,
    min_node_count: usize,
    state: RwLock<NodeState>,
    ready: AtomicBool,
}

impl LitNodeNetwork {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    fn node_set(&self) -> Vec<Value> {
        self.nodes
            .iter()
            .filter_map(|node| Url::parse(node).ok())
            .filter_map(|url| {
                let host = url.host_str()?.to_string();
                let port = url.port_or_known_default()?;
                Some(json!({ "value": 1, "socketAddress": format!("{}:{}", host, port) }))
            })
            .collect()
    }

    async fn epoch(&self) -> Option<u64> {
        self.state.read().await.epoch
    }

    fn session_sig<'a>(
        session_sigs: &'a SessionSigs,
        node: &str,
    ) -> std::result::Result<&'a AuthSig, RemoteError> {
        session_sigs.0.get(node).ok_or_else(|| {
            RemoteError::new(format!("No session signature for {}", node))
                .with_code("missing_session_sig")
        })
    }

    /// Combine the `signedData` shares of a Lit Action, grouped by sig name
    fn combine_action_signatures(
        responses: &[(String, NodeExecuteResponse)],
    ) -> Result<Map<String, Value>> {
        let mut grouped: BTreeMap<&str, Vec<SignatureShare>> = BTreeMap::new();
        for (_, response) in responses {
            for (name, share) in &response.signed_data {
                grouped.entry(name).or_default().push(share.clone());
            }
        }

        let mut signatures = Map::new();
        for (name, shares) in grouped {
            let combined = combine_ecdsa_shares(&shares)?;
            signatures.insert(name.to_string(), serde_json::to_value(combined)?);
        }
        Ok(signatures)
    }
}

#[async_trait]
impl SigningNetwork for LitNodeNetwork {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn latest_blockhash(&self) -> Result<String> {
        {
            let state = self.state.read().await;
            if let Some(hash) = &state.latest_blockhash {
                if state.fetched_at.elapsed() < BLOCKHASH_MAX_AGE {
                    return Ok(hash.clone());
                }
            }
        }

        let handshakes = handshake_all(&self.http, &self.nodes, self.min_node_count).await?;
        let refreshed = NodeState::from_handshakes(&handshakes);
        let hash = refreshed.latest_blockhash.clone().ok_or_else(|| {
            Error::from(RemoteError::new("Lit nodes reported no blockhash").with_code("no_blockhash"))
        })?;
        *self.state.write().await = refreshed;
        debug!(blockhash = %hash, "Refreshed latest blockhash");
        Ok(hash)
    }

    async fn session_sigs(
        &self,
        request: SessionSigsRequest,
        callback: &dyn AuthNeededCallback,
    ) -> Result<SessionSigs> {
        let session_key = SigningKey::generate(&mut OsRng);
        let session_public = hex::encode(session_key.verifying_key().as_bytes());

        let capability = callback
            .auth_sig(AuthCallbackParams {
                uri: format!("{}{}", SESSION_URI_PREFIX, session_public),
                expiration: request.expiration.clone(),
                resource_ability_requests: request.resource_ability_requests.clone(),
            })
            .await?;

        let issued_at = iso_timestamp(Utc::now());
        let mut sigs = BTreeMap::new();
        for node in &self.nodes {
            let sig = session_sig_for_node(&session_key, &request, &capability, &issued_at, node)?;
            sigs.insert(node.clone(), sig);
        }
        Ok(SessionSigs(sigs))
    }

    async fn execute_js(
        &self,
        session_sigs: &SessionSigs,
        code: &str,
        js_params: Value,
    ) -> Result<ExecuteJsResponse> {
        let request_id = Uuid::new_v4().to_string();
        let encoded_code = STANDARD.encode(code);
        let node_set = self.node_set();
        let epoch = self.epoch().await;

        let results = join_all(self.nodes.iter().map(|node| {
            let (request_id, encoded_code, js_params, node_set) =
                (&request_id, &encoded_code, &js_params, &node_set);
            async move {
                let result = async {
                    let auth_sig = Self::session_sig(session_sigs, node)?;
                    let body = json!({
                        "authSig": auth_sig,
                        "code": encoded_code,
                        "jsParams": js_params,
                        "authMethods": [],
                        "nodeSet": node_set,
                        "epoch": epoch,
                    });
                    post_json::<NodeExecuteResponse>(
                        &self.http,
                        node,
                        EXECUTE_JS_PATH,
                        request_id,
                        &body,
                    )
                    .await
                }
                .await;
                (node.clone(), result)
            }
        }))
        .await;

        let responses = quorum(results, self.min_node_count)?;
        let (response, agreeing) = most_common(responses.iter().map(|(_, r)| &r.response))
            .map(|(response, count)| (response.clone(), count))
            .unwrap_or((Value::Null, 0));
        debug!(
            agreeing,
            answered = responses.len(),
            "Lit Action responses collected"
        );

        let chosen = responses
            .iter()
            .map(|(_, r)| r)
            .find(|r| r.response == response);
        let signatures = Self::combine_action_signatures(&responses)?;

        // Lit Actions return their response as a string; decode JSON if it is
        let response = match response {
            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            other => other,
        };

        let mut extra = Map::new();
        if let Some(chosen) = chosen {
            if !chosen.claim_data.is_empty() {
                extra.insert("claims".to_string(), Value::Object(chosen.claim_data.clone()));
            }
        }

        Ok(ExecuteJsResponse {
            success: Some(chosen.map_or(false, |r| r.success)),
            response,
            logs: chosen.map(|r| r.logs.clone()).unwrap_or_default(),
            signatures: Value::Object(signatures),
            extra,
        })
    }

    async fn pkp_sign(
        &self,
        public_key: &str,
        session_sigs: &SessionSigs,
        to_sign: &[u8],
    ) -> Result<PkpSignature> {
        if to_sign.len() != 32 {
            return Err(Error::InvalidArgument(format!(
                "PKP signing expects a 32-byte digest, got {} bytes",
                to_sign.len()
            )));
        }

        let request_id = Uuid::new_v4().to_string();
        let node_set = self.node_set();
        let epoch = self.epoch().await;

        let results = join_all(self.nodes.iter().map(|node| {
            let (request_id, node_set) = (&request_id, &node_set);
            async move {
                let result = async {
                    let auth_sig = Self::session_sig(session_sigs, node)?;
                    let body = json!({
                        "toSign": to_sign,
                        "pubkey": public_key,
                        "authSig": auth_sig,
                        "authMethods": [],
                        "nodeSet": node_set,
                        "epoch": epoch,
                    });
                    post_json::<NodeSignResponse>(&self.http, node, PKP_SIGN_PATH, request_id, &body)
                        .await?
                        .into_share(node)
                }
                .await;
                (node.clone(), result)
            }
        }))
        .await;

        let shares: Vec<SignatureShare> = quorum(results, self.min_node_count)?
            .into_iter()
            .map(|(_, share)| share)
            .collect();
        combine_ecdsa_shares(&shares)
    }

    async fn disconnect(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}
