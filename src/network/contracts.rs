//! PKP minting against the Lit contracts on Chronicle Yellowstone
//!
//! Minting goes through PKPHelper, which mints the next PKP, registers the
//! wallet auth method and hands the NFT to the PKP itself in one
//! transaction. The minted key is read back from PKPNFT's `PKPMinted` event.

use alloy::network::EthereumWallet;
use alloy::primitives::{hex, keccak256, Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Map};
use std::str::FromStr;
use tracing::{debug, info};
use url::Url;

use super::{ContractClient, ContractsContext, ContractsFactory};
use crate::config::{env_vars, LitConfig};
use crate::error::RemoteError;
use crate::types::{AuthMethod, AuthMethodScope, AuthMethodType, AuthSig, MintInfo, PkpRecord};
use crate::{Error, Result};

sol! {
    interface IPKPNFT {
        function mintCost() external view returns (uint256);

        event PKPMinted(uint256 indexed tokenId, bytes pubkey);
    }

    interface IPKPHelper {
        function mintNextAndAddAuthMethods(
            uint256 keyType,
            uint256[] permittedAuthMethodTypes,
            bytes[] permittedAuthMethodIds,
            bytes[] permittedAuthMethodPubkeys,
            uint256[][] permittedAuthMethodScopes,
            bool addPkpEthAddressAsPermittedAddress,
            bool sendPkpToItself
        ) external payable returns (uint256);
    }
}

/// ECDSA over secp256k1
const KEY_TYPE_ECDSA: u64 = 2;

/// Auth method id of a wallet: `keccak256("<address>:lit")`
pub fn auth_method_id(auth_method: &AuthMethod) -> Result<[u8; 32]> {
    match auth_method.auth_method_type {
        AuthMethodType::EthWallet => {
            let auth_sig: AuthSig = serde_json::from_str(&auth_method.access_token)?;
            Ok(keccak256(format!("{}:lit", auth_sig.address)).0)
        }
    }
}

/// Build the stored record for a freshly minted key
pub fn pkp_record(token_id: U256, pubkey: &[u8]) -> Result<PkpRecord> {
    if pubkey.len() != 65 || pubkey[0] != 0x04 {
        return Err(RemoteError::new(format!(
            "PKPMinted carried a {}-byte public key, expected an uncompressed key",
            pubkey.len()
        ))
        .with_code("invalid_pkp")
        .into());
    }
    let eth_address = Address::from_raw_public_key(&pubkey[1..]);

    let mut record = PkpRecord::new(format!("0x{}", hex::encode(pubkey)));
    record
        .extra
        .insert("tokenId".to_string(), json!(format!("0x{:x}", token_id)));
    record
        .extra
        .insert("ethAddress".to_string(), json!(eth_address.to_checksum(None)));
    Ok(record)
}

fn parse_address(value: Option<&String>, env_var: &str, name: &str) -> Result<Address> {
    let value = value.ok_or_else(|| {
        Error::Config(format!("No {} contract address configured; set {}", name, env_var))
    })?;
    Address::from_str(value)
        .map_err(|e| Error::Config(format!("Invalid {} address {}: {}", name, value, e)))
}

fn rpc_error(action: &str, e: impl std::fmt::Display) -> Error {
    RemoteError::new(format!("{}: {}", action, e))
        .with_code("rpc_error")
        .into()
}

/// Binds [`PkpContractClient`]s to the configured contract addresses
pub struct PkpContracts {
    pkp_nft: Option<String>,
    pkp_helper: Option<String>,
}

impl PkpContracts {
    pub fn from_config(config: &LitConfig) -> Self {
        Self {
            pkp_nft: config.contracts.pkp_nft.clone(),
            pkp_helper: config.contracts.pkp_helper.clone(),
        }
    }
}

impl ContractsFactory for PkpContracts {
    fn bind(&self, context: ContractsContext) -> Box<dyn ContractClient> {
        Box::new(PkpContractClient {
            context,
            pkp_nft: self.pkp_nft.clone(),
            pkp_helper: self.pkp_helper.clone(),
            bound: None,
        })
    }
}

struct Bound {
    pkp_nft: Address,
    pkp_helper: Address,
    mint_cost: U256,
}

pub struct PkpContractClient {
    context: ContractsContext,
    pkp_nft: Option<String>,
    pkp_helper: Option<String>,
    bound: Option<Bound>,
}

impl PkpContractClient {
    fn rpc_url(&self) -> Url {
        self.context.wallet.rpc_url().clone()
    }
}

#[async_trait]
impl ContractClient for PkpContractClient {
    async fn connect(&mut self) -> Result<()> {
        let pkp_nft = parse_address(self.pkp_nft.as_ref(), env_vars::LIT_PKP_NFT_ADDRESS, "PKPNFT")?;
        let pkp_helper = parse_address(
            self.pkp_helper.as_ref(),
            env_vars::LIT_PKP_HELPER_ADDRESS,
            "PKPHelper",
        )?;

        let provider = ProviderBuilder::new().connect_http(self.rpc_url());
        let tx = TransactionRequest::default()
            .to(pkp_nft)
            .input(Bytes::from(IPKPNFT::mintCostCall {}.abi_encode()).into());
        let result = provider
            .call(tx)
            .await
            .map_err(|e| rpc_error("Failed to read mint cost", e))?;
        let mint_cost = if result.len() >= 32 {
            U256::from_be_slice(&result[..32])
        } else {
            U256::ZERO
        };

        if self.context.debug {
            debug!(
                %pkp_nft,
                %pkp_helper,
                %mint_cost,
                network = %self.context.network,
                "Contracts client bound"
            );
        }
        self.bound = Some(Bound {
            pkp_nft,
            pkp_helper,
            mint_cost,
        });
        Ok(())
    }

    async fn mint_with_auth(
        &self,
        auth_method: AuthMethod,
        scopes: &[AuthMethodScope],
    ) -> Result<MintInfo> {
        let bound = self
            .bound
            .as_ref()
            .ok_or_else(|| Error::NotInitialized("Contracts client".to_string()))?;

        let auth_method_id = auth_method_id(&auth_method)?;
        let scopes: Vec<U256> = scopes
            .iter()
            .map(|scope| U256::from(u32::from(*scope)))
            .collect();
        let call = IPKPHelper::mintNextAndAddAuthMethodsCall {
            keyType: U256::from(KEY_TYPE_ECDSA),
            permittedAuthMethodTypes: vec![U256::from(u32::from(auth_method.auth_method_type))],
            permittedAuthMethodIds: vec![Bytes::copy_from_slice(&auth_method_id)],
            permittedAuthMethodPubkeys: vec![Bytes::new()],
            permittedAuthMethodScopes: vec![scopes],
            addPkpEthAddressAsPermittedAddress: true,
            sendPkpToItself: true,
        };

        let wallet: EthereumWallet = self.context.wallet.ethereum_wallet();
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url());
        let tx = TransactionRequest::default()
            .to(bound.pkp_helper)
            .value(bound.mint_cost)
            .input(Bytes::from(call.abi_encode()).into());

        let receipt = provider
            .send_transaction(tx)
            .await
            .map_err(|e| rpc_error("Failed to send mint transaction", e))?
            .get_receipt()
            .await
            .map_err(|e| rpc_error("Mint transaction was not confirmed", e))?;
        let tx_hash = format!("{:#x}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(RemoteError::new(format!("Mint transaction {} reverted", tx_hash))
                .with_code("mint_reverted")
                .into());
        }

        let minted = receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.address() == bound.pkp_nft)
            .find_map(|log| log.log_decode::<IPKPNFT::PKPMinted>().ok())
            .ok_or_else(|| {
                Error::from(
                    RemoteError::new(format!("Mint transaction {} emitted no PKPMinted", tx_hash))
                        .with_code("invalid_pkp"),
                )
            })?;
        let event = minted.inner.data;
        let pkp = pkp_record(event.tokenId, &event.pubkey)?;

        info!(
            tx = %tx_hash,
            token_id = pkp.token_id().unwrap_or_default(),
            "PKP minted"
        );

        let mut extra = Map::new();
        extra.insert(
            "tx".to_string(),
            json!({
                "hash": tx_hash,
                "blockNumber": receipt.block_number,
                "gasUsed": receipt.gas_used,
            }),
        );
        Ok(MintInfo { pkp, extra })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LitNetwork;
    use crate::error::ErrorKind;
    use crate::network::mock::{test_wallet, MockNetwork};
    use std::sync::Arc;

    // Public key of the well-known development key 0xac09...ff80
    const DEV_PUBKEY: &str = "048318535b54105d4a7aae60c08fc45f9687181b4fdfc625bd1a753fa7397fed753547f11ca8696646f2f3acb08e31016afac23e630c5d11f59f61fef57b0d2aa5";

    fn context() -> ContractsContext {
        ContractsContext {
            network: LitNetwork::DatilDev,
            wallet: Arc::new(test_wallet()),
            node: Arc::new(MockNetwork::ready()),
            debug: false,
        }
    }

    #[test]
    fn wallet_auth_method_id_hashes_address() {
        let auth_sig = test_wallet().auth_sig("challenge").unwrap();
        let method = AuthMethod::eth_wallet(&auth_sig).unwrap();

        let id = auth_method_id(&method).unwrap();
        assert_eq!(
            id,
            keccak256("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266:lit").0
        );
    }

    #[test]
    fn minted_record_derives_eth_address() {
        let pubkey = hex::decode(DEV_PUBKEY).unwrap();
        let record = pkp_record(U256::from(0x2a), &pubkey).unwrap();

        assert_eq!(record.public_key, format!("0x{}", DEV_PUBKEY));
        assert_eq!(record.token_id(), Some("0x2a"));
        assert_eq!(
            record.eth_address(),
            Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn compressed_pubkey_is_rejected() {
        let err = pkp_record(U256::from(1), &[0x02; 33]).unwrap_err();
        assert_eq!(err.remote().unwrap().error_code.as_deref(), Some("invalid_pkp"));
    }

    #[tokio::test]
    async fn connect_requires_contract_addresses() {
        let factory = PkpContracts::from_config(&LitConfig::default());
        let mut client = factory.bind(context());

        let err = client.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains(env_vars::LIT_PKP_NFT_ADDRESS));
    }

    #[tokio::test]
    async fn mint_before_connect_is_not_initialized() {
        let factory = PkpContracts::from_config(&LitConfig::default());
        let client = factory.bind(context());
        let auth_sig = test_wallet().auth_sig("challenge").unwrap();

        let err = client
            .mint_with_auth(
                AuthMethod::eth_wallet(&auth_sig).unwrap(),
                &[AuthMethodScope::SignAnything],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
    }
}
