//! Combining the ECDSA signature shares returned by Lit nodes
//!
//! Each node answers a signing request with its share `s_i` of the
//! signature and the common nonce point `R`. The signature is
//! `(r, s) = (R.x, sum(s_i))`; it is only accepted once it recovers to the
//! PKP's public key.

use alloy::primitives::hex;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::sec1::FromEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, Scalar};
use serde::Deserialize;
use serde_json::{json, Map};

use crate::error::RemoteError;
use crate::types::PkpSignature;
use crate::Result;

/// One node's share of a signature, as found in `signedData` of a Lit Action
/// response or in the `EcdsaSignedMessageShare` of a PKP sign response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureShare {
    #[serde(default, alias = "sig_type")]
    pub sig_type: String,
    #[serde(alias = "signature_share")]
    pub signature_share: String,
    #[serde(alias = "bigr", alias = "big_r")]
    pub big_r: String,
    #[serde(alias = "public_key")]
    pub public_key: String,
    #[serde(alias = "digest")]
    pub data_signed: String,
}

fn share_error(message: impl Into<String>) -> crate::Error {
    RemoteError::new(message).with_code("invalid_signature_share").into()
}

/// Nodes sometimes JSON-quote hex values inside the JSON response
fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.trim().trim_matches('"');
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| share_error(format!("Invalid hex in signature share: {}", e)))
}

fn parse_scalar(value: &str) -> Result<Scalar> {
    let bytes = decode_hex(value)?;
    if bytes.len() > 32 {
        return Err(share_error("Signature share is longer than 32 bytes"));
    }
    let mut repr = FieldBytes::default();
    repr[32 - bytes.len()..].copy_from_slice(&bytes);
    Option::<Scalar>::from(Scalar::from_repr(repr))
        .ok_or_else(|| share_error("Signature share is not a valid scalar"))
}

fn parse_point(value: &str) -> Result<AffinePoint> {
    let encoded = EncodedPoint::from_bytes(decode_hex(value)?)
        .map_err(|e| share_error(format!("Invalid nonce point: {}", e)))?;
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| share_error("Nonce point is not on the curve"))
}

/// Combine the shares of one signature and verify it against the PKP key
pub fn combine_ecdsa_shares(shares: &[SignatureShare]) -> Result<PkpSignature> {
    let first = shares
        .first()
        .ok_or_else(|| share_error("No signature shares returned"))?;
    if shares.iter().any(|share| share.big_r != first.big_r) {
        return Err(share_error("Nodes disagree on the signature nonce"));
    }

    let mut s = Scalar::ZERO;
    for share in shares {
        s += parse_scalar(&share.signature_share)?;
    }
    let r = parse_point(&first.big_r)?.x();

    let signature = Signature::from_scalars(r, s.to_bytes())
        .map_err(|e| share_error(format!("Combined signature is invalid: {}", e)))?;
    let signature = signature.normalize_s().unwrap_or(signature);

    let verifying_key = VerifyingKey::from_sec1_bytes(&decode_hex(&first.public_key)?)
        .map_err(|e| share_error(format!("Invalid PKP public key: {}", e)))?;
    let digest = decode_hex(&first.data_signed)?;
    let recovery_id = RecoveryId::trial_recovery_from_prehash(&verifying_key, &digest, &signature)
        .map_err(|_| {
            share_error("Combined signature does not verify against the PKP public key")
        })?;

    let rs = signature.to_bytes();
    let mut extra = Map::new();
    extra.insert("r".to_string(), json!(format!("0x{}", hex::encode(&rs[..32]))));
    extra.insert("s".to_string(), json!(format!("0x{}", hex::encode(&rs[32..]))));
    extra.insert("recid".to_string(), json!(recovery_id.to_byte()));
    if !first.sig_type.is_empty() {
        extra.insert("sigType".to_string(), json!(first.sig_type));
    }

    Ok(PkpSignature {
        signature: format!("0x{}{:02x}", hex::encode(rs), 27 + recovery_id.to_byte()),
        public_key: Some(format!(
            "0x{}",
            hex::encode(verifying_key.to_encoded_point(false).as_bytes())
        )),
        data_signed: Some(format!("0x{}", hex::encode(&digest))),
        extra,
    })
}
