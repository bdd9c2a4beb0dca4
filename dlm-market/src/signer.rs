//! Claim signing
//!
//! A claim authorizes the external ledger to release `amount` base units for
//! one dataset to one wallet, once per nonce. The digest is the Solidity
//! packed encoding `(address, string, uint256, uint256)` hashed with
//! Keccak-256, wrapped as an EIP-191 personal message and signed with
//! secp256k1. Signatures are `0x` + r ‖ s ‖ v with v ∈ {27, 28}.

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("No claim signing key configured")]
    NotConfigured,

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid wallet address '{0}'")]
    InvalidAddress(String),

    #[error("Signing failed: {0}")]
    Failed(String),
}

/// Parameters bound into a claim signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMessage {
    pub wallet: [u8; 20],
    pub external_dataset_id: String,
    pub base_unit_amount: u128,
    pub nonce: u64,
}

/// Produces signatures the external ledger accepts
pub trait ClaimSigner: Send + Sync {
    fn sign_claim(&self, message: &ClaimMessage) -> Result<String, SignerError>;
}

/// Parse a `0x`-prefixed 20-byte hex address
pub fn parse_wallet_address(address: &str) -> Result<[u8; 20], SignerError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| SignerError::InvalidAddress(address.to_string()))?;
    if hex_part.len() != 40 {
        return Err(SignerError::InvalidAddress(address.to_string()));
    }
    let bytes = hex::decode(hex_part).map_err(|_| SignerError::InvalidAddress(address.to_string()))?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn uint256(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// keccak256(abi.encodePacked(wallet, datasetId, amount, nonce))
pub fn claim_message_hash(message: &ClaimMessage) -> [u8; 32] {
    let mut packed = Vec::with_capacity(20 + message.external_dataset_id.len() + 64);
    packed.extend_from_slice(&message.wallet);
    packed.extend_from_slice(message.external_dataset_id.as_bytes());
    packed.extend_from_slice(&uint256(message.base_unit_amount));
    packed.extend_from_slice(&uint256(u128::from(message.nonce)));
    keccak256(&packed)
}

/// EIP-191 digest of a 32-byte message
pub fn eth_signed_message_hash(message_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(28 + 32);
    data.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    data.extend_from_slice(message_hash);
    keccak256(&data)
}

/// secp256k1 signer holding the service's claim key
pub struct EcdsaClaimSigner {
    key: SigningKey,
}

impl EcdsaClaimSigner {
    pub fn from_hex(key_hex: &str) -> Result<Self, SignerError> {
        let trimmed = key_hex.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_part).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Checksum-free `0x` address the external ledger expects as signer
    pub fn address(&self) -> String {
        let point = self.key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        format!("0x{}", hex::encode(&hash[12..]))
    }
}

impl ClaimSigner for EcdsaClaimSigner {
    fn sign_claim(&self, message: &ClaimMessage) -> Result<String, SignerError> {
        let digest = eth_signed_message_hash(&claim_message_hash(message));
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SignerError::Failed(e.to_string()))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", hex::encode(out)))
    }
}

/// Stand-in used when no key is configured; every claim fails
pub struct UnconfiguredSigner;

impl ClaimSigner for UnconfiguredSigner {
    fn sign_claim(&self, _message: &ClaimMessage) -> Result<String, SignerError> {
        Err(SignerError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn message() -> ClaimMessage {
        ClaimMessage {
            wallet: parse_wallet_address("0x00000000000000000000000000000000000000aa").unwrap(),
            external_dataset_id: "dataset-1".into(),
            base_unit_amount: 3_500_000_000_000_000_000,
            nonce: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_parse_wallet_address() {
        let addr = parse_wallet_address("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23").unwrap();
        assert_eq!(addr[0], 0x2c);
        assert_eq!(addr[19], 0x23);
        assert!(parse_wallet_address("2c7536e3605d9c16a7a3d7b1898e529396a65c23").is_err());
        assert!(parse_wallet_address("0x1234").is_err());
        assert!(parse_wallet_address("0xzz7536e3605d9c16a7a3d7b1898e529396a65c23").is_err());
    }

    #[test]
    fn test_address_derivation() {
        let signer = EcdsaClaimSigner::from_hex(TEST_KEY).unwrap();
        assert_eq!(signer.address(), "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23");
    }

    #[test]
    fn test_signature_recovers_signer() {
        let signer = EcdsaClaimSigner::from_hex(&format!("0x{}", TEST_KEY)).unwrap();
        let msg = message();
        let sig_hex = signer.sign_claim(&msg).unwrap();
        assert!(sig_hex.starts_with("0x"));

        let bytes = hex::decode(&sig_hex[2..]).unwrap();
        assert_eq!(bytes.len(), 65);
        let v = bytes[64];
        assert!(v == 27 || v == 28);

        let signature = Signature::from_slice(&bytes[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(v - 27).unwrap();
        let digest = eth_signed_message_hash(&claim_message_hash(&msg));
        let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).unwrap();
        assert_eq!(&recovered, signer.key.verifying_key());
    }

    #[test]
    fn test_digest_binds_every_field() {
        let base = claim_message_hash(&message());
        let mut other = message();
        other.nonce += 1;
        assert_ne!(base, claim_message_hash(&other));
        let mut other = message();
        other.base_unit_amount += 1;
        assert_ne!(base, claim_message_hash(&other));
        let mut other = message();
        other.external_dataset_id.push('x');
        assert_ne!(base, claim_message_hash(&other));
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(EcdsaClaimSigner::from_hex("not-hex").is_err());
        assert!(EcdsaClaimSigner::from_hex("00").is_err());
    }

    #[test]
    fn test_unconfigured_signer_fails() {
        assert!(matches!(
            UnconfiguredSigner.sign_claim(&message()),
            Err(SignerError::NotConfigured)
        ));
    }
}
