//! Ledger archival side effect
//!
//! A range query may carry archival credentials; the returned record set is
//! then digested, signed with the caller's ed25519 key and submitted to an
//! external ledger endpoint as a JSON-RPC call. This is fire-and-forget from
//! the query's point of view: failure is reported to the caller but never
//! invalidates the records already computed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::codec::TimeSeriesRecord;

/// Per-request archival credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveCredentials {
    /// Base58-encoded 32-byte ed25519 seed
    pub signing_key: String,
    /// JSON-RPC endpoint of the ledger node
    pub endpoint: String,
}

/// Error type for archival submission
#[derive(Debug)]
pub enum ArchiveError {
    /// Signing key is not a valid base58 32-byte seed
    InvalidKey(String),
    /// Record set could not be serialized
    Serialize(serde_json::Error),
    /// Transport failure talking to the ledger endpoint
    Submit(reqwest::Error),
    /// The ledger answered with an error object
    Rejected(String),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::InvalidKey(msg) => write!(f, "Invalid signing key: {}", msg),
            ArchiveError::Serialize(e) => write!(f, "Cannot serialize records: {}", e),
            ArchiveError::Submit(e) => write!(f, "Ledger submission failed: {}", e),
            ArchiveError::Rejected(msg) => write!(f, "Ledger rejected submission: {}", msg),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Serialize(e) => Some(e),
            ArchiveError::Submit(e) => Some(e),
            _ => None,
        }
    }
}

/// Sign the record set and submit it to the ledger endpoint
pub async fn submit_records(
    credentials: &ArchiveCredentials,
    records: &[TimeSeriesRecord],
) -> Result<(), ArchiveError> {
    let content = serde_json::to_vec(records).map_err(ArchiveError::Serialize)?;
    let envelope = sign_envelope(&credentials.signing_key, &content)?;

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "Ledger.SubmitRecord",
        "params": [envelope],
    });

    let reply: serde_json::Value = reqwest::Client::new()
        .post(&credentials.endpoint)
        .json(&body)
        .send()
        .await
        .map_err(ArchiveError::Submit)?
        .error_for_status()
        .map_err(ArchiveError::Submit)?
        .json()
        .await
        .map_err(ArchiveError::Submit)?;

    match reply.get("error") {
        Some(err) if !err.is_null() => Err(ArchiveError::Rejected(err.to_string())),
        _ => {
            tracing::info!(
                endpoint = %credentials.endpoint,
                records = records.len(),
                "Record set archived"
            );
            Ok(())
        }
    }
}

/// Build the signed submission envelope
fn sign_envelope(signing_key: &str, content: &[u8]) -> Result<serde_json::Value, ArchiveError> {
    let seed = bs58::decode(signing_key)
        .into_vec()
        .map_err(|e| ArchiveError::InvalidKey(e.to_string()))?;
    let seed: [u8; 32] = seed
        .as_slice()
        .try_into()
        .map_err(|_| ArchiveError::InvalidKey("expected a 32-byte ed25519 seed".to_string()))?;

    let key = SigningKey::from_bytes(&seed);
    let digest = Sha256::digest(content);
    let signature = key.sign(&digest);

    Ok(serde_json::json!({
        "payload": BASE64.encode(content),
        "digest": BASE64.encode(digest),
        "signature": BASE64.encode(signature.to_bytes()),
        "public_key": BASE64.encode(key.verifying_key().to_bytes()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn test_key() -> String {
        bs58::encode(&[7u8; 32]).into_string()
    }

    #[test]
    fn test_envelope_signature_verifies() {
        let content = br#"[{"payload":23.5,"timestamp":"2022-01-01T00:00:00Z"}]"#;
        let envelope = sign_envelope(&test_key(), content).unwrap();

        let payload = BASE64
            .decode(envelope["payload"].as_str().unwrap())
            .unwrap();
        assert_eq!(payload, content);

        let digest = Sha256::digest(&payload);
        assert_eq!(
            BASE64.decode(envelope["digest"].as_str().unwrap()).unwrap(),
            digest.as_slice()
        );

        let public_key: [u8; 32] = BASE64
            .decode(envelope["public_key"].as_str().unwrap())
            .unwrap()
            .try_into()
            .unwrap();
        let signature: [u8; 64] = BASE64
            .decode(envelope["signature"].as_str().unwrap())
            .unwrap()
            .try_into()
            .unwrap();

        let verifying = VerifyingKey::from_bytes(&public_key).unwrap();
        verifying
            .verify(&digest, &Signature::from_bytes(&signature))
            .unwrap();
    }

    #[test]
    fn test_rejects_malformed_key() {
        let err = sign_envelope("not base58 0OIl", b"x").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidKey(_)));

        // Valid base58 but wrong length
        let short = bs58::encode(&[1u8; 16]).into_string();
        let err = sign_envelope(&short, b"x").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidKey(_)));
    }
}
