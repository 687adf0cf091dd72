//! Task signatures - HMAC-SHA256 over the task id
//!
//! The worker proves that a callback for task `T` comes from it by sending
//! `hex(HMAC-SHA256(key, T))` in `X-Signature`. In the default scope the body
//! is NOT covered: a holder of one valid signature can replay any payload
//! for that task. `SignatureScope::TaskIdAndBody` closes that gap at the
//! cost of wire compatibility with task-id-only workers.

use crate::config::SignatureConfig;
use crate::{Error, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the callback signature
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// What a callback signature covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScope {
    /// `MAC(key, task_id)`
    #[default]
    TaskId,

    /// `MAC(key, task_id + "\n" + body)`
    TaskIdAndBody,
}

impl std::str::FromStr for SignatureScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task_id" | "id" => Ok(SignatureScope::TaskId),
            "task_id_and_body" | "body" => Ok(SignatureScope::TaskIdAndBody),
            other => Err(Error::Config(format!("Unknown signature scope: {}", other))),
        }
    }
}

/// Signs and verifies task callback messages with a process-wide key
///
/// Construct once from configuration; cloning is cheap.
#[derive(Clone)]
pub struct TaskSigner {
    mac: HmacSha256,
    scope: SignatureScope,
}

impl std::fmt::Debug for TaskSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSigner")
            .field("key", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl TaskSigner {
    /// Create a signer for the task-id scope
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::Config("Signature key must not be empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| Error::Config(format!("Invalid signature key: {}", e)))?;

        Ok(Self {
            mac,
            scope: SignatureScope::TaskId,
        })
    }

    pub fn from_config(config: &SignatureConfig) -> Result<Self> {
        Ok(Self::new(config.key.as_bytes())?.with_scope(config.scope))
    }

    pub fn with_scope(mut self, scope: SignatureScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> SignatureScope {
        self.scope
    }

    /// Hex-encoded `HMAC-SHA256(key, message)`
    pub fn sign(&self, message: &str) -> String {
        self.sign_bytes(message.as_bytes())
    }

    /// Constant-time check of `signature` against `message`
    ///
    /// Never fails: malformed hex or a mismatch both yield `false`.
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        self.verify_bytes(message.as_bytes(), signature)
    }

    /// Signature for a callback under the configured scope
    pub fn sign_callback(&self, task_id: &str, body: &[u8]) -> String {
        self.sign_bytes(&self.callback_message(task_id, body))
    }

    /// Verify a callback under the configured scope
    pub fn verify_callback(&self, task_id: &str, body: &[u8], signature: &str) -> bool {
        self.verify_bytes(&self.callback_message(task_id, body), signature)
    }

    fn callback_message(&self, task_id: &str, body: &[u8]) -> Vec<u8> {
        match self.scope {
            SignatureScope::TaskId => task_id.as_bytes().to_vec(),
            SignatureScope::TaskIdAndBody => {
                let mut message = Vec::with_capacity(task_id.len() + 1 + body.len());
                message.extend_from_slice(task_id.as_bytes());
                message.push(b'\n');
                message.extend_from_slice(body);
                message
            }
        }
    }

    fn sign_bytes(&self, message: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify_bytes(&self, message: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(&expected).is_ok()
    }
}
