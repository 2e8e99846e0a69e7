//! Question token registry
//!
//! Callback payloads have a hard size limit, so question menus carry a short
//! opaque token instead of the full path + question text. The registry maps
//! tokens back to their payload and forgets each one the moment it is
//! resolved: a replayed callback with a consumed token observes "not found".
//!
//! Tokens live in process memory only. A restart drops them all, which is
//! accepted: menus re-mint tokens on every render, so a freshly drawn menu
//! always works.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// Full payload a token stands in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRef {
    pub device: String,
    pub model: String,
    pub number: String,
    pub question: String,
}

/// Process-wide mint/resolve-once store for question tokens.
///
/// The registry is the single piece of shared mutable state in the core;
/// the mutex guarantees that two concurrent resolutions of the same token
/// cannot both succeed.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    entries: Mutex<HashMap<String, QuestionRef>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token for a question and store its payload.
    ///
    /// The id is deterministic: `device_model_number_<hash8>` where `hash8`
    /// is the first 8 hex characters of the SHA-256 of the question text.
    /// Minting the same tuple again after a prior consumption simply
    /// re-registers it.
    pub fn mint(&self, device: &str, model: &str, number: &str, question: &str) -> String {
        let id = format!("{}_{}_{}_{}", device, model, number, hash8(question));
        let payload = QuestionRef {
            device: device.to_string(),
            model: model.to_string(),
            number: number.to_string(),
            question: question.to_string(),
        };
        self.entries
            .lock()
            .expect("token registry poisoned")
            .insert(id.clone(), payload);
        id
    }

    /// Resolve a token, consuming it. The first resolver wins; everyone
    /// else gets `TokenNotFound`.
    pub fn resolve(&self, id: &str) -> Result<QuestionRef> {
        self.entries
            .lock()
            .expect("token registry poisoned")
            .remove(id)
            .ok_or_else(|| Error::TokenNotFound(id.to_string()))
    }

    /// Number of live tokens, for diagnostics.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("token registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First 8 hex characters of the SHA-256 of `text`. Collisions between two
/// distinct questions under the same path are accepted as negligible at
/// catalog scale.
fn hash8(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(8);
    hex
}
