use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::slots::CredentialSlot;

/// Opaque bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***{} chars)", self.0.len())
    }
}

/// Process-wide holder of the current credential.
///
/// Single writer at auth transitions (login, signup, OAuth callback, logout),
/// many readers. The in-memory value is authoritative; the durable slot is
/// written best-effort and only read once, in [`TokenStore::open`].
pub struct TokenStore {
    current: RwLock<Option<Credential>>,
    slot: Arc<dyn CredentialSlot>,
}

impl TokenStore {
    /// Initialize from the durable slot.
    pub fn open(slot: Arc<dyn CredentialSlot>) -> Self {
        let current = match slot.load() {
            Ok(value) => value.map(Credential::new),
            Err(e) => {
                warn!(error = %e, "Failed to load stored credential");
                None
            }
        };
        debug!(present = current.is_some(), "Token store opened");

        Self {
            current: RwLock::new(current),
            slot,
        }
    }

    pub fn set(&self, value: impl Into<String>) {
        let credential = Credential::new(value);
        if let Err(e) = self.slot.store(credential.as_str()) {
            warn!(error = %e, "Failed to persist credential");
        }
        *self.current.write() = Some(credential);
    }

    pub fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn clear(&self) {
        *self.current.write() = None;
        if let Err(e) = self.slot.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }
}
