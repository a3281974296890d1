//! Authentication: credential storage, sign-in flows and route guards.
//!
//! This module provides:
//! - `TokenStore`: the process-wide bearer credential, single writer, many readers
//! - `CredentialSlot`: durable storage for it (file, OS keychain, or memory)
//! - `AuthFlows`: login, signup, OAuth callback, logout and account recovery
//! - `guard`: access decisions made before a view calls the backend

pub mod flows;
pub mod guard;
pub mod slots;
pub mod token;

pub use flows::{parse_oauth_callback, AuthFlows, ResetForm, SignupForm};
pub use guard::{Access, Requirement};
pub use slots::{CredentialSlot, FileSlot, KeyringSlot, MemorySlot};
pub use token::{Credential, TokenStore};
