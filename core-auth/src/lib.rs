//! # Authentication Module
//!
//! Media-server session management.
//!
//! ## Overview
//!
//! This module restores the saved session at startup, runs the
//! username/password login when needed and persists the resulting
//! credentials through the host's secure store.
//!
//! ## Features
//!
//! - `Credentials` with a redacted `Debug`
//! - `CredentialStore` persisting the session as one secret
//! - `Authenticator` contract implemented by server connectors
//! - `AuthManager` restore / login / sign-out flow with auth events

pub mod authenticator;
pub mod credential_store;
pub mod error;
pub mod manager;
pub mod types;

pub use authenticator::Authenticator;
pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use types::{AuthState, Credentials, MIN_TOKEN_LEN};
