//! # verigate-oauth
//!
//! Protocol-pure OAuth 2.0 building blocks: PKCE verification (RFC 7636),
//! scope arithmetic, the wire DTOs for the authorize/token/revoke
//! endpoints, the RFC 6749 protocol error set, and redirect URL building.
//! Everything here is deterministic and store-free; the server crate
//! supplies the state.

pub mod error;
pub mod pkce;
pub mod redirect;
pub mod scope;
pub mod types;

pub use error::OAuthError;
pub use types::{AuthorizeOutcome, TokenResponse};
