//! # verigate-server
//!
//! The VeriGate authorization server: crypto primitives, the business
//! services (users, clients, scopes, the two token realms, and the
//! authorization engine), and the axum HTTP boundary.

pub mod crypto;
pub mod http;
pub mod services;
pub mod state;
pub mod sweeper;
