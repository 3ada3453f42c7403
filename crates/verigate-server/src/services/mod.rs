//! Business services, one per component: users, clients, scopes, the two
//! token realms, and the authorization engine that drives the code flow.

pub mod authorize;
pub mod client;
pub mod scope;
pub mod session;
pub mod token;
pub mod user;

pub use authorize::AuthorizationService;
pub use client::ClientService;
pub use scope::ScopeService;
pub use session::WebSessionService;
pub use token::OAuthTokenService;
pub use user::UserService;
