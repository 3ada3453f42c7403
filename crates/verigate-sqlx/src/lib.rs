//! # verigate-sqlx
//!
//! PostgreSQL implementations of the VeriGate store contracts. Queries
//! run at runtime against the schema in `schema.sql`; the authorization
//! code consume uses `UPDATE … AND is_used = FALSE RETURNING` so two
//! exchanges of the same code can never both succeed.

pub mod client;
pub mod code;
pub mod consent;
pub mod scope;
pub mod token;
pub mod user;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use verigate_core::AppError;

pub use client::PgClientStore;
pub use code::PgAuthCodeStore;
pub use consent::PgConsentStore;
pub use scope::PgScopeStore;
pub use token::PgOAuthTokenStore;
pub use user::PgUserStore;

/// Open a connection pool against the given database URL.
pub async fn connect(url: &str) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .map_err(|e| AppError::unavailable(format!("database connection failed: {e}")))
}

/// Factory for the per-entity stores sharing one pool.
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn users(&self) -> PgUserStore {
        PgUserStore::new(self.pool.clone())
    }

    pub fn clients(&self) -> PgClientStore {
        PgClientStore::new(self.pool.clone())
    }

    pub fn auth_codes(&self) -> PgAuthCodeStore {
        PgAuthCodeStore::new(self.pool.clone())
    }

    pub fn consents(&self) -> PgConsentStore {
        PgConsentStore::new(self.pool.clone())
    }

    pub fn oauth_tokens(&self) -> PgOAuthTokenStore {
        PgOAuthTokenStore::new(self.pool.clone())
    }

    pub fn scopes(&self) -> PgScopeStore {
        PgScopeStore::new(self.pool.clone())
    }
}

/// Map a driver error onto the application error model.
pub(crate) fn db_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::conflict("record already exists")
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            AppError::unavailable("database unavailable")
        }
        _ => AppError::internal(format!("database error: {err}")),
    }
}
