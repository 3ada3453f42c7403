// PostgreSQL user store. Username and email uniqueness is enforced by
// functional indexes on LOWER(column); lookups match the same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::User;
use verigate_core::store::{UserProfileUpdate, UserStore};

use crate::db_error;

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, \
     profile_picture_url, phone_number, is_active, is_verified, created_at, updated_at, \
     last_login_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    profile_picture_url: Option<String>,
    phone_number: Option<String>,
    is_active: bool,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            profile_picture_url: row.profile_picture_url,
            phone_number: row.phone_number,
            is_active: row.is_active,
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, _ctx: &RequestContext, user: &User) -> Result<User> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, full_name, \
             profile_picture_url, phone_number, is_active, is_verified, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(&user.profile_picture_url)
            .bind(&user.phone_number)
            .bind(user.is_active)
            .bind(user.is_verified)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, _ctx: &RequestContext, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_username(&self, _ctx: &RequestContext, username: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, _ctx: &RequestContext, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn update_profile(
        &self,
        _ctx: &RequestContext,
        id: i64,
        update: &UserProfileUpdate,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET \
             full_name = COALESCE($2, full_name), \
             profile_picture_url = COALESCE($3, profile_picture_url), \
             phone_number = COALESCE($4, phone_number), \
             updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.full_name)
        .bind(&update.profile_picture_url)
        .bind(&update.phone_number)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_password(
        &self,
        _ctx: &RequestContext,
        id: i64,
        password_hash: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn update_last_login(&self, _ctx: &RequestContext, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
