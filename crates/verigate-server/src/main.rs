use std::sync::Arc;

use anyhow::Context;
use verigate_core::config::Config;
use verigate_core::logger::Logger;
use verigate_server::crypto::jwt::SigningKeys;
use verigate_server::state::{AppState, Stores};
use verigate_server::{http, sweeper};
use verigate_sqlx::PgStores;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::from_env();
    let config = Config::from_env().context("failed to load configuration")?;

    let keys = SigningKeys::from_pem(&config.jwt_private_key, &config.jwt_public_key)
        .context("failed to load RSA signing keys")?;

    let pool = verigate_sqlx::connect(&config.postgres.url())
        .await
        .context("failed to connect to postgres")?;
    let pg = PgStores::new(pool);

    let cache = verigate_redis::RedisCache::connect(&config.redis.url())
        .await
        .context("failed to connect to redis")?;
    // Web sessions live in Redis so they expire with their keys.
    let web_sessions = verigate_redis::RedisWebSessionStore::new(cache.connection());

    let stores = Stores {
        users: Arc::new(pg.users()),
        clients: Arc::new(pg.clients()),
        codes: Arc::new(pg.auth_codes()),
        consents: Arc::new(pg.consents()),
        oauth_tokens: Arc::new(pg.oauth_tokens()),
        web_sessions: Arc::new(web_sessions),
        scopes: Arc::new(pg.scopes()),
    };

    let state = AppState::new(
        stores,
        Arc::new(cache),
        keys,
        &config.token_hash_key,
        config.access_token_ttl,
        config.refresh_token_ttl,
        logger.clone(),
    )
    .context("failed to wire services")?;

    // Periodic cleanup of expired authorization codes.
    let sweep_codes = Arc::new(pg.auth_codes());
    tokio::spawn(sweeper::run(sweep_codes, logger.clone()));

    let app = http::router(state);
    let addr = format!("0.0.0.0:{}", config.app_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    logger.info(&format!("listening on {addr}"));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // If the signal handler cannot be installed, run until killed.
        std::future::pending::<()>().await;
    }
}
