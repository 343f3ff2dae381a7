use anyhow::Context;
use std::sync::Arc;
use timber_auth::domain::auth::{
    Clock, IdentityResolver, OAuthCallbackHandler, OAuthProvider, SessionStore, SystemClock,
    TokenIssuer, TokenLifetimes, TokenSigner,
};
use timber_auth::infrastructure::config::{Config, LogFormat, SessionStoreKind};
use timber_auth::infrastructure::db::{check_connection, create_pool, run_migrations};
use timber_auth::infrastructure::http::{start_http_server, AppServices};
use timber_auth::infrastructure::oauth::GitHubOAuthClient;
use timber_auth::infrastructure::repositories::UserRepository;
use timber_auth::infrastructure::session::{BoundedSessionStore, InMemorySessionStore, RedisSessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("invalid configuration")?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting timber-auth on {}:{}", config.host, config.port);

    // Create database connection pool
    let pool = create_pool(&config.database_url)
        .await
        .context("failed to create database pool")?;
    check_connection(&pool)
        .await
        .context("database connection check failed")?;
    run_migrations(&pool).await.context("database migrations failed")?;
    tracing::info!("Database connection verified and migrated");

    let pool = Arc::new(pool);
    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Session store, every call bounded by the configured timeout
    let store: Arc<dyn SessionStore> = match config.session_store {
        SessionStoreKind::Redis => {
            let redis = RedisSessionStore::connect(&config.redis_url, config.session_store_prefix.clone())
                .await
                .context("failed to connect to redis")?;
            tracing::info!(prefix = %config.session_store_prefix, "Redis session store connected");
            Arc::new(BoundedSessionStore::new(redis, config.session_store_timeout))
        }
        SessionStoreKind::Memory => {
            if !config.is_development() {
                tracing::warn!("In-memory session store in production: sessions are lost on restart and not shared between instances");
            }
            Arc::new(BoundedSessionStore::new(
                InMemorySessionStore::new(clock.clone()),
                config.session_store_timeout,
            ))
        }
    };

    // 2. Signer and issuer
    let signer = Arc::new(TokenSigner::new(config.jwt_secret.as_bytes(), clock));
    let issuer = Arc::new(TokenIssuer::new(
        signer,
        store.clone(),
        TokenLifetimes {
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
        },
        config.replay_policy,
    ));

    // 3. Sign-in providers and identity resolution
    let github: Arc<dyn OAuthProvider> = Arc::new(GitHubOAuthClient::new(
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
        config.github_redirect_uri.clone(),
    ));
    let resolver: Arc<dyn IdentityResolver> = Arc::new(UserRepository::new(pool.clone()));
    let oauth = Arc::new(OAuthCallbackHandler::new(
        vec![github],
        resolver,
        issuer.clone(),
        config.oauth_state_ttl,
    ));

    let services = AppServices {
        issuer,
        oauth,
        store,
        pool: Some(pool),
        ownership_timeout: config.session_store_timeout,
        secure_cookies: !config.is_development(),
    };

    // Start HTTP server with all routes
    start_http_server(config, services).await
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "timber_auth=debug,tower_http=debug".into());

    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
