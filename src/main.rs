use ludex::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    identity::{HttpIdentityProvider, IdentityState},
    repository::{PostgresRepository, RepositoryState},
    storage::{MediaState, S3MediaStorage},
    verifier::{CredentialVerifier, VerifierState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Async entry point. Brings the process up in dependency order: config,
/// logging, the Postgres pool, the identity provider client, media storage,
/// and finally the HTTP server on top of all of them.
#[tokio::main]
async fn main() {
    // 1. Configuration (Fail-Fast)
    // .env first, so AppConfig::load() sees everything the file provides.
    dotenv::dotenv().ok();
    // load() panics on missing production secrets before anything else starts.
    let config = AppConfig::load();

    // 2. Log Filtering
    // RUST_LOG wins when set; otherwise a chatty-enough local default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ludex=debug,tower_http=info,axum=trace".into());

    // 3. Log Format per Environment
    match config.env {
        Env::Local => {
            // Human-readable output while developing.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // One JSON object per line for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("ludex starting in {:?} mode", config.env);

    // 4. Postgres Pool
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // One repository instance, shared as a trait object.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Identity Provider Client
    // The hosted auth service performing password checks, OAuth exchanges,
    // and sign-ups. This application never stores credentials itself.
    let identity = Arc::new(HttpIdentityProvider::new(
        config.idp_url.clone(),
        config.idp_key.clone(),
    )) as IdentityState;

    // The verifier owns the sign-in decision on top of identity + repository.
    let verifier =
        Arc::new(CredentialVerifier::new(identity.clone(), repo.clone())) as VerifierState;

    // 6. Media Storage (S3/MinIO)
    // The S3-compatible client behind cover art uploads.
    let media_client = S3MediaStorage::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: the Dockerized MinIO starts empty, so provision the
    // bucket here rather than asking every developer to click it into
    // existence.
    if config.env == Env::Local {
        use ludex::storage::MediaStorage;
        media_client.ensure_bucket_exists().await;
    }

    let media = Arc::new(media_client) as MediaState;

    // 7. Shared State Assembly
    // Everything the handlers and layers reach for, in one clonable bundle.
    let app_state = AppState {
        repo,
        identity,
        verifier,
        media,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("Swagger UI at http://localhost:3000/swagger-ui");

    // Runs until the process is killed.
    axum::serve(listener, app).await.unwrap();
}
