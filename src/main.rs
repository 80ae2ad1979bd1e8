use eventplanner::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    geocoding::{GeocoderState, NominatimGeocoder},
    repository::{PostgresRepository, RepositoryState},
    token::TokenService,
};
use sqlx::postgres::PgPoolOptions;
use std::{process, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, collaborators, then the HTTP server.
/// Any startup failure is fatal and ends the process with a non-zero exit code.
#[tokio::main]
async fn main() {
    // 1. Configuration (Fail-Fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // The subscriber depends on the config, so this goes straight to stderr.
            eprintln!("FATAL: invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eventplanner=debug,tower_http=info".into());

    // 3. Logging Format by Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.env == Env::Local && AppConfig::secret_is_ephemeral() {
        tracing::warn!(
            "JWT_SECRET is not set; using a random per-process secret. Sessions will not survive a restart."
        );
    }

    // 4. Database (Postgres)
    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("FATAL: failed to connect to Postgres, check DATABASE_URL: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("FATAL: database migrations failed: {}", e);
        process::exit(1);
    }
    tracing::info!("Database migrations complete");
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Collaborators
    let geocoder = Arc::new(NominatimGeocoder::new(&config.geocoding_url)) as GeocoderState;
    let tokens = TokenService::new(&config.jwt_secret);

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        tokens,
        geocoder,
        config,
    };

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("FATAL: cannot bind {}: {}", bind_addr, e);
            process::exit(1);
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server terminated: {}", e);
        process::exit(1);
    }
}
