//! Main Entrypoint for the Lingua API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and schema.
//! 3. Wiring the provider router (external OpenAI-compatible provider when
//!    credentials are configured, deterministic fallback otherwise).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use lingua_api::{
    config::Config, engine::SessionEngine, gate::AllowAllGate, router::create_router,
    state::AppState, store::SessionStore,
};
use lingua_core::catalog::InMemoryCatalog;
use lingua_core::provider::{FallbackProvider, LanguageProvider, OpenAiProvider, ProviderRouter};
use sqlx::sqlite::SqlitePool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = SqlitePool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let store = SessionStore::new(pool);
    store.init().await?;
    info!("Database connection established and schema is up-to-date.");

    // --- 4. Wire the Provider Router ---
    let external: Option<Arc<dyn LanguageProvider>> = match &config.openai_api_key {
        Some(api_key) => {
            info!(model = %config.chat_model, "External language provider configured.");
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(&config.openai_api_base);
            Some(Arc::new(OpenAiProvider::new(
                openai_config,
                config.chat_model.clone(),
            )))
        }
        None => {
            info!("No provider credentials; running on the deterministic fallback only.");
            None
        }
    };
    let provider = Arc::new(ProviderRouter::new(external, FallbackProvider::random()));

    let engine = SessionEngine::new(
        store,
        Arc::new(InMemoryCatalog::with_demo_modules()),
        provider,
        Arc::new(AllowAllGate),
        config.teacher_test_scope,
    );

    let app_state = Arc::new(AppState {
        engine: Arc::new(engine),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
