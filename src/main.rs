use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elinity_games::api::{self, AppState};
use elinity_games::config::{CompletionConfig, ServerConfig};
use elinity_games::games::GameController;
use elinity_games::llm::CompletionGateway;
use elinity_games::manager::GameManager;
use elinity_games::registry::GameRegistry;
use elinity_games::store::MemoryStore;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elinity_games=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Elinity game service...");

    let server_config = ServerConfig::from_env();
    let completion_config = CompletionConfig::from_env();

    let gateway = CompletionGateway::from_config(&completion_config);
    if completion_config.api_key.is_none() {
        tracing::warn!(
            "OPENROUTER_API_KEY is not set; games will run on fallback narration only"
        );
    }

    let registry = GameRegistry::load(server_config.games_file.as_deref());
    let manager = GameManager::new(Arc::new(MemoryStore::new()));
    let controller = GameController::new(manager.clone(), Arc::new(gateway));

    let state = Arc::new(AppState {
        manager,
        controller,
        registry,
    });

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
