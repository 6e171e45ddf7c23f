//! Sigilforge Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sigilforge_engine::api;
use sigilforge_engine::infrastructure::{
    clock::SystemClock,
    persistence::{InMemoryCharacterStore, SqliteCharacterStore},
    ports::{CharacterStore, ClockPort},
    retry::RetryConfig,
    rules::load_rule_set,
};
use sigilforge_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may be run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sigilforge_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sigilforge Engine");

    // Load configuration
    let rules_path =
        std::env::var("SIGILFORGE_RULES").unwrap_or_else(|_| "config/rules.sample.json".into());
    let store_kind = std::env::var("SIGILFORGE_STORE").unwrap_or_else(|_| "sqlite".into());
    let db_path = std::env::var("SIGILFORGE_DB").unwrap_or_else(|_| "characters.db".into());
    let server_host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let server_port: u16 = std::env::var("SERVER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .unwrap_or(3000);

    let defaults = RetryConfig::default();
    let retry_config = RetryConfig {
        max_retries: env_parse("SIGILFORGE_SAVE_RETRIES").unwrap_or(defaults.max_retries),
        base_delay_ms: env_parse("SIGILFORGE_SAVE_BACKOFF_MS").unwrap_or(defaults.base_delay_ms),
        ..defaults
    };
    tracing::info!(
        "Snapshot persistence configured with retry: max_retries={}, base_delay_ms={}",
        retry_config.max_retries,
        retry_config.base_delay_ms
    );

    let rules = load_rule_set(&rules_path)?;

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    let store: Arc<dyn CharacterStore> = match store_kind.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            tracing::warn!("Using in-memory character store; nothing will be persisted");
            Arc::new(InMemoryCharacterStore::new())
        }
        "sqlite" => {
            tracing::info!("Opening SQLite character store at {}", db_path);
            Arc::new(SqliteCharacterStore::new(&db_path, clock.clone()).await?)
        }
        other => anyhow::bail!("Unknown SIGILFORGE_STORE `{other}` (expected sqlite or memory)"),
    };

    // Create application
    let app = Arc::new(App::new(store, clock, rules, retry_config));

    let mut router = api::http::routes()
        .with_state(app)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    // Start server
    let addr: SocketAddr = format!("{server_host}:{server_port}").parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        // The portal sends identity headers and JSON bodies, which trigger preflights.
        .allow_headers([
            HeaderName::from_static(api::http::USER_ID_HEADER),
            HeaderName::from_static(api::http::CORRELATION_ID_HEADER),
            axum::http::header::CONTENT_TYPE,
        ]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
