use ai_chat::completion_client::{CompletionClient, DisabledCompletionClient, OpenAiCompatClient};
use ai_chat::config::AppConfig;
use ai_chat::store::{ConversationStore, MemoryStore, MessageStore, PgStore};
use ai_chat::{db, handlers, AppState, ChatService};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (conversations, messages): (Arc<dyn ConversationStore>, Arc<dyn MessageStore>) =
        match config.database_url.as_deref() {
            Some(database_url) => {
                let db_pool = db::create_pool(database_url, config.database_max_connections)
                    .await
                    .expect("Failed to create database pool.");
                tracing::info!("✅ Postgres store ready");
                let store = Arc::new(PgStore::new(db_pool));
                (store.clone(), store)
            }
            None => {
                tracing::warn!("DATABASE_URL not found. Conversations will be kept in memory only.");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let completion: Arc<dyn CompletionClient> = match config.completion_api_key.clone() {
        Some(api_key) => {
            tracing::info!(
                "Initializing completion client ({} at {})...",
                config.chat.model,
                config.completion_base_url
            );
            let client = OpenAiCompatClient::new(
                api_key,
                config.completion_base_url.clone(),
                config.chat.completion_timeout,
            )
            .expect("Failed to build completion HTTP client");
            Arc::new(client)
        }
        None => {
            tracing::warn!("COMPLETION_API_KEY not found. Assistant replies are disabled.");
            tracing::info!("To enable replies, set: COMPLETION_API_KEY (or GROQ_API_KEY)");
            Arc::new(DisabledCompletionClient)
        }
    };

    if config.uses_default_jwt_secret() {
        tracing::warn!("JWT_SECRET not set; using the insecure default secret");
    }

    let shared_state = Arc::new(AppState {
        chat: ChatService::new(conversations, messages, completion, config.chat.clone()),
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = handlers::app_router(shared_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind listener");
    tracing::info!("listening on {}", listener.local_addr().expect("listener has an address"));
    axum::serve(listener, app).await.expect("Server error");
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,ai_chat=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,ai_chat=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("💬 AI chat service starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
