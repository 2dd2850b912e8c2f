//! Main Entrypoint for the NPC API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Wiring the museum knowledge base and starting its index build.
//! 3. Starting the NPC tool service and the realtime session factory.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use npc_api::{
    config::Config,
    router::create_router,
    state::AppState,
    ws::{SessionManager, tools::McpToolExecutor},
};
use npc_core::{
    agent::{AGENT_NAME, NpcToolService},
    llm_client::OpenAICompatibleClient,
    rag::{
        RagAccessor, RagComponents, RagConfig, embeddings::OpenAIEmbeddings, qdrant::QdrantStore,
    },
};
use openai_realtime::{OpenAIRealtimeFactory, RealtimeConfig};
use secrecy::SecretString;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
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

    let prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = prompts
        .get("system_prompt")
        .context("system_prompt.md not found in prompts directory")?
        .clone();

    // --- 3. Knowledge Base ---
    let openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());
    let components = RagComponents {
        embedder: Arc::new(OpenAIEmbeddings::new(
            openai_config.clone(),
            config.embedding_model.clone(),
            config.embedding_size,
        )),
        store: Arc::new(QdrantStore::new(
            config.qdrant.url.clone(),
            config.qdrant.api_key.clone(),
        )),
        llm: Arc::new(OpenAICompatibleClient::new(
            openai_config,
            config.chat_model.clone(),
        )),
    };
    let rag = Arc::new(RagAccessor::new(
        RagConfig {
            collection: config.rag_collection.clone(),
            docs_dir: config.rag_docs_dir.clone(),
            embedding_size: config.embedding_size,
            hybrid: config.rag_enable_hybrid,
        },
        components,
    ));

    // Warm the index in the background; queries retry the build if this fails.
    let warmup = rag.clone();
    tokio::spawn(async move {
        match warmup.index().await {
            Ok(index) => info!(chunks = index.chunk_count(), "Museum index ready."),
            Err(e) => error!(error = ?e, "Museum index build failed"),
        }
    });

    // --- 4. Tools and Realtime Sessions ---
    let tools = McpToolExecutor::start(NpcToolService::new(&config.timezone, rag))
        .await
        .context("Failed to start the NPC tool service")?;

    let mut realtime = RealtimeConfig::new(
        SecretString::from(config.openai_api_key.clone()),
        AGENT_NAME,
        system_prompt,
    );
    realtime.model = config.realtime_model.clone();
    realtime.voice = config.realtime_voice.clone();
    realtime.transcription_model = config.transcription_model.clone();
    realtime.transcription_language =
        Some(config.transcription_language.clone()).filter(|lang| !lang.is_empty());

    let factory = Arc::new(OpenAIRealtimeFactory::new(realtime, Arc::new(tools)));
    let app_state = Arc::new(AppState {
        sessions: Arc::new(SessionManager::new(factory)),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state, &config.static_dir).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.realtime_model,
        voice = %config.realtime_voice,
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
