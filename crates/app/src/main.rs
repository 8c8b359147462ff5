mod page;
mod routes;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use docqa_core::providers::openai::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL,
};
use docqa_core::{
    CharacterNgramEmbedder, ChatModel, Embedder, OpenAiClient, OpenAiConfig, RagCoordinator,
};
use routes::{router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedderBackend {
    /// Remote embedding model through the OpenAI-compatible API.
    Openai,
    /// Offline hashed character-trigram embeddings.
    Local,
}

#[derive(Parser)]
#[command(name = "docqa-server", version, about = "Upload documents and ask questions about them")]
struct Cli {
    /// Address the web UI listens on
    #[arg(long, env = "DOCQA_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// API key for the embedding and chat-completion services
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat-completion model identifier
    #[arg(long, env = "DOCQA_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Upper bound for a single request to the API, in seconds
    #[arg(long, env = "DOCQA_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    request_timeout_secs: u64,

    /// Most chunks sent in one embeddings request
    #[arg(
        long,
        env = "DOCQA_EMBEDDING_BATCH_SIZE",
        default_value_t = DEFAULT_EMBEDDING_BATCH_SIZE as u64,
        value_parser = clap::value_parser!(u64).range(1..=2048)
    )]
    embedding_batch_size: u64,

    /// Where chunk and question embeddings come from
    #[arg(long, env = "DOCQA_EMBEDDER", value_enum, default_value_t = EmbedderBackend::Openai)]
    embedder: EmbedderBackend,

    /// Largest accepted upload request, in bytes
    #[arg(long, env = "DOCQA_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; requests to the API will fail");
    }

    let openai = Arc::new(OpenAiClient::new(OpenAiConfig {
        api_key: cli.openai_api_key,
        base_url: cli.openai_base_url,
        embedding_model: cli.embedding_model,
        chat_model: cli.chat_model,
        timeout: Duration::from_secs(cli.request_timeout_secs),
        embedding_batch_size: cli.embedding_batch_size as usize,
    })?);

    let embedder: Arc<dyn Embedder> = match cli.embedder {
        EmbedderBackend::Openai => openai.clone(),
        EmbedderBackend::Local => Arc::new(CharacterNgramEmbedder::default()),
    };
    let chat: Arc<dyn ChatModel> = openai;

    let state = AppState::new(RagCoordinator::new(embedder, chat));
    let app = router(state, cli.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(
        version = app_version,
        address = %listener.local_addr()?,
        embedder = ?cli.embedder,
        started_at = %Utc::now().to_rfc3339(),
        "docqa-server boot"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("docqa-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
