//! kbchat HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use kbchat::cache::{AnswerStore, MemoryAnswerStore, PgAnswerStore};
use kbchat::config::Config;
use kbchat::embedding::HttpEmbedder;
use kbchat::gateway::{AppState, create_router};
use kbchat::llm::ChatClient;
use kbchat::orchestrator::ChatService;
use kbchat::tenant::{Tenant, TenantDirectory};
use kbchat::vectorstore::{DiskVectorStore, PgVectorStore, VectorStore};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    info!(
        addr = %config.socket_addr(),
        pgvector = config.use_pgvector,
        "kbchat starting"
    );
    if let Some(provider) = &config.llm_provider {
        info!(provider, "LLM provider hint configured");
    }

    let tenants = Arc::new(TenantDirectory::new());
    if let Some(path) = &config.tenants_path {
        let raw = std::fs::read_to_string(path)?;
        let loaded: Vec<Tenant> = serde_json::from_str(&raw)?;
        let count = loaded.len();
        for tenant in loaded {
            tenants.insert(tenant)?;
        }
        info!(count, "loaded tenant directory");
    } else {
        warn!("no KBCHAT_TENANTS_PATH configured; starting with an empty tenant directory");
    }

    let chat = if config.mock_provider {
        warn!("mock provider enabled; answers are canned");
        ChatClient::new_mock(&config.chat_model)
    } else {
        ChatClient::new(&config.chat_model)
    };
    let helper_chat = chat.with_model(&config.question_generation_model);
    let embedder = Arc::new(HttpEmbedder::new(
        &config.embedding_model,
        config.embedding_dim,
    ));

    if config.use_pgvector {
        let url = config
            .pgvector_database_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("PGVECTOR_DATABASE_URL is required"))?;
        let store = Arc::new(PgVectorStore::connect(&url).await?);
        let answers = Arc::new(
            PgAnswerStore::connect(store.pool().clone(), config.embedding_dim).await?,
        );
        serve(config, tenants, store, embedder, answers, chat, helper_chat).await
    } else {
        let store = Arc::new(DiskVectorStore::open(config.storage_path.join("vectors")).await?);
        let answers = Arc::new(MemoryAnswerStore::new());
        serve(config, tenants, store, embedder, answers, chat, helper_chat).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn serve<V, A>(
    config: Config,
    tenants: Arc<TenantDirectory>,
    store: Arc<V>,
    embedder: Arc<HttpEmbedder>,
    answers: Arc<A>,
    chat: ChatClient,
    helper_chat: ChatClient,
) -> anyhow::Result<()>
where
    V: VectorStore + 'static,
    A: AnswerStore + 'static,
{
    let service = Arc::new(ChatService::new(
        tenants,
        store,
        embedder,
        answers,
        chat,
        helper_chat,
        config.service_settings(),
    ));

    let app = create_router(AppState::new(service));
    let addr: SocketAddr = config.socket_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("kbchat shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
