use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use insight_embeddings::{CachedProvider, EmbeddingCache, EmbeddingProvider, OpenAIProvider};
use insight_feedback::{
    DeferredFeedbackLog, EmbeddingSettings, FeedbackProcessor, IngestionService,
    JsonLinesDeadLetters, PipelineConfig, WorkerPool, serve,
};
use insight_ranking::{JsonContentCatalog, JsonFileProfileStore};

#[derive(Parser, Debug)]
#[command(
    name = "insight-feedback",
    about = "HTTP feedback ingestion and the worker pool that applies it to profile vectors"
)]
struct Cli {
    /// TOML pipeline configuration.
    #[arg(long, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "INSIGHT_BIND")]
    bind: Option<String>,

    /// JSON file backing the profile store.
    #[arg(long, env = "INSIGHT_PROFILE_STORE")]
    profile_store: Option<PathBuf>,

    /// JSON array of content items.
    #[arg(long, env = "INSIGHT_CATALOG")]
    catalog: Option<PathBuf>,

    /// JSON-lines file receiving dead-lettered events.
    #[arg(long, env = "INSIGHT_DEAD_LETTERS")]
    dead_letters: Option<PathBuf>,

    /// API key for the embedding gateway.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Log output format.
    #[arg(long, env = "INSIGHT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(path) = cli.profile_store {
        config.server.profile_store_path = path;
    }
    if let Some(path) = cli.catalog {
        config.server.catalog_path = path;
    }
    if let Some(path) = cli.dead_letters {
        config.server.dead_letter_path = path;
    }

    let profiles = Arc::new(
        JsonFileProfileStore::open(&config.server.profile_store_path)
            .await
            .with_context(|| {
                format!(
                    "failed to open profile store {}",
                    config.server.profile_store_path.display()
                )
            })?,
    );
    let catalog = Arc::new(
        JsonContentCatalog::load(&config.server.catalog_path)
            .await
            .with_context(|| {
                format!(
                    "failed to load content catalog {}",
                    config.server.catalog_path.display()
                )
            })?,
    );

    let mut processor = FeedbackProcessor::new(profiles.clone(), catalog.clone())
        .with_deferred_log(Arc::new(DeferredFeedbackLog::new()))
        .with_config(&config.ranking, &config.worker)
        .context("invalid ranking configuration")?;
    if let Some(embedder) = build_embedder(
        &config.server.embedding,
        cli.openai_api_key,
        config.worker.embed_timeout(),
    )
    .await?
    {
        processor = processor.with_embedder(embedder);
    }

    let dead_letters = Arc::new(JsonLinesDeadLetters::new(
        config.server.dead_letter_path.clone(),
    ));
    let pool = WorkerPool::start(&config.worker, Arc::new(processor), dead_letters);
    let service = IngestionService::new(pool.queue(), profiles, catalog);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    serve(listener, service, shutdown_signal())
        .await
        .context("server shutdown")?;

    let stats = pool.shutdown().await;
    info!(?stats, "insight-feedback stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn build_embedder(
    settings: &EmbeddingSettings,
    api_key: Option<String>,
    timeout: Duration,
) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    if !settings.enabled {
        info!("Embedding gateway disabled; only stored embeddings will be used");
        return Ok(None);
    }

    let mut provider = OpenAIProvider::new()
        .with_base_url(settings.base_url.as_str())
        .with_model(settings.model.as_str())
        .with_max_input_chars(settings.max_input_chars)
        .with_timeout(timeout)?;
    if let Some(key) = api_key {
        provider = provider.with_api_key(key);
    }
    if let Some(dimensions) = settings.dimensions {
        provider = provider.with_dimensions(dimensions);
    }
    if !provider.is_available() {
        warn!("OPENAI_API_KEY is not set; items without a stored embedding will be dead-lettered");
        return Ok(None);
    }

    let cache = match &settings.cache_path {
        Some(path) => EmbeddingCache::with_persistence(path, settings.cache_capacity)
            .await
            .with_context(|| format!("failed to open embedding cache {}", path.display()))?,
        None => EmbeddingCache::new(settings.cache_capacity),
    };

    info!(
        model = %settings.model,
        dimension = provider.dimension(),
        "Embedding gateway configured"
    );
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(CachedProvider::new(provider, cache));
    Ok(Some(embedder))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
