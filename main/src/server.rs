use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use clap::Parser;
use common::{
    storage::store::IndexStore,
    utils::{
        completion::CompletionProvider,
        config::{get_config, AppConfig},
        embedding::EmbeddingProvider,
    },
};
use retrieval_pipeline::{IndexLifecycle, QueryGateway, VectorIndexer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod startup;

/// Question answering over a folder of text documents.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Get config
    let config = get_config()?;

    // Set up tracing
    let default_level = if args.verbose || config.log_verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .try_init()
        .ok();

    startup::validate_startup(&config).await?;
    log_config(&config);

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(config.api_key().unwrap_or_default())
            .with_api_base(&config.openai_base_url),
    ));

    let embedding_provider = Arc::new(
        EmbeddingProvider::from_config(&config, Some(openai_client.clone())).await?,
    );
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let completion_provider = Arc::new(CompletionProvider::from_config(
        &config,
        Some(openai_client),
    )?);
    info!(
        completion_backend = completion_provider.backend_label(),
        "Completion provider initialized"
    );

    let indexer = VectorIndexer::from_config(&config, embedding_provider, completion_provider);
    let store = IndexStore::new(&config).await?;
    let lifecycle = Arc::new(IndexLifecycle::new(
        Arc::new(indexer),
        store,
        config.source_dir(),
    ));
    let api_state = ApiState::new(Arc::new(QueryGateway::new(lifecycle)));

    // Create Axum router
    let app = Router::new()
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let serve_address = config.listen_address();
    info!("Starting server listening on {}", serve_address);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn log_config(config: &AppConfig) {
    info!(
        texts_data_path = %config.source_dir().display(),
        persist_dir = %config.persist_path().display(),
        openai_base_url = %config.openai_base_url,
        embedding_backend = ?config.embedding_backend,
        completion_backend = ?config.completion_backend,
        query_model = %config.query_model,
        similarity_top_k = config.similarity_top_k,
        "Configuration loaded"
    );
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
