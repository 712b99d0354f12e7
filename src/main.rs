use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lens_social_indexer::api::{self, AppState};
use lens_social_indexer::config::Config;
use lens_social_indexer::db::Database;
use lens_social_indexer::metadata::{gateway_transport, web_transport, MetadataFetcher};
use lens_social_indexer::metrics::IndexerMetrics;
use lens_social_indexer::search::{search_transport, SearchIndexClient};
use lens_social_indexer::source::JsonlLogSource;
use lens_social_indexer::store::PgEntityStore;
use lens_social_indexer::worker::{LensIndexerWorker, WorkerOptions};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,lens_social_indexer=debug".into()),
    );

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Lens indexer failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!("Initialized configuration");

    let db = Arc::new(Database::connect(&config.database).await?);
    info!("Connected to database");

    let metrics = Arc::new(IndexerMetrics::new()?);
    let store = Arc::new(PgEntityStore::new(db.clone()));

    let metadata = MetadataFetcher::new(
        Arc::new(gateway_transport(&config.ipfs, &config.http)?),
        Arc::new(web_transport(&config.http)?),
    );
    let search = SearchIndexClient::new(Arc::new(search_transport(&config.search, &config.http)?));

    let worker = LensIndexerWorker::new(
        WorkerOptions {
            contract_address: config.chain.contract_address.clone(),
            key_scheme: config.chain.key_scheme,
            engine_id: config.search.engine_id.clone(),
            indexer_id: config.chain.indexer_id.clone(),
        },
        store,
        metadata,
        search,
        metrics.clone(),
    );

    // Start API server
    let server_config = config.server.clone();
    let state = AppState {
        pool: db.pool().clone(),
        metrics,
    };
    tokio::spawn(async move {
        if let Err(e) = api::start_api_server(&server_config, state).await {
            error!("API server error: {}", e);
        }
    });

    let resume_after = worker.resume_point().await?;
    let mut source = JsonlLogSource::open(
        &config.chain.log_source_path,
        config.chain.batch_blocks,
        resume_after,
    )?;

    tokio::select! {
        result = worker.run(&mut source) => {
            let batches = result?;
            info!(batches, "Lens indexer finished");
        }
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received, abandoning the in-flight batch"),
                Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    Ok(())
}
