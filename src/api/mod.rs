// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::db::DbPool;
use crate::metrics::IndexerMetrics;

/// Shared state of the operational endpoints.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub metrics: Arc<IndexerMetrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve `/health` and `/metrics` until the process exits.
pub async fn start_api_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Starting API server on {}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool::Runtime;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use diesel_async::AsyncPgConnection;
    use std::time::Duration;

    fn unreachable_pool() -> DbPool {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(
            "postgres://indexer@127.0.0.1:1/lens",
        );
        DbPool::builder(manager)
            .max_size(1)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(Duration::from_secs(2)))
            .create_timeout(Some(Duration::from_secs(2)))
            .build()
            .unwrap()
    }

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn exposes_metrics_and_reports_unhealthy_database() {
        let metrics = Arc::new(IndexerMetrics::new().unwrap());
        metrics.batches_processed.inc();
        let base = serve(AppState {
            pool: unreachable_pool(),
            metrics,
        })
        .await;

        let body = reqwest::get(format!("{base}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("lens_batches_processed_total 1"));

        let health = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(health.status().as_u16(), 503);
        let json: serde_json::Value = health.json().await.unwrap();
        assert_eq!(json["status"], "unhealthy");
    }
}
