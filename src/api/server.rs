//! Review server lifecycle.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::review_router;
use crate::api::types::AppState;

/// Handle to a running review server.
pub struct ReviewServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReviewServer {
    /// Bound address; differs from the requested one when port 0 was asked for.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shut down the server gracefully. In-flight reviews finish first.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Review server shutdown signal sent");
        }
    }

    /// Wait for the server task to end.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Review server task failed: {e}");
        }
    }
}

/// Bind `addr` and serve the review router in a background task.
pub async fn start_server(state: AppState, addr: SocketAddr) -> std::io::Result<ReviewServer> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    let app = review_router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Review server error: {e}");
        }
    });

    tracing::info!(addr = %addr, "Review server started");

    Ok(ReviewServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PipelineConfig;
    use crate::pipeline::cache::MemoryRequirementCache;
    use crate::pipeline::llm::MockLlmClient;
    use crate::pipeline::CompliancePipeline;

    fn state() -> AppState {
        let pipeline = CompliancePipeline::new(
            Arc::new(MockLlmClient::new("[]")),
            Arc::new(MemoryRequirementCache::default()),
            PipelineConfig::default(),
        );
        AppState::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn serves_health_until_shutdown() {
        let mut server = start_server(state(), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_ne!(server.addr().port(), 0);

        let body = reqwest::get(format!("http://{}/health", server.addr()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("\"status\":\"ok\""));

        server.shutdown();
        // Second shutdown is safe (no-op)
        server.shutdown();
        server.wait().await;
    }
}
