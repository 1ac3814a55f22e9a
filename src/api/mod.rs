//! HTTP API server for telephony webhooks
//!
//! Provides:
//! - Call webhooks (`POST /voice`, `POST /gather`) answering with TwiML
//! - Recording endpoint (`POST /api/ask`) answering with JSON
//! - Health checks (`/health`, `/ready`)
//! - Static web files, with `index.html` at `/`

pub mod ask;
pub mod health;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::pipeline::CallTurnPipeline;

/// Shared state for API handlers
pub struct ApiState {
    /// Call-turn pipeline shared by every request
    pub pipeline: Arc<CallTurnPipeline>,
}

impl ApiState {
    /// Wrap a pipeline for the handlers
    #[must_use]
    pub fn new(pipeline: CallTurnPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Builder for API server
pub struct ApiServerBuilder {
    pipeline: CallTurnPipeline,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(pipeline: CallTurnPipeline, port: u16) -> Self {
        Self {
            pipeline,
            port,
            static_dir: None,
        }
    }

    /// Serve static files from this directory if it exists
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir.filter(|d| d.is_dir());
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState::new(self.pipeline)),
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes and layers
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(voice::router(self.state.clone()))
            .nest("/api", ask::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router()).await?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
