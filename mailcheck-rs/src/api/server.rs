//! API Server - HTTP server for the REST API and web pages

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{self, AppState};
use crate::api::web;
use crate::cleaner::EmailListCleaner;
use crate::utils::dns::DnsResolver;
use crate::verification::VerificationManager;

/// API Server configuration
pub struct ApiServer<R: DnsResolver> {
    state: Arc<AppState<R>>,
    addr: String,
}

impl<R: DnsResolver> ApiServer<R> {
    /// Create a new API server
    pub fn new(
        manager: VerificationManager<R>,
        cleaner: EmailListCleaner,
        resolver: R,
        addr: String,
    ) -> Self {
        let state = Arc::new(AppState {
            manager,
            cleaner,
            resolver,
        });

        Self { state, addr }
    }

    pub fn manager(&self) -> &VerificationManager<R> {
        &self.state.manager
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        // CORS configuration
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let api_routes = Router::new()
            .route("/verify", post(handlers::submit_verify::<R>))
            .route("/verify/upload", post(handlers::upload_verify::<R>))
            .route("/jobs", get(handlers::list_jobs::<R>))
            .route("/jobs/:id/status", get(handlers::job_status::<R>))
            .route("/jobs/:id/report", get(handlers::job_report::<R>))
            .route("/jobs/:id", axum::routing::delete(handlers::cancel_job::<R>))
            .route("/clean", post(handlers::clean::<R>));

        // Web routes (HTML pages)
        let web_routes = Router::new()
            .route("/", get(web::index_page::<R>))
            .route("/verify", post(web::verify_submit::<R>))
            .route("/jobs/:id", get(web::job_page::<R>));

        Router::new()
            .route("/health", get(handlers::health))
            .nest("/api", api_routes)
            .merge(web_routes)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        self.run_until(CancellationToken::new()).await
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run_until(&self, shutdown: CancellationToken) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("API server stopped");
        Ok(())
    }
}
