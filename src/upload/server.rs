use super::handlers::{command_handler, health_handler, upload_handler};
use crate::config::{EnrollmentConfig, UploadConfig};
use crate::error::UploadError;
use crate::events::EventBus;
use crate::mailbox::Mailbox;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the upload handlers
#[derive(Clone)]
pub struct UploadState {
    pub(crate) ingest_dir: PathBuf,
    pub(crate) extension: String,
    pub(crate) mailbox: Arc<dyn Mailbox>,
    pub(crate) event_bus: Arc<EventBus>,
}

/// HTTP service accepting enrollment videos and external door commands
pub struct UploadServer {
    config: UploadConfig,
    state: UploadState,
}

impl UploadServer {
    pub fn new(
        config: UploadConfig,
        enrollment: &EnrollmentConfig,
        mailbox: Arc<dyn Mailbox>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            state: UploadState {
                ingest_dir: enrollment.ingest_dir.clone(),
                extension: enrollment.extension.clone(),
                mailbox,
                event_bus,
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/uploads/:filename", put(upload_handler))
            .route("/command", post(command_handler))
            .route("/health", get(health_handler))
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(self.config.max_upload_bytes)),
            )
            .with_state(self.state.clone())
    }

    /// Serve until cancelled
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.state.ingest_dir)
            .await
            .map_err(|e| UploadError::Server {
                details: format!(
                    "Cannot create {}: {}",
                    self.state.ingest_dir.display(),
                    e
                ),
            })?;

        let addr = format!("{}:{}", self.config.ip, self.config.port);

        info!("Starting upload service on {}", addr);

        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| UploadError::BindFailed {
                    address: addr.clone(),
                    source: e,
                })?;

        info!("Upload service listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|e| UploadError::Server {
                details: format!("Server error: {}", e),
            })?;

        info!("Upload service stopped");
        Ok(())
    }
}
