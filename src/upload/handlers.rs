use super::server::UploadState;
use crate::hardware::HardwareCommand;
use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Accepts a bare file name with the enrollment extension; anything that
/// could escape the ingestion directory is refused.
pub(crate) fn valid_upload_name(name: &str, extension: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains("..") {
        return false;
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return false;
    }
    std::path::Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "error": message.into() })))
}

/// `PUT /uploads/:filename`: stream the body into the ingestion directory.
///
/// The file grows while the upload is in flight, so the enrollment
/// stability check sees it as incomplete until the last chunk lands.
pub async fn upload_handler(
    State(state): State<UploadState>,
    Path(filename): Path<String>,
    body: Body,
) -> impl IntoResponse {
    if !valid_upload_name(&filename, &state.extension) {
        warn!("Refusing upload with name {:?}", filename);
        return error_response(StatusCode::BAD_REQUEST, "invalid file name");
    }

    let destination = state.ingest_dir.join(&filename);
    let mut file = match File::create(&destination).await {
        Ok(file) => file,
        Err(e) => {
            error!("Creating {}: {}", destination.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot store upload");
        }
    };

    let mut stream = body.into_data_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let result = match chunk {
            Ok(bytes) => file.write_all(&bytes).await.map(|_| bytes.len()),
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        };

        match result {
            Ok(len) => written += len as u64,
            Err(e) => {
                warn!("Upload of {} interrupted: {}", filename, e);
                drop(file);
                let _ = tokio::fs::remove_file(&destination).await;
                return error_response(StatusCode::BAD_REQUEST, "upload interrupted");
            }
        }
    }

    if let Err(e) = file.flush().await {
        error!("Flushing {}: {}", destination.display(), e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "cannot store upload");
    }

    info!("Received upload {} ({} bytes)", filename, written);
    (
        StatusCode::CREATED,
        Json(json!({ "file": filename, "bytes": written })),
    )
}

/// `POST /command`: the body is a single wire character
pub async fn command_handler(State(state): State<UploadState>, body: Bytes) -> impl IntoResponse {
    let command = match String::from_utf8_lossy(&body).parse::<HardwareCommand>() {
        Ok(command) => command,
        Err(e) => {
            warn!("Rejected command request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.mailbox.post(command).await {
        Ok(()) => {
            info!("Queued command {}: {}", command, command.description());
            (
                StatusCode::ACCEPTED,
                Json(json!({ "command": command.to_string() })),
            )
        }
        Err(e) => {
            error!("Queueing command {}: {}", command, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Health check
pub async fn health_handler(State(state): State<UploadState>) -> impl IntoResponse {
    let health_info = json!({
        "status": "healthy",
        "ingest_dir": state.ingest_dir.display().to_string(),
        "subscribers": state.event_bus.subscriber_count(),
    });

    (StatusCode::OK, Json(health_info))
}
