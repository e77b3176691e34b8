use std::io;
use std::path::{Path, PathBuf};

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use locals_types::api::UploadResponse;

use crate::auth::AppState;
use crate::error::ApiError;

/// 10 MB limit for profile and event photos
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const PUBLIC_PREFIX: &str = "/media";

/// Flat directory of uploaded images, served back under `/media`.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a fresh name and returns the public URL path.
    pub async fn put(&self, bytes: &[u8], ext: &str) -> io::Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = format!("{}.{}", Uuid::new_v4(), ext);
        let mut file = tokio::fs::File::create(self.root.join(&name)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }
}

/// Form field that carries the file in a multipart upload.
const FILE_FIELD: &str = "file";

/// Maps an image content type to the extension it is stored under.
fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Extension from a client file name, e.g. `beach.JPEG`.
fn extension_from_name(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        _ => None,
    }
}

fn unsupported_type() -> ApiError {
    ApiError::validation("Only jpeg, png, gif or webp images are accepted")
}

/// Pulls the `file` part out of a multipart form.
async fn read_file_field(mut multipart: Multipart) -> Result<(Bytes, &'static str), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let ext = field
            .content_type()
            .and_then(extension_for)
            .or_else(|| field.file_name().and_then(extension_from_name))
            .ok_or_else(unsupported_type)?;
        let bytes = field.bytes().await?;
        return Ok((bytes, ext));
    }

    Err(ApiError::validation("No file uploaded"))
}

/// POST /upload: a multipart form with a `file` part, or the raw image bytes
/// with an image `Content-Type`. Returns `{ fileUrl }`.
pub async fn upload(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (bytes, ext) = if content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state).await?;
        read_file_field(multipart).await?
    } else {
        let ext = extension_for(&content_type).ok_or_else(unsupported_type)?;
        (Bytes::from_request(request, &state).await?, ext)
    };
    if bytes.is_empty() {
        return Err(ApiError::validation("No file uploaded"));
    }

    let file_url = state.blobs.put(&bytes, ext).await.map_err(|e| {
        error!("Failed to store upload in {}: {}", state.blobs.root().display(), e);
        ApiError::Internal(e.to_string())
    })?;

    info!("Stored {} byte upload at {}", bytes.len(), file_url);
    Ok((StatusCode::CREATED, Json(UploadResponse { file_url })))
}
