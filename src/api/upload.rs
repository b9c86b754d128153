//! Upload API endpoints
//!
//! Handles image uploads for diary entries:
//! - POST /api/v1/upload/image - Upload a single image
//!
//! The MIME allowlist and size limit are enforced here, server-side.
//! Stored files are served statically from the upload directory; each
//! upload is recorded as a media row and can be attached to a diary.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::Media;

/// Response for a successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diary_id: Option<i64>,
}

/// Build the upload router (requires auth)
pub fn router() -> Router<AppState> {
    Router::new().route("/image", post(upload_image))
}

/// POST /api/v1/upload/image - Upload a single image
///
/// Accepts multipart/form-data with a "file" field and an optional
/// "diary_id" field attaching the image to one of the caller's diaries.
async fn upload_image(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let config = &state.upload_config;

    ensure_upload_dir(&config.path).await?;

    let mut file_data: Option<(String, Vec<u8>)> = None;
    let mut diary_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to read multipart: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                if !config.is_type_allowed(&content_type) {
                    return Err(ApiError::validation_error(format!(
                        "Invalid file type: {}. Allowed types: {:?}",
                        content_type, config.allowed_types
                    )));
                }

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::internal_error(format!("Failed to read file: {}", e)))?;

                if data.len() as u64 > config.max_file_size {
                    return Err(ApiError::validation_error(format!(
                        "File too large: {} bytes (max {})",
                        data.len(),
                        config.max_file_size
                    )));
                }
                if data.is_empty() {
                    return Err(ApiError::validation_error("Empty file"));
                }

                file_data = Some((content_type, data.to_vec()));
            }
            "diary_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::internal_error(format!("Failed to read field: {}", e)))?;
                diary_id = Some(
                    text.parse()
                        .map_err(|_| ApiError::validation_error("Invalid diary_id"))?,
                );
            }
            _ => continue,
        }
    }

    let (content_type, data) =
        file_data.ok_or_else(|| ApiError::validation_error("Missing 'file' field"))?;

    // When attaching, the diary must exist and belong to the uploader
    if let Some(diary_id) = diary_id {
        let diary = state
            .diary_repo
            .get_by_id(diary_id)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .ok_or_else(|| ApiError::not_found("Diary not found"))?;
        if diary.author_id != user.id {
            return Err(ApiError::forbidden("You can only attach uploads to your own diaries"));
        }
    }

    let extension = config.get_extension(&content_type);
    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    let path = config.path.join(&filename);

    fs::write(&path, &data)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to write file: {}", e)))?;

    let size = data.len() as u64;
    let url = format!("/uploads/{}", filename);

    let media = state
        .media_repo
        .create(&Media {
            id: 0,
            uploader_id: user.id,
            diary_id,
            url: url.clone(),
            filename: filename.clone(),
            content_type: content_type.clone(),
            size: size as i64,
            created_at: chrono::Utc::now(),
        })
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: media.id,
            url,
            filename,
            size,
            content_type,
            diary_id,
        }),
    ))
}

/// Create the upload directory if it doesn't exist
async fn ensure_upload_dir(path: &PathBuf) -> Result<(), ApiError> {
    if !path.exists() {
        fs::create_dir_all(path)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))?;
    }
    Ok(())
}
