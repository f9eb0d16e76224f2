//! Turning request bodies and multipart uploads into decoded images.

use std::sync::Arc;

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::{engine::ImageEngine, error::AppError};

/// Raw image bytes from a whole request body.
pub fn body_bytes(body: Bytes) -> Result<Bytes, AppError> {
    if body.is_empty() {
        return Err(AppError::bad_request("No image data in request body"));
    }
    Ok(body)
}

/// Raw image bytes from the multipart field named `field`. Other fields are
/// skipped.
#[instrument(level = "debug", skip(multipart))]
pub async fn field_bytes(multipart: &mut Multipart, field: &str) -> Result<Bytes, AppError> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Failed to read multipart form data: {e}")))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let data = part
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Failed to read file data: {e}")))?;
        if data.is_empty() {
            return Err(AppError::bad_request(format!(
                "Uploaded file for field '{field}' is empty"
            )));
        }
        debug!(bytes = data.len(), "read multipart field");
        return Ok(data);
    }
    Err(AppError::bad_request(format!(
        "No file uploaded for field '{field}'"
    )))
}

/// Decode on the blocking pool so large images don't stall the runtime.
pub async fn decode<E: ImageEngine>(engine: &Arc<E>, data: Bytes) -> Result<E::Image, AppError> {
    let engine = Arc::clone(engine);
    let image = tokio::task::spawn_blocking(move || engine.decode(&data)).await??;
    Ok(image)
}

pub async fn image_from_body<E: ImageEngine>(
    engine: &Arc<E>,
    body: Bytes,
) -> Result<E::Image, AppError> {
    decode(engine, body_bytes(body)?).await
}

pub async fn image_from_field<E: ImageEngine>(
    engine: &Arc<E>,
    multipart: &mut Multipart,
    field: &str,
) -> Result<E::Image, AppError> {
    let data = field_bytes(multipart, field).await?;
    decode(engine, data).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_a_client_error() {
        let err = body_bytes(Bytes::new()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(reason) if reason.contains("No image data")));
    }

    #[test]
    fn body_bytes_pass_through() {
        let body = Bytes::from_static(b"\x89PNG");
        assert_eq!(body_bytes(body.clone()).unwrap(), body);
    }
}
