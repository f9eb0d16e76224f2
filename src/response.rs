//! Encoding processed images into HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{engine::ImageHandle, error::AppError};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for a format token, case-insensitive. Unknown formats are
/// labelled as generic binary data.
pub fn mime_type(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tiff" | "tif" => "image/tiff",
        "avif" => "image/avif",
        "heif" | "heic" => "image/heif",
        _ => OCTET_STREAM,
    }
}

/// The value for the engine's quality slot. PNG takes its compression level
/// there, preferring `compression` over `quality`; every other format takes
/// `quality` and ignores `compression`.
///
/// `format` must already be lowercase.
pub fn effective_quality(
    format: &str,
    quality: Option<u8>,
    compression: Option<u8>,
) -> Option<u8> {
    if format == "png" {
        compression.or(quality)
    } else {
        quality
    }
}

/// Encode `image` as `format` and wrap it in a response with a matching
/// `Content-Type`.
pub async fn respond<I: ImageHandle>(
    image: I,
    format: &str,
    quality: Option<u8>,
    compression: Option<u8>,
    status: StatusCode,
) -> Result<Response, AppError> {
    let format = format.to_ascii_lowercase();
    let quality = effective_quality(&format, quality, compression);
    let content_type = mime_type(&format);

    debug!(%format, ?quality, content_type, "encoding image");
    let data = tokio::task::spawn_blocking(move || image.encode(&format, quality)).await??;

    Ok((
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        data,
    )
        .into_response())
}
