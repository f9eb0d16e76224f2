//! Pre-built image routes.
//!
//! ```text
//! POST /text?text=Hello&fontSize=48&font=DejaVu-Sans&x=100&y=200   body: raw image
//! POST /convert?format=png&compression=9                          body: raw image
//! POST /text/upload, /convert/upload                              multipart field `image`
//! GET  /version
//! ```

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{BytesRejection, QueryRejection},
        Extension, Multipart, Query,
    },
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    engine::{
        ImageEngine, ImageHandle, TextOptions, BLACK, DEFAULT_FONT, DEFAULT_FONT_SIZE,
        MAX_FONT_SIZE, MAX_STROKE_WIDTH, WHITE,
    },
    error::AppError,
    request,
    response::respond,
};

/// Multipart field the upload routes read the image from.
pub const UPLOAD_FIELD: &str = "image";

const TEXT_FORMAT: &str = "jpeg";
const DEFAULT_TEXT_QUALITY: u8 = 90;

/// Add the image routes to `routes`. Handlers expect an `Arc<E>` extension.
pub fn register<E: ImageEngine>(routes: Router) -> Router {
    routes
        .route("/text", post(add_text::<E>))
        .route("/text/upload", post(add_text_upload::<E>))
        .route("/convert", post(convert::<E>))
        .route("/convert/upload", post(convert_upload::<E>))
        .route("/version", get(version::<E>))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQuery {
    pub text: String,
    pub font_size: Option<u32>,
    pub font: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub stroke_width: Option<f64>,
    pub quality: Option<u8>,
}

impl TextQuery {
    /// Black text in the requested font; a white stroke when `strokeWidth`
    /// is given.
    pub fn options(&self) -> Result<TextOptions, AppError> {
        let font_size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        if !(1..=MAX_FONT_SIZE).contains(&font_size) {
            return Err(AppError::bad_request(format!(
                "fontSize must be between 1 and {MAX_FONT_SIZE}"
            )));
        }

        let mut options = TextOptions {
            font: self.font.clone().unwrap_or_else(|| DEFAULT_FONT.to_owned()),
            font_size,
            color: BLACK,
            ..TextOptions::default()
        };
        if let Some(width) = self.stroke_width {
            if !(0.0..=MAX_STROKE_WIDTH).contains(&width) {
                return Err(AppError::bad_request(format!(
                    "strokeWidth must be between 0 and {MAX_STROKE_WIDTH}"
                )));
            }
            options.stroke_color = Some(WHITE);
            options.stroke_width = width;
        }
        Ok(options)
    }

    /// Requested position, or the centre of a `width`×`height` image.
    /// An explicit coordinate may lie at most one image extent off either
    /// edge of the origin.
    pub fn position(&self, width: u32, height: u32) -> Result<(i32, i32), AppError> {
        let x = coordinate("x", self.x, width)?;
        let y = coordinate("y", self.y, height)?;
        Ok((x, y))
    }
}

fn coordinate(name: &str, value: Option<i32>, extent: u32) -> Result<i32, AppError> {
    let limit = i32::try_from(extent).unwrap_or(i32::MAX);
    match value {
        None => Ok(limit / 2),
        Some(v) if (-limit..=limit).contains(&v) => Ok(v),
        Some(v) => Err(AppError::bad_request(format!(
            "{name}={v} is outside -{limit}..={limit}"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertQuery {
    pub format: String,
    pub quality: Option<u8>,
    pub compression: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub codec: String,
    pub text: String,
}

#[instrument(skip_all)]
pub async fn add_text<E: ImageEngine>(
    Extension(engine): Extension<Arc<E>>,
    query: Result<Query<TextQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let Query(params) = query?;
    let options = params.options()?;
    let image = request::image_from_body(&engine, body?).await?;
    overlay(image, params, options).await
}

#[instrument(skip_all)]
pub async fn add_text_upload<E: ImageEngine>(
    Extension(engine): Extension<Arc<E>>,
    query: Result<Query<TextQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let Query(params) = query?;
    let options = params.options()?;
    let image = request::image_from_field(&engine, &mut multipart?, UPLOAD_FIELD).await?;
    overlay(image, params, options).await
}

/// The default position depends on the decoded size, so it is only known
/// after decode and must be fixed before drawing.
async fn overlay<I: ImageHandle>(
    image: I,
    params: TextQuery,
    options: TextOptions,
) -> Result<Response, AppError> {
    let (x, y) = params.position(image.width(), image.height())?;
    let quality = params.quality.unwrap_or(DEFAULT_TEXT_QUALITY);
    let text = params.text;

    let drawn =
        tokio::task::spawn_blocking(move || image.draw_text(&text, x, y, &options)).await??;
    respond(drawn, TEXT_FORMAT, Some(quality), None, StatusCode::OK).await
}

#[instrument(skip_all)]
pub async fn convert<E: ImageEngine>(
    Extension(engine): Extension<Arc<E>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let Query(params) = query?;
    check_format(&params)?;
    let image = request::image_from_body(&engine, body?).await?;
    respond(
        image,
        &params.format,
        params.quality,
        params.compression,
        StatusCode::OK,
    )
    .await
}

#[instrument(skip_all)]
pub async fn convert_upload<E: ImageEngine>(
    Extension(engine): Extension<Arc<E>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let Query(params) = query?;
    check_format(&params)?;
    let image = request::image_from_field(&engine, &mut multipart?, UPLOAD_FIELD).await?;
    respond(
        image,
        &params.format,
        params.quality,
        params.compression,
        StatusCode::OK,
    )
    .await
}

fn check_format(params: &ConvertQuery) -> Result<(), AppError> {
    if params.format.trim().is_empty() {
        return Err(AppError::bad_request("format must not be empty"));
    }
    Ok(())
}

pub async fn version<E: ImageEngine>(Extension(engine): Extension<Arc<E>>) -> Json<VersionInfo> {
    Json(VersionInfo {
        version: engine.version(),
        codec: engine.codec_version().to_owned(),
        text: engine.text_version().to_owned(),
    })
}
