mod fonts;
mod raster;

use thiserror::Error;

pub use fonts::FontBook;
pub use raster::{Raster, RasterImage, RasterOptions};

/// Errors raised by an image engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize image engine: {0}")]
    Init(String),
    #[error("cannot decode image: {0}")]
    Decode(String),
    #[error("cannot encode image as {format}: {reason}")]
    Encode { format: String, reason: String },
    #[error("unknown font '{0}'")]
    FontNotFound(String),
    #[error("cannot draw text: {0}")]
    Draw(String),
    #[error("image engine is shut down")]
    Closed,
}

impl EngineError {
    pub fn encode(format: &str, reason: impl ToString) -> Self {
        Self::Encode {
            format: format.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// The process-wide image engine: a codec backend plus a text backend.
///
/// Built once at startup, shared read-only by every request, and shut down
/// once when the server stops.
pub trait ImageEngine: Send + Sync + 'static {
    type Image: ImageHandle;

    /// Combined version of the engine and both of its backends.
    fn version(&self) -> String;
    fn codec_version(&self) -> &str;
    fn text_version(&self) -> &str;

    /// Decode raw bytes. Blocking; callers run it off the async runtime.
    fn decode(&self, data: &[u8]) -> Result<Self::Image, EngineError>;

    /// Release engine resources. Only the first call has an effect.
    fn shutdown(&self);
}

/// A decoded image. Transforms return a new handle and leave `self` untouched.
pub trait ImageHandle: Send + Sized + 'static {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Encode into `format` (lowercase token). `quality` carries the
    /// format-specific knob: JPEG/AVIF quality or PNG compression level.
    fn encode(&self, format: &str, quality: Option<u8>) -> Result<Vec<u8>, EngineError>;

    fn draw_text(
        &self,
        text: &str,
        x: i32,
        y: i32,
        options: &TextOptions,
    ) -> Result<Self, EngineError>;
}

pub const DEFAULT_FONT: &str = "DejaVu-Sans";
pub const DEFAULT_FONT_SIZE: u32 = 48;
/// Largest font size in pixels the text routes accept.
pub const MAX_FONT_SIZE: u32 = 1024;
/// Largest stroke width in pixels the text routes accept.
pub const MAX_STROKE_WIDTH: f64 = 32.0;
/// Text anchors further than this from the origin are rejected by backends,
/// keeping glyph coordinates far from `i32` overflow.
pub const MAX_TEXT_OFFSET: i32 = 1 << 24;

/// RGBA color, 8 bits per channel.
pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const WHITE: Rgba = [255, 255, 255, 255];

#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    /// Font file path or family name such as `DejaVu-Sans`.
    pub font: String,
    pub font_size: u32,
    pub color: Rgba,
    pub stroke_color: Option<Rgba>,
    pub stroke_width: f64,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            color: BLACK,
            stroke_color: None,
            stroke_width: 0.0,
        }
    }
}
