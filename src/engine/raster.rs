use std::{
    io::Cursor,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use ab_glyph::PxScale;
use image::{
    codecs::{
        avif::AvifEncoder,
        gif::GifEncoder,
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
        webp::WebPEncoder,
    },
    DynamicImage, Frame, ImageFormat, ImageReader, Limits, Rgba,
};
use imageproc::drawing::draw_text_mut;
use tracing::{info, warn};

use super::{
    EngineError, FontBook, ImageEngine, ImageHandle, TextOptions, DEFAULT_FONT, MAX_FONT_SIZE,
    MAX_STROKE_WIDTH, MAX_TEXT_OFFSET,
};

/// Release series (major.minor) of the `image` dependency in Cargo.toml.
const CODEC_VERSION: &str = "0.25";
/// Release series (major.minor) of the `imageproc` dependency in Cargo.toml.
const TEXT_VERSION: &str = "0.25";

const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_AVIF_QUALITY: u8 = 80;
const AVIF_SPEED: u8 = 8;

#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Font directories to index. Empty means the system font directories.
    pub font_dirs: Vec<PathBuf>,
    /// Largest accepted width or height of a decoded image.
    pub max_dimension: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            font_dirs: Vec::new(),
            max_dimension: 16384,
        }
    }
}

/// Engine backed by `image` for codecs and `imageproc` for text.
#[derive(Debug)]
pub struct Raster {
    fonts: Arc<FontBook>,
    max_dimension: u32,
    closed: AtomicBool,
}

impl Raster {
    pub fn initialize(options: RasterOptions) -> Result<Self, EngineError> {
        if options.max_dimension == 0 {
            return Err(EngineError::Init("max dimension must be positive".into()));
        }

        let fonts = FontBook::scan(&options.font_dirs)?;
        if fonts.is_empty() {
            warn!("no fonts indexed, text requests must give a font file path");
        } else if fonts.resolve(DEFAULT_FONT).is_none() {
            warn!("default font {DEFAULT_FONT} not found, text requests must name a font");
        }

        let engine = Self {
            fonts: Arc::new(fonts),
            max_dimension: options.max_dimension,
            closed: AtomicBool::new(false),
        };
        info!(
            version = %engine.version(),
            fonts = engine.fonts.len(),
            "image engine initialized"
        );
        Ok(engine)
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }
}

impl ImageEngine for Raster {
    type Image = RasterImage;

    fn version(&self) -> String {
        format!(
            "imgwire-raster/{} (image {}; imageproc {})",
            env!("CARGO_PKG_VERSION"),
            CODEC_VERSION,
            TEXT_VERSION
        )
    }

    fn codec_version(&self) -> &str {
        CODEC_VERSION
    }

    fn text_version(&self) -> &str {
        TEXT_VERSION
    }

    fn decode(&self, data: &[u8]) -> Result<RasterImage, EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::Closed);
        }
        if data.is_empty() {
            return Err(EngineError::Decode("no image data".into()));
        }

        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        reader.limits(self.limits());
        let image = reader
            .decode()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        Ok(RasterImage {
            image,
            fonts: Arc::clone(&self.fonts),
        })
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("image engine shut down");
    }
}

#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
    fonts: Arc<FontBook>,
}

impl ImageHandle for RasterImage {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn encode(&self, format: &str, quality: Option<u8>) -> Result<Vec<u8>, EngineError> {
        let mut buf = Vec::new();
        let written = match format {
            "jpeg" | "jpg" => {
                let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
                // JPEG has no alpha channel
                DynamicImage::ImageRgb8(self.image.to_rgb8())
                    .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
            }
            "png" => {
                let compression = match quality {
                    None => CompressionType::Default,
                    Some(0..=2) => CompressionType::Fast,
                    Some(3..=6) => CompressionType::Default,
                    Some(_) => CompressionType::Best,
                };
                self.image.write_with_encoder(PngEncoder::new_with_quality(
                    &mut buf,
                    compression,
                    FilterType::Adaptive,
                ))
            }
            // lossless only, quality does not apply
            "webp" => DynamicImage::ImageRgba8(self.image.to_rgba8())
                .write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
            "gif" => {
                let mut encoder = GifEncoder::new(&mut buf);
                encoder.encode_frame(Frame::new(self.image.to_rgba8()))
            }
            "tiff" | "tif" => self
                .image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff),
            "avif" => {
                let quality = quality.unwrap_or(DEFAULT_AVIF_QUALITY).clamp(1, 100);
                DynamicImage::ImageRgba8(self.image.to_rgba8()).write_with_encoder(
                    AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality),
                )
            }
            other => return Err(EngineError::encode(other, "unsupported output format")),
        };
        written.map_err(|e| EngineError::encode(format, e))?;
        Ok(buf)
    }

    fn draw_text(
        &self,
        text: &str,
        x: i32,
        y: i32,
        options: &TextOptions,
    ) -> Result<Self, EngineError> {
        if !(1..=MAX_FONT_SIZE).contains(&options.font_size) {
            return Err(EngineError::Draw(format!(
                "font size must be between 1 and {MAX_FONT_SIZE}"
            )));
        }
        if x.unsigned_abs() > MAX_TEXT_OFFSET.unsigned_abs()
            || y.unsigned_abs() > MAX_TEXT_OFFSET.unsigned_abs()
        {
            return Err(EngineError::Draw(format!("text position ({x}, {y}) is out of range")));
        }
        let font = self.fonts.load(&options.font)?;
        let scale = PxScale::from(options.font_size as f32);
        let mut canvas = self.image.to_rgba8();

        if let Some(stroke) = options.stroke_color {
            let radius = options.stroke_width.clamp(0.0, MAX_STROKE_WIDTH).round() as i32;
            for (dx, dy) in stroke_offsets(radius) {
                let (sx, sy) = (x.saturating_add(dx), y.saturating_add(dy));
                draw_text_mut(&mut canvas, Rgba(stroke), sx, sy, scale, &font, text);
            }
        }
        draw_text_mut(&mut canvas, Rgba(options.color), x, y, scale, &font, text);

        Ok(Self {
            image: DynamicImage::ImageRgba8(canvas),
            fonts: Arc::clone(&self.fonts),
        })
    }
}

/// Every non-zero offset inside a disc of `radius`.
fn stroke_offsets(radius: i32) -> impl Iterator<Item = (i32, i32)> {
    (-radius..=radius)
        .flat_map(move |dx| (-radius..=radius).map(move |dy| (dx, dy)))
        .filter(move |&(dx, dy)| (dx, dy) != (0, 0) && dx * dx + dy * dy <= radius * radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const PNG_1X1: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mP8/x8AAwMCAO9KX5kAAAAASUVORK5CYII=";

    fn engine_with(max_dimension: u32) -> Raster {
        let fonts = tempfile::tempdir().unwrap();
        Raster::initialize(RasterOptions {
            font_dirs: vec![fonts.path().to_path_buf()],
            max_dimension,
        })
        .unwrap()
    }

    fn engine() -> Raster {
        engine_with(RasterOptions::default().max_dimension)
    }

    fn sample(engine: &Raster) -> RasterImage {
        engine.decode(&STANDARD.decode(PNG_1X1).unwrap()).unwrap()
    }

    fn fixture_fonts() -> PathBuf {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"))
    }

    fn rgba(width: u32, height: u32) -> RasterImage {
        RasterImage {
            image: DynamicImage::new_rgba8(width, height),
            fonts: Arc::new(FontBook::default()),
        }
    }

    #[test]
    fn decode_reads_dimensions() {
        let engine = engine();
        let image = sample(&engine);
        assert_eq!((image.width(), image.height()), (1, 1));
    }

    #[test]
    fn decode_rejects_empty_and_garbage() {
        let engine = engine();
        assert!(matches!(engine.decode(&[]), Err(EngineError::Decode(_))));
        assert!(matches!(
            engine.decode(b"definitely not an image"),
            Err(EngineError::Decode(_))
        ));
    }

    #[test]
    fn decode_enforces_dimension_limit() {
        let engine = engine_with(4);
        let png = rgba(8, 2).encode("png", None).unwrap();
        assert!(matches!(engine.decode(&png), Err(EngineError::Decode(_))));
    }

    #[test]
    fn encodes_every_supported_format() {
        let image = rgba(4, 3);
        for format in ["jpeg", "jpg", "png", "webp", "gif", "tiff", "tif"] {
            let bytes = image.encode(format, None).unwrap();
            assert!(!bytes.is_empty(), "{format} produced no bytes");
        }
        let jpeg = image.encode("jpeg", Some(40)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn png_round_trips() {
        let engine = engine();
        let png = sample(&engine).encode("png", Some(9)).unwrap();
        let again = engine.decode(&png).unwrap();
        assert_eq!((again.width(), again.height()), (1, 1));
    }

    #[test]
    fn unsupported_formats_fail_to_encode() {
        let image = rgba(2, 2);
        for format in ["heif", "heic", "foo"] {
            assert!(matches!(
                image.encode(format, None),
                Err(EngineError::Encode { format: f, .. }) if f == format
            ));
        }
    }

    #[test]
    fn draw_text_needs_a_known_font() {
        let image = rgba(10, 10);
        let err = image
            .draw_text("hi", 5, 5, &TextOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::FontNotFound(font) if font == DEFAULT_FONT));
    }

    #[test]
    fn draw_text_rejects_out_of_range_font_size() {
        for font_size in [0, MAX_FONT_SIZE + 1, 4_000_000_000] {
            let options = TextOptions {
                font_size,
                ..TextOptions::default()
            };
            assert!(matches!(
                rgba(10, 10).draw_text("hi", 0, 0, &options),
                Err(EngineError::Draw(_))
            ));
        }
    }

    #[test]
    fn draw_text_rejects_far_positions() {
        let image = RasterImage {
            image: DynamicImage::new_rgba8(10, 10),
            fonts: Arc::new(FontBook::scan(&[fixture_fonts()]).unwrap()),
        };
        let options = TextOptions {
            stroke_color: Some(crate::engine::WHITE),
            stroke_width: 2.0,
            ..TextOptions::default()
        };
        for (x, y) in [(i32::MAX, 0), (i32::MIN, 0), (0, i32::MIN), (MAX_TEXT_OFFSET + 1, 0)] {
            assert!(matches!(
                image.draw_text("hi", x, y, &options),
                Err(EngineError::Draw(_))
            ));
        }
        assert!(image
            .draw_text("hi", -MAX_TEXT_OFFSET, MAX_TEXT_OFFSET, &options)
            .is_ok());
    }

    #[test]
    fn stroke_offsets_cover_a_disc() {
        assert_eq!(stroke_offsets(0).count(), 0);
        let one: Vec<_> = stroke_offsets(1).collect();
        assert_eq!(one, vec![(-1, 0), (0, -1), (0, 1), (1, 0)]);
        assert!(stroke_offsets(3).all(|(dx, dy)| dx * dx + dy * dy <= 9));
    }

    #[test]
    fn shutdown_closes_the_engine_once() {
        let engine = engine();
        engine.shutdown();
        engine.shutdown();
        assert!(engine.is_shut_down());
        assert!(matches!(
            engine.decode(&STANDARD.decode(PNG_1X1).unwrap()),
            Err(EngineError::Closed)
        ));
    }

    #[test]
    fn initialize_rejects_zero_dimension() {
        let err = Raster::initialize(RasterOptions {
            max_dimension: 0,
            ..RasterOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::Init(_)));
    }

    #[test]
    fn backend_versions_follow_manifest() {
        let manifest = include_str!("../../Cargo.toml");
        let requirement = |name: &str| {
            manifest
                .lines()
                .find(|line| line.starts_with(&format!("{name} =")))
                .unwrap()
                .to_owned()
        };
        assert!(requirement("image").contains(&format!("\"{CODEC_VERSION}")));
        assert!(requirement("imageproc").contains(&format!("\"{TEXT_VERSION}")));
    }

    #[test]
    fn version_names_both_backends() {
        let engine = engine();
        let version = engine.version();
        assert!(version.starts_with("imgwire-raster/"));
        assert!(version.contains(&format!("image {}", engine.codec_version())));
        assert!(version.contains(&format!("imageproc {}", engine.text_version())));
    }
}
