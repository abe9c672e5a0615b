//! Thumbnail processor - generates thumbnails from original images
//!
//! Takes an image, scales it down to fit inside the configured box while
//! maintaining aspect ratio (never scaling up), and re-encodes it in the
//! configured output format.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use crate::error::ResizeError;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::borrow::Cow;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Encoding used for derivatives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Re-encode in the source image's own format
    Source,
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl OutputFormat {
    /// Concrete format for an image decoded as `source`
    pub fn resolve(self, source: ImageFormat) -> ImageFormat {
        match self {
            OutputFormat::Source => match source {
                ImageFormat::Jpeg
                | ImageFormat::Png
                | ImageFormat::Gif
                | ImageFormat::Bmp
                | ImageFormat::WebP => source,
                // No encoder for the rest; PNG is lossless
                _ => ImageFormat::Png,
            },
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Bmp => ImageFormat::Bmp,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" | "original" => Ok(OutputFormat::Source),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            "bmp" => Ok(OutputFormat::Bmp),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(format!("unsupported output format '{other}'")),
        }
    }
}

/// Content type stored alongside a derivative
pub fn content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::WebP => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Configuration for thumbnail generation
#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    /// Maximum width in pixels
    pub max_width: u32,
    /// Maximum height in pixels
    pub max_height: u32,
    pub format: OutputFormat,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 300,
            max_height: 300,
            format: OutputFormat::Source,
            quality: 80,
        }
    }
}

/// Result of thumbnail generation
#[derive(Debug)]
pub struct ThumbnailResult {
    /// The encoded thumbnail
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ThumbnailResult {
    pub fn content_type(&self) -> &'static str {
        content_type(self.format)
    }
}

/// Thumbnail processor
pub struct ThumbnailProcessor {
    config: ThumbnailConfig,
}

impl ThumbnailProcessor {
    /// Create a new processor with the given configuration
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Create a processor with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ThumbnailConfig::default())
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Generate a thumbnail from the given image data (blocking version)
    ///
    /// **Note:** This method performs CPU-intensive operations and should not be called
    /// directly from async code. Use `generate_async` instead.
    pub fn generate(&self, original_data: &[u8]) -> Result<ThumbnailResult, ResizeError> {
        let source_format = image::guess_format(original_data)
            .map_err(|e| ResizeError::Decode(e.to_string()))?;
        let img = image::load_from_memory_with_format(original_data, source_format)
            .map_err(|e| ResizeError::Decode(e.to_string()))?;

        let (orig_w, orig_h) = img.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            source_format = ?source_format,
            "Processing image for thumbnail"
        );

        let (new_w, new_h) = self.calculate_dimensions(orig_w, orig_h);

        // Images already inside the box are re-encoded as-is
        let resized = if (new_w, new_h) == (orig_w, orig_h) {
            img
        } else {
            img.resize_exact(new_w, new_h, FilterType::Triangle)
        };

        let format = self.config.format.resolve(source_format);
        let data = self.encode(&resized, format)?;

        debug!(
            width = new_w,
            height = new_h,
            format = ?format,
            size = data.len(),
            "Thumbnail generated"
        );

        Ok(ThumbnailResult {
            data,
            width: new_w,
            height: new_h,
            format,
        })
    }

    /// Generate a thumbnail asynchronously using a blocking thread pool
    ///
    /// This method offloads the CPU-intensive image processing to a dedicated
    /// thread pool, so polling and storage I/O keep making progress.
    pub async fn generate_async(
        self: Arc<Self>,
        original_data: Bytes,
    ) -> Result<ThumbnailResult, ResizeError> {
        tokio::task::spawn_blocking(move || self.generate(&original_data))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    ResizeError::Decode(format!("thumbnail task panicked: {e}"))
                } else {
                    ResizeError::Aborted(e.to_string())
                }
            })?
    }

    /// Fit `width`x`height` inside the configured box, preserving aspect ratio
    pub fn calculate_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let (max_w, max_h) = (self.config.max_width, self.config.max_height);

        if width <= max_w && height <= max_h {
            return (width, height);
        }

        let ratio = f64::min(
            max_w as f64 / width as f64,
            max_h as f64 / height as f64,
        );
        let new_w = ((width as f64 * ratio).round() as u32).clamp(1, max_w);
        let new_h = ((height as f64 * ratio).round() as u32).clamp(1, max_h);
        (new_w, new_h)
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Bytes, ResizeError> {
        let mut buf = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                // JPEG carries no alpha channel
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.config.quality);
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| ResizeError::Encode(e.to_string()))?;
            }
            ImageFormat::Png => {
                // PNG has no float samples; HDR sources are narrowed to 16 bits
                let img = match img {
                    DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                        Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16()))
                    }
                    _ => Cow::Borrowed(img),
                };
                img.write_to(&mut Cursor::new(&mut buf), format)
                    .map_err(|e| ResizeError::Encode(e.to_string()))?;
            }
            _ => {
                DynamicImage::ImageRgba8(img.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buf), format)
                    .map_err(|e| ResizeError::Encode(e.to_string()))?;
            }
        }

        Ok(Bytes::from(buf))
    }
}
