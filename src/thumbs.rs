//! Thumbnail naming and WebP transcoding. Thumbnails are named by the same
//! rating key the reference documents carry.
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Rating key embedded in an exported image name: the text between the last
/// `[` and the `]` that follows it, e.g. `"Heat (1995) [4242].thumb.jpg"`.
pub fn rating_key_from_image_name(name: &str) -> Option<&str> {
    let start = name.rfind('[')? + 1;
    let len = name[start..].find(']')?;
    let key = name[start..start + len].trim();
    (!key.is_empty()).then_some(key)
}

pub fn thumbnail_file_name(rating_key: &str) -> String {
    format!("{rating_key}.thumb.webp")
}

#[async_trait]
pub trait ThumbnailTranscoder: Send + Sync {
    /// Converts `source` and stores it under the rating key's thumbnail
    /// name. `Ok(false)` means the image could not be converted.
    async fn transcode(&self, rating_key: &str, source: Vec<u8>) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct WebpTranscoder {
    out_dir: PathBuf,
}

impl WebpTranscoder {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn path_for(&self, rating_key: &str) -> PathBuf {
        self.out_dir.join(thumbnail_file_name(rating_key))
    }
}

#[async_trait]
impl ThumbnailTranscoder for WebpTranscoder {
    async fn transcode(&self, rating_key: &str, source: Vec<u8>) -> Result<bool> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.out_dir.display()))?;
        let dest = self.path_for(rating_key);
        let key = rating_key.to_string();
        tokio::task::spawn_blocking(move || match encode_webp(&source) {
            Ok(bytes) => write_file(&dest, &bytes).map(|_| true),
            Err(e) => {
                tracing::warn!("Failed to convert thumbnail {}: {:#}", key, e);
                Ok(false)
            }
        })
        .await
        .context("Thumbnail task panicked")?
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Decodes any supported image, flattens alpha onto black and encodes WebP.
pub fn encode_webp(source: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(source).context("Unsupported image data")?;
    let rgb = flatten_onto_black(img);
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut out, ImageFormat::WebP)
        .context("WebP encoding failed")?;
    Ok(out.into_inner())
}

fn flatten_onto_black(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let scale = |c: u8| ((c as u16 * a as u16) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([scale(r), scale(g), scale(b)]));
    }
    rgb
}
