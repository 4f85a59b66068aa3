use anyhow::{Context, Result};
use image::{RgbaImage, imageops};
use std::path::Path;
use tracing::info;

pub struct PreparedImage {
    pub image: RgbaImage,
    /// Factor applied to source coordinates; 1.0 when the image was kept as is.
    pub scale: f32,
}

pub fn load_image(path: &Path, max_size: u32) -> Result<PreparedImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image: {}", path.display()))?
        .to_rgba8();
    Ok(downscale(image, max_size))
}

/// Shrinks the image so its longest side is at most `max_size`. Zero disables.
pub fn downscale(image: RgbaImage, max_size: u32) -> PreparedImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if max_size == 0 || longest <= max_size {
        return PreparedImage { image, scale: 1.0 };
    }
    let scale = max_size as f32 / longest as f32;
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    info!(new_width, new_height, "resized image");
    let image = imageops::resize(&image, new_width, new_height, imageops::FilterType::Triangle);
    PreparedImage { image, scale }
}
