//! Recipe pictures. Uploads are re-encoded as JPEG, stored under the media directory
//! and served from `/media`.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

pub const JPEG_QUALITY: u8 = 50;
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unreadable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not store image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Decode any supported format and re-encode it as an RGB JPEG at [`JPEG_QUALITY`].
pub fn compress_image(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(jpeg)
}

/// Compress off the async runtime.
pub async fn compress(bytes: Vec<u8>) -> Result<Vec<u8>, MediaError> {
    let jpeg = tokio::task::spawn_blocking(move || compress_image(&bytes)).await??;
    Ok(jpeg)
}

/// Write a compressed picture under a fresh name and return that name.
pub async fn save_jpeg(media_dir: &Path, jpeg: &[u8]) -> Result<String, MediaError> {
    tokio::fs::create_dir_all(media_dir).await?;
    let file_name = format!("{}.jpg", uuid::Uuid::new_v4());
    tokio::fs::write(media_dir.join(&file_name), jpeg).await?;
    Ok(file_name)
}

pub async fn discard(media_dir: &Path, file_name: &str) {
    if let Err(e) = tokio::fs::remove_file(media_dir.join(file_name)).await {
        tracing::warn!(file_name, "failed to remove unused picture: {e}");
    }
}
