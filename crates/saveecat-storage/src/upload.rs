//! Download-and-store orchestration for item media.
//!
//! The upload manager fetches media bytes from the CDN, derives
//! content-addressed keys, and writes the original plus derivative
//! renditions to the blob store. Derivative failures never fail the item:
//! a stored original with no thumbnails is still a stored item.

use std::time::Duration;

use image::imageops::FilterType;
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use reqwest::Client;

use crate::client::BlobClient;
use crate::error::StorageError;
use crate::keys::{content_key, content_type_for_extension, file_extension};

/// Derivative widths for image renditions.
const IMAGE_VARIANTS: &[(&str, u32)] = &[
    ("thumb", 150),
    ("small", 300),
    ("medium", 600),
    ("large", 1200),
];

/// Derivative widths for avatar renditions.
const AVATAR_VARIANTS: &[(&str, u32)] = &[("small", 64), ("medium", 128), ("large", 256)];

/// Maximum poster frame width.
const POSTER_MAX_WIDTH: u32 = 600;

const JPEG_QUALITY: u8 = 85;

/// The CDN requires a site referer for media requests.
const CDN_HOST_MARKER: &str = "savee-cdn.com";
const CDN_REFERER: &str = "https://savee.com/";

/// Tuning knobs for downloads.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub download_max_retries: u32,
}

/// Keys written for one item's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub storage_key: String,
    pub poster_key: Option<String>,
}

pub struct UploadManager {
    blob: BlobClient,
    http: Client,
    config: StorageConfig,
}

impl UploadManager {
    /// # Errors
    ///
    /// Returns [`StorageError::Http`] if the download client cannot be
    /// constructed.
    pub fn new(blob: BlobClient, config: StorageConfig) -> Result<Self, StorageError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { blob, http, config })
    }

    /// Fetches media bytes from `url`, retrying network failures and 5xx
    /// responses with a short backoff.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Download`] for a persistent non-success
    /// status, or [`StorageError::Http`] for a persistent network failure.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let mut attempt = 0u32;
        loop {
            match self.try_download(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    let retriable = match &err {
                        StorageError::Http(_) => true,
                        StorageError::Download { status, .. } => *status >= 500,
                        _ => false,
                    };
                    if !retriable || attempt >= self.config.download_max_retries {
                        return Err(err);
                    }
                    let delay_secs = 1u64 << attempt.min(3);
                    tracing::warn!(
                        url,
                        attempt,
                        delay_secs,
                        error = %err,
                        "media download failed, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_download(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let mut request = self.http.get(url);
        if url.contains(CDN_HOST_MARKER) {
            request = request.header("referer", CDN_REFERER);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Downloads an image and stores it under `base_key` with derivative
    /// renditions. Returns the original's storage key.
    ///
    /// Gifs are stored as-is with no derivatives: re-encoding would drop
    /// frames.
    ///
    /// # Errors
    ///
    /// Returns an error only for the download or the original's upload;
    /// derivative failures are logged and swallowed.
    pub async fn upload_image(&mut self, url: &str, base_key: &str) -> Result<String, StorageError> {
        let bytes = self.download(url).await?;
        let ext = file_extension(url);
        let key = content_key(base_key, "original", &bytes, ext);
        self.blob
            .put(&key, &bytes, content_type_for_extension(ext))
            .await?;

        if ext != ".gif" {
            self.store_derivatives(&bytes, base_key, IMAGE_VARIANTS).await;
        }
        Ok(key)
    }

    /// Downloads a video and stores it under `base_key`, along with a JPEG
    /// poster frame when `poster_url` is given. The poster is best-effort.
    ///
    /// # Errors
    ///
    /// Returns an error only for the video's download or upload.
    pub async fn upload_video(
        &mut self,
        url: &str,
        base_key: &str,
        poster_url: Option<&str>,
    ) -> Result<UploadedMedia, StorageError> {
        let bytes = self.download(url).await?;
        let ext = file_extension(url);
        let storage_key = content_key(base_key, "video", &bytes, ext);
        self.blob
            .put(&storage_key, &bytes, content_type_for_extension(ext))
            .await?;

        let mut poster_key = None;
        if let Some(poster_url) = poster_url {
            match self.store_poster(poster_url, base_key).await {
                Ok(key) => poster_key = Some(key),
                Err(err) => {
                    tracing::warn!(url = poster_url, error = %err, "poster upload failed, keeping video without one");
                }
            }
        }

        Ok(UploadedMedia {
            storage_key,
            poster_key,
        })
    }

    /// Downloads a profile avatar, normalises it to JPEG, and stores it
    /// under `users/{username}/avatar/` with small derivative renditions.
    ///
    /// # Errors
    ///
    /// Returns an error for the download, decode, or original upload;
    /// derivative failures are logged and swallowed.
    pub async fn upload_avatar(&mut self, username: &str, url: &str) -> Result<String, StorageError> {
        let bytes = self.download(url).await?;
        let decoded = image::load_from_memory(&bytes)?;
        let normalised = encode_jpeg(&decoded)?;

        let base_key = format!("users/{username}/avatar");
        let key = content_key(&base_key, "original", &normalised, ".jpg");
        self.blob.put(&key, &normalised, "image/jpeg").await?;

        self.store_derivatives(&bytes, &base_key, AVATAR_VARIANTS).await;
        Ok(key)
    }

    async fn store_poster(&mut self, poster_url: &str, base_key: &str) -> Result<String, StorageError> {
        let bytes = self.download(poster_url).await?;
        let decoded = image::load_from_memory(&bytes)?;
        let frame = resize_to_width(&decoded, POSTER_MAX_WIDTH);
        let encoded = encode_jpeg(&frame)?;
        let key = content_key(base_key, "poster", &encoded, ".jpg");
        self.blob.put(&key, &encoded, "image/jpeg").await?;
        Ok(key)
    }

    /// Decodes `bytes` and stores one JPEG rendition per `(variant, width)`.
    /// Every failure here is non-fatal.
    async fn store_derivatives(&mut self, bytes: &[u8], base_key: &str, variants: &[(&str, u32)]) {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(err) => {
                tracing::warn!(base_key, error = %err, "derivative decode failed, keeping original only");
                return;
            }
        };

        for &(variant, width) in variants {
            let resized = resize_to_width(&decoded, width);
            let encoded = match encode_jpeg(&resized) {
                Ok(buf) => buf,
                Err(err) => {
                    tracing::warn!(base_key, variant, error = %err, "derivative encode failed");
                    continue;
                }
            };
            let key = content_key(base_key, variant, &encoded, ".jpg");
            if let Err(err) = self.blob.put(&key, &encoded, "image/jpeg").await {
                tracing::warn!(base_key, variant, error = %err, "derivative upload failed");
            }
        }
    }
}

/// Downscales to `width`, preserving aspect ratio. Images already narrower
/// are returned unscaled.
fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    if img.width() <= width {
        return img.clone();
    }
    let height = u32::try_from(
        u64::from(width) * u64::from(img.height()) / u64::from(img.width().max(1)),
    )
    .unwrap_or(u32::MAX)
    .max(1);
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Encodes as JPEG at the pipeline's fixed quality, flattening any alpha
/// channel first.
fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, StorageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))?;
    Ok(buf)
}
