//! Image post-processing: crop to 2:1 and re-host.
//!
//! Runs separately from the scrape. For every stored row that has an image
//! URL but no `Cropped Image URL` yet:
//!
//! 1. Download the source image
//! 2. Center-crop it to a 2:1 (width:height) ratio
//! 3. Re-encode as JPEG
//! 4. Upload to the image host under a fixed folder
//! 5. Write the hosted URL back to the row
//!
//! A failure in any step writes `Error: <reason>` into the row instead, so a
//! single bad image never halts the batch. Store failures while reading rows
//! or writing the marker do end the pass.

use crate::error::{ImageError, StoreError};
use crate::fetch::Fetcher;
use crate::models::FIELD_CROPPED_IMAGE_URL;
use crate::store::RowStore;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;
use tracing::{info, instrument, warn};

/// Region to keep, in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centered 2:1 crop for a `width` x `height` image.
///
/// Images taller than 2:1 lose rows top and bottom; wider ones lose columns
/// left and right.
pub fn crop_box(width: u32, height: u32) -> CropBox {
    let target_height = width / 2;
    if height > target_height {
        CropBox {
            x: 0,
            y: (height - target_height) / 2,
            width,
            height: target_height,
        }
    } else {
        let target_width = height.saturating_mul(2).min(width);
        CropBox {
            x: (width - target_width) / 2,
            y: 0,
            width: target_width,
            height,
        }
    }
}

/// Decode, crop to 2:1 and re-encode as JPEG.
pub fn crop_to_2x1(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(bytes)?;
    let b = crop_box(img.width(), img.height());
    if b.width == 0 || b.height == 0 {
        return Err(ImageError::Empty {
            width: img.width(),
            height: img.height(),
        });
    }

    let cropped = DynamicImage::ImageRgb8(img.crop_imm(b.x, b.y, b.width, b.height).to_rgb8());
    let mut out = Vec::new();
    cropped.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)?;
    Ok(out)
}

/// Stable file name for an image, derived from its source URL.
pub fn file_name_for(source_url: &str) -> String {
    format!("{:x}.jpg", Sha256::digest(source_url.as_bytes()))
}

/// Somewhere to publish processed images.
pub trait ImageHost {
    /// Upload a JPEG and return its public URL.
    async fn upload(&self, file_name: &str, jpeg: Vec<u8>) -> Result<String, ImageError>;
}

/// Cloudinary unsigned upload via an upload preset.
pub struct CloudinaryHost {
    client: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryHost {
    pub fn new(client: reqwest::Client, cloud_name: String, upload_preset: String, folder: String) -> Self {
        Self {
            client,
            cloud_name,
            upload_preset,
            folder,
        }
    }

    fn upload_url(&self) -> String {
        format!("https://api.cloudinary.com/v1_1/{}/image/upload", self.cloud_name)
    }
}

impl fmt::Debug for CloudinaryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryHost")
            .field("cloud_name", &self.cloud_name)
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

impl ImageHost for CloudinaryHost {
    #[instrument(level = "debug", skip(self, jpeg), fields(bytes = jpeg.len()))]
    async fn upload(&self, file_name: &str, jpeg: Vec<u8>) -> Result<String, ImageError> {
        let part = reqwest::multipart::Part::bytes(jpeg)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", self.folder.clone());

        let response = self.client.post(self.upload_url()).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Upload(format!(
                "HTTP {}: {}",
                status.as_u16(),
                crate::utils::truncate_for_log(&body, 200)
            )));
        }
        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.secure_url)
    }
}

/// Counts from one image pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

async fn process_one<F: Fetcher, H: ImageHost>(
    fetcher: &F,
    host: &H,
    source_url: &str,
) -> Result<String, ImageError> {
    let bytes = fetcher.fetch_bytes(source_url).await?;
    let jpeg = crop_to_2x1(&bytes)?;
    host.upload(&file_name_for(source_url), jpeg).await
}

/// Crop and re-host every row that still needs it.
#[instrument(level = "info", skip_all)]
pub async fn process_rows<S, F, H>(store: &mut S, fetcher: &F, host: &H) -> Result<ImageSummary, StoreError>
where
    S: RowStore,
    F: Fetcher,
    H: ImageHost,
{
    store.ensure_field(FIELD_CROPPED_IMAGE_URL).await?;
    let rows = store.rows().await?;
    let mut summary = ImageSummary::default();

    for row in rows {
        let Some(source_url) = row.image_url.as_deref().filter(|_| row.needs_crop()) else {
            summary.skipped += 1;
            continue;
        };

        info!(row = %row.id, "Processing image");
        match process_one(fetcher, host, source_url).await {
            Ok(public_url) => {
                store
                    .write_field(&row.id, FIELD_CROPPED_IMAGE_URL, &public_url)
                    .await?;
                summary.processed += 1;
            }
            Err(e) => {
                warn!(row = %row.id, url = %source_url, error = %e, "Image processing failed");
                store
                    .write_field(&row.id, FIELD_CROPPED_IMAGE_URL, &format!("Error: {e}"))
                    .await?;
                summary.failed += 1;
            }
        }
    }

    info!(
        processed = summary.processed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Image pass finished"
    );
    Ok(summary)
}
