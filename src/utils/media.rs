use std::path::Path;

use axum::body::Bytes;
use axum_extra::extract::Multipart;
use tokio::fs;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    utils::validation::image_extension,
};

pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Pulls the file part named `field` out of a multipart body.
pub async fn read_image_field(mut multipart: Multipart, field: &str) -> AppResult<Option<ImageUpload>> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::validation("Malformed multipart body."))?
    {
        if part.name() != Some(field) {
            continue;
        }

        let filename = part.file_name().map(|s| s.to_string());
        let data = part
            .bytes()
            .await
            .map_err(|_| AppError::validation("Malformed multipart body."))?;

        if let Some(filename) = filename {
            if !data.is_empty() {
                return Ok(Some(ImageUpload { filename, data }));
            }
        }
    }

    Ok(None)
}

/// Writes the image under `<media_root>/<folder>/` with a random name and
/// returns the public `/media/...` path.
pub async fn save_image(
    media_root: &Path,
    folder: &str,
    upload: ImageUpload,
    invalid_message: &str,
) -> AppResult<String> {
    let extension = image_extension(&upload.filename)
        .ok_or_else(|| AppError::validation(invalid_message))?;

    let target_dir = media_root.join(folder);
    if !target_dir.exists() {
        fs::create_dir_all(&target_dir).await?;
    }

    let file_name = format!("{}.{}", Uuid::new_v4(), extension);
    fs::write(target_dir.join(&file_name), &upload.data).await?;

    Ok(format!("/media/{}/{}", folder, file_name))
}
