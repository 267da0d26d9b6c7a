//! File-type and size rules for admin uploads, plus storage key derivation.

use std::path::Path;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::UploadKind;

pub const MAX_GALLERY_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_MODPACK_BYTES: usize = 256 * 1024 * 1024;

const GALLERY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const MODPACK_EXTENSIONS: &[&str] = &["zip", "mrpack", "jar"];

impl UploadKind {
    pub fn max_bytes(self) -> usize {
        match self {
            UploadKind::Gallery => MAX_GALLERY_BYTES,
            UploadKind::Modpack => MAX_MODPACK_BYTES,
        }
    }

    fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Gallery => GALLERY_EXTENSIONS,
            UploadKind::Modpack => MODPACK_EXTENSIONS,
        }
    }

    /// Prefix of every storage key for this kind.
    pub fn key_prefix(self) -> &'static str {
        match self {
            UploadKind::Gallery => "gallery",
            UploadKind::Modpack => "modpacks",
        }
    }
}

impl FromStr for UploadKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gallery" => Ok(UploadKind::Gallery),
            "modpack" => Ok(UploadKind::Modpack),
            other => Err(AppError::Validation(format!("Unknown upload kind '{}'", other))),
        }
    }
}

/// Lowercase extension of `filename`, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Strips any directory components a client put in the filename.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .unwrap_or("upload")
        .to_string()
}

/// validate_upload
///
/// Checks a file against the rules for its kind: non-empty, within the size limit,
/// an allowed extension, and for gallery images an `image/*` content type.
pub fn validate_upload(
    kind: UploadKind,
    filename: &str,
    content_type: &str,
    size: usize,
) -> Result<String, AppError> {
    if size == 0 {
        return Err(AppError::Validation("File is empty".to_string()));
    }
    if size > kind.max_bytes() {
        return Err(AppError::Validation(format!(
            "File exceeds the {} MiB limit",
            kind.max_bytes() / (1024 * 1024)
        )));
    }

    let extension = extension_of(filename)
        .filter(|ext| kind.allowed_extensions().contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported file type; expected one of: {}",
                kind.allowed_extensions().join(", ")
            ))
        })?;

    if kind == UploadKind::Gallery && !content_type.starts_with("image/") {
        return Err(AppError::Validation(
            "Gallery uploads must be images".to_string(),
        ));
    }

    Ok(extension)
}

/// Builds a collision-free object key such as `gallery/<uuid>.png`.
pub fn storage_key(kind: UploadKind, extension: &str) -> String {
    format!("{}/{}.{}", kind.key_prefix(), Uuid::new_v4(), extension)
}
