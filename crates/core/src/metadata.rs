use crate::exif_reader::read_exif_fields;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".tiff", ".heic", ".png"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub extension: String,
    pub size: u64,
    pub created_at: Option<DateTime<Local>>,
    pub modified_at: DateTime<Local>,
    pub capture_date: Option<DateTime<Local>>,
    pub camera_model: Option<String>,
    pub gps_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Local>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl FileMetadata {
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "filename" => Some(FieldValue::Text(self.filename.clone())),
            "extension" => Some(FieldValue::Text(self.extension.clone())),
            "size" => Some(FieldValue::Integer(
                i64::try_from(self.size).unwrap_or(i64::MAX),
            )),
            "created_at" => self.created_at.map(FieldValue::Timestamp),
            "modified_at" => Some(FieldValue::Timestamp(self.modified_at)),
            "capture_date" => self.capture_date.map(FieldValue::Timestamp),
            "camera_model" => self.camera_model.clone().map(FieldValue::Text),
            "gps_info" => self.gps_info.clone().map(FieldValue::Text),
            _ => None,
        }
    }

    pub fn file_stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|v| v.to_str())
            .unwrap_or(&self.filename)
    }

    pub fn is_image(&self) -> bool {
        IMAGE_EXTENSIONS.contains(&self.extension.as_str())
    }
}

pub fn extract_metadata(path: &Path) -> Option<FileMetadata> {
    let stat = match fs::metadata(path) {
        Ok(stat) => stat,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "メタデータを取得できませんでした");
            return None;
        }
    };

    let filename = path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|v| format!(".{}", v.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    let modified_at = stat
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());
    let created_at = stat.created().ok().map(DateTime::<Local>::from);

    let mut metadata = FileMetadata {
        filename,
        extension,
        size: stat.len(),
        created_at,
        modified_at,
        capture_date: None,
        camera_model: None,
        gps_info: None,
    };

    if metadata.is_image() {
        match read_exif_fields(path) {
            Ok(fields) => {
                metadata.capture_date = fields.capture_date;
                metadata.camera_model = fields.camera_model;
                metadata.gps_info = fields.gps_info;
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "EXIFなしとして扱います");
            }
        }
    }

    if metadata.capture_date.is_none() {
        metadata.capture_date = Some(metadata.modified_at);
    }

    Some(metadata)
}
