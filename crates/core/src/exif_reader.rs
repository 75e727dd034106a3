use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifFields {
    pub capture_date: Option<DateTime<Local>>,
    pub camera_model: Option<String>,
    pub gps_info: Option<String>,
}

pub fn read_exif_fields(path: &Path) -> Result<ExifFields> {
    let file = File::open(path)
        .with_context(|| format!("EXIF読み込み対象を開けませんでした: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))?;

    let capture_date = ascii_value(&exif, Tag::DateTimeOriginal)
        .or_else(|| ascii_value(&exif, Tag::DateTimeDigitized))
        .and_then(|raw| {
            let parsed = parse_capture_date(&raw);
            if parsed.is_none() {
                tracing::warn!(path = %path.display(), value = %raw, "撮影日時を解釈できませんでした");
            }
            parsed
        });

    let camera_model = normalize(ascii_value(&exif, Tag::Model));

    let gps_info = match (
        display_value(&exif, Tag::GPSLatitude),
        display_value(&exif, Tag::GPSLongitude),
    ) {
        (Some(lat), Some(lon)) => Some(format!("{lat}, {lon}")),
        _ => None,
    };

    Ok(ExifFields {
        capture_date,
        camera_model,
        gps_info,
    })
}

pub fn parse_capture_date(input: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(input, EXIF_DATE_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ascii_value(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
        _ => None,
    }
}

fn display_value(exif: &Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|field| field.display_value().with_unit(exif).to_string())
}
