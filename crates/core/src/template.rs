use crate::metadata::FileMetadata;
use crate::sanitize::sanitize_component;
use chrono::{DateTime, Datelike, Local, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Extension,
    Camera,
    Filename,
}

pub const TOKENS: &[Token] = &[
    Token::Year,
    Token::Month,
    Token::Day,
    Token::Hour,
    Token::Minute,
    Token::Second,
    Token::Extension,
    Token::Camera,
    Token::Filename,
];

pub const UNKNOWN_CAMERA: &str = "UnknownCamera";
pub const UNKNOWN_FILE: &str = "UnknownFile";

impl Token {
    pub fn placeholder(self) -> &'static str {
        match self {
            Token::Year => "{year}",
            Token::Month => "{month}",
            Token::Day => "{day}",
            Token::Hour => "{hour}",
            Token::Minute => "{minute}",
            Token::Second => "{second}",
            Token::Extension => "{extension}",
            Token::Camera => "{camera}",
            Token::Filename => "{filename}",
        }
    }

    fn value(self, metadata: &FileMetadata, date: Option<DateTime<Local>>) -> String {
        match self {
            Token::Year => date.map_or("YYYY".to_string(), |d| format!("{:04}", d.year())),
            Token::Month => date.map_or("MM".to_string(), |d| format!("{:02}", d.month())),
            Token::Day => date.map_or("DD".to_string(), |d| format!("{:02}", d.day())),
            Token::Hour => date.map_or("HH".to_string(), |d| format!("{:02}", d.hour())),
            Token::Minute => date.map_or("mm".to_string(), |d| format!("{:02}", d.minute())),
            Token::Second => date.map_or("ss".to_string(), |d| format!("{:02}", d.second())),
            Token::Extension => metadata.extension.trim_start_matches('.').to_string(),
            Token::Camera => metadata
                .camera_model
                .clone()
                .unwrap_or_else(|| UNKNOWN_CAMERA.to_string()),
            Token::Filename => {
                let stem = metadata.file_stem();
                if stem.is_empty() {
                    UNKNOWN_FILE.to_string()
                } else {
                    stem.to_string()
                }
            }
        }
    }
}

pub fn normalize_separators(pattern: &str) -> String {
    pattern.replace('\\', "/")
}

pub fn render_destination(pattern: &str, metadata: &FileMetadata) -> String {
    let date = metadata.capture_date.or(metadata.created_at);

    let mut output = pattern.to_string();
    for token in TOKENS {
        if !output.contains(token.placeholder()) {
            continue;
        }
        let value = sanitize_component(&token.value(metadata, date));
        output = output.replace(token.placeholder(), &value);
    }
    output
}

pub fn unknown_placeholders(pattern: &str) -> Vec<String> {
    let mut unknown = Vec::new();
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let candidate = &rest[start..start + len + 1];
        if !TOKENS.iter().any(|t| t.placeholder() == candidate) {
            unknown.push(candidate.to_string());
        }
        rest = &rest[start + len + 1..];
    }
    unknown
}
