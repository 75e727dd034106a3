use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Skip,
    Overwrite,
    RenameTo(PathBuf),
    Error,
}

impl Resolution {
    /// `skip`, `overwrite` and `error` are keywords; anything else is a rename target.
    pub fn parse(answer: &str) -> Self {
        match answer.trim() {
            "skip" => Resolution::Skip,
            "overwrite" => Resolution::Overwrite,
            "error" => Resolution::Error,
            other => Resolution::RenameTo(PathBuf::from(other)),
        }
    }

    pub fn is_blanket_eligible(&self) -> bool {
        matches!(self, Resolution::Skip | Resolution::Overwrite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDecision {
    pub resolution: Resolution,
    #[serde(default)]
    pub apply_to_all: bool,
}

impl ConflictDecision {
    pub fn once(resolution: Resolution) -> Self {
        Self {
            resolution,
            apply_to_all: false,
        }
    }

    pub fn for_all(resolution: Resolution) -> Self {
        Self {
            resolution,
            apply_to_all: true,
        }
    }
}

pub trait ConflictHandler: Send {
    fn resolve(&self, source: &Path, destination: &Path) -> ConflictDecision;
}

impl<F> ConflictHandler for F
where
    F: Fn(&Path, &Path) -> ConflictDecision + Send,
{
    fn resolve(&self, source: &Path, destination: &Path) -> ConflictDecision {
        self(source, destination)
    }
}

pub fn suggest_rename(destination: &Path) -> PathBuf {
    let parent = destination.parent().unwrap_or_else(|| Path::new(""));
    let stem = destination
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = destination
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut n = 1usize;
    loop {
        let mut name = format!("{stem}_{n}");
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
