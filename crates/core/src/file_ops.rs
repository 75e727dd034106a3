use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Done,
    Conflict,
}

#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("元ファイルが存在しません: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("{action}に失敗しました: {} -> {}: {source}", .from.display(), .to.display())]
    Io {
        action: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn copy_file(source: &Path, dest: &Path, overwrite: bool) -> Result<Transfer, FileOpError> {
    if !source.exists() {
        return Err(FileOpError::SourceMissing(source.to_path_buf()));
    }
    if !overwrite && dest.exists() {
        return Ok(Transfer::Conflict);
    }

    let io_err = |source_err| FileOpError::Io {
        action: "コピー",
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: source_err,
    };

    ensure_parent_dir(dest).map_err(io_err)?;
    fs::copy(source, dest).map_err(io_err)?;
    preserve_times(source, dest).map_err(io_err)?;
    Ok(Transfer::Done)
}

pub fn move_file(source: &Path, dest: &Path, overwrite: bool) -> Result<Transfer, FileOpError> {
    if !source.exists() {
        return Err(FileOpError::SourceMissing(source.to_path_buf()));
    }
    if !overwrite && dest.exists() {
        return Ok(Transfer::Conflict);
    }

    let io_err = |source_err| FileOpError::Io {
        action: "移動",
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: source_err,
    };

    ensure_parent_dir(dest).map_err(io_err)?;
    if let Err(err) = fs::rename(source, dest) {
        tracing::debug!(error = %err, "renameに失敗したためコピーと削除で移動します");
        fs::copy(source, dest).map_err(io_err)?;
        preserve_times(source, dest).map_err(io_err)?;
        fs::remove_file(source).map_err(io_err)?;
    }
    Ok(Transfer::Done)
}

fn ensure_parent_dir(dest: &Path) -> io::Result<()> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn preserve_times(source: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
}
