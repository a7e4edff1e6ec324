use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the I/O layer and configuration loading.
///
/// Problems found *inside* the mod graph are not errors in this sense; they are
/// accumulated as [`crate::model::Problem`] records and inspected after a rebuild.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot walk mods root: {0}")]
    Walk(#[from] walkdir::Error),
}
