//! Subcommand handlers. Each takes the restored session, runs one desk
//! operation and renders the result.

pub mod admin;
pub mod auth;
pub mod doctor;
pub mod patient;
pub mod pharmacist;

use std::path::{Path, PathBuf};

use mediplus_client::{DeskError, SessionError};
use mediplus_core::LowStockReport;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Desk(#[from] DeskError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload held: {0}. Re-run with --force to upload anyway")]
    LowStock(LowStockReport),

    #[error("Queue subscription stopped")]
    SubscriptionClosed,
}

async fn read_file(path: &Path) -> Result<Vec<u8>, CommandError> {
    tokio::fs::read(path).await.map_err(|source| CommandError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CommandError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| CommandError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned())
}

/// Where to save a download: `--out`, else the server's name, else `<id>.pdf`.
fn download_target(out: Option<PathBuf>, server_name: Option<&str>, id: &str) -> PathBuf {
    out.unwrap_or_else(|| {
        server_name
            .and_then(|n| Path::new(n).file_name())
            .map_or_else(|| PathBuf::from(format!("{id}.pdf")), PathBuf::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_target() {
        assert_eq!(
            download_target(Some(PathBuf::from("x.pdf")), Some("rx.pdf"), "1"),
            PathBuf::from("x.pdf")
        );
        assert_eq!(
            download_target(None, Some("../../etc/rx.pdf"), "1"),
            PathBuf::from("rx.pdf")
        );
        assert_eq!(download_target(None, None, "abc"), PathBuf::from("abc.pdf"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/stock.csv")), "stock.csv");
    }
}
