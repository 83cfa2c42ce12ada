//! Where raw library exports come from.
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::rollup::LibraryKind;
use crate::thumbs::rating_key_from_image_name;

mod archive;
mod plex;
mod retry;
mod tautulli;

pub use archive::unpack_export;
pub use plex::{PlexClient, PlexConfig};
pub use tautulli::{TautulliClient, TautulliConfig};

/// A complete raw export for one library.
#[derive(Debug, Clone, Default)]
pub struct LibraryExport {
    pub document: Vec<u8>,
    pub images: Vec<ExportImage>,
}

/// A thumbnail shipped alongside an export, named `"... [ratingKey].thumb.jpg"`.
#[derive(Debug, Clone)]
pub struct ExportImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportImage {
    pub fn rating_key(&self) -> Option<&str> {
        rating_key_from_image_name(&self.file_name)
    }
}

#[async_trait]
pub trait ExportProvider: Send + Sync {
    /// Yields the complete export for `kind`, or a terminal failure.
    async fn fetch(&self, kind: LibraryKind) -> Result<LibraryExport>;
}

/// Reads previously downloaded exports from `dir`, one
/// `"Library - {name} - All.json"` per library.
#[derive(Debug, Clone)]
pub struct FileExportProvider {
    dir: PathBuf,
}

impl FileExportProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ExportProvider for FileExportProvider {
    async fn fetch(&self, kind: LibraryKind) -> Result<LibraryExport> {
        let path = self.dir.join(kind.export_file_name());
        let document = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read export {}", path.display()))?;
        tracing::info!("Loaded {} export from {}", kind, path.display());
        Ok(LibraryExport {
            document,
            images: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_provider_reads_library_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Library - Music - All.json"), b"[]").unwrap();
        let provider = FileExportProvider::new(dir.path());

        let export = provider.fetch(LibraryKind::Music).await.unwrap();
        assert_eq!(export.document, b"[]");
        assert!(export.images.is_empty());

        let err = provider.fetch(LibraryKind::Movies).await.unwrap_err();
        assert!(err.to_string().contains("Library - Movies - All.json"));
    }

    #[test]
    fn export_image_exposes_rating_key() {
        let image = ExportImage {
            file_name: "Heat (1995) [4242].thumb.jpg".to_string(),
            bytes: Vec::new(),
        };
        assert_eq!(image.rating_key(), Some("4242"));
    }
}
