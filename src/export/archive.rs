use anyhow::{anyhow, Context, Result};
use std::io::{Cursor, Read};
use std::path::Path;

use super::{ExportImage, LibraryExport};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Splits a downloaded export zip into its JSON document (the first `.json`
/// entry) and its thumbnail images.
pub fn unpack_export(zip_bytes: Vec<u8>) -> Result<LibraryExport> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(zip_bytes)).context("Export is not a valid zip archive")?;

    let mut document: Option<Vec<u8>> = None;
    let mut images = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {i}"))?;
        if entry.is_dir() {
            continue;
        }
        let file_name = Path::new(entry.name())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let ext = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if ext == "json" && document.is_none() {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("Failed to read {file_name}"))?;
            tracing::debug!("Export document: {}", file_name);
            document = Some(buf);
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("Failed to read {file_name}"))?;
            images.push(ExportImage { file_name, bytes });
        }
    }

    let document = document.ok_or_else(|| anyhow!("Export archive contains no JSON document"))?;
    Ok(LibraryExport { document, images })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn splits_document_and_images() {
        let bytes = build_zip(&[
            ("Library - Movies - All [1].json", b"[]"),
            ("Library - Movies - All [1].images/Heat [42].thumb.jpg", b"jpg"),
            ("Library - Movies - All [1].images/notes.txt", b"skip"),
        ]);
        let export = unpack_export(bytes).unwrap();
        assert_eq!(export.document, b"[]");
        assert_eq!(export.images.len(), 1);
        assert_eq!(export.images[0].file_name, "Heat [42].thumb.jpg");
        assert_eq!(export.images[0].rating_key(), Some("42"));
    }

    #[test]
    fn archive_without_document_is_an_error() {
        let bytes = build_zip(&[("poster.png", b"png")]);
        let err = unpack_export(bytes).unwrap_err();
        assert!(err.to_string().contains("no JSON document"));
    }
}
