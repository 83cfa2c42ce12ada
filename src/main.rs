use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use mediaref::export::{
    ExportProvider, FileExportProvider, LibraryExport, PlexClient, TautulliClient,
};
use mediaref::output::write_document;
use mediaref::thumbs::{ThumbnailTranscoder, WebpTranscoder};
use mediaref::{rollup_library, LibraryKind};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// Previously downloaded "Library - <name> - All.json" files
    File,
    /// A fresh Tautulli metadata export per library
    Tautulli,
    /// Paged reads straight from the Plex catalog API
    Plex,
}

/// Builds the movie, TV and music reference documents from library exports.
#[derive(Debug, Parser)]
#[command(name = "mediaref", version)]
struct Cli {
    #[arg(long, env = "MEDIAREF_SOURCE", value_enum, default_value = "file")]
    source: Source,

    /// Directory holding raw exports (file source)
    #[arg(long, env = "MEDIAREF_INPUT_DIR", default_value = "data/gen")]
    input_dir: PathBuf,

    /// Directory the *_ref.json documents are written to
    #[arg(long, env = "MEDIAREF_OUTPUT_DIR", default_value = "data")]
    output_dir: PathBuf,

    /// Root of the thumbnail folders; thumbnails are skipped when unset
    #[arg(long, env = "MEDIAREF_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "MEDIAREF_LIBRARIES",
        value_delimiter = ',',
        default_value = "movies,shows,music"
    )]
    libraries: Vec<LibraryKind>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn image_folder(root: &Path, kind: LibraryKind) -> PathBuf {
    let name = match kind {
        LibraryKind::Movies => "movie_image",
        LibraryKind::Shows => "tv_image",
        LibraryKind::Music => "music_image",
    };
    root.join(name)
}

async fn transcode_images(
    export: LibraryExport,
    transcoder: &dyn ThumbnailTranscoder,
) -> (usize, usize) {
    let mut converted = 0;
    let mut failed = 0;
    for image in export.images {
        let Some(key) = image.rating_key().map(|k| k.to_string()) else {
            warn!("Skipping image (no rating key): {}", image.file_name);
            continue;
        };
        match transcoder.transcode(&key, image.bytes).await {
            Ok(true) => converted += 1,
            Ok(false) => failed += 1,
            Err(e) => {
                error!("Thumbnail {} failed: {:#}", key, e);
                failed += 1;
            }
        }
    }
    (converted, failed)
}

async fn process_library(
    cli: &Cli,
    provider: &dyn ExportProvider,
    kind: LibraryKind,
) -> Result<()> {
    let mut export = provider.fetch(kind).await?;
    let document = std::mem::take(&mut export.document);
    let rollup = rollup_library(kind, &document)?;

    let path = cli.output_dir.join(kind.reference_file_name());
    write_document(&path, &rollup.document).await?;
    info!("Wrote {} ({})", path.display(), rollup.report.summary());

    if let Some(root) = &cli.image_dir {
        let transcoder = WebpTranscoder::new(image_folder(root, kind));
        let (converted, failed) = transcode_images(export, &transcoder).await;
        info!("{} thumbnails: {} converted, {} failed", kind, converted, failed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = dotenv();
    init_tracing();
    match env_file {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }

    let cli = Cli::parse();
    let provider: Box<dyn ExportProvider> = match cli.source {
        Source::File => Box::new(FileExportProvider::new(&cli.input_dir)),
        Source::Tautulli => Box::new(TautulliClient::from_env()?),
        Source::Plex => Box::new(PlexClient::from_env()?),
    };

    let mut failures = Vec::new();
    for kind in &cli.libraries {
        info!("Processing {} library", kind);
        if let Err(e) = process_library(&cli, provider.as_ref(), *kind).await {
            error!("{} library failed: {:#}", kind, e);
            failures.push(*kind);
        }
    }

    if !failures.is_empty() {
        let names: Vec<_> = failures.iter().map(|k| k.to_string()).collect();
        bail!("Failed libraries: {}", names.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libraries_flag_takes_a_comma_list() {
        let cli = Cli::try_parse_from(["mediaref", "--libraries", "music,tv"]).unwrap();
        assert_eq!(cli.libraries, vec![LibraryKind::Music, LibraryKind::Shows]);
        assert!(Cli::try_parse_from(["mediaref", "--libraries", "podcasts"]).is_err());
    }
}
