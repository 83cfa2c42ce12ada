//! Library rollups: fold a raw export document into its reference document.
//!
//! Each pipeline is a single pass over an in-memory document. Per-entity
//! problems are logged, recorded in the [`RunReport`] and skipped; only a
//! document that is not an array of objects aborts a run.
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::{RollupError, SkipReason};
use crate::models::RatingKey;

mod collab;
pub mod movies;
pub mod music;
pub mod shows;

pub use collab::{split_collaborators, Attribution, CollaboratorIndex};
pub use movies::{rollup_movies, MovieDocument, MovieLibraryMetadata, MovieSummary};
pub use music::{
    rollup_music, AlbumSummary, ArtistSummary, MusicDocument, MusicLibraryMetadata,
};
pub use shows::{rollup_shows, SeasonSummary, ShowDocument, ShowLibraryMetadata, ShowSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    Movies,
    Shows,
    Music,
}

impl LibraryKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            LibraryKind::Movies => "Movies",
            LibraryKind::Shows => "TV Shows",
            LibraryKind::Music => "Music",
        }
    }

    /// File name of the reference document written for this library.
    pub fn reference_file_name(&self) -> &'static str {
        match self {
            LibraryKind::Movies => "movies_ref.json",
            LibraryKind::Shows => "tvshows_ref.json",
            LibraryKind::Music => "music_ref.json",
        }
    }

    /// File name of the raw export document for this library.
    pub fn export_file_name(&self) -> String {
        format!("Library - {} - All.json", self.display_name())
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for LibraryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movies" | "movie" => Ok(LibraryKind::Movies),
            "shows" | "show" | "tv" | "tv shows" | "tvshows" => Ok(LibraryKind::Shows),
            "music" => Ok(LibraryKind::Music),
            other => Err(format!("unknown library kind '{other}'")),
        }
    }
}

/// Which level of the hierarchy a skipped entity lived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLevel {
    Movie,
    Show,
    Episode,
    Artist,
    Album,
}

impl fmt::Display for EntityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityLevel::Movie => "movie",
            EntityLevel::Show => "show",
            EntityLevel::Episode => "episode",
            EntityLevel::Artist => "artist",
            EntityLevel::Album => "album",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntity {
    pub level: EntityLevel,
    pub label: String,
    pub reason: SkipReason,
}

/// Side channel of a rollup run: how many top-level records went in, how many
/// made it into the document, and everything that was skipped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub processed: usize,
    pub skipped: Vec<SkippedEntity>,
}

impl RunReport {
    pub(crate) fn skip(&mut self, level: EntityLevel, label: String, reason: SkipReason) {
        tracing::warn!("Skipping {} '{}': {}", level, label, reason);
        self.skipped.push(SkippedEntity {
            level,
            label,
            reason,
        });
    }

    pub fn merge(&mut self, other: RunReport) {
        self.total += other.total;
        self.processed += other.processed;
        self.skipped.extend(other.skipped);
    }

    pub fn summary(&self) -> String {
        format!(
            "processed {} of {}, skipped {}",
            self.processed,
            self.total,
            self.skipped.len()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Rollup<D> {
    pub document: D,
    pub report: RunReport,
}

/// Reference document of any library kind, serialized as its inner document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LibraryDocument {
    Movies(MovieDocument),
    Shows(ShowDocument),
    Music(MusicDocument),
}

/// Parses `bytes` and runs the pipeline for `kind`.
pub fn rollup_library(
    kind: LibraryKind,
    bytes: &[u8],
) -> Result<Rollup<LibraryDocument>, RollupError> {
    let records = parse_document(bytes)?;
    let Rollup { document, report } = match kind {
        LibraryKind::Movies => {
            let r = rollup_movies(records);
            Rollup {
                document: LibraryDocument::Movies(r.document),
                report: r.report,
            }
        }
        LibraryKind::Shows => {
            let r = rollup_shows(records);
            Rollup {
                document: LibraryDocument::Shows(r.document),
                report: r.report,
            }
        }
        LibraryKind::Music => {
            let r = rollup_music(records);
            Rollup {
                document: LibraryDocument::Music(r.document),
                report: r.report,
            }
        }
    };
    info!("{} rollup: {}", kind, report.summary());
    Ok(Rollup { document, report })
}

/// Checks the document shape: a JSON array whose elements are all objects.
/// Anything else is fatal for the library.
pub fn parse_document(bytes: &[u8]) -> Result<Vec<Value>, RollupError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| RollupError::MalformedInput(format!("invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(RollupError::MalformedInput(
            "top-level value is not an array".to_string(),
        ));
    };
    if let Some(pos) = items.iter().position(|v| !v.is_object()) {
        return Err(RollupError::MalformedInput(format!(
            "element {pos} is not an object"
        )));
    }
    Ok(items)
}

/// Decodes one record; a type mismatch only costs that record.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, SkipReason> {
    serde_json::from_value(value).map_err(|e| SkipReason::InvalidRecord(e.to_string()))
}

/// Best available name for log lines and skip records.
pub(crate) fn label_of(title: Option<&str>, rating_key: Option<&RatingKey>) -> String {
    title
        .map(|t| t.to_string())
        .or_else(|| rating_key.map(|k| k.to_string()))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Label for a record that failed to decode, read straight from the JSON.
pub(crate) fn raw_label(value: &Value) -> String {
    value
        .get("title")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .or_else(|| value.get("ratingKey").map(|k| k.to_string()))
        .unwrap_or_else(|| "Unknown".to_string())
}
