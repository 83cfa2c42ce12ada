use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::collab::{Attribution, CollaboratorIndex};
use super::{decode, label_of, raw_label, EntityLevel, Rollup, RunReport};
use crate::error::SkipReason;
use crate::format::{format_duration, format_size, DurationStyle};
use crate::models::{Album, Artist, RatingKey};
use crate::reduce::{aggregate_unique, year_range};

const DURATION_STYLE: DurationStyle = DurationStyle::Bucketed;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub rating_key: RatingKey,
    pub title: String,
    pub year: Option<i32>,
    pub track_count: usize,
    pub size_human: String,
    pub total_size_bytes: u64,
    pub duration_human: String,
    pub unique_containers: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub artist_name: String,
    pub rating_key: Option<RatingKey>,
    pub album_count: usize,
    pub track_count: usize,
    pub size_human: String,
    pub total_size_bytes: u64,
    pub year_range: Option<String>,
    pub albums: Vec<AlbumSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicLibraryMetadata {
    pub total_artists: usize,
    pub total_albums: usize,
    pub total_tracks: usize,
    pub total_size_human: String,
    pub total_duration_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MusicDocument {
    pub metadata: MusicLibraryMetadata,
    pub artists: Vec<ArtistSummary>,
}

/// Library-wide music totals. Albums, tracks and size count each album once;
/// duration counts it once per attribution event, so a collaboration album
/// adds its duration for every collaborator it is credited to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MusicTotals {
    pub albums: usize,
    pub tracks: usize,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

impl MusicTotals {
    pub fn merge(self, other: MusicTotals) -> MusicTotals {
        MusicTotals {
            albums: self.albums + other.albums,
            tracks: self.tracks + other.tracks,
            size_bytes: self.size_bytes + other.size_bytes,
            duration_ms: self.duration_ms + other.duration_ms,
        }
    }
}

/// Facts of one album summed over every track, media and part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumStats {
    pub size_bytes: u64,
    pub duration_ms: u64,
    pub track_count: usize,
    pub unique_containers: String,
}

pub fn album_stats(album: &Album) -> AlbumStats {
    let tracks = album.tracks.as_deref().unwrap_or_default();
    let mut size_bytes = 0u64;
    let mut duration_ms = 0u64;
    let mut containers: Vec<Option<&str>> = Vec::new();

    for media in tracks.iter().flat_map(|t| t.media.as_deref().unwrap_or_default()) {
        duration_ms += media.duration.unwrap_or(0);
        for part in media.parts.as_deref().unwrap_or_default() {
            size_bytes += part.size.unwrap_or(0);
            containers.push(part.container.as_deref().or(media.container.as_deref()));
        }
    }

    AlbumStats {
        size_bytes,
        duration_ms,
        track_count: tracks.len(),
        unique_containers: aggregate_unique(containers),
    }
}

/// One output artist and the albums credited to it so far.
#[derive(Debug)]
struct Bucket {
    name: String,
    albums: Vec<AlbumSummary>,
    tracks: usize,
    size_bytes: u64,
}

/// Buckets in first-attribution order.
#[derive(Debug, Default)]
struct Buckets {
    order: Vec<Bucket>,
    by_name: HashMap<String, usize>,
}

impl Buckets {
    fn credit(&mut self, name: &str, album: &AlbumSummary) {
        let idx = match self.by_name.get(name) {
            Some(&idx) => idx,
            None => {
                self.order.push(Bucket {
                    name: name.to_string(),
                    albums: Vec::new(),
                    tracks: 0,
                    size_bytes: 0,
                });
                self.by_name.insert(name.to_string(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        let bucket = &mut self.order[idx];
        bucket.tracks += album.track_count;
        bucket.size_bytes += album.total_size_bytes;
        bucket.albums.push(album.clone());
    }

    fn into_summaries(self, index: &CollaboratorIndex) -> Vec<ArtistSummary> {
        self.order
            .into_iter()
            .map(|b| ArtistSummary {
                rating_key: index.rating_key(&b.name).cloned(),
                album_count: b.albums.len(),
                track_count: b.tracks,
                size_human: format_size(b.size_bytes),
                total_size_bytes: b.size_bytes,
                year_range: year_range(b.albums.iter().map(|a| a.year)),
                artist_name: b.name,
                albums: b.albums,
            })
            .collect()
    }
}

pub fn rollup_music(records: Vec<Value>) -> Rollup<MusicDocument> {
    let mut report = RunReport {
        total: records.len(),
        ..RunReport::default()
    };

    // Collaborators resolve against every input record, decodable or not, and
    // may only appear later in the document.
    let index = CollaboratorIndex::from_records(&records);

    let mut artists: Vec<(String, Artist)> = Vec::with_capacity(records.len());
    for value in records {
        let label = raw_label(&value);
        match decode::<Artist>(value) {
            Ok(artist) => match artist.title.clone() {
                Some(title) => artists.push((title, artist)),
                None => {
                    let label = label_of(None, artist.rating_key.as_ref());
                    report.skip(
                        EntityLevel::Artist,
                        label,
                        SkipReason::MissingRequiredField("title"),
                    );
                }
            },
            Err(reason) => report.skip(EntityLevel::Artist, label, reason),
        }
    }

    let mut totals = MusicTotals::default();
    let mut buckets = Buckets::default();
    for (title, artist) in &artists {
        let attribution = index.attribute(title);
        for album in artist.albums.as_deref().unwrap_or_default() {
            let (summary, stats) = match summarize_album(album) {
                Ok(s) => s,
                Err(reason) => {
                    let label = format!(
                        "{} - {}",
                        title,
                        label_of(album.title.as_deref(), album.rating_key.as_ref())
                    );
                    report.skip(EntityLevel::Album, label, reason);
                    continue;
                }
            };

            let credited: &[String] = match &attribution {
                Attribution::Direct(name) => std::slice::from_ref(name),
                Attribution::Collaborators(names) => names,
            };
            for name in credited {
                buckets.credit(name, &summary);
            }

            totals = totals.merge(MusicTotals {
                albums: 1,
                tracks: stats.track_count,
                size_bytes: stats.size_bytes,
                duration_ms: stats.duration_ms * credited.len() as u64,
            });
        }
    }
    report.processed = artists.len();

    let artists = buckets.into_summaries(&index);
    let metadata = MusicLibraryMetadata {
        total_artists: artists.len(),
        total_albums: totals.albums,
        total_tracks: totals.tracks,
        total_size_human: format_size(totals.size_bytes),
        total_duration_human: format_duration(totals.duration_ms, DURATION_STYLE),
    };
    Rollup {
        document: MusicDocument { metadata, artists },
        report,
    }
}

fn summarize_album(album: &Album) -> Result<(AlbumSummary, AlbumStats), SkipReason> {
    let rating_key = album
        .rating_key
        .clone()
        .ok_or(SkipReason::MissingRequiredField("ratingKey"))?;
    let title = album
        .title
        .clone()
        .ok_or(SkipReason::MissingRequiredField("title"))?;
    let stats = album_stats(album);

    let summary = AlbumSummary {
        rating_key,
        title,
        year: album.year,
        track_count: stats.track_count,
        size_human: format_size(stats.size_bytes),
        total_size_bytes: stats.size_bytes,
        duration_human: format_duration(stats.duration_ms, DURATION_STYLE),
        unique_containers: stats.unique_containers.clone(),
    };
    Ok((summary, stats))
}
