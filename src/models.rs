//! Raw library export records. Every field is optional; required fields are
//! checked by the rollup pipelines, not here.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plex rating key. Tautulli exports encode it as a number, the catalog API as
/// a string; whichever was read is written back out unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingKey {
    Number(u64),
    Text(String),
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingKey::Number(n) => write!(f, "{n}"),
            RatingKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub size: Option<u64>,
    pub container: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub video_resolution: Option<String>,
    pub container: Option<String>,
    pub duration: Option<u64>,
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub rating_key: Option<RatingKey>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub content_rating: Option<String>,
    pub duration: Option<u64>,
    pub media: Option<Vec<Media>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub rating_key: Option<RatingKey>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<u64>,
    pub media: Option<Vec<Media>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub rating_key: Option<RatingKey>,
    pub season_number: Option<i32>,
    pub episodes: Option<Vec<Episode>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub rating_key: Option<RatingKey>,
    pub title: Option<String>,
    pub content_rating: Option<String>,
    pub season_count: Option<u32>,
    pub duration: Option<u64>,
    pub seasons: Option<Vec<Season>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub rating_key: Option<RatingKey>,
    pub title: Option<String>,
    pub media: Option<Vec<Media>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub rating_key: Option<RatingKey>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub tracks: Option<Vec<Track>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub rating_key: Option<RatingKey>,
    pub title: Option<String>,
    pub albums: Option<Vec<Album>>,
}
