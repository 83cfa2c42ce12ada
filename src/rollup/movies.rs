use serde::Serialize;
use serde_json::Value;

use super::{decode, label_of, raw_label, EntityLevel, Rollup, RunReport};
use crate::error::SkipReason;
use crate::facts::extract_leaf_facts;
use crate::format::{format_codec, format_duration, format_resolution, format_size, DurationStyle};
use crate::models::{Movie, RatingKey};

const DURATION_STYLE: DurationStyle = DurationStyle::RoundedMinutes;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub rating_key: RatingKey,
    pub title: String,
    pub year: Option<i32>,
    pub content_rating: Option<String>,
    pub duration_human: Option<String>,
    pub audio_codec: Option<String>,
    pub container: Option<String>,
    pub video_codec: Option<String>,
    pub video_resolution: Option<String>,
    pub size_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieLibraryMetadata {
    pub total_movies: usize,
    pub total_size_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDocument {
    pub metadata: MovieLibraryMetadata,
    pub movies: Vec<MovieSummary>,
}

/// Running totals for a movie library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovieTotals {
    pub movies: usize,
    pub size_bytes: u64,
}

impl MovieTotals {
    pub fn merge(self, other: MovieTotals) -> MovieTotals {
        MovieTotals {
            movies: self.movies + other.movies,
            size_bytes: self.size_bytes + other.size_bytes,
        }
    }

    fn metadata(&self) -> MovieLibraryMetadata {
        MovieLibraryMetadata {
            total_movies: self.movies,
            total_size_human: format_size(self.size_bytes),
        }
    }
}

pub fn rollup_movies(records: Vec<Value>) -> Rollup<MovieDocument> {
    let mut report = RunReport {
        total: records.len(),
        ..RunReport::default()
    };
    let mut totals = MovieTotals::default();
    let mut movies = Vec::with_capacity(records.len());

    for value in records {
        let label = raw_label(&value);
        let movie: Movie = match decode(value) {
            Ok(m) => m,
            Err(reason) => {
                report.skip(EntityLevel::Movie, label, reason);
                continue;
            }
        };
        match summarize_movie(&movie) {
            Ok((summary, size_bytes)) => {
                totals = totals.merge(MovieTotals {
                    movies: 1,
                    size_bytes,
                });
                movies.push(summary);
            }
            Err(reason) => {
                let label = label_of(movie.title.as_deref(), movie.rating_key.as_ref());
                report.skip(EntityLevel::Movie, label, reason);
            }
        }
    }

    report.processed = movies.len();
    Rollup {
        document: MovieDocument {
            metadata: totals.metadata(),
            movies,
        },
        report,
    }
}

fn summarize_movie(movie: &Movie) -> Result<(MovieSummary, u64), SkipReason> {
    let rating_key = movie
        .rating_key
        .clone()
        .ok_or(SkipReason::MissingRequiredField("ratingKey"))?;
    let title = movie
        .title
        .clone()
        .ok_or(SkipReason::MissingRequiredField("title"))?;
    let facts = extract_leaf_facts(movie.media.as_deref())?;

    let duration = movie
        .duration
        .or_else(|| (facts.duration_ms > 0).then_some(facts.duration_ms));

    let summary = MovieSummary {
        rating_key,
        title,
        year: movie.year,
        content_rating: movie.content_rating.clone(),
        duration_human: duration.map(|ms| format_duration(ms, DURATION_STYLE)),
        audio_codec: format_codec(facts.audio_codec.as_deref()),
        container: facts.container.clone(),
        video_codec: format_codec(facts.video_codec.as_deref()),
        video_resolution: format_resolution(facts.resolution.as_deref()),
        size_human: format_size(facts.size_bytes),
    };
    Ok((summary, facts.size_bytes))
}
