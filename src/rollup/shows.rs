use serde::Serialize;
use serde_json::Value;

use super::{decode, label_of, raw_label, EntityLevel, Rollup, RunReport};
use crate::error::SkipReason;
use crate::facts::{extract_leaf_facts, LeafFacts};
use crate::format::{format_codec, format_duration, format_resolution, format_size, DurationStyle};
use crate::models::{Episode, RatingKey, Season, Show};
use crate::reduce::{aggregate_unique, year_range};

const DURATION_STYLE: DurationStyle = DurationStyle::RoundedMinutes;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub season_rating_key: Option<RatingKey>,
    pub season_number: Option<i32>,
    pub episode_count: usize,
    pub avg_episode_duration_human: Option<String>,
    pub size_human: String,
    pub unique_resolutions: String,
    pub unique_audio_codecs: String,
    pub unique_video_codecs: String,
    pub unique_containers: String,
    pub year_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSummary {
    pub rating_key: RatingKey,
    pub title: String,
    pub avg_episode_duration_human: Option<String>,
    pub content_rating: Option<String>,
    pub season_count: Option<u32>,
    pub total_episode_count: usize,
    pub size_human: String,
    pub unique_resolutions: String,
    pub unique_audio_codecs: String,
    pub unique_video_codecs: String,
    pub unique_containers: String,
    pub year_range: Option<String>,
    pub seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowLibraryMetadata {
    pub total_shows: usize,
    pub total_seasons: usize,
    pub total_episodes: usize,
    pub total_size_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowDocument {
    pub metadata: ShowLibraryMetadata,
    pub shows: Vec<ShowSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowTotals {
    pub shows: usize,
    pub seasons: usize,
    pub episodes: usize,
    pub size_bytes: u64,
}

impl ShowTotals {
    pub fn merge(self, other: ShowTotals) -> ShowTotals {
        ShowTotals {
            shows: self.shows + other.shows,
            seasons: self.seasons + other.seasons,
            episodes: self.episodes + other.episodes,
            size_bytes: self.size_bytes + other.size_bytes,
        }
    }

    fn metadata(&self) -> ShowLibraryMetadata {
        ShowLibraryMetadata {
            total_shows: self.shows,
            total_seasons: self.seasons,
            total_episodes: self.episodes,
            total_size_human: format_size(self.size_bytes),
        }
    }
}

/// Per-episode display values kept raw (one entry per episode, nulls
/// included) so a parent can re-aggregate over the union of its children.
#[derive(Debug, Clone, Default)]
struct RawValues {
    episodes: usize,
    size_bytes: u64,
    resolutions: Vec<Option<String>>,
    audio_codecs: Vec<Option<String>>,
    video_codecs: Vec<Option<String>>,
    containers: Vec<Option<String>>,
    years: Vec<Option<i32>>,
}

impl RawValues {
    fn push(&mut self, facts: &LeafFacts, year: Option<i32>) {
        self.episodes += 1;
        self.size_bytes += facts.size_bytes;
        self.resolutions
            .push(format_resolution(facts.resolution.as_deref()));
        self.audio_codecs
            .push(format_codec(facts.audio_codec.as_deref()));
        self.video_codecs
            .push(format_codec(facts.video_codec.as_deref()));
        self.containers.push(facts.container.clone());
        self.years.push(year);
    }

    fn extend(&mut self, other: &RawValues) {
        self.episodes += other.episodes;
        self.size_bytes += other.size_bytes;
        self.resolutions.extend(other.resolutions.iter().cloned());
        self.audio_codecs.extend(other.audio_codecs.iter().cloned());
        self.video_codecs.extend(other.video_codecs.iter().cloned());
        self.containers.extend(other.containers.iter().cloned());
        self.years.extend(other.years.iter().copied());
    }

    fn unique_resolutions(&self) -> String {
        aggregate_unique(self.resolutions.iter().map(|v| v.as_deref()))
    }

    fn unique_audio_codecs(&self) -> String {
        aggregate_unique(self.audio_codecs.iter().map(|v| v.as_deref()))
    }

    fn unique_video_codecs(&self) -> String {
        aggregate_unique(self.video_codecs.iter().map(|v| v.as_deref()))
    }

    fn unique_containers(&self) -> String {
        aggregate_unique(self.containers.iter().map(|v| v.as_deref()))
    }

    fn year_range(&self) -> Option<String> {
        year_range(self.years.iter().copied())
    }
}

pub fn rollup_shows(records: Vec<Value>) -> Rollup<ShowDocument> {
    let mut report = RunReport {
        total: records.len(),
        ..RunReport::default()
    };
    let mut totals = ShowTotals::default();
    let mut shows = Vec::with_capacity(records.len());

    for value in records {
        let label = raw_label(&value);
        let show: Show = match decode(value) {
            Ok(s) => s,
            Err(reason) => {
                report.skip(EntityLevel::Show, label, reason);
                continue;
            }
        };
        match summarize_show(&show, &mut report) {
            Ok((summary, show_totals)) => {
                totals = totals.merge(show_totals);
                shows.push(summary);
            }
            Err(reason) => {
                let label = label_of(show.title.as_deref(), show.rating_key.as_ref());
                report.skip(EntityLevel::Show, label, reason);
            }
        }
    }

    report.processed = shows.len();
    Rollup {
        document: ShowDocument {
            metadata: totals.metadata(),
            shows,
        },
        report,
    }
}

fn summarize_show(
    show: &Show,
    report: &mut RunReport,
) -> Result<(ShowSummary, ShowTotals), SkipReason> {
    let rating_key = show
        .rating_key
        .clone()
        .ok_or(SkipReason::MissingRequiredField("ratingKey"))?;
    let title = show
        .title
        .clone()
        .ok_or(SkipReason::MissingRequiredField("title"))?;

    let mut show_raw = RawValues::default();
    let mut seasons = Vec::new();
    for season in show.seasons.as_deref().unwrap_or_default() {
        let (summary, season_raw) = summarize_season(season, &title, report);
        show_raw.extend(&season_raw);
        seasons.push(summary);
    }

    let totals = ShowTotals {
        shows: 1,
        seasons: seasons.len(),
        episodes: show_raw.episodes,
        size_bytes: show_raw.size_bytes,
    };
    let summary = ShowSummary {
        rating_key,
        title,
        avg_episode_duration_human: show.duration.map(|ms| format_duration(ms, DURATION_STYLE)),
        content_rating: show.content_rating.clone(),
        season_count: show.season_count,
        total_episode_count: show_raw.episodes,
        size_human: format_size(show_raw.size_bytes),
        unique_resolutions: show_raw.unique_resolutions(),
        unique_audio_codecs: show_raw.unique_audio_codecs(),
        unique_video_codecs: show_raw.unique_video_codecs(),
        unique_containers: show_raw.unique_containers(),
        year_range: show_raw.year_range(),
        seasons,
    };
    Ok((summary, totals))
}

fn summarize_season(
    season: &Season,
    show_title: &str,
    report: &mut RunReport,
) -> (SeasonSummary, RawValues) {
    let mut raw = RawValues::default();
    let mut duration_sum = 0u64;
    let mut timed_episodes = 0u64;

    for episode in season.episodes.as_deref().unwrap_or_default() {
        let facts = match extract_leaf_facts(episode.media.as_deref()) {
            Ok(f) => f,
            Err(reason) => {
                let label = episode_label(show_title, season, episode);
                report.skip(EntityLevel::Episode, label, reason);
                continue;
            }
        };
        let duration = episode.duration.unwrap_or(facts.duration_ms);
        if duration > 0 {
            duration_sum += duration;
            timed_episodes += 1;
        }
        raw.push(&facts, episode.year);
    }

    let avg_duration = (timed_episodes > 0).then(|| duration_sum / timed_episodes);
    let summary = SeasonSummary {
        season_rating_key: season.rating_key.clone(),
        season_number: season.season_number,
        episode_count: raw.episodes,
        avg_episode_duration_human: avg_duration.map(|ms| format_duration(ms, DURATION_STYLE)),
        size_human: format_size(raw.size_bytes),
        unique_resolutions: raw.unique_resolutions(),
        unique_audio_codecs: raw.unique_audio_codecs(),
        unique_video_codecs: raw.unique_video_codecs(),
        unique_containers: raw.unique_containers(),
        year_range: raw.year_range(),
    };
    (summary, raw)
}

fn episode_label(show_title: &str, season: &Season, episode: &Episode) -> String {
    let season_no = season
        .season_number
        .map(|n| format!("S{n:02}"))
        .unwrap_or_else(|| "S??".to_string());
    let episode_name = label_of(episode.title.as_deref(), episode.rating_key.as_ref());
    format!("{show_title} {season_no} {episode_name}")
}
