//! Direct Plex catalog fetch. Pages through a library section and the
//! children of each item, then assembles the same document shape a Tautulli
//! export carries, so the rollup pipelines read either source unchanged.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use super::retry::send_with_retry;
use super::tautulli::env_or;
use super::{ExportImage, ExportProvider, LibraryExport};
use crate::rollup::LibraryKind;

const DEFAULT_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone)]
pub struct PlexConfig {
    pub base_url: String,
    pub token: String,
    pub movies_library: String,
    pub shows_library: String,
    pub music_library: String,
    pub page_size: u32,
    pub thumbnails: bool,
}

impl PlexConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("PLEX_URL").context("PLEX_URL not set")?;
        let token = env::var("PLEX_TOKEN").context("PLEX_TOKEN not set")?;
        let library = |key: &str, kind: LibraryKind| {
            env::var(key).unwrap_or_else(|_| kind.display_name().to_string())
        };
        Ok(Self {
            base_url,
            token,
            movies_library: library("PLEX_MOVIES_LIBRARY", LibraryKind::Movies),
            shows_library: library("PLEX_SHOWS_LIBRARY", LibraryKind::Shows),
            music_library: library("PLEX_MUSIC_LIBRARY", LibraryKind::Music),
            page_size: env_or("PLEX_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
            thumbnails: env_or("PLEX_THUMBNAILS", true),
        })
    }

    /// Plex library title holding `kind`.
    pub fn library_name(&self, kind: LibraryKind) -> &str {
        match kind {
            LibraryKind::Movies => &self.movies_library,
            LibraryKind::Shows => &self.shows_library,
            LibraryKind::Music => &self.music_library,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlexClient {
    client: Client,
    config: PlexConfig,
}

impl PlexClient {
    pub fn new(config: PlexConfig) -> Result<Self> {
        let user_agent = format!("mediaref/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .user_agent(user_agent)
            .build()
            .context("Failed to build Plex HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(PlexConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(ACCEPT, "application/json")
            .header("X-Plex-Token", &self.config.token)
    }

    async fn container(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp =
            send_with_retry(&format!("Plex {path}"), || self.request(path).query(query)).await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Plex {} returned {}", path, status);
        }
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("Invalid Plex response for {path}"))?;
        take_field(body, "MediaContainer")
            .ok_or_else(|| anyhow!("Plex {} response has no MediaContainer", path))
    }

    pub async fn section_key(&self, name: &str) -> Result<String> {
        let container = self.container("/library/sections", &[]).await?;
        find_section_key(&container, name)
            .ok_or_else(|| anyhow!("Plex library '{}' not found", name))
    }

    /// Every item listed under `path`, fetched page by page.
    pub async fn list(&self, path: &str) -> Result<Vec<Value>> {
        let size = self.config.page_size;
        let mut items = Vec::new();
        loop {
            let container = self.container(path, &page_query(items.len(), size)).await?;
            let total = container.get("totalSize").and_then(Value::as_u64);
            let page = take_field(container, "Metadata")
                .and_then(|m| match m {
                    Value::Array(page) => Some(page),
                    _ => None,
                })
                .unwrap_or_default();
            let fetched = page.len();
            items.extend(page);
            if is_last_page(fetched, size, items.len(), total) {
                return Ok(items);
            }
        }
    }

    /// Children of `item`. A failed listing is logged and read as empty, so
    /// one unreachable show or album does not abort the library.
    async fn children(&self, item: &Value) -> Vec<Value> {
        let Some(key) = key_text(item) else {
            return Vec::new();
        };
        match self.list(&format!("/library/metadata/{key}/children")).await {
            Ok(children) => children,
            Err(e) => {
                warn!("Skipping children of {}: {:#}", label(item), e);
                Vec::new()
            }
        }
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let resp = send_with_retry(&format!("Plex {path}"), || self.request(path)).await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Plex {} returned {}", path, status);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn collect_thumb(&self, item: &Value, images: &mut Vec<ExportImage>) {
        if !self.config.thumbnails {
            return;
        }
        let (Some(thumb), Some(key)) = (item.get("thumb").and_then(Value::as_str), key_text(item))
        else {
            return;
        };
        match self.download(thumb).await {
            Ok(bytes) => images.push(ExportImage {
                file_name: image_name(item, &key),
                bytes,
            }),
            Err(e) => warn!("Thumbnail for {} failed: {:#}", label(item), e),
        }
    }

    async fn movies(&self, section: &str, images: &mut Vec<ExportImage>) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        for movie in self.list(&section_all(section)).await? {
            self.collect_thumb(&movie, images).await;
            records.push(movie_record(&movie));
        }
        Ok(records)
    }

    async fn shows(&self, section: &str, images: &mut Vec<ExportImage>) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        for show in self.list(&section_all(section)).await? {
            self.collect_thumb(&show, images).await;
            let mut seasons = Vec::new();
            for season in self.children(&show).await {
                self.collect_thumb(&season, images).await;
                let episodes = self.children(&season).await;
                seasons.push(season_record(&season, episodes.iter().map(episode_record).collect()));
            }
            records.push(show_record(&show, seasons));
        }
        Ok(records)
    }

    async fn music(&self, section: &str, images: &mut Vec<ExportImage>) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        for artist in self.list(&section_all(section)).await? {
            self.collect_thumb(&artist, images).await;
            let mut albums = Vec::new();
            for album in self.children(&artist).await {
                self.collect_thumb(&album, images).await;
                let tracks = self.children(&album).await;
                albums.push(album_record(&album, tracks.iter().map(track_record).collect()));
            }
            records.push(artist_record(&artist, albums));
        }
        Ok(records)
    }
}

#[async_trait]
impl ExportProvider for PlexClient {
    async fn fetch(&self, kind: LibraryKind) -> Result<LibraryExport> {
        let name = self.config.library_name(kind);
        let section = self.section_key(name).await?;
        info!("Fetching {} from Plex library '{}' (section {})", kind, name, section);

        let mut images = Vec::new();
        let records = match kind {
            LibraryKind::Movies => self.movies(&section, &mut images).await?,
            LibraryKind::Shows => self.shows(&section, &mut images).await?,
            LibraryKind::Music => self.music(&section, &mut images).await?,
        };
        info!(
            "Fetched {} {} records and {} thumbnails",
            records.len(),
            kind,
            images.len()
        );
        let document =
            serde_json::to_vec(&Value::Array(records)).context("Failed to encode Plex catalog")?;
        Ok(LibraryExport { document, images })
    }
}

fn section_all(section: &str) -> String {
    format!("/library/sections/{section}/all")
}

fn page_query(start: usize, size: u32) -> Vec<(&'static str, String)> {
    vec![
        ("X-Plex-Container-Start", start.to_string()),
        ("X-Plex-Container-Size", size.to_string()),
    ]
}

fn is_last_page(fetched: usize, size: u32, collected: usize, total: Option<u64>) -> bool {
    fetched == 0 || fetched < size as usize || total.is_some_and(|t| collected as u64 >= t)
}

fn take_field(value: Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(mut map) => map.remove(name),
        _ => None,
    }
}

fn find_section_key(container: &Value, name: &str) -> Option<String> {
    container
        .get("Directory")?
        .as_array()?
        .iter()
        .find(|d| d.get("title").and_then(Value::as_str) == Some(name))
        .and_then(|d| match d.get("key")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn key_text(item: &Value) -> Option<String> {
    match item.get("ratingKey")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn label(item: &Value) -> String {
    item.get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| key_text(item))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Export-style image name, so the rating key is recovered the same way as
/// for Tautulli archives.
fn image_name(item: &Value, key: &str) -> String {
    let title = item.get("title").and_then(Value::as_str).unwrap_or("Untitled");
    format!("{title} [{key}].thumb.jpg")
}

/// Plex serves rating keys as strings; Tautulli exports carry numbers.
fn rating_key(item: &Value) -> Value {
    match item.get("ratingKey") {
        Some(Value::String(s)) => s
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn field(item: &Value, name: &str) -> Value {
    item.get(name).cloned().unwrap_or(Value::Null)
}

fn media_records(item: &Value) -> Value {
    let Some(media) = item.get("Media").and_then(Value::as_array) else {
        return Value::Null;
    };
    media
        .iter()
        .map(|m| {
            let parts: Vec<Value> = m
                .get("Part")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .map(|p| {
                            json!({"size": field(p, "size"), "container": field(p, "container")})
                        })
                        .collect()
                })
                .unwrap_or_default();
            json!({
                "audioCodec": field(m, "audioCodec"),
                "videoCodec": field(m, "videoCodec"),
                "videoResolution": field(m, "videoResolution"),
                "container": field(m, "container"),
                "duration": field(m, "duration"),
                "parts": parts
            })
        })
        .collect()
}

fn movie_record(movie: &Value) -> Value {
    json!({
        "ratingKey": rating_key(movie),
        "title": field(movie, "title"),
        "year": field(movie, "year"),
        "contentRating": field(movie, "contentRating"),
        "duration": field(movie, "duration"),
        "media": media_records(movie)
    })
}

fn episode_record(episode: &Value) -> Value {
    json!({
        "ratingKey": rating_key(episode),
        "title": field(episode, "title"),
        "year": field(episode, "year"),
        "duration": field(episode, "duration"),
        "media": media_records(episode)
    })
}

fn season_record(season: &Value, episodes: Vec<Value>) -> Value {
    json!({
        "ratingKey": rating_key(season),
        "seasonNumber": field(season, "index"),
        "episodes": episodes
    })
}

fn show_record(show: &Value, seasons: Vec<Value>) -> Value {
    json!({
        "ratingKey": rating_key(show),
        "title": field(show, "title"),
        "contentRating": field(show, "contentRating"),
        "seasonCount": field(show, "childCount"),
        "duration": field(show, "duration"),
        "seasons": seasons
    })
}

fn track_record(track: &Value) -> Value {
    json!({
        "ratingKey": rating_key(track),
        "title": field(track, "title"),
        "media": media_records(track)
    })
}

fn album_record(album: &Value, tracks: Vec<Value>) -> Value {
    json!({
        "ratingKey": rating_key(album),
        "title": field(album, "title"),
        "year": field(album, "year"),
        "tracks": tracks
    })
}

fn artist_record(artist: &Value, albums: Vec<Value>) -> Value {
    json!({
        "ratingKey": rating_key(artist),
        "title": field(artist, "title"),
        "albums": albums
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::LibraryDocument;
    use crate::rollup_library;

    fn plex_movie() -> Value {
        json!({
            "ratingKey": "4242",
            "title": "Heat",
            "year": 1995,
            "contentRating": "R",
            "duration": 10_200_000,
            "thumb": "/library/metadata/4242/thumb/1700000000",
            "Media": [{
                "audioCodec": "dca",
                "videoCodec": "h264",
                "videoResolution": "1080",
                "container": "mkv",
                "duration": 10_200_000,
                "Part": [{"size": 12_000_000_000u64, "container": "mkv", "file": "/m/heat.mkv"}]
            }]
        })
    }

    fn config() -> PlexConfig {
        PlexConfig {
            base_url: "http://plex:32400/".to_string(),
            token: "t".to_string(),
            movies_library: "Films".to_string(),
            shows_library: "TV Shows".to_string(),
            music_library: "Music".to_string(),
            page_size: 2,
            thumbnails: false,
        }
    }

    #[test]
    fn movie_record_uses_export_field_names() {
        let record = movie_record(&plex_movie());
        assert_eq!(record["ratingKey"], json!(4242));
        assert_eq!(record["media"][0]["parts"][0]["size"], json!(12_000_000_000u64));
        assert_eq!(record["media"][0]["parts"][0]["container"], "mkv");
        assert!(record["media"][0].get("Part").is_none());
        assert!(record["media"][0]["parts"][0].get("file").is_none());

        let bare = movie_record(&json!({"ratingKey": "abc", "title": "No media"}));
        assert_eq!(bare["ratingKey"], "abc");
        assert!(bare["media"].is_null());
    }

    #[test]
    fn assembled_catalog_rolls_up_like_an_export() {
        let episode = json!({
            "ratingKey": "11",
            "title": "Pilot",
            "year": 2004,
            "Media": [{"videoResolution": "720", "Part": [{"size": 1_000_000_000u64}]}]
        });
        let season = season_record(
            &json!({"ratingKey": "10", "index": 1}),
            vec![episode_record(&episode)],
        );
        let show = show_record(
            &json!({"ratingKey": "9", "title": "Lost", "childCount": 1, "duration": 2_580_000}),
            vec![season],
        );
        let bytes = serde_json::to_vec(&json!([show])).unwrap();
        let rollup = rollup_library(LibraryKind::Shows, &bytes).unwrap();
        let LibraryDocument::Shows(doc) = rollup.document else {
            panic!("expected a shows document");
        };
        assert_eq!(doc.shows[0].season_count, Some(1));
        assert_eq!(doc.shows[0].seasons[0].season_number, Some(1));
        assert_eq!(doc.shows[0].unique_resolutions, "720p");
        assert_eq!(doc.metadata.total_episodes, 1);
        assert!(rollup.report.skipped.is_empty());
    }

    #[test]
    fn music_catalog_keeps_collaborator_titles() {
        let track = json!({
            "ratingKey": "3",
            "Media": [{"duration": 1000, "Part": [{"size": 10}]}]
        });
        let album = album_record(
            &json!({"ratingKey": "2", "title": "Duet", "year": 2020}),
            vec![track_record(&track)],
        );
        let artist = artist_record(&json!({"ratingKey": "1", "title": "A; B"}), vec![album]);
        assert_eq!(artist["title"], "A; B");
        assert_eq!(artist["albums"][0]["tracks"][0]["media"][0]["parts"][0]["size"], 10);
    }

    #[test]
    fn paging_stops_on_short_page_or_total() {
        assert!(!is_last_page(2, 2, 2, None));
        assert!(is_last_page(1, 2, 3, None));
        assert!(is_last_page(0, 2, 4, None));
        assert!(is_last_page(2, 2, 4, Some(4)));
        assert!(!is_last_page(2, 2, 4, Some(5)));
        assert_eq!(
            page_query(400, 200),
            vec![
                ("X-Plex-Container-Start", "400".to_string()),
                ("X-Plex-Container-Size", "200".to_string()),
            ]
        );
    }

    #[test]
    fn finds_section_by_library_title() {
        let container = json!({"Directory": [
            {"key": "1", "title": "Films", "type": "movie"},
            {"key": 5, "title": "Music", "type": "artist"}
        ]});
        let config = config();
        assert_eq!(
            find_section_key(&container, config.library_name(LibraryKind::Movies)).as_deref(),
            Some("1")
        );
        assert_eq!(find_section_key(&container, "Music").as_deref(), Some("5"));
        assert_eq!(find_section_key(&container, "TV Shows"), None);
    }

    #[test]
    fn thumbnails_are_named_like_export_images() {
        let movie = plex_movie();
        let image = ExportImage {
            file_name: image_name(&movie, "4242"),
            bytes: Vec::new(),
        };
        assert_eq!(image.file_name, "Heat [4242].thumb.jpg");
        assert_eq!(image.rating_key(), Some("4242"));

        let client = PlexClient::new(config()).unwrap();
        assert_eq!(
            client.url("/library/sections"),
            "http://plex:32400/library/sections"
        );
    }
}
