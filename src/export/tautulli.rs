use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::info;

use super::retry::send_with_retry;
use super::{unpack_export, ExportProvider, LibraryExport};
use crate::rollup::LibraryKind;

const DEFAULT_POLL_SECS: u64 = 30;
const DEFAULT_MAX_POLLS: u32 = 120;

#[derive(Debug, Clone)]
pub struct TautulliConfig {
    pub base_url: String,
    pub api_key: String,
    pub movies_section: u32,
    pub shows_section: u32,
    pub music_section: u32,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl TautulliConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("TAUTULLI_URL").context("TAUTULLI_URL not set")?;
        let api_key = env::var("TAUTULLI_API_KEY").context("TAUTULLI_API_KEY not set")?;
        Ok(Self {
            base_url,
            api_key,
            movies_section: env_or("TAUTULLI_MOVIES_SECTION", 1),
            shows_section: env_or("TAUTULLI_SHOWS_SECTION", 2),
            music_section: env_or("TAUTULLI_MUSIC_SECTION", 5),
            poll_interval: Duration::from_secs(env_or("TAUTULLI_POLL_SECS", DEFAULT_POLL_SECS)),
            max_polls: env_or("TAUTULLI_MAX_POLLS", DEFAULT_MAX_POLLS),
        })
    }

    pub fn section_id(&self, kind: LibraryKind) -> u32 {
        match kind {
            LibraryKind::Movies => self.movies_section,
            LibraryKind::Shows => self.shows_section,
            LibraryKind::Music => self.music_section,
        }
    }
}

pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Drives a Tautulli metadata export: start the job, poll until it completes,
/// download and unpack the archive.
#[derive(Debug, Clone)]
pub struct TautulliClient {
    client: Client,
    config: TautulliConfig,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: ApiResponse,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    result: String,
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// State of one export job as listed by `get_exports_table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExportStatus {
    pub complete: bool,
    pub progress: u64,
}

impl TautulliClient {
    pub fn new(config: TautulliConfig) -> Result<Self> {
        let user_agent = format!("mediaref/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build Tautulli HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(TautulliConfig::from_env()?)
    }

    fn endpoint(&self) -> String {
        format!("{}/api/v2", self.config.base_url.trim_end_matches('/'))
    }

    async fn get_with_retry(&self, params: &[(&str, String)]) -> Result<Response> {
        let cmd = params
            .iter()
            .find(|(k, _)| *k == "cmd")
            .map(|(_, v)| v.as_str())
            .unwrap_or("?");
        send_with_retry(&format!("Tautulli {cmd}"), || {
            self.client
                .get(self.endpoint())
                .query(&[("apikey", self.config.api_key.as_str())])
                .query(params)
        })
        .await
    }

    async fn call(&self, params: &[(&str, String)]) -> Result<Value> {
        let resp = self.get_with_retry(params).await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Tautulli API returned {}", status);
        }
        let envelope: Envelope = resp.json().await.context("Invalid Tautulli response body")?;
        unwrap_envelope(envelope)
    }

    pub async fn start_export(&self, section_id: u32) -> Result<u64> {
        let data = self
            .call(&[
                ("cmd", "export_metadata".to_string()),
                ("section_id", section_id.to_string()),
                ("file_format", "json".to_string()),
                ("metadata_level", "1".to_string()),
                ("media_info_level", "2".to_string()),
                ("thumb_level", "9".to_string()),
                ("individual_files", "False".to_string()),
            ])
            .await?;
        let export_id = parse_export_id(&data)?;
        info!("Export {} started for section {}", export_id, section_id);
        Ok(export_id)
    }

    pub(crate) async fn export_status(&self, export_id: u64) -> Result<ExportStatus> {
        let data = self
            .call(&[("cmd", "get_exports_table".to_string())])
            .await?;
        find_export_status(&data, export_id)
            .ok_or_else(|| anyhow!("Export {} not listed by Tautulli", export_id))
    }

    pub async fn download_export(&self, export_id: u64) -> Result<Vec<u8>> {
        let resp = self
            .get_with_retry(&[
                ("cmd", "download_export".to_string()),
                ("export_id", export_id.to_string()),
            ])
            .await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Failed to download export {}: {}", export_id, status);
        }
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read export {} body", export_id))?;
        info!("Downloaded export {} ({} bytes)", export_id, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn wait_for_export(&self, export_id: u64) -> Result<()> {
        for _ in 0..self.config.max_polls {
            let status = self.export_status(export_id).await?;
            if status.complete {
                info!("Export {} complete", export_id);
                return Ok(());
            }
            info!("Export {} in progress: {}%", export_id, status.progress);
            tokio::time::sleep(self.config.poll_interval).await;
        }
        bail!(
            "Export {} did not complete after {} polls",
            export_id,
            self.config.max_polls
        )
    }
}

#[async_trait]
impl ExportProvider for TautulliClient {
    async fn fetch(&self, kind: LibraryKind) -> Result<LibraryExport> {
        let section_id = self.config.section_id(kind);
        info!("Starting {} export (section {})", kind, section_id);
        let export_id = self.start_export(section_id).await?;
        self.wait_for_export(export_id).await?;
        let zip_bytes = self.download_export(export_id).await?;
        tokio::task::spawn_blocking(move || unpack_export(zip_bytes))
            .await
            .context("Export unpack task panicked")?
    }
}

fn unwrap_envelope(envelope: Envelope) -> Result<Value> {
    let response = envelope.response;
    if response.result != "success" {
        bail!(
            "Tautulli API error: {}",
            response.message.unwrap_or_else(|| response.result.clone())
        );
    }
    Ok(response.data)
}

fn parse_export_id(data: &Value) -> Result<u64> {
    data.get("export_id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("Tautulli export response has no export_id"))
}

fn find_export_status(data: &Value, export_id: u64) -> Option<ExportStatus> {
    data.get("data")?
        .as_array()?
        .iter()
        .find(|e| e.get("export_id").and_then(|v| v.as_u64()) == Some(export_id))
        .map(|e| ExportStatus {
            complete: e.get("complete").and_then(|v| v.as_i64()) == Some(1),
            progress: e.get("progress").and_then(|v| v.as_u64()).unwrap_or(0),
        })
}
