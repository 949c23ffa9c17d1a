use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use crate::constants::constants;
use crate::error::LookupError;
use crate::resolver::{PlaylistEntry, VideoSource};

// --- API Models ---

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListResponse<T> {
  #[serde(default)]
  pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct VideoResource {
  pub id: String,
  pub snippet: Option<VideoSnippet>,
  #[serde(rename = "contentDetails")]
  pub content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct VideoSnippet {
  #[serde(rename = "channelId")]
  pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoContentDetails {
  pub duration: Option<String>, // ISO 8601, e.g. PT1M30S
}

#[derive(Debug, Deserialize)]
pub struct ChannelResource {
  #[serde(rename = "contentDetails")]
  pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelContentDetails {
  #[serde(rename = "relatedPlaylists")]
  pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
  pub uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemResource {
  pub snippet: PlaylistItemSnippet,
  #[serde(rename = "contentDetails")]
  pub content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemSnippet {
  pub title: String,
  #[serde(rename = "publishedAt")]
  pub published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemContentDetails {
  #[serde(rename = "videoId")]
  pub video_id: String,
}

impl From<PlaylistItemResource> for PlaylistEntry {
  fn from(item: PlaylistItemResource) -> Self {
    PlaylistEntry {
      video_id: item.content_details.video_id,
      title: item.snippet.title,
      published_at: item.snippet.published_at.date_naive(),
    }
  }
}

// --- Client ---

/// Thin client for the public video-data API. Every request carries the API key.
#[derive(Debug, Clone)]
pub struct DataApi {
  client: Client,
  base_url: String,
  api_key: String,
}

impl DataApi {
  pub fn new(client: Client, api_key: impl Into<String>) -> Self {
    Self { client, base_url: constants().api_base_url.clone(), api_key: api_key.into() }
  }

  /// Build a client from an optional key, failing early when none is configured.
  pub fn from_key(client: Client, api_key: Option<String>) -> Result<Self, LookupError> {
    api_key.map(|key| Self::new(client, key)).ok_or(LookupError::MissingApiKey)
  }

  #[cfg(test)]
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, LookupError> {
    let base = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'));
    let mut url = Url::parse(&base)?;
    url.query_pairs_mut().extend_pairs(params.iter().copied()).append_pair("key", &self.api_key);
    Ok(url)
  }

  /// GET `endpoint` with `params` and decode the JSON body.
  pub async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, LookupError> {
    let url = self.endpoint_url(endpoint, params)?;
    debug!(endpoint, "api: GET");
    let resp = self.client.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(LookupError::Transport {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("unknown status").to_string(),
      });
    }
    Ok(resp.json::<T>().await?)
  }
}

impl VideoSource for DataApi {
  async fn video_channel(&self, video_id: &str) -> Result<Option<String>, LookupError> {
    let list: ListResponse<VideoResource> = self.fetch("/videos", &[("part", "snippet"), ("id", video_id)]).await?;
    Ok(list.items.into_iter().next().and_then(|v| v.snippet).and_then(|s| s.channel_id))
  }

  async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>, LookupError> {
    let list: ListResponse<ChannelResource> =
      self.fetch("/channels", &[("part", "contentDetails"), ("id", channel_id)]).await?;
    Ok(
      list
        .items
        .into_iter()
        .next()
        .and_then(|c| c.content_details)
        .and_then(|d| d.related_playlists)
        .and_then(|p| p.uploads)
        .filter(|u| !u.is_empty()),
    )
  }

  async fn playlist_items(&self, playlist_id: &str, max_results: u32) -> Result<Vec<PlaylistEntry>, LookupError> {
    let max_results = max_results.to_string();
    let list: ListResponse<PlaylistItemResource> = self
      .fetch(
        "/playlistItems",
        &[("part", "snippet,contentDetails"), ("playlistId", playlist_id), ("maxResults", &max_results)],
      )
      .await?;
    Ok(list.items.into_iter().map(PlaylistEntry::from).collect())
  }

  async fn video_durations(&self, video_ids: &[String]) -> Result<HashMap<String, String>, LookupError> {
    if video_ids.is_empty() {
      return Ok(HashMap::new());
    }
    let ids = video_ids.join(",");
    let list: ListResponse<VideoResource> = self.fetch("/videos", &[("part", "contentDetails"), ("id", &ids)]).await?;
    Ok(
      list
        .items
        .into_iter()
        .filter_map(|v| {
          let duration = v.content_details.and_then(|d| d.duration)?;
          Some((v.id, duration))
        })
        .collect(),
    )
  }
}
