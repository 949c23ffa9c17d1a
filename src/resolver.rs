use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::constants::constants;
use crate::error::LookupError;
use crate::ident::{IdKind, classify};

/// A listed video. One per row of the sidebar; dropped on the next lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSummary {
  pub id: String,
  pub title: String,
  pub publish_time: NaiveDate,
  /// ISO-8601 duration, `None` when the duration lookup had no entry for this id.
  pub duration: Option<String>,
}

/// A user action asking for the videos related to an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
  pub raw_input: String,
  pub resolved_type: IdKind,
}

impl LookupRequest {
  /// Classify `raw_input` with the prefix/length heuristic.
  pub fn new(raw_input: impl Into<String>) -> Self {
    let raw_input = raw_input.into().trim().to_string();
    let resolved_type = classify(&raw_input);
    Self { raw_input, resolved_type }
  }

  /// Skip classification and use `kind` as given.
  pub fn with_kind(raw_input: impl Into<String>, kind: IdKind) -> Self {
    Self { raw_input: raw_input.into().trim().to_string(), resolved_type: kind }
  }
}

/// One playlist row before durations are joined in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
  pub video_id: String,
  pub title: String,
  pub published_at: NaiveDate,
}

/// The four reads the resolver needs from the data API.
#[allow(async_fn_in_trait)]
pub trait VideoSource {
  /// Owning channel of a video, `None` if the video is unknown.
  async fn video_channel(&self, video_id: &str) -> Result<Option<String>, LookupError>;
  /// The channel's uploads playlist, `None` if the channel has none.
  async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>, LookupError>;
  async fn playlist_items(&self, playlist_id: &str, max_results: u32) -> Result<Vec<PlaylistEntry>, LookupError>;
  /// Durations keyed by video id; ids without an entry are simply absent.
  async fn video_durations(&self, video_ids: &[String]) -> Result<HashMap<String, String>, LookupError>;
}

/// List the videos related to `request`, most recent first.
pub async fn list_videos<S: VideoSource>(source: &S, request: &LookupRequest) -> Result<Vec<VideoSummary>, LookupError> {
  let id = request.raw_input.as_str();
  info!(id = %id, kind = %request.resolved_type, "lookup: listing videos");
  match request.resolved_type {
    IdKind::Video => videos_for_video(source, id).await,
    IdKind::Channel => videos_for_channel(source, id, constants().related_page_size).await,
    IdKind::Playlist => videos_for_playlist(source, id, constants().playlist_page_size).await,
  }
}

async fn videos_for_video<S: VideoSource>(source: &S, video_id: &str) -> Result<Vec<VideoSummary>, LookupError> {
  let channel_id = source
    .video_channel(video_id)
    .await?
    .ok_or_else(|| LookupError::not_found(format!("channel for video {}", video_id)))?;
  debug!(video_id, channel_id = %channel_id, "lookup: resolved owning channel");
  videos_for_channel(source, &channel_id, constants().related_page_size).await
}

async fn videos_for_channel<S: VideoSource>(
  source: &S,
  channel_id: &str,
  max_results: u32,
) -> Result<Vec<VideoSummary>, LookupError> {
  let uploads = source
    .uploads_playlist(channel_id)
    .await?
    .ok_or_else(|| LookupError::not_found(format!("uploads playlist for channel {}", channel_id)))?;
  debug!(channel_id, uploads = %uploads, "lookup: resolved uploads playlist");
  videos_for_playlist(source, &uploads, max_results).await
}

async fn videos_for_playlist<S: VideoSource>(
  source: &S,
  playlist_id: &str,
  max_results: u32,
) -> Result<Vec<VideoSummary>, LookupError> {
  let entries = source.playlist_items(playlist_id, max_results).await?;
  if entries.is_empty() {
    return Ok(Vec::new());
  }
  let ids: Vec<String> = entries.iter().map(|e| e.video_id.clone()).collect();
  let durations = source.video_durations(&ids).await?;
  debug!(playlist_id, entries = entries.len(), durations = durations.len(), "lookup: joining durations");
  Ok(join_durations(entries, &durations))
}

/// Attach durations to playlist entries by id. A missing key leaves the duration unknown.
pub fn join_durations(entries: Vec<PlaylistEntry>, durations: &HashMap<String, String>) -> Vec<VideoSummary> {
  entries
    .into_iter()
    .map(|entry| VideoSummary {
      duration: durations.get(&entry.video_id).cloned(),
      id: entry.video_id,
      title: entry.title,
      publish_time: entry.published_at,
    })
    .collect()
}

/// Thumbnail image URL for a listed video.
pub fn thumbnail_url(id: &str) -> String {
  constants().thumbnail_url_template.replace("{id}", id)
}
