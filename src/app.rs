use anyhow::Result;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::api::DataApi;
use crate::config::Config;
use crate::constants::constants;
use crate::error::LookupError;
use crate::ident::{extract_video_id, share_url};
use crate::interceptor::{SystemOpener, TabOpener};
use crate::player::{Player, watch_url};
use crate::resolver::{LookupRequest, VideoSummary, list_videos};
use crate::theme::THEMES;

// --- Types ---

pub type LookupResult = (LookupRequest, Result<Vec<VideoSummary>, LookupError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
}

/// What submitting the input box should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
  /// A video id: play it and list its channel's uploads.
  Play(String),
  /// A playlist or channel id: list only, nothing to play.
  List(String),
  Invalid,
}

/// Decide what an input string refers to.
pub fn plan_submit(input: &str) -> Submit {
  let trimmed = input.trim();
  if let Some(id) = extract_video_id(trimmed) {
    return Submit::Play(id);
  }
  let is_token = !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if is_token { Submit::List(trimmed.to_string()) } else { Submit::Invalid }
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  /// Input did not contain anything usable on the last submit.
  pub input_invalid: bool,
  pub mode: AppMode,
  pub theme_index: usize,
  pub videos: Vec<VideoSummary>,
  pub list_state: ListState,
  /// What the current list is related to, e.g. `dQw4w9WgXcQ (video)`.
  pub list_source: Option<String>,
  /// Inline message shown in place of the list after a failed lookup.
  pub list_error: Option<String>,
  pub pending_lookups: usize,
  pub share_url: Option<String>,
  pub player: Option<Player>,
  pub player_ready: bool,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  api: Option<DataApi>,
  config: Config,
  opener: SystemOpener,
  initial_video_id: Option<String>,
  ready_rx: Option<oneshot::Receiver<Result<()>>>,
  lookup_tx: mpsc::UnboundedSender<LookupResult>,
  lookup_rx: mpsc::UnboundedReceiver<LookupResult>,
  /// When the last error was set, used for auto-dismiss after 5 seconds.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(config: Config, api: Option<DataApi>, initial_video_id: Option<String>) -> Self {
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };
    let (lookup_tx, lookup_rx) = mpsc::unbounded_channel();

    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      input_invalid: false,
      mode: AppMode::Input,
      theme_index,
      videos: Vec::new(),
      list_state: ListState::default(),
      list_source: None,
      list_error: None,
      pending_lookups: 0,
      share_url: None,
      player: None,
      player_ready: false,
      last_error: None,
      status_message: None,
      should_quit: false,
      api,
      config,
      opener: SystemOpener::default(),
      initial_video_id,
      ready_rx: None,
      lookup_tx,
      lookup_rx,
      error_time: None,
    }
  }

  /// Hand the app a player whose readiness resolves through `ready_rx`.
  pub fn attach_player(&mut self, player: Player, ready_rx: oneshot::Receiver<Result<()>>) {
    self.player = Some(player);
    self.ready_rx = Some(ready_rx);
    self.status_message = Some("Starting player…".to_string());
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is bounded by modular arithmetic in next_theme()
    // and by position() on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Startup ---

  /// Runs once: when the player reports ready, or right away when there is no player.
  pub fn on_player_ready(&mut self) {
    self.status_message = None;
    let Some(id) = self.initial_video_id.take() else { return };
    info!(id = %id, "sidebar: loading initial video");
    self.input = id.clone();
    self.cursor_position = self.input.chars().count();
    self.play(&id);
    self.trigger_lookup(LookupRequest::new(id));
  }

  // --- Async plumbing ---

  pub fn check_pending(&mut self) {
    if let Some(mut rx) = self.ready_rx.take() {
      match rx.try_recv() {
        Ok(Ok(())) => {
          self.player_ready = true;
          self.on_player_ready();
        }
        Ok(Err(e)) => {
          warn!(err = %e, "sidebar: player failed to start");
          self.player = None;
          self.set_error(format!("Player unavailable: {:#}", e));
          self.on_player_ready();
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.ready_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.player = None;
          self.set_error("Player task failed.".to_string());
          self.on_player_ready();
        }
      }
    }

    while let Ok((request, result)) = self.lookup_rx.try_recv() {
      self.pending_lookups = self.pending_lookups.saturating_sub(1);
      self.apply_lookup(request, result);
    }

    if let Some(player) = self.player.as_mut() {
      player.poll_state();
    }
    self.expire_error();
  }

  /// Spawn a lookup. Earlier lookups still in flight are not cancelled; whichever
  /// result arrives last is what the list shows.
  pub fn trigger_lookup(&mut self, request: LookupRequest) {
    let Some(api) = self.api.clone() else {
      self.apply_lookup(request, Err(LookupError::MissingApiKey));
      return;
    };
    self.pending_lookups += 1;
    self.status_message = Some(format!("Loading related videos for {}…", request.raw_input));

    let tx = self.lookup_tx.clone();
    tokio::spawn(async move {
      let result = list_videos(&api, &request).await;
      let _ = tx.send((request, result));
    });
  }

  /// Replace the list with a lookup outcome. Failures replace it with the inline error.
  pub fn apply_lookup(&mut self, request: LookupRequest, result: Result<Vec<VideoSummary>, LookupError>) {
    if self.pending_lookups == 0 {
      self.status_message = None;
    }
    self.list_source = Some(format!("{} ({})", request.raw_input, request.resolved_type));
    match result {
      Ok(videos) => {
        info!(id = %request.raw_input, count = videos.len(), "sidebar: related videos loaded");
        self.list_error = None;
        self.videos = videos;
        self.list_state.select(if self.videos.is_empty() { None } else { Some(0) });
      }
      Err(e) => {
        error!(id = %request.raw_input, err = %e, "sidebar: error listing videos");
        self.videos.clear();
        self.list_state.select(None);
        self.list_error = Some(constants().lookup_error_message.clone());
      }
    }
  }

  // --- User actions ---

  pub fn submit(&mut self) {
    match plan_submit(&self.input) {
      Submit::Play(id) => {
        if self.input.trim() != id {
          self.input = id.clone();
          self.cursor_position = self.input.chars().count();
          self.input_scroll = 0;
        }
        self.input_invalid = false;
        self.play(&id);
        self.update_share_url(&id);
        self.trigger_lookup(LookupRequest::new(id));
      }
      Submit::List(id) => {
        self.input_invalid = false;
        self.trigger_lookup(LookupRequest::new(id));
      }
      Submit::Invalid => {
        self.input_invalid = true;
        self.set_error("Enter a video id, playlist id, channel id or video URL.".to_string());
      }
    }
  }

  /// Play the selected list entry, mirroring its id into the input box.
  pub fn play_selected(&mut self) {
    let Some(video) = self.list_state.selected().and_then(|i| self.videos.get(i)) else { return };
    let id = video.id.clone();
    self.input = id.clone();
    self.cursor_position = self.input.chars().count();
    self.input_scroll = 0;
    self.play(&id);
  }

  fn play(&mut self, id: &str) {
    let Some(player) = self.player.as_mut() else {
      info!(id, "sidebar: no player attached, skipping playback");
      return;
    };
    if let Err(e) = player.load_video_by_id(id).and_then(|_| player.play_video()) {
      self.set_error(format!("Playback error: {:#}", e));
    }
  }

  fn update_share_url(&mut self, id: &str) {
    let url = share_url(self.config.share_base_url(), id);
    info!(url = %url, "sidebar: new share url");
    self.share_url = Some(url);
  }

  /// Open the current (or selected) video in the external viewer tab.
  pub fn open_in_viewer(&mut self) {
    let id = self
      .player
      .as_ref()
      .and_then(|p| p.current_video.clone())
      .or_else(|| self.list_state.selected().and_then(|i| self.videos.get(i)).map(|v| v.id.clone()));
    let Some(id) = id else { return };
    let url = share_url(self.config.viewer_url(), &id);
    self.opener.open(&url, &constants().tab_target);
  }

  pub fn toggle_pause(&mut self) {
    if let Some(player) = self.player.as_mut()
      && let Err(e) = player.toggle_pause()
    {
      self.set_error(format!("Pause error: {:#}", e));
    }
  }

  pub fn now_playing(&self) -> Option<(&str, Option<&VideoSummary>)> {
    let id = self.player.as_ref()?.current_video.as_deref()?;
    Some((id, self.videos.iter().find(|v| v.id == id)))
  }

  pub fn now_playing_url(&self) -> Option<String> {
    self.now_playing().map(|(id, _)| watch_url(id))
  }

  pub async fn shutdown(&mut self) -> Result<()> {
    if let Some(player) = self.player.as_mut() {
      player.stop().await?;
    }
    Ok(())
  }
}
