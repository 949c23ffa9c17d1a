use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::constants::constants;

/// Display options the player is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerOptions {
  /// Play in a window instead of fullscreen.
  pub inline: bool,
  /// Allow the player to expand related/playlist entries after the video.
  pub related: bool,
  /// Show the on-screen controller.
  pub controls: bool,
  /// Audio only, no video window.
  pub audio_only: bool,
}

impl Default for PlayerOptions {
  fn default() -> Self {
    Self { inline: true, related: false, controls: true, audio_only: false }
  }
}

impl PlayerOptions {
  fn mpv_args(&self, socket_path: &str) -> Vec<String> {
    let mut args = vec![
      "--idle=yes".to_string(),
      "--keep-open=no".to_string(),
      format!("--input-ipc-server={}", socket_path),
      format!("--fullscreen={}", if self.inline { "no" } else { "yes" }),
      format!("--osc={}", if self.controls { "yes" } else { "no" }),
    ];
    if !self.related {
      args.push("--ytdl-raw-options=no-playlist=".to_string());
    }
    if self.audio_only {
      args.push("--no-video".to_string());
    } else {
      args.push("--force-window=yes".to_string());
    }
    args
  }
}

/// Player state as reported by mpv.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
  Unstarted,
  Buffering,
  Playing,
  Paused,
  Ended,
}

impl PlayerState {
  pub fn label(self) -> &'static str {
    match self {
      PlayerState::Unstarted => "unstarted",
      PlayerState::Buffering => "buffering",
      PlayerState::Playing => "playing",
      PlayerState::Paused => "paused",
      PlayerState::Ended => "ended",
    }
  }
}

/// Map one mpv IPC event line to a state change.
fn parse_event(line: &str) -> Option<PlayerState> {
  let val: Value = serde_json::from_str(line).ok()?;
  match val.get("event")?.as_str()? {
    "start-file" => Some(PlayerState::Buffering),
    "playback-restart" => Some(PlayerState::Playing),
    "end-file" => Some(PlayerState::Ended),
    "property-change" if val.get("name").and_then(Value::as_str) == Some("pause") => {
      match val.get("data").and_then(Value::as_bool)? {
        true => Some(PlayerState::Paused),
        false => Some(PlayerState::Playing),
      }
    }
    _ => None,
  }
}

fn command_line(args: Value) -> String {
  let mut line = json!({ "command": args }).to_string();
  line.push('\n');
  line
}

pub fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={}", video_id)
}

/// An mpv process driven over its JSON IPC socket.
///
/// Commands issued before the socket is ready are queued and flushed once it connects.
pub struct Player {
  process: Option<TokioChild>,
  cmd_tx: mpsc::UnboundedSender<String>,
  state_rx: mpsc::Receiver<PlayerState>,
  io_handle: Option<JoinHandle<()>>,
  socket_path: String,
  pub state: PlayerState,
  pub current_video: Option<String>,
}

impl Player {
  /// Start mpv idle. The returned receiver resolves once, when the player accepts commands.
  pub fn spawn(options: PlayerOptions) -> Result<(Self, oneshot::Receiver<Result<()>>)> {
    let socket_path = std::env::temp_dir().join(format!("yside-mpv-{}.sock", std::process::id()));
    let socket_path = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let child = Command::new("mpv")
      .args(options.mpv_args(&socket_path))
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
          anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
        } else {
          anyhow!(e).context("Failed to spawn mpv process")
        }
      })?;
    info!(socket = %socket_path, ?options, "player: mpv started");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = mpsc::channel(32);
    let (ready_tx, ready_rx) = oneshot::channel();
    let io_handle = tokio::spawn(run_ipc(socket_path.clone(), cmd_rx, state_tx, ready_tx));

    let player = Self {
      process: Some(child),
      cmd_tx,
      state_rx,
      io_handle: Some(io_handle),
      socket_path,
      state: PlayerState::Unstarted,
      current_video: None,
    };
    Ok((player, ready_rx))
  }

  fn send(&self, args: Value) -> Result<()> {
    self.cmd_tx.send(command_line(args)).map_err(|_| anyhow!("Player connection closed"))
  }

  /// Replace whatever is playing with `video_id`.
  pub fn load_video_by_id(&mut self, video_id: &str) -> Result<()> {
    self.send(json!(["loadfile", watch_url(video_id), "replace"]))?;
    self.current_video = Some(video_id.to_string());
    Ok(())
  }

  pub fn play_video(&mut self) -> Result<()> {
    self.send(json!(["set_property", "pause", false]))
  }

  pub fn toggle_pause(&mut self) -> Result<()> {
    self.send(json!(["cycle", "pause"]))
  }

  pub fn is_playing(&self) -> bool {
    self.state == PlayerState::Playing
  }

  /// Drain pending state changes; returns the latest one, if any.
  pub fn poll_state(&mut self) -> Option<PlayerState> {
    let mut latest = None;
    while let Ok(state) = self.state_rx.try_recv() {
      latest = Some(state);
    }
    if let Some(state) = latest {
      debug!(state = state.label(), "player: state change");
      self.state = state;
    }
    latest
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.io_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    if let Some(mut child) = self.process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }
    self.current_video = None;
    self.state = PlayerState::Unstarted;
    let _ = std::fs::remove_file(&self.socket_path);
    Ok(())
  }
}

async fn connect(socket_path: &str) -> Result<UnixStream> {
  let c = constants();
  let mut last_err = None;
  for attempt in 0..c.mpv_connect_attempts {
    tokio::time::sleep(Duration::from_millis(c.mpv_connect_delay_ms)).await;
    match UnixStream::connect(socket_path).await {
      Ok(stream) => return Ok(stream),
      Err(e) => {
        debug!(attempt, err = %e, "player: mpv IPC connect failed, retrying");
        last_err = Some(e);
      }
    }
  }
  Err(anyhow!("mpv IPC socket never came up: {}", last_err.map(|e| e.to_string()).unwrap_or_default()))
}

async fn run_ipc(
  socket_path: String,
  mut cmd_rx: mpsc::UnboundedReceiver<String>,
  state_tx: mpsc::Sender<PlayerState>,
  ready_tx: oneshot::Sender<Result<()>>,
) {
  let stream = match connect(&socket_path).await {
    Ok(stream) => stream,
    Err(e) => {
      warn!(err = %e, "player: not ready");
      let _ = ready_tx.send(Err(e));
      return;
    }
  };
  let (reader, mut writer) = stream.into_split();
  let observe = command_line(json!(["observe_property", 1, "pause"]));
  if let Err(e) = writer.write_all(observe.as_bytes()).await {
    let _ = ready_tx.send(Err(anyhow!(e).context("Failed to write to mpv IPC socket")));
    return;
  }
  info!("player: ready");
  let _ = ready_tx.send(Ok(()));

  let mut lines = TokioBufReader::new(reader).lines();
  loop {
    tokio::select! {
      cmd = cmd_rx.recv() => {
        let Some(cmd) = cmd else { break };
        if let Err(e) = writer.write_all(cmd.as_bytes()).await {
          warn!(err = %e, "player: IPC write failed");
          break;
        }
      }
      line = lines.next_line() => {
        let Ok(Some(line)) = line else { break };
        if let Some(state) = parse_event(&line)
          && state_tx.send(state).await.is_err()
        {
          break;
        }
      }
    }
  }
  debug!("player: IPC loop finished");
}
