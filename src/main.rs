mod api;
mod app;
mod config;
mod constants;
mod dom;
mod duration;
mod error;
mod ident;
mod input;
mod interceptor;
mod patcher;
mod player;
mod resolver;
mod theme;
mod ui;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use api::DataApi;
use app::App;
use config::Config;
use constants::constants;
use dom::{Document, selector};
use duration::format_duration;
use ident::{IdKind, extract_video_id, query_param};
use interceptor::{ClickInterceptor, SystemOpener, TabOpener, dispatch_click};
use patcher::{ChangeSource, PageChange, PagePatcher};
use player::{Player, PlayerOptions};
use resolver::{LookupRequest, list_videos, thumbnail_url};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "YSIDE_LOG";

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Related-videos sidebar with an embedded player (default)
  Sidebar {
    /// Share URL carrying `?v=ID`, or a bare video id
    input: Option<String>,
    /// Play audio only, without a video window
    #[arg(long)]
    audio_only: bool,
    /// Hide the player's on-screen controls
    #[arg(long)]
    no_controls: bool,
  },
  /// Print the videos related to an id without starting the TUI
  List {
    id: String,
    /// Skip classification and treat ID as this kind
    #[arg(short, long)]
    kind: Option<IdKind>,
    /// Emit JSON instead of one line per video
    #[arg(long)]
    json: bool,
  },
  /// Open a watch link in the alternate viewer tab
  Redirect {
    href: String,
    /// Print the viewer URL without launching a browser
    #[arg(long)]
    dry_run: bool,
  },
  /// Patch a saved page and write the result
  Patch {
    file: PathBuf,
    /// Host the page was served from
    #[arg(long, default_value = "www.youtube.com")]
    host: String,
    /// Write here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Dispatch a click on the first element matching this selector after patching
    #[arg(long)]
    click: Option<String>,
    /// Number of change notifications to patch on; the first one loads the page
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..=1024))]
    passes: u64,
    /// Poll on the fixed timer for this many seconds instead
    #[arg(long, conflicts_with = "passes")]
    poll: Option<u64>,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

// --- Logging ---

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns stdout, so it logs to a daily file in the data dir.
fn init_file_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "yside")?;
  let log_dir = dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "yside.log"));
  tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

fn init_stderr_logging() {
  tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(std::io::stderr).init();
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let command =
    cli.command.unwrap_or(Command::Sidebar { input: None, audio_only: false, no_controls: false });

  match command {
    Command::Sidebar { input, audio_only, no_controls } => {
      let _guard = init_file_logging();
      let options = PlayerOptions { controls: !no_controls, audio_only, ..PlayerOptions::default() };

      let default_hook = std::panic::take_hook();
      std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        default_hook(info);
      }));

      let mut terminal = ratatui::init();
      let result = run_sidebar(&mut terminal, input, options).await;
      ratatui::restore();
      result
    }
    Command::List { id, kind, json } => {
      init_stderr_logging();
      run_list(id, kind, json).await
    }
    Command::Redirect { href, dry_run } => {
      init_stderr_logging();
      run_redirect(&href, dry_run)
    }
    Command::Patch { file, host, out, click, passes, poll } => {
      init_stderr_logging();
      run_patch(file, &host, out, click, passes, poll).await
    }
    Command::Completions { shell } => {
      clap_complete::generate(shell, &mut Cli::command(), "yside", &mut std::io::stdout());
      Ok(())
    }
  }
}

/// Initial id from a share URL's `v` parameter, else the first id-shaped token.
fn initial_video_id(input: &str) -> Option<String> {
  query_param(input, "v").filter(|v| !v.is_empty()).or_else(|| extract_video_id(input))
}

fn data_api(config: &Config) -> Option<DataApi> {
  match DataApi::from_key(reqwest::Client::new(), config.api_key()) {
    Ok(api) => Some(api),
    Err(e) => {
      warn!(err = %e, "sidebar: lookups disabled");
      None
    }
  }
}

async fn run_sidebar(terminal: &mut DefaultTerminal, input: Option<String>, options: PlayerOptions) -> Result<()> {
  let config = Config::load();
  let api = data_api(&config);
  let initial = input.as_deref().and_then(initial_video_id);
  info!(initial = ?initial, "sidebar: starting");
  let mut app = App::new(config, api, initial);

  match Player::spawn(options) {
    Ok((player, ready_rx)) => app.attach_player(player, ready_rx),
    Err(e) => {
      warn!(err = %e, "sidebar: running without a player");
      app.set_error(format!("{:#}", e));
      app.on_player_ready();
    }
  }

  loop {
    app.check_pending();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown().await
}

async fn run_list(id: String, kind: Option<IdKind>, json: bool) -> Result<()> {
  let config = Config::load();
  let api = DataApi::from_key(reqwest::Client::new(), config.api_key())?;
  let request = match kind {
    Some(kind) => LookupRequest::with_kind(id, kind),
    None => LookupRequest::new(id),
  };
  info!(id = %request.raw_input, kind = %request.resolved_type, "list: looking up");

  let videos = match list_videos(&api, &request).await {
    Ok(videos) => videos,
    Err(e) => {
      error!(err = %e, "list: lookup failed");
      return Err(anyhow!(e).context(constants().lookup_error_message.clone()));
    }
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&videos).context("Failed to encode videos")?);
    return Ok(());
  }
  for video in &videos {
    println!(
      "{:>8}  {}  {}  {}  {}",
      format_duration(video.duration.as_deref()),
      video.publish_time.format("%Y-%m-%d"),
      video.id,
      video.title,
      thumbnail_url(&video.id)
    );
  }
  Ok(())
}

fn run_redirect(href: &str, dry_run: bool) -> Result<()> {
  let config = Config::load();
  let interceptor = ClickInterceptor::new(config.viewer_url())?;
  let url = interceptor.viewer_url_for(href).with_context(|| format!("No video id in {}", href))?;
  let mut opener = SystemOpener::new(dry_run);
  opener.open(&url, &constants().tab_target);
  println!("{}", url);
  Ok(())
}

/// Starting document and change source for `patch`.
///
/// Observer mode starts from an empty document: the first notification replaces it with
/// `page`, and each of the remaining `passes - 1` reports a mutation. Polling patches `page`
/// directly on the fixed timer for `poll` seconds.
fn patch_source(page: Document, passes: u64, poll: Option<u64>) -> Result<(Document, ChangeSource)> {
  if let Some(secs) = poll {
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_secs(secs)).await;
      let _ = stop_tx.send(());
    });
    let every = Duration::from_millis(constants().patch_interval_ms);
    return Ok((page, ChangeSource::Polling { every, shutdown: stop_rx }));
  }

  let capacity = usize::try_from(passes).context("Too many passes")?;
  let (tx, rx) = mpsc::channel(capacity);
  tx.try_send(PageChange::Replaced(page)).map_err(|_| anyhow!("Failed to queue page load"))?;
  for _ in 1..passes {
    tx.try_send(PageChange::Mutated).map_err(|_| anyhow!("Failed to queue page change"))?;
  }
  Ok((Document::new(), ChangeSource::Observer(rx)))
}

/// Click the first element matching `target` and return the URL left in the viewer tab.
fn click_first(doc: &Document, target: &str, viewer_url: &str) -> Result<Option<String>> {
  let target = doc.query_selector(doc.root(), &selector(target)?).context("No element matches the click selector")?;
  let interceptor = ClickInterceptor::new(viewer_url)?;
  let mut opener = SystemOpener::new(true);
  let (event, opened) = dispatch_click(doc, target, &interceptor, &mut opener);
  info!(
    default_prevented = event.default_prevented(),
    propagation_stopped = event.propagation_stopped(),
    opened = opened.len(),
    "patch: click dispatched"
  );
  Ok(opener.tab(&constants().tab_target).map(str::to_string))
}

async fn run_patch(
  file: PathBuf,
  host: &str,
  out: Option<PathBuf>,
  click: Option<String>,
  passes: u64,
  poll: Option<u64>,
) -> Result<()> {
  let patcher = PagePatcher::new()?;
  let (mut doc, source) = patch_source(Document::load(&file)?, passes, poll)?;

  let ran = patcher
    .watch(&mut doc, host, source, |_, report| {
      info!(
        changed = report.changed(),
        listener = report.listener_attached,
        marker = report.marker_added,
        rows = report.rows_marked,
        style = report.style_injected,
        "patch: pass done"
      );
    })
    .await;
  info!(file = %file.display(), host, passes = ran, "patch: finished");

  if let Some(target) = click {
    let config = Config::load();
    match click_first(&doc, &target, config.viewer_url())? {
      Some(url) => eprintln!("{}", url),
      None => eprintln!("click not redirected"),
    }
  }

  let html = doc.to_html();
  match out {
    Some(path) => std::fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?,
    None => print!("{}", html),
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initial_id_from_share_url() {
    assert_eq!(initial_video_id("https://stopdesign.ru/yt/?v=dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(initial_video_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(initial_video_id("nothing here"), None);
  }

  #[test]
  fn cli_defaults_to_sidebar() {
    let cli = Cli::try_parse_from(["yside"]).unwrap();
    assert!(cli.command.is_none());
  }

  #[test]
  fn list_accepts_kind_override() {
    let cli = Cli::try_parse_from(["yside", "list", "UCabc", "--kind", "channel", "--json"]).unwrap();
    match cli.command {
      Some(Command::List { id, kind, json }) => {
        assert_eq!(id, "UCabc");
        assert_eq!(kind, Some(IdKind::Channel));
        assert!(json);
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn poll_conflicts_with_passes() {
    assert!(Cli::try_parse_from(["yside", "patch", "p.html", "--passes", "2", "--poll", "3"]).is_err());
  }

  #[test]
  fn patch_passes_are_bounded() {
    assert!(Cli::try_parse_from(["yside", "patch", "p.html", "--passes", "0"]).is_err());
    assert!(Cli::try_parse_from(["yside", "patch", "p.html", "--passes", "1025"]).is_err());
  }

  // --- patch ---

  const PAGE: &str = r#"<html><head></head><body>
    <div id="logo-icon"></div>
    <div id="contents">
      <ytd-rich-grid-media><div id="button"></div><a id="thumbnail" href="/watch?v=dQw4w9WgXcQ"><img class="ytd-moving-thumbnail-renderer"></a></ytd-rich-grid-media>
    </div>
  </body></html>"#;

  #[tokio::test]
  async fn observer_source_loads_page_then_reports_mutations() {
    let (doc, source) = patch_source(Document::parse(PAGE), 3, None).unwrap();
    assert!(doc.query_selector(doc.body(), &selector("#contents").unwrap()).is_none());
    let ChangeSource::Observer(mut rx) = source else { panic!("expected observer source") };

    let first = rx.recv().await.unwrap();
    let PageChange::Replaced(page) = first else { panic!("expected a replaced page first") };
    assert!(page.query_selector(page.body(), &selector("#contents").unwrap()).is_some());
    assert!(matches!(rx.recv().await, Some(PageChange::Mutated)));
    assert!(matches!(rx.recv().await, Some(PageChange::Mutated)));
    assert!(rx.recv().await.is_none());
  }

  #[tokio::test]
  async fn patch_then_click_leaves_viewer_url_in_tab() {
    let patcher = PagePatcher::new().unwrap();
    let (mut doc, source) = patch_source(Document::parse(PAGE), 2, None).unwrap();
    let mut changed = Vec::new();
    let ran = patcher.watch(&mut doc, "www.youtube.com", source, |_, r| changed.push(r.changed())).await;

    assert_eq!(ran, 2);
    assert_eq!(changed, [true, false]);
    assert_eq!(click_first(&doc, "img", "https://viewer.test/").unwrap().as_deref(), Some("https://viewer.test/?v=dQw4w9WgXcQ"));
    assert_eq!(click_first(&doc, "#logo-icon", "https://viewer.test/").unwrap(), None);
    assert!(click_first(&doc, "#missing", "https://viewer.test/").is_err());
  }

  #[test]
  fn cli_is_well_formed() {
    Cli::command().debug_assert();
  }
}
