use scraper::Selector;
use std::collections::HashMap;
use std::process::Stdio;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::dom::{Document, NodeId, SelectorError, selector};
use crate::ident::{query_param, share_url};

/// Listener name the patcher registers and [`dispatch_click`] resolves.
pub const LISTENER_NAME: &str = "yside-redirect";

/// A click travelling through the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
  pub target: NodeId,
  default_prevented: bool,
  propagation_stopped: bool,
}

impl ClickEvent {
  pub fn new(target: NodeId) -> Self {
    Self { target, default_prevented: false, propagation_stopped: false }
  }

  pub fn prevent_default(&mut self) {
    self.default_prevented = true;
  }

  pub fn stop_propagation(&mut self) {
    self.propagation_stopped = true;
  }

  pub fn default_prevented(&self) -> bool {
    self.default_prevented
  }

  pub fn propagation_stopped(&self) -> bool {
    self.propagation_stopped
  }
}

/// Opens a URL in a named browser tab. Opening the same target name again replaces that tab.
pub trait TabOpener {
  fn open(&mut self, url: &str, target: &str);
}

/// Opens URLs with the platform browser launcher and remembers the last URL per tab name.
#[derive(Debug, Default)]
pub struct SystemOpener {
  pub dry_run: bool,
  tabs: HashMap<String, String>,
}

impl SystemOpener {
  pub fn new(dry_run: bool) -> Self {
    Self { dry_run, tabs: HashMap::new() }
  }

  pub fn tab(&self, target: &str) -> Option<&str> {
    self.tabs.get(target).map(String::as_str)
  }
}

impl TabOpener for SystemOpener {
  fn open(&mut self, url: &str, target: &str) {
    let replaced = self.tabs.insert(target.to_string(), url.to_string());
    info!(url, target, reused = replaced.is_some(), "redirect: opening viewer");
    if self.dry_run {
      return;
    }
    #[cfg(target_os = "macos")]
    let cmd = "open";
    #[cfg(not(target_os = "macos"))]
    let cmd = "xdg-open";
    match std::process::Command::new(cmd)
      .arg(url)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
    {
      Ok(mut child) => {
        // Reap the child in a background thread to avoid zombie processes.
        std::thread::spawn(move || {
          let _ = child.wait();
        });
      }
      Err(e) => warn!(err = %e, "redirect: failed to launch browser"),
    }
  }
}

/// Capture-phase click handler that sends video clicks to the alternate viewer.
#[derive(Debug, Clone)]
pub struct ClickInterceptor {
  surfaces: Selector,
  links: Vec<Selector>,
  viewer_url: String,
  tab_target: String,
}

impl ClickInterceptor {
  pub fn new(viewer_url: &str) -> Result<Self, SelectorError> {
    let c = constants();
    Ok(Self {
      surfaces: selector(&c.surface_selectors.join(", "))?,
      links: c.link_selectors.iter().map(|s| selector(s)).collect::<Result<_, _>>()?,
      viewer_url: viewer_url.to_string(),
      tab_target: c.tab_target.clone(),
    })
  }

  /// Viewer URL for a watch link such as `/watch?v=ID`, or `None` if it carries no id.
  pub fn viewer_url_for(&self, href: &str) -> Option<String> {
    let id = query_param(href, "v").filter(|v| !v.is_empty())?;
    Some(share_url(&self.viewer_url, &id))
  }

  /// Handle one click. Returns the opened URL when the click was redirected.
  ///
  /// Anything that does not match (target, link, href or `v` parameter) leaves the
  /// event untouched so the page's default navigation runs.
  pub fn handle(&self, doc: &Document, event: &mut ClickEvent, opener: &mut impl TabOpener) -> Option<String> {
    if !doc.matches(event.target, &self.surfaces) {
      return None;
    }
    let link = self.links.iter().find_map(|sel| doc.closest(event.target, sel))?;
    let href = doc.attr(link, "href")?;
    let url = self.viewer_url_for(href)?;

    event.stop_propagation();
    event.prevent_default();
    debug!(href, "redirect: intercepted click");
    opener.open(&url, &self.tab_target);
    Some(url)
  }
}

/// Dispatch a click to every capture-phase listener registered under [`LISTENER_NAME`].
///
/// Returns the URLs opened, one per listener invocation.
pub fn dispatch_click(
  doc: &Document,
  target: NodeId,
  interceptor: &ClickInterceptor,
  opener: &mut impl TabOpener,
) -> (ClickEvent, Vec<String>) {
  let mut event = ClickEvent::new(target);
  let count = doc.listeners("click").filter(|l| l.capture && l.name == LISTENER_NAME).count();
  let mut opened = Vec::new();
  for _ in 0..count {
    if let Some(url) = interceptor.handle(doc, &mut event, opener) {
      opened.push(url);
    }
  }
  (event, opened)
}
