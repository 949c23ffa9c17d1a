use scraper::Selector;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::constants::constants;
use crate::dom::{Document, SelectorError, selector};
use crate::interceptor::LISTENER_NAME;

/// Body attribute recording that this page load has been set up.
pub const ACTIVE_ATTR: &str = "data-extension-active";
/// Attribute set on a row's button once the row has been seen.
pub const PATCHED_ATTR: &str = "patched";
/// Attribute carried by the cosmetic marker element.
pub const MARKER_ATTR: &str = "data-extension-marker";

/// What a single patch pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
  pub listener_attached: bool,
  pub marker_added: bool,
  pub rows_marked: usize,
  pub style_injected: bool,
}

impl PatchReport {
  pub fn changed(&self) -> bool {
    self.listener_attached || self.marker_added || self.rows_marked > 0 || self.style_injected
  }
}

/// A notification that the page changed.
#[derive(Debug)]
pub enum PageChange {
  /// Nodes were added or attributes changed in the current document.
  Mutated,
  /// A new page load replaced the document.
  Replaced(Document),
}

/// Where patch passes are triggered from.
pub enum ChangeSource {
  /// Patch once per mutation notification; stop when the sender goes away.
  Observer(mpsc::Receiver<PageChange>),
  /// Degraded mode: patch on a fixed timer until `shutdown` fires or is dropped.
  Polling { every: Duration, shutdown: oneshot::Receiver<()> },
}

/// Does `host` belong to one of the allowed domains? A host matches a domain exactly
/// or as a subdomain, so `m.youtube.com` passes and `notyoutube.com` does not.
pub fn is_target_domain(host: &str) -> bool {
  let host = host.trim_end_matches('.').to_ascii_lowercase();
  constants().allowed_domains.iter().any(|d| {
    host == *d || host.strip_suffix(d.as_str()).is_some_and(|prefix| prefix.ends_with('.'))
  })
}

/// Keeps a page patched: interceptor attached, marker added, rows marked and layout style present.
#[derive(Debug, Clone)]
pub struct PagePatcher {
  rows: Selector,
  row_button: Selector,
  logo: Selector,
  style: Selector,
  marker_text: String,
  layout_css: String,
}

impl PagePatcher {
  pub fn new() -> Result<Self, SelectorError> {
    let c = constants();
    Ok(Self {
      rows: selector(&c.row_selector)?,
      row_button: selector(&c.row_button_selector)?,
      logo: selector(&c.logo_selector)?,
      style: selector("style")?,
      marker_text: c.marker_text.clone(),
      layout_css: c.layout_css.clone(),
    })
  }

  /// One synchronous pass. Safe to run any number of times; prior work is detected by
  /// marker attributes only.
  pub fn patch(&self, doc: &mut Document) -> PatchReport {
    let mut report = PatchReport::default();
    let body = doc.body();

    if !doc.has_attr(body, ACTIVE_ATTR) {
      doc.add_event_listener("click", LISTENER_NAME, true);
      report.listener_attached = true;
      report.marker_added = self.add_marker(doc);
    }

    for row in doc.query_selector_all(body, &self.rows) {
      if let Some(button) = doc.query_selector(row, &self.row_button)
        && !doc.has_attr(button, PATCHED_ATTR)
      {
        doc.set_attr(button, PATCHED_ATTR, "true");
        report.rows_marked += 1;
      }
    }

    if report.rows_marked > 0 {
      report.style_injected = self.inject_style(doc);
    }

    doc.set_attr(body, ACTIVE_ATTR, "true");
    report
  }

  /// Patch only when `host` is on the allow-list.
  pub fn patch_if_allowed(&self, doc: &mut Document, host: &str) -> Option<PatchReport> {
    is_target_domain(host).then(|| self.patch(doc))
  }

  fn add_marker(&self, doc: &mut Document) -> bool {
    let Some(logo) = doc.query_selector(doc.body(), &self.logo) else { return false };
    if doc.children(logo).into_iter().any(|c| doc.has_attr(c, MARKER_ATTR)) {
      return false;
    }
    let marker = doc.append_element(
      logo,
      "div",
      &[(MARKER_ATTR, "true"), ("style", "position: absolute; bottom: 2px; left: 8px; font-size: 11px; z-index: 9999;")],
    );
    doc.append_text(marker, &self.marker_text);
    true
  }

  fn inject_style(&self, doc: &mut Document) -> bool {
    let existing = doc.query_selector_all(doc.root(), &self.style);
    if existing.into_iter().any(|s| doc.text_content(s) == self.layout_css) {
      return false;
    }
    let style = doc.append_element(doc.head(), "style", &[]);
    doc.append_text(style, &self.layout_css);
    info!("patch: layout style injected");
    true
  }

  /// Patch `page` whenever `source` says so, calling `on_pass` after every pass that ran.
  /// Triggers on a host outside the allow-list do nothing. Returns the number of passes run.
  pub async fn watch(
    &self,
    page: &mut Document,
    host: &str,
    source: ChangeSource,
    mut on_pass: impl FnMut(&Document, &PatchReport),
  ) -> usize {
    let mut passes = 0;
    let mut run_pass = |page: &mut Document| {
      if let Some(report) = self.patch_if_allowed(page, host) {
        passes += 1;
        on_pass(page, &report);
      } else {
        debug!(host, "patch: host not on allow-list, skipping pass");
      }
    };
    match source {
      ChangeSource::Observer(mut changes) => {
        while let Some(change) = changes.recv().await {
          if let PageChange::Replaced(doc) = change {
            *page = doc;
          }
          run_pass(page);
        }
      }
      ChangeSource::Polling { every, mut shutdown } => {
        info!(?every, "patch: no mutation source, polling");
        let mut ticker = tokio::time::interval(every);
        loop {
          tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => run_pass(page),
          }
        }
      }
    }
    passes
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::interceptor::tests::RecordingOpener;
  use crate::interceptor::{ClickInterceptor, dispatch_click};

  const PAGE: &str = r#"<html><head></head><body>
    <div id="logo-icon"></div>
    <div id="contents">
      <ytd-rich-grid-media><div id="button"></div></ytd-rich-grid-media>
      <ytd-video-renderer><div id="button"></div></ytd-video-renderer>
      <ytd-rich-grid-media><a id="thumbnail" href="/watch?v=dQw4w9WgXcQ"><img class="ytd-moving-thumbnail-renderer"></a></ytd-rich-grid-media>
    </div>
    <ytd-video-renderer><div id="button"></div></ytd-video-renderer>
  </body></html>"#;

  fn sel(s: &str) -> Selector {
    selector(s).unwrap()
  }

  fn count(doc: &Document, s: &str) -> usize {
    doc.query_selector_all(doc.root(), &sel(s)).len()
  }

  #[test]
  fn first_pass_does_all_the_work() {
    let mut doc = Document::parse(PAGE);
    let report = PagePatcher::new().unwrap().patch(&mut doc);

    assert_eq!(report, PatchReport { listener_attached: true, marker_added: true, rows_marked: 2, style_injected: true });
    assert_eq!(doc.attr(doc.body(), ACTIVE_ATTR), Some("true"));
    assert_eq!(count(&doc, "#contents [patched]"), 2);
    // The row outside #contents is not a content row.
    assert_eq!(count(&doc, "[patched]"), 2);
  }

  #[test]
  fn second_pass_on_unchanged_page_is_a_no_op() {
    let mut doc = Document::parse(PAGE);
    let patcher = PagePatcher::new().unwrap();
    patcher.patch(&mut doc);
    let report = patcher.patch(&mut doc);

    assert!(!report.changed());
    assert_eq!(count(&doc, "head style"), 1);
    assert_eq!(count(&doc, "[data-extension-marker]"), 1);
    assert_eq!(doc.listeners("click").count(), 1);
  }

  #[test]
  fn new_rows_are_marked_without_duplicating_style() {
    let mut doc = Document::parse(PAGE);
    let patcher = PagePatcher::new().unwrap();
    patcher.patch(&mut doc);

    let contents = doc.query_selector(doc.body(), &sel("#contents")).unwrap();
    let row = doc.append_element(contents, "ytd-video-renderer", &[]);
    doc.append_element(row, "div", &[("id", "button")]);

    let report = patcher.patch(&mut doc);
    assert_eq!(report.rows_marked, 1);
    assert!(!report.style_injected);
    assert!(!report.listener_attached);
    assert_eq!(count(&doc, "head style"), 1);
  }

  #[test]
  fn existing_identical_style_is_not_duplicated() {
    let mut doc = Document::parse(PAGE);
    let style = doc.append_element(doc.head(), "style", &[]);
    doc.append_text(style, &constants().layout_css);

    let report = PagePatcher::new().unwrap().patch(&mut doc);
    assert!(!report.style_injected);
    assert_eq!(count(&doc, "style"), 1);
  }

  #[test]
  fn missing_logo_skips_marker() {
    let mut doc = Document::new();
    let report = PagePatcher::new().unwrap().patch(&mut doc);
    assert!(report.listener_attached);
    assert!(!report.marker_added);
    assert_eq!(report.rows_marked, 0);
    assert!(!report.style_injected);
  }

  #[test]
  fn patched_page_redirects_exactly_once_per_click() {
    let mut doc = Document::parse(PAGE);
    let patcher = PagePatcher::new().unwrap();
    patcher.patch(&mut doc);
    patcher.patch(&mut doc);

    let img = doc.query_selector(doc.body(), &sel("img")).unwrap();
    let mut opener = RecordingOpener::default();
    let interceptor = ClickInterceptor::new("https://viewer.test/").unwrap();
    let (_, opened) = dispatch_click(&doc, img, &interceptor, &mut opener);
    assert_eq!(opened, ["https://viewer.test/?v=dQw4w9WgXcQ"]);
  }

  #[test]
  fn domain_allow_list() {
    assert!(is_target_domain("www.youtube.com"));
    assert!(is_target_domain("youtube.com"));
    assert!(is_target_domain("m.youtube.com"));
    assert!(!is_target_domain("example.org"));
    assert!(!is_target_domain("notyoutube.com"));
    assert!(!is_target_domain("youtube.com.evil.org"));
    assert!(is_target_domain("WWW.YouTube.com."));
    let mut doc = Document::parse(PAGE);
    assert_eq!(PagePatcher::new().unwrap().patch_if_allowed(&mut doc, "example.org"), None);
    assert!(!doc.has_attr(doc.body(), ACTIVE_ATTR));
  }

  #[tokio::test]
  async fn observer_patches_per_notification_until_closed() {
    let patcher = PagePatcher::new().unwrap();
    let mut doc = Document::new();
    let (tx, rx) = mpsc::channel(4);
    tx.send(PageChange::Replaced(Document::parse(PAGE))).await.unwrap();
    tx.send(PageChange::Mutated).await.unwrap();
    drop(tx);

    let mut reports = Vec::new();
    let passes = patcher.watch(&mut doc, "www.youtube.com", ChangeSource::Observer(rx), |_, r| reports.push(*r)).await;

    assert_eq!(passes, 2);
    assert!(reports[0].changed());
    assert!(!reports[1].changed());
    assert_eq!(count(&doc, "head style"), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn polling_runs_until_shutdown() {
    let patcher = PagePatcher::new().unwrap();
    let mut doc = Document::parse(PAGE);
    let (stop_tx, stop_rx) = oneshot::channel();
    let source = ChangeSource::Polling { every: Duration::from_millis(1000), shutdown: stop_rx };

    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(2500)).await;
      let _ = stop_tx.send(());
    });
    let passes = patcher.watch(&mut doc, "youtube.com", source, |_, _| {}).await;

    // Ticks at 0ms, 1000ms and 2000ms.
    assert_eq!(passes, 3);
    assert_eq!(doc.listeners("click").count(), 1);
  }

  #[tokio::test]
  async fn watch_ignores_foreign_hosts() {
    let patcher = PagePatcher::new().unwrap();
    let mut doc = Document::parse(PAGE);
    let (tx, rx) = mpsc::channel(1);
    tx.send(PageChange::Mutated).await.unwrap();
    drop(tx);
    assert_eq!(patcher.watch(&mut doc, "example.org", ChangeSource::Observer(rx), |_, _| {}).await, 0);
    assert!(!doc.has_attr(doc.body(), ACTIVE_ATTR));
  }
}
