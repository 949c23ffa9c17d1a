//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Data API
  pub api_base_url: String,
  pub related_page_size: u32,
  pub playlist_page_size: u32,
  pub thumbnail_url_template: String,

  // Sidebar
  pub share_base_url: String,
  pub lookup_error_message: String,

  // Redirector
  pub viewer_url: String,
  pub tab_target: String,
  pub allowed_domains: Vec<String>,
  pub patch_interval_ms: u64,
  pub surface_selectors: Vec<String>,
  pub link_selectors: Vec<String>,
  pub row_selector: String,
  pub row_button_selector: String,
  pub logo_selector: String,
  pub marker_text: String,
  pub layout_css: String,

  // Player
  pub mpv_connect_attempts: u32,
  pub mpv_connect_delay_ms: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed every test in this module fails.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
