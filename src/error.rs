use thiserror::Error;

/// Failure of a related-videos lookup.
///
/// Every variant collapses to the same inline message in the sidebar; the
/// distinction only matters for logs and for `yside list`.
#[derive(Error, Debug)]
pub enum LookupError {
  /// The API answered with a non-2xx status.
  #[error("failed to fetch: {reason}")]
  Transport { status: u16, reason: String },

  /// An entity the lookup depends on does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("network error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid API URL: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("no API key configured (set YOUTUBE_API_KEY or api_key in prefs.toml)")]
  MissingApiKey,
}

impl LookupError {
  pub fn not_found(what: impl Into<String>) -> Self {
    Self::NotFound(what.into())
  }
}
