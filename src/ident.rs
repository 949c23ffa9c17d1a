use clap::ValueEnum;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// First run of exactly 11 id characters (A-Z, a-z, 0-9, hyphen, underscore). Group 1 is the id.
static VIDEO_ID_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z0-9_-])([A-Za-z0-9_-]{11})(?:$|[^A-Za-z0-9_-])").unwrap());

/// What an identifier is guessed to refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
  Video,
  Playlist,
  Channel,
}

impl IdKind {
  pub fn label(self) -> &'static str {
    match self {
      IdKind::Video => "video",
      IdKind::Playlist => "playlist",
      IdKind::Channel => "channel",
    }
  }
}

impl fmt::Display for IdKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Guess the kind of an identifier. First match wins:
/// `PL…` is a playlist, exactly 11 characters is a video, anything else is a channel.
///
/// An 11-character channel id classifies as a video; the lookup then fails
/// downstream with a not-found error instead of here.
pub fn classify(id: &str) -> IdKind {
  if id.starts_with("PL") {
    IdKind::Playlist
  } else if id.chars().count() == 11 {
    IdKind::Video
  } else {
    IdKind::Channel
  }
}

/// Pull a video id out of free-form input (bare id, watch URL, short link).
pub fn extract_video_id(input: &str) -> Option<String> {
  VIDEO_ID_RE.captures(input.trim()).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Read a query parameter from an absolute URL, a relative `path?query`, or a bare query string.
pub fn query_param(input: &str, name: &str) -> Option<String> {
  let input = input.trim();
  if let Ok(url) = Url::parse(input) {
    return url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned());
  }
  let query = input.split_once('?').map_or(input, |(_, q)| q);
  url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
}

/// Shareable sidebar address for a video id.
pub fn share_url(base: &str, id: &str) -> String {
  let base = base.split_once('?').map_or(base, |(b, _)| b);
  format!("{}?v={}", base, id)
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- classify ---

  #[test]
  fn playlist_prefix_wins_regardless_of_length() {
    assert_eq!(classify("PL"), IdKind::Playlist);
    assert_eq!(classify("PLabcdefghi"), IdKind::Playlist); // 11 chars
    assert_eq!(classify("PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf"), IdKind::Playlist);
  }

  #[test]
  fn eleven_chars_is_video() {
    assert_eq!(classify("dQw4w9WgXcQ"), IdKind::Video);
    assert_eq!(classify("___________"), IdKind::Video);
  }

  #[test]
  fn everything_else_is_channel() {
    assert_eq!(classify("UCuAXFkgsw1L7xaCfnd5JJOw"), IdKind::Channel);
    assert_eq!(classify("short"), IdKind::Channel);
    assert_eq!(classify("dQw4w9WgXcQx"), IdKind::Channel);
    assert_eq!(classify(""), IdKind::Channel);
  }

  #[test]
  fn eleven_char_channel_id_is_indistinguishable_from_video() {
    assert_eq!(classify("UCabcdefghi"), IdKind::Video);
  }

  // --- extract_video_id ---

  #[test]
  fn extracts_bare_id() {
    assert_eq!(extract_video_id("  dQw4w9WgXcQ "), Some("dQw4w9WgXcQ".to_string()));
  }

  #[test]
  fn extracts_from_share_urls() {
    assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
  }

  #[test]
  fn ids_may_start_or_end_with_dash_or_underscore() {
    assert_eq!(extract_video_id("https://youtu.be/-FYG8UlqPw0"), Some("-FYG8UlqPw0".to_string()));
    assert_eq!(extract_video_id("https://www.youtube.com/watch?v=-FYG8UlqPw0"), Some("-FYG8UlqPw0".to_string()));
    assert_eq!(extract_video_id("https://youtu.be/abcdefghij-?t=3"), Some("abcdefghij-".to_string()));
    assert_eq!(extract_video_id("_bcdefghijk"), Some("_bcdefghijk".to_string()));
  }

  #[test]
  fn longer_runs_are_not_ids() {
    assert_eq!(extract_video_id("https://youtube-nocookie.com/x"), None);
    assert_eq!(extract_video_id("-dQw4w9WgXcQ"), None);
  }

  #[test]
  fn garbage_yields_none() {
    assert_eq!(extract_video_id(""), None);
    assert_eq!(extract_video_id("hello world"), None);
    assert_eq!(extract_video_id("PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf"), None);
  }

  // --- query_param / share_url ---

  #[test]
  fn query_param_from_absolute_and_relative() {
    assert_eq!(query_param("https://host/yt/?v=abc&t=3", "v").as_deref(), Some("abc"));
    assert_eq!(query_param("/watch?v=dQw4w9WgXcQ&pp=x", "v").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(query_param("v=xyz", "v").as_deref(), Some("xyz"));
    assert_eq!(query_param("/watch?list=PL1", "v"), None);
  }

  #[test]
  fn share_url_replaces_existing_query() {
    assert_eq!(share_url("https://host/yt/", "dQw4w9WgXcQ"), "https://host/yt/?v=dQw4w9WgXcQ");
    assert_eq!(share_url("https://host/yt/?v=old", "new"), "https://host/yt/?v=new");
  }
}
