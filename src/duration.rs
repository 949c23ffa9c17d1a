use regex::Regex;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").unwrap());

/// Format an ISO-8601 video duration (`PT#H#M#S`, any subset) as a clock string.
///
/// `PT1H2M3S` → `1:02:03`, `PT5M9S` → `5:09`, `PT45S` → `0:45`.
/// Absent or unparseable input formats as `0:00`.
pub fn format_duration(iso: Option<&str>) -> String {
  let Some(caps) = iso.and_then(|s| DURATION_RE.captures(s)) else {
    return "0:00".to_string();
  };
  let part = |i: usize| -> u64 { caps.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0) };
  let (hours, minutes, seconds) = (part(1), part(2), part(3));

  if hours > 0 {
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
  } else {
    format!("{}:{:02}", minutes, seconds)
  }
}
