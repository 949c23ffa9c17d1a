use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, AppMode};
use crate::duration::format_duration;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(Span::styled(" ▶ yside ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let right_text = match &app.share_url {
    Some(url) => format!("{} ", url),
    None => format!("v{} ", env!("CARGO_PKG_VERSION")),
  };
  let width = (right_text.chars().count() as u16).min(area.width.saturating_sub(10));
  let right = Line::from(Span::styled(truncate_str(&right_text, width as usize), Style::default().fg(theme.muted)));
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let [list_area, player_area] =
    Layout::horizontal([Constraint::Percentage(64), Constraint::Percentage(36)]).areas(area);

  if let Some(message) = &app.list_error {
    render_list_error(frame, app.theme(), message, list_area);
  } else if app.videos.is_empty() {
    render_welcome(frame, app.theme(), list_area);
  } else {
    render_videos(frame, app, list_area);
  }
  render_player(frame, app, player_area);
}

fn bordered(theme: &Theme) -> Block<'static> {
  Block::bordered()
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▶  Related videos", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Paste a video URL or id, a playlist id or a channel id.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("The newest uploads of the owning channel show up here.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(bordered(theme));
  frame.render_widget(paragraph, area);
}

fn render_list_error(frame: &mut Frame, theme: &Theme, message: &str, area: Rect) {
  let text = vec![Line::from(""), Line::from(Span::styled(message.to_string(), Style::default().fg(theme.error)))];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(bordered(theme).title(" Related "));
  frame.render_widget(paragraph, area);
}

fn render_videos(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let playing = app.now_playing().map(|(id, _)| id.to_string());

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .videos
    .iter()
    .enumerate()
    .map(|(i, video)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let badge = format!(" {} ", format_duration(video.duration.as_deref()));
      let date = video.publish_time.format("%Y-%m-%d").to_string();
      let marker = if playing.as_deref() == Some(video.id.as_str()) { "♪ " } else { "" };

      let right_w = date.chars().count();
      let title_max = inner_w.saturating_sub(badge.chars().count() + right_w + marker.chars().count() + 3);
      let title = truncate_str(&video.title, title_max);
      let used = badge.chars().count() + 1 + marker.chars().count() + title.chars().count() + right_w;
      let gap = inner_w.saturating_sub(used);

      let line = Line::from(vec![
        Span::styled(badge, Style::default().fg(theme.badge_fg).bg(theme.badge_bg)),
        Span::raw(" "),
        Span::styled(marker, Style::default().fg(theme.accent)),
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(date, Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = match &app.list_source {
    Some(source) => format!(" Related to {} · {} videos ", source, app.videos.len()),
    None => " Related ".to_string(),
  };

  let list = List::new(items)
    .block(
      bordered(theme).title(title).title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_player(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let state = app.player.as_ref().map(|p| p.state.label()).unwrap_or("no player");
  let info_title = Line::from(vec![
    Span::styled(" Now Playing ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", state), Style::default().fg(theme.muted)),
  ]);
  let block = bordered(theme).title(info_title).padding(Padding::horizontal(1));

  let Some((id, summary)) = app.now_playing() else {
    frame.render_widget(block, area);
    return;
  };
  let inner_w = area.width.saturating_sub(4) as usize;
  let mut lines = vec![Line::from("")];
  if let Some(video) = summary {
    lines.push(Line::from(Span::styled(
      truncate_str(&video.title, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
      Span::styled("Duration  ", Style::default().fg(theme.muted)),
      Span::styled(format_duration(video.duration.as_deref()), Style::default().fg(theme.fg)),
    ]));
    lines.push(Line::from(vec![
      Span::styled("Published ", Style::default().fg(theme.muted)),
      Span::styled(video.publish_time.format("%Y-%m-%d").to_string(), Style::default().fg(theme.fg)),
    ]));
  } else {
    lines.push(Line::from(Span::styled(id.to_string(), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))));
  }
  lines.push(Line::from(""));
  if let Some(url) = app.now_playing_url() {
    lines.push(Line::from(Span::styled(
      truncate_str(&url, inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )));
  }
  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    match app.player.as_ref() {
      Some(player) if app.player_ready => (format!(" ♪ {}", player.state.label()), Style::default().fg(theme.status)),
      _ => (" Ready".to_string(), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.input_invalid {
    theme.error
  } else if app.mode == AppMode::Input {
    theme.accent
  } else {
    theme.border
  };
  let input_block = Block::bordered()
    .title(" Video ID or URL ")
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_results = !app.videos.is_empty();
  let playing = app.player.as_ref().map(|p| p.is_playing());
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Load"), ("^t", "Theme"), ("^o", "Viewer")];
      if has_results {
        k.push(("↓", "Related"));
      }
      k.push(("Esc", if has_results { "Related" } else { "Quit" }));
      k
    }
    AppMode::Results => {
      let mut k = vec![("Enter", "Play"), ("j/k", "Navigate")];
      if let Some(playing) = playing {
        k.push(("Space", if playing { "Pause" } else { "Play" }));
      }
      k.push(("^o", "Viewer"));
      k.push(("Esc", "Back"));
      k
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
