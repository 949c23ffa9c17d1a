use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => {
        app.should_quit = true;
        return;
      }
      KeyCode::Char('t') => {
        app.next_theme();
        return;
      }
      KeyCode::Char('o') => {
        app.open_in_viewer();
        return;
      }
      _ => {}
    }
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => handle_results_key(app, key),
  }
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.submit();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      app.input_invalid = false;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.input_invalid = false;
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.input_invalid = false;
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
        app.input_invalid = false;
      } else if !app.videos.is_empty() {
        app.mode = AppMode::Results;
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Down => {
      if !app.videos.is_empty() {
        app.mode = AppMode::Results;
      }
    }
    _ => {}
  }
}

fn handle_results_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.play_selected();
    }
    KeyCode::Char(' ') => {
      app.toggle_pause();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.videos.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| (i + 1) % count);
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.videos.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Esc => {
      app.mode = AppMode::Input;
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use chrono::NaiveDate;
  use ratatui::crossterm::event::KeyEvent;

  use crate::resolver::VideoSummary;

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn app_with_videos(n: usize) -> App {
    let mut app = App::new(Config::default(), None, None);
    app.videos = (0..n)
      .map(|i| VideoSummary {
        id: format!("vid{:08}", i),
        title: format!("Video {}", i),
        publish_time: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        duration: None,
      })
      .collect();
    app.list_state.select(Some(0));
    app
  }

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日"; // a=1 byte, é=2 bytes, 日=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0);
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 3);
    assert_eq!(char_to_byte_index(s, 3), 6);
  }

  #[test]
  fn char_to_byte_empty() {
    assert_eq!(char_to_byte_index("", 0), 0);
    assert_eq!(char_to_byte_index("", 5), 0);
  }

  // --- key handling ---

  #[test]
  fn typing_edits_at_cursor() {
    let mut app = app_with_videos(0);
    for c in "dQw4".chars() {
      handle_key_event(&mut app, press(KeyCode::Char(c)));
    }
    handle_key_event(&mut app, press(KeyCode::Home));
    handle_key_event(&mut app, press(KeyCode::Delete));
    handle_key_event(&mut app, press(KeyCode::End));
    handle_key_event(&mut app, press(KeyCode::Backspace));
    assert_eq!(app.input, "Qw");
    assert_eq!(app.cursor_position, 2);
  }

  #[test]
  fn results_navigation_wraps() {
    let mut app = app_with_videos(3);
    app.mode = AppMode::Results;
    handle_key_event(&mut app, press(KeyCode::Char('k')));
    assert_eq!(app.list_state.selected(), Some(2));
    handle_key_event(&mut app, press(KeyCode::Char('j')));
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[test]
  fn esc_moves_between_modes_then_quits() {
    let mut app = app_with_videos(2);
    handle_key_event(&mut app, press(KeyCode::Esc));
    assert_eq!(app.mode, AppMode::Results);
    handle_key_event(&mut app, press(KeyCode::Esc));
    assert_eq!(app.mode, AppMode::Input);

    let mut empty = app_with_videos(0);
    handle_key_event(&mut empty, press(KeyCode::Esc));
    assert!(empty.should_quit);
  }

  #[test]
  fn enter_in_results_mirrors_selection_into_input() {
    let mut app = app_with_videos(3);
    app.mode = AppMode::Results;
    handle_key_event(&mut app, press(KeyCode::Down));
    handle_key_event(&mut app, press(KeyCode::Enter));
    assert_eq!(app.input, "vid00000001");
  }

  #[test]
  fn ctrl_c_quits_from_any_mode() {
    let mut app = app_with_videos(1);
    app.mode = AppMode::Results;
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }
}
