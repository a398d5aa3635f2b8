use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::admin::AdminField;
use crate::app::{App, AppMode};
use crate::share::VideoAction;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Single-line editable text with a char-indexed cursor and a horizontal
/// scroll offset maintained by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
  pub value: String,
  /// Cursor position (char index).
  pub cursor: usize,
  /// Display-column scroll offset.
  pub scroll: usize,
}

impl TextInput {
  pub fn set(&mut self, value: &str) {
    self.value = value.to_string();
    self.cursor = self.value.chars().count();
  }

  pub fn clear(&mut self) {
    self.value.clear();
    self.cursor = 0;
    self.scroll = 0;
  }

  pub fn is_empty(&self) -> bool {
    self.value.is_empty()
  }

  fn char_count(&self) -> usize {
    self.value.chars().count()
  }

  /// Apply an editing key. Returns true when the text changed.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_idx, c);
        self.cursor += 1;
        true
      }
      KeyCode::Backspace => {
        if self.cursor == 0 {
          return false;
        }
        self.cursor -= 1;
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.remove(byte_idx);
        true
      }
      KeyCode::Delete => {
        if self.cursor >= self.char_count() {
          return false;
        }
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.remove(byte_idx);
        true
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        false
      }
      KeyCode::Right => {
        if self.cursor < self.char_count() {
          self.cursor += 1;
        }
        false
      }
      KeyCode::Home => {
        self.cursor = 0;
        false
      }
      KeyCode::End => {
        self.cursor = self.char_count();
        false
      }
      _ => false,
    }
  }
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
  let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
  if ctrl && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if ctrl && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key),
    AppMode::Search => handle_search_key(app, key),
    AppMode::Detail => handle_detail_key(app, key),
    AppMode::Requests => handle_requests_key(app, key),
    AppMode::SignIn => handle_sign_in_key(app, key),
    AppMode::Admin => handle_admin_key(app, key),
  }
}

/// Video card actions shared by the browse and detail views.
fn video_action_for(code: KeyCode) -> Option<VideoAction> {
  match code {
    KeyCode::Char('o') => Some(VideoAction::Open),
    KeyCode::Char('y') => Some(VideoAction::Copy),
    KeyCode::Char('d') => Some(VideoAction::Download),
    _ => None,
  }
}

fn handle_browse_key(app: &mut App, key: KeyEvent) {
  if let Some(action) = video_action_for(key.code) {
    app.video_action(action);
    return;
  }
  match key.code {
    KeyCode::Char('q') => app.should_quit = true,
    KeyCode::Esc => {
      if app.search.query().is_empty() {
        app.should_quit = true;
      } else {
        app.clear_search();
      }
    }
    KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
    KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
    KeyCode::Right | KeyCode::Tab | KeyCode::Char('l') => app.cycle_tab(1),
    KeyCode::Left | KeyCode::BackTab | KeyCode::Char('h') => app.cycle_tab(-1),
    KeyCode::Char(c @ '1'..='9') => app.select_tab(c as usize - '1' as usize),
    KeyCode::Char('m') => app.load_more(),
    KeyCode::Char('/') => app.mode = AppMode::Search,
    KeyCode::Char('r') => app.open_requests(),
    KeyCode::Char('a') => app.open_admin(),
    KeyCode::Enter => app.open_selected(),
    _ => {}
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Esc => {
      if app.search.open {
        app.search.dismiss();
      } else {
        app.mode = AppMode::Browse;
      }
    }
    KeyCode::Down => {
      let count = app.suggestions().len();
      if app.search.open && count > 0 {
        app.search.highlight_next(count);
      } else {
        app.search.dismiss();
        app.mode = AppMode::Browse;
      }
    }
    KeyCode::Up => {
      let count = app.suggestions().len();
      app.search.highlight_prev(count);
    }
    KeyCode::Enter => {
      if app.search.open && !app.suggestions().is_empty() {
        app.select_suggestion(app.search.highlighted);
      } else {
        app.search.dismiss();
        app.mode = AppMode::Browse;
      }
    }
    _ => {
      if app.search.input.handle_key(key) {
        app.query_changed();
      }
    }
  }
}

fn handle_detail_key(app: &mut App, key: KeyEvent) {
  if let Some(action) = video_action_for(key.code) {
    app.video_action(action);
    return;
  }
  match key.code {
    KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => app.close_detail(),
    KeyCode::Down | KeyCode::Char('j') => app.move_detail_selection(1),
    KeyCode::Up | KeyCode::Char('k') => app.move_detail_selection(-1),
    KeyCode::Char('/') => app.mode = AppMode::Search,
    _ => {}
  }
}

fn handle_requests_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Esc => app.close_requests(),
    KeyCode::Enter => app.submit_request(),
    _ => {
      app.requests.input.handle_key(key);
    }
  }
}

fn handle_sign_in_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Esc => app.mode = AppMode::Browse,
    KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
      app.sign_in.on_password = !app.sign_in.on_password;
    }
    KeyCode::Enter => {
      if app.sign_in.on_password {
        app.submit_sign_in();
      } else {
        app.sign_in.on_password = true;
      }
    }
    _ => {
      app.sign_in.focused_input().handle_key(key);
    }
  }
}

fn handle_admin_key(app: &mut App, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('l') {
    app.sign_out();
    return;
  }
  match key.code {
    KeyCode::Esc => app.mode = AppMode::Browse,
    KeyCode::Tab | KeyCode::Down => app.admin.focus = app.admin.focus.next(),
    KeyCode::BackTab | KeyCode::Up => app.admin.focus = app.admin.focus.prev(),
    KeyCode::Enter => {
      if app.admin.focus.in_character_form() {
        app.submit_character();
      } else if app.admin.focus != AdminField::Category {
        app.submit_video();
      }
    }
    KeyCode::Left | KeyCode::Right if app.admin.focus == AdminField::Category => {
      app.admin_cycle_category(if key.code == KeyCode::Left { -1 } else { 1 });
    }
    KeyCode::Left | KeyCode::Right if app.admin.focus == AdminField::Character => {
      app.admin.cycle_character(if key.code == KeyCode::Left { -1 } else { 1 });
    }
    _ => {
      if let Some(input) = app.admin.focused_input() {
        input.handle_key(key);
      }
    }
  }
}

/// Mouse: a left click anywhere outside the open suggestion list closes it;
/// a click on a suggestion row selects it.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
  match mouse.kind {
    MouseEventKind::Down(MouseButton::Left) => {
      if let Some(row) = app.search.click(mouse.column, mouse.row)
        && row < app.suggestions().len()
      {
        app.select_suggestion(row);
      }
    }
    MouseEventKind::ScrollDown if app.mode == AppMode::Browse => app.move_selection(1),
    MouseEventKind::ScrollUp if app.mode == AppMode::Browse => app.move_selection(-1),
    _ => {}
  }
}
