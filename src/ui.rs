use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, List, ListItem, ListState, Padding, Paragraph},
};

use crate::admin::AdminField;
use crate::app::{App, AppMode};
use crate::browse::{Listing, Selector};
use crate::constants::constants;
use crate::graphics::{ThumbnailWidget, fit_thumbnail};
use crate::input::TextInput;
use crate::model::{CharacterRequest, RequestStatus, Video};
use crate::pager::AdvanceTrigger;
use crate::theme::Theme;
use crate::youtube::{embed_url, extract_video_id};

const SPINNER: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

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

fn rounded(theme: &Theme) -> Block<'static> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

/// Title on the left, muted metadata flush right.
fn split_line<'a>(left: String, right: String, width: usize, fg: ratatui::style::Color, theme: &Theme) -> Line<'a> {
  let right_w = right.chars().count();
  let left = truncate_str(&left, width.saturating_sub(right_w + 2));
  let gap = width.saturating_sub(left.chars().count() + right_w);
  Line::from(vec![
    Span::styled(left, Style::default().fg(fg)),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(theme.muted)),
  ])
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  }
}

fn spinner(app: &App) -> &'static str {
  SPINNER[(app.started_at.elapsed().as_millis() / 100) as usize % SPINNER.len()]
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, tabs_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_tabs(frame, app, tabs_area);
  match app.mode {
    AppMode::Browse | AppMode::Search => render_browse(frame, app, main_area),
    AppMode::Detail => render_detail(frame, app, main_area),
    AppMode::Requests => render_requests(frame, app, main_area),
    AppMode::SignIn => render_sign_in(frame, app, main_area),
    AppMode::Admin => render_admin(frame, app, main_area),
  }
  render_status(frame, app, status_area);
  render_search(frame, app, input_area);
  render_footer(frame, app, footer_area);
  render_suggestions(frame, app, input_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let title = format!(" ▶ {} ", constants().app_name);
  let mut spans = vec![Span::styled(title, Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))];
  if app.loading {
    spans.push(Span::styled(format!("{} ", spinner(app)), Style::default().fg(theme.status)));
  }
  if let Some(session) = &app.session {
    let who = session.email.as_deref().unwrap_or("operator");
    spans.push(Span::styled(format!("[admin: {}]", who), Style::default().fg(theme.success)));
  }
  frame.render_widget(Line::from(spans), area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

/// Category bar: one tab per selector with its item count.
fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let searching = !app.search.query().is_empty();
  let mut spans = vec![Span::raw(" ")];
  for (i, selector) in Selector::tabs().iter().enumerate() {
    let label = format!(" {} {} ({}) ", i + 1, selector.label(), app.tab_count(selector));
    let style = if *selector == app.selector && !searching {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.muted)
    };
    spans.push(Span::styled(label, style));
    spans.push(Span::raw(" "));
  }
  if searching {
    spans.push(Span::styled(format!(" search: \"{}\"", app.search.query()), Style::default().fg(theme.accent)));
  }
  frame.render_widget(Line::from(spans), area);
}

fn render_empty(frame: &mut Frame, theme: &Theme, area: Rect, title: &str, hint: &str) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled(title.to_string(), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled(hint.to_string(), Style::default().fg(theme.muted))),
  ];
  frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme)), area);
}

fn row_style(theme: &Theme, i: usize, selected: Option<usize>) -> (ratatui::style::Color, ratatui::style::Color) {
  if Some(i) == selected {
    (theme.highlight_fg, theme.highlight_bg)
  } else if i % 2 == 1 {
    (theme.fg, theme.stripe_bg)
  } else {
    (theme.fg, theme.bg)
  }
}

fn render_browse(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let [list_area, preview_area] =
    Layout::horizontal([Constraint::Percentage(58), Constraint::Percentage(42)]).areas(area);

  let Some(catalog) = &app.catalog else {
    let title = format!("{} Loading…", spinner(app));
    render_empty(frame, theme, area, &title, "Fetching the catalog");
    return;
  };
  let Some(listing) = app.listing() else { return };
  if listing.is_empty() {
    let title = if app.search.query().is_empty() { listing.empty_title() } else { "No characters found" };
    render_empty(frame, theme, list_area, title, "Check back soon for new content!");
    render_preview(frame, app, preview_area);
    return;
  }

  let visible = app.visible_len();
  let inner_w = list_area.width.saturating_sub(4) as usize;
  let selected = app.list_state.selected();
  let items: Vec<ListItem> = match &listing {
    Listing::Edits(videos) => app
      .pager
      .slice(videos)
      .iter()
      .enumerate()
      .map(|(i, v)| {
        let (fg, bg) = row_style(theme, i, selected);
        let right = format!("{}  {}", catalog.category_label(&v.category_id), v.created_at.format("%Y-%m-%d"));
        ListItem::new(split_line(v.title.clone(), right, inner_w, fg, theme)).bg(bg)
      })
      .collect(),
    Listing::Characters(chars) => app
      .pager
      .slice(chars)
      .iter()
      .enumerate()
      .map(|(i, c)| {
        let (fg, bg) = row_style(theme, i, selected);
        let count = c.playable().len();
        let right = format!(
          "{}  {} video{}",
          catalog.category_label(&c.character.category_id),
          count,
          if count == 1 { "" } else { "s" }
        );
        ListItem::new(split_line(c.name().to_string(), right, inner_w, fg, theme)).bg(bg)
      })
      .collect(),
  };

  let heading = match &listing {
    Listing::Edits(_) => " Edits ".to_string(),
    Listing::Characters(_) if !app.search.query().is_empty() => " Search results ".to_string(),
    Listing::Characters(_) => format!(" {} ", app.selector.label()),
  };
  let footer = if app.has_more() {
    match app.advance {
      AdvanceTrigger::Button => {
        format!(" {}/{} · m: Load {} More ", visible, listing.len(), app.pager.page_size())
      }
      AdvanceTrigger::Sentinel => format!(" {}/{} · scroll for more ", visible, listing.len()),
    }
  } else {
    format!(" {} ", listing.len())
  };

  let list = List::new(items)
    .block(
      rounded(theme)
        .title(heading)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .title_bottom(Line::from(Span::styled(footer, Style::default().fg(theme.muted))).right_aligned()),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, list_area, &mut app.list_state);
  render_preview(frame, app, preview_area);
}

fn render_detail(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let [list_area, preview_area] =
    Layout::horizontal([Constraint::Percentage(58), Constraint::Percentage(42)]).areas(area);

  let (Some(catalog), Some(character)) = (&app.catalog, app.selected_character()) else {
    render_empty(frame, theme, area, "Character not found", "Esc to go back");
    return;
  };

  let inner_w = list_area.width.saturating_sub(4) as usize;
  let selected = app.detail_state.selected();
  let videos = character.playable();
  let items: Vec<ListItem> = videos
    .iter()
    .enumerate()
    .map(|(i, v)| {
      let (fg, bg) = row_style(theme, i, selected);
      ListItem::new(split_line(v.title.clone(), v.created_at.format("%Y-%m-%d").to_string(), inner_w, fg, theme)).bg(bg)
    })
    .collect();

  let title = Line::from(vec![
    Span::styled(format!(" {} ", character.name()), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(
      format!("{} · {} videos ", catalog.category_label(&character.character.category_id), videos.len()),
      Style::default().fg(theme.muted),
    ),
  ]);
  let mut block = rounded(theme).title(title);
  if let Some(url) = &character.character.image_url {
    block = block.title_bottom(Line::from(Span::styled(format!(" {} ", url), Style::default().fg(theme.muted))));
  }
  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, list_area, &mut app.detail_state);
  render_preview(frame, app, preview_area);
}

/// Thumbnail and links for the highlighted video.
fn render_preview(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let block = rounded(theme)
    .title(Span::styled(" Preview ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let Some(video) = app.highlighted_video().cloned() else { return };
  let Some(embed) = embed_url(&video.youtube_link) else { return };
  let category = app.catalog.as_ref().map_or("", |c| c.category_label(&video.category_id)).to_string();
  let [thumb_area, info_area] = Layout::vertical([Constraint::Min(0), Constraint::Length(6)]).areas(inner);

  if let Some(mode) = app.display_mode {
    render_thumbnail(frame, app, &video, mode, thumb_area);
  }

  let w = info_area.width as usize;
  let lines = vec![
    Line::from(Span::styled(truncate_str(&video.title, w), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(vec![
      Span::styled("Category  ", Style::default().fg(theme.muted)),
      Span::styled(category, Style::default().fg(theme.fg)),
    ]),
    Line::from(vec![
      Span::styled("Posted    ", Style::default().fg(theme.muted)),
      Span::styled(video.created_at.format("%Y-%m-%d %H:%M").to_string(), Style::default().fg(theme.fg)),
    ]),
    Line::from(""),
    Line::from(Span::styled(
      truncate_str(&embed, w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )),
    Line::from(Span::styled(truncate_str(&video.youtube_link, w), Style::default().fg(theme.muted))),
  ];
  frame.render_widget(Paragraph::new(lines), info_area);
}

fn render_thumbnail(frame: &mut Frame, app: &mut App, video: &Video, mode: crate::display::DisplayMode, area: Rect) {
  let Some(video_id) = extract_video_id(&video.youtube_link) else { return };
  let Some((cached_id, image)) = &app.gfx.thumbnail else { return };
  if cached_id != video_id || area.is_empty() {
    return;
  }
  let stale = match &app.gfx.resized {
    Some((id, rect, _)) => id != cached_id || *rect != area,
    None => true,
  };
  if stale {
    app.gfx.resized = Some((cached_id.clone(), area, fit_thumbnail(image, area, mode)));
  }
  if let Some((_, _, resized)) = &app.gfx.resized {
    frame.render_widget(ThumbnailWidget { image: resized, display_mode: mode }, area);
  }
}

fn request_item<'a>(req: &CharacterRequest, theme: &Theme, width: usize) -> ListItem<'a> {
  let date = req.created_at.format("%Y-%m-%d").to_string();
  let (mark, name_style) = match req.status {
    RequestStatus::Pending => ("  ", Style::default().fg(theme.fg)),
    RequestStatus::Fulfilled => ("✓ ", Style::default().fg(theme.success).add_modifier(Modifier::CROSSED_OUT)),
  };
  let right = format!("{}  {}", req.status.label(), date);
  let name = truncate_str(&req.character_name, width.saturating_sub(right.chars().count() + 4));
  let gap = width.saturating_sub(name.chars().count() + right.chars().count() + 2);
  ListItem::new(Line::from(vec![
    Span::styled(mark, Style::default().fg(theme.success)),
    Span::styled(name, name_style),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(theme.muted)),
  ]))
}

fn render_requests(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let dialog = centered(area, 64, area.height);
  frame.render_widget(Clear, dialog);
  let block = rounded(theme)
    .title(Span::styled(" Request a Character ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .padding(Padding::horizontal(1));
  let inner = block.inner(dialog);
  frame.render_widget(block, dialog);

  let [input_area, list_area] = Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(inner);
  let title = if app.requests.submitting { " Character name (submitting…) " } else { " Character name " };
  render_text_field(frame, theme, input_area, title, &mut app.requests.input, true, false);

  if app.requests.loading && app.requests.list.is_empty() {
    let text = format!("{} Loading requests…", spinner(app));
    let text = Line::from(Span::styled(text, Style::default().fg(theme.muted)));
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), list_area);
    return;
  }
  if app.requests.list.is_empty() {
    let text = Line::from(Span::styled("No requests yet", Style::default().fg(theme.muted)));
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), list_area);
    return;
  }
  let width = list_area.width as usize;
  let items: Vec<ListItem> = app.requests.list.iter().map(|r| request_item(r, theme, width)).collect();
  frame.render_widget(List::new(items), list_area);
}

/// Bordered single-line input with horizontal scrolling. Places the cursor when focused.
fn render_text_field(
  frame: &mut Frame,
  theme: &Theme,
  area: Rect,
  title: &str,
  input: &mut TextInput,
  focused: bool,
  masked: bool,
) {
  let border_color = if focused { theme.accent } else { theme.border };
  let block = Block::bordered()
    .title(title.to_string())
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let shown = if masked { "•".repeat(input.value.chars().count()) } else { input.value.clone() };
  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&shown, input.cursor);

  if cursor_col < input.scroll {
    input.scroll = cursor_col;
  } else if cursor_col >= input.scroll + inner_w {
    input.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = shown
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= input.scroll)
    .take_while(|(start, _, _)| *start < input.scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - input.scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_sign_in(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let dialog = centered(area, 52, 10);
  frame.render_widget(Clear, dialog);
  let title = if app.sign_in.busy { " Admin sign-in (signing in…) " } else { " Admin sign-in " };
  let block = rounded(theme)
    .title(Span::styled(title, Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .padding(Padding::horizontal(1));
  let inner = block.inner(dialog);
  frame.render_widget(block, dialog);

  let [email_area, password_area, _] =
    Layout::vertical([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)]).areas(inner);
  let on_password = app.sign_in.on_password;
  render_text_field(frame, theme, email_area, " Email ", &mut app.sign_in.email, !on_password, false);
  render_text_field(frame, theme, password_area, " Password ", &mut app.sign_in.password, on_password, true);
}

/// A `◀ value ▶` selector row for the category and character pickers.
fn picker_line<'a>(label: &str, value: &str, focused: bool, theme: &Theme) -> Line<'a> {
  let label_style = if focused {
    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(theme.muted)
  };
  Line::from(vec![
    Span::styled(format!("{:<10}", label), label_style),
    Span::styled("◀ ", Style::default().fg(theme.muted)),
    Span::styled(value.to_string(), Style::default().fg(theme.fg)),
    Span::styled(" ▶", Style::default().fg(theme.muted)),
  ])
}

fn render_admin(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let title = if app.admin.busy { " Admin panel (saving…) " } else { " Admin panel " };
  let block = rounded(theme)
    .title(Span::styled(title, Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [category_area, character_form, video_form] =
    Layout::vertical([Constraint::Length(1), Constraint::Length(7), Constraint::Min(3)]).areas(inner);

  let focus = app.admin.focus;
  let category = app.admin.selected_category().map_or("(choose a category)".to_string(), |c| c.name.clone());
  frame.render_widget(
    picker_line(AdminField::Category.label(), &category, focus == AdminField::Category, theme),
    category_area,
  );

  let char_block = rounded(theme).title(Span::styled(" Add New Character ", Style::default().fg(theme.fg)));
  let char_inner = char_block.inner(character_form);
  frame.render_widget(char_block, character_form);
  let [name_area, image_area] =
    Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(char_inner);
  render_text_field(
    frame,
    theme,
    name_area,
    &format!(" {} ", AdminField::CharacterName.label()),
    &mut app.admin.name,
    focus == AdminField::CharacterName,
    false,
  );
  render_text_field(
    frame,
    theme,
    image_area,
    &format!(" {} ", AdminField::CharacterImage.label()),
    &mut app.admin.image,
    focus == AdminField::CharacterImage,
    false,
  );

  let video_block = rounded(theme).title(Span::styled(" Post New Video ", Style::default().fg(theme.fg)));
  let video_inner = video_block.inner(video_form);
  frame.render_widget(video_block, video_form);
  let [character_area, title_area, link_area, preview_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Min(0),
  ])
  .areas(video_inner);

  let character = app.admin.selected_character().map_or("None (standalone edit)".to_string(), |c| c.name.clone());
  frame.render_widget(
    picker_line(AdminField::Character.label(), &character, focus == AdminField::Character, theme),
    character_area,
  );
  render_text_field(
    frame,
    theme,
    title_area,
    &format!(" {} ", AdminField::VideoTitle.label()),
    &mut app.admin.title,
    focus == AdminField::VideoTitle,
    false,
  );
  render_text_field(
    frame,
    theme,
    link_area,
    &format!(" {} ", AdminField::VideoLink.label()),
    &mut app.admin.link,
    focus == AdminField::VideoLink,
    false,
  );

  let preview = match app.admin.preview() {
    Some(url) => Line::from(vec![
      Span::styled("Preview  ", Style::default().fg(theme.muted)),
      Span::styled(url, Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED)),
    ]),
    None if app.admin.link.is_empty() => Line::from(""),
    None => Line::from(Span::styled("Not a YouTube link yet", Style::default().fg(theme.muted))),
  };
  frame.render_widget(Paragraph::new(preview), preview_area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ✓ {}", info), Style::default().fg(theme.success))
  } else {
    let count = app.catalog.as_ref().map_or(0, |c| c.video_count());
    let preview = app.display_mode.map_or("previews off", |m| m.label());
    (format!(" Ready · {} videos · {}", count, preview), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_search(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Search;
  render_text_field(frame, theme, area, " Search characters ", &mut app.search.input, focused, false);
}

/// Suggestion dropdown drawn just above the search box. Records its area for
/// click hit-testing.
fn render_suggestions(frame: &mut Frame, app: &mut App, input_area: Rect) {
  if !app.search.open || app.mode != AppMode::Search {
    app.search.area = None;
    return;
  }
  let theme = app.theme();
  let names: Vec<String> = app.suggestions().iter().map(|c| c.name().to_string()).collect();
  if names.is_empty() {
    app.search.area = None;
    return;
  }

  let height = (names.len() as u16 + 2).min(input_area.y);
  let width = input_area.width.min(40);
  let area = Rect { x: input_area.x, y: input_area.y.saturating_sub(height), width, height };
  let inner_w = (width as usize).saturating_sub(4);
  let items: Vec<ListItem> = names.into_iter().map(|n| ListItem::new(truncate_str(&n, inner_w))).collect();
  let list = List::new(items)
    .block(rounded(theme).title(Span::styled(" Suggestions ", Style::default().fg(theme.accent))))
    .style(Style::default().fg(theme.fg).bg(theme.bg))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg));
  let mut state = ListState::default().with_selected(Some(app.search.highlighted));

  frame.render_widget(Clear, area);
  frame.render_stateful_widget(list, area, &mut state);
  app.search.area = Some(area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Browse => {
      let mut k = vec![("/", "Search"), ("Tab", "Category"), ("Enter", "Open"), ("o", "Watch"), ("y", "Copy")];
      k.push(("d", "Download"));
      if app.advance == AdvanceTrigger::Button && app.has_more() {
        k.push(("m", "More"));
      }
      k.extend([("r", "Requests"), ("a", "Admin"), ("^t", "Theme"), ("q", "Quit")]);
      k
    }
    AppMode::Search => vec![("Enter", "Select"), ("↑/↓", "Suggestions"), ("Esc", "Close")],
    AppMode::Detail => vec![("j/k", "Navigate"), ("o", "Watch"), ("y", "Copy"), ("d", "Download"), ("Esc", "Back")],
    AppMode::Requests => vec![("Enter", "Submit"), ("Esc", "Close")],
    AppMode::SignIn => vec![("Tab", "Next field"), ("Enter", "Sign in"), ("Esc", "Cancel")],
    AppMode::Admin => {
      let submit = if app.admin.focus.in_character_form() { "Create character" } else { "Post video" };
      vec![("Tab", "Next field"), ("←/→", "Choose"), ("Enter", submit), ("^l", "Sign out"), ("Esc", "Back")]
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
        s.push(Span::raw(" "));
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
