use image::DynamicImage;
use ratatui::{layout::Rect, widgets::ListState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::admin::{self, AdminError, AdminPanel, SignInPanel};
use crate::backend::{Backend, BackendResult};
use crate::browse::{self, Listing, Selector};
use crate::catalog::{Catalog, load_catalog};
use crate::config::{Config, Settings};
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::input::TextInput;
use crate::model::{Category, Character, CharacterRequest, CharacterWithVideos, Id, Session, Video};
use crate::pager::{AdvanceTrigger, Pager};
use crate::realtime::{FeedStatus, Subscription};
use crate::requests::{self, RequestError};
use crate::share::{self, VideoAction};
use crate::suggest::{SearchBox, suggestions};
use crate::theme::{THEMES, theme_index};
use crate::youtube::{self, extract_video_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Category bar and the paged listing.
  Browse,
  /// Typing in the search box, suggestions open.
  Search,
  /// One character's videos.
  Detail,
  /// Character request dialog.
  Requests,
  SignIn,
  Admin,
}

/// Thumbnail preview state for the highlighted video.
#[derive(Default)]
pub struct GraphicsCache {
  pub thumbnail: Option<(String, DynamicImage)>,
  /// Thumbnail resized for the last drawn area.
  pub resized: Option<(String, Rect, DynamicImage)>,
  /// Video id of the fetch in flight.
  wanted: Option<String>,
}

#[derive(Debug, Default)]
pub struct RequestsDialog {
  pub input: TextInput,
  pub list: Vec<CharacterRequest>,
  pub loading: bool,
  pub submitting: bool,
}

/// In-flight async task receivers.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) catalog_rx: Option<oneshot::Receiver<BackendResult<Catalog>>>,
  pub(crate) subscribe_rx: Option<oneshot::Receiver<BackendResult<Subscription>>>,
  pub(crate) requests_rx: Option<oneshot::Receiver<BackendResult<Vec<CharacterRequest>>>>,
  pub(crate) submit_rx: Option<oneshot::Receiver<Result<String, RequestError>>>,
  pub(crate) sign_in_rx: Option<oneshot::Receiver<Result<Session, AdminError>>>,
  pub(crate) sign_out_rx: Option<oneshot::Receiver<Result<(), AdminError>>>,
  /// Session check; the flag says whether to open the panel on success.
  pub(crate) session_rx: Option<oneshot::Receiver<(bool, Option<Session>)>>,
  pub(crate) categories_rx: Option<oneshot::Receiver<Result<Vec<Category>, AdminError>>>,
  pub(crate) characters_rx: Option<oneshot::Receiver<(Id, Result<Vec<Character>, AdminError>)>>,
  pub(crate) create_rx: Option<oneshot::Receiver<Result<String, AdminError>>>,
  pub(crate) post_rx: Option<oneshot::Receiver<Result<String, AdminError>>>,
  pub(crate) thumb_rx: Option<oneshot::Receiver<(String, anyhow::Result<DynamicImage>)>>,
}

impl AsyncTasks {
  #[cfg(test)]
  fn idle(&self) -> bool {
    self.catalog_rx.is_none()
      && self.subscribe_rx.is_none()
      && self.requests_rx.is_none()
      && self.submit_rx.is_none()
      && self.sign_in_rx.is_none()
      && self.sign_out_rx.is_none()
      && self.session_rx.is_none()
      && self.categories_rx.is_none()
      && self.characters_rx.is_none()
      && self.create_rx.is_none()
      && self.post_rx.is_none()
      && self.thumb_rx.is_none()
  }
}

const FEED_RETRY_INITIAL: Duration = Duration::from_secs(1);

/// Take a finished task's output out of `slot`, putting the receiver back
/// while the task is still running. A task that died yields `Err`.
fn take_ready<T>(slot: &mut Option<oneshot::Receiver<T>>) -> Option<Result<T, oneshot::error::TryRecvError>> {
  let mut rx = slot.take()?;
  match rx.try_recv() {
    Err(oneshot::error::TryRecvError::Empty) => {
      *slot = Some(rx);
      None
    }
    other => Some(other),
  }
}

/// Run `fut` on the runtime and return a receiver for its output.
fn spawn_task<T, F>(fut: F) -> oneshot::Receiver<T>
where
  T: Send + 'static,
  F: Future<Output = T> + Send + 'static,
{
  let (tx, rx) = oneshot::channel();
  tokio::spawn(async move {
    let _ = tx.send(fut.await);
  });
  rx
}

pub struct App {
  backend: Arc<dyn Backend>,
  http: reqwest::Client,
  pub mode: AppMode,
  pub theme_index: usize,
  /// Last successfully loaded catalog. Kept when a reload fails.
  pub catalog: Option<Catalog>,
  pub loading: bool,
  /// A change arrived while loading; reload once more when it finishes.
  reload_pending: bool,
  pub selector: Selector,
  pub pager: Pager,
  pub advance: AdvanceTrigger,
  pub auto_fulfill: bool,
  pub list_state: ListState,
  pub search: SearchBox,
  /// Character shown in the detail view.
  pub selected_character: Option<Id>,
  pub detail_state: ListState,
  pub requests: RequestsDialog,
  pub sign_in: SignInPanel,
  pub admin: AdminPanel,
  pub session: Option<Session>,
  subscription: Option<Subscription>,
  /// When to open the change feed again after it was lost.
  resubscribe_at: Option<Instant>,
  /// Wait before the next resubscribe; doubles per failure.
  feed_backoff: Duration,
  /// The feed went away; the next successful subscribe reloads.
  feed_lost: bool,
  pub display_mode: Option<DisplayMode>,
  pub gfx: GraphicsCache,
  pub last_error: Option<String>,
  /// Success notices, lower priority than errors.
  pub info_message: Option<String>,
  error_time: Option<Instant>,
  info_time: Option<Instant>,
  pub should_quit: bool,
  /// Where theme changes are persisted. `None` keeps them in memory.
  pub prefs_path: Option<PathBuf>,
  pub started_at: Instant,
  pub(crate) tasks: AsyncTasks,
}

impl App {
  pub fn new(backend: Arc<dyn Backend>, settings: &Settings, display_mode: Option<DisplayMode>) -> Self {
    let mut list_state = ListState::default();
    list_state.select(Some(0));
    let mut detail_state = ListState::default();
    detail_state.select(Some(0));

    Self {
      backend,
      http: reqwest::Client::new(),
      mode: AppMode::Browse,
      theme_index: theme_index(settings.theme_name.as_deref()),
      catalog: None,
      loading: false,
      reload_pending: false,
      selector: Selector::Edits,
      pager: Pager::new(settings.page_size),
      advance: settings.advance,
      auto_fulfill: settings.auto_fulfill,
      list_state,
      search: SearchBox::default(),
      selected_character: None,
      detail_state,
      requests: RequestsDialog::default(),
      sign_in: SignInPanel::default(),
      admin: AdminPanel::default(),
      session: None,
      subscription: None,
      resubscribe_at: None,
      feed_backoff: FEED_RETRY_INITIAL,
      feed_lost: false,
      display_mode,
      gfx: GraphicsCache::default(),
      last_error: None,
      info_message: None,
      error_time: None,
      info_time: None,
      should_quit: false,
      prefs_path: None,
      started_at: Instant::now(),
      tasks: AsyncTasks::default(),
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // theme_index is kept in range by theme_index() and next_theme().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    let name = self.theme().name.to_string();
    if let Some(path) = &self.prefs_path
      && let Err(e) = Config::update_at(path, |c| c.theme_name = Some(name))
    {
      warn!(err = %format!("{:#}", e), "config: failed to save theme");
    }
  }

  // --- Notices ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  pub fn set_info(&mut self, msg: String) {
    self.info_message = Some(msg);
    self.info_time = Some(Instant::now());
  }

  /// Clear notices older than the configured lifetime.
  pub fn expire_notices(&mut self) {
    let ttl = Duration::from_secs(constants().notice_ttl_secs);
    if self.error_time.is_some_and(|t| t.elapsed() >= ttl) {
      self.clear_error();
    }
    if self.info_time.is_some_and(|t| t.elapsed() >= ttl) {
      self.info_message = None;
      self.info_time = None;
    }
  }

  // --- Loading ---

  /// Open the change feed and issue the first load.
  pub fn start(&mut self) {
    self.subscribe();
    self.trigger_reload();
  }

  fn subscribe(&mut self) {
    let backend = Arc::clone(&self.backend);
    self.tasks.subscribe_rx = Some(spawn_task(async move { backend.subscribe_video_changes().await }));
  }

  /// Try the change feed again after the current backoff.
  fn schedule_resubscribe(&mut self) {
    self.feed_lost = true;
    self.resubscribe_at = Some(Instant::now() + self.feed_backoff);
    info!(retry_in = ?self.feed_backoff, "realtime: resubscribe scheduled");
    let max = Duration::from_secs(constants().realtime_retry_max_secs);
    self.feed_backoff = (self.feed_backoff * 2).min(max);
  }

  fn feed_status(&mut self, status: FeedStatus) {
    match status {
      FeedStatus::Down(reason) => {
        self.set_error(format!("Live updates interrupted ({}), reconnecting…", reason));
      }
      FeedStatus::Restored => {
        info!("realtime: feed restored");
        self.clear_error();
        self.set_info("Live updates restored".to_string());
        self.request_reload();
      }
    }
  }

  /// Full reload of categories, characters and videos.
  pub fn trigger_reload(&mut self) {
    self.loading = true;
    self.reload_pending = false;
    let backend = Arc::clone(&self.backend);
    self.tasks.catalog_rx = Some(spawn_task(async move { load_catalog(backend.as_ref()).await }));
  }

  /// Reload now, or once the load in flight finishes.
  pub fn request_reload(&mut self) {
    if self.loading {
      self.reload_pending = true;
    } else {
      self.trigger_reload();
    }
  }

  fn catalog_loaded(&mut self, catalog: Catalog) {
    self.catalog = Some(catalog);
    // Keep the detail view if its character survived the reload.
    if let Some(id) = &self.selected_character
      && self.catalog.as_ref().is_some_and(|c| c.character(id).is_none())
    {
      self.selected_character = None;
      if self.mode == AppMode::Detail {
        self.mode = AppMode::Browse;
      }
    }
    self.clamp_selection();
  }

  /// Poll every in-flight task and the change feed. Called once per frame.
  pub fn check_pending(&mut self) {
    if let Some(result) = take_ready(&mut self.tasks.catalog_rx) {
      self.loading = false;
      match result {
        Ok(Ok(catalog)) => self.catalog_loaded(catalog),
        Ok(Err(e)) => {
          warn!(err = %e, "catalog: load failed");
          self.set_error(format!("Failed to load videos: {}", e));
        }
        Err(_) => self.set_error("Load task failed.".to_string()),
      }
      if self.reload_pending {
        debug!("catalog: running deferred reload");
        self.trigger_reload();
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.subscribe_rx) {
      match result {
        Ok(Ok(subscription)) => {
          info!("realtime: listening for video changes");
          self.subscription = Some(subscription);
          self.feed_backoff = FEED_RETRY_INITIAL;
          if self.feed_lost {
            // Changes made while the feed was down were never delivered.
            self.feed_lost = false;
            self.set_info("Live updates restored".to_string());
            self.request_reload();
          }
        }
        Ok(Err(e)) => {
          warn!(err = %e, "realtime: subscribe failed");
          self.set_error(format!("Live updates unavailable: {}", e));
          self.schedule_resubscribe();
        }
        Err(_) => {
          self.set_error("Subscribe task failed.".to_string());
          self.schedule_resubscribe();
        }
      }
    }

    self.check_feed();

    self.check_requests();
    self.check_admin();

    if let Some(result) = take_ready(&mut self.tasks.thumb_rx) {
      match result {
        Ok((video_id, Ok(image))) => {
          self.gfx.thumbnail = Some((video_id, image));
          self.gfx.resized = None;
        }
        Ok((video_id, Err(e))) => debug!(video_id = %video_id, err = %e, "thumbnail: fetch failed"),
        Err(_) => {}
      }
      self.gfx.wanted = None;
    }
  }

  /// Drain the change feed. A feed whose task ended is dropped and
  /// scheduled for resubscribe.
  fn check_feed(&mut self) {
    let (events, statuses, closed) = match self.subscription.as_mut() {
      Some(feed) => (feed.drain(), feed.statuses(), feed.is_closed()),
      None => (Vec::new(), Vec::new(), false),
    };
    for status in statuses {
      self.feed_status(status);
    }
    if !events.is_empty() {
      debug!(count = events.len(), "realtime: change events");
      self.request_reload();
    }
    if closed {
      warn!("realtime: feed task ended");
      self.subscription = None;
      self.set_error("Live updates disconnected, reconnecting…".to_string());
      self.schedule_resubscribe();
    }
    if self.subscription.is_none()
      && self.tasks.subscribe_rx.is_none()
      && self.resubscribe_at.is_some_and(|at| Instant::now() >= at)
    {
      self.resubscribe_at = None;
      self.subscribe();
    }
  }

  fn check_requests(&mut self) {
    if let Some(result) = take_ready(&mut self.tasks.requests_rx) {
      self.requests.loading = false;
      match result {
        Ok(Ok(list)) => self.requests.list = list,
        Ok(Err(e)) => {
          warn!(err = %e, "requests: load failed");
          self.set_error("Failed to load requests".to_string());
        }
        Err(_) => self.set_error("Request task failed.".to_string()),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.submit_rx) {
      self.requests.submitting = false;
      match result {
        Ok(Ok(name)) => {
          self.requests.input.clear();
          info!(name, "requests: submitted from dialog");
          self.set_info("Request submitted successfully!".to_string());
          self.trigger_load_requests();
        }
        Ok(Err(RequestError::Backend(e))) => {
          warn!(err = %e, "requests: submit failed");
          self.set_error("Failed to submit request".to_string());
        }
        Ok(Err(e)) => self.set_error(e.to_string()),
        Err(_) => self.set_error("Request task failed.".to_string()),
      }
    }
  }

  fn check_admin(&mut self) {
    if let Some(result) = take_ready(&mut self.tasks.sign_in_rx) {
      self.sign_in.busy = false;
      match result {
        Ok(Ok(session)) => {
          info!(email = session.email.as_deref().unwrap_or(""), "admin: signed in");
          self.session = Some(session);
          self.sign_in.password.clear();
          self.set_info("Signed in".to_string());
          self.enter_admin();
        }
        Ok(Err(e)) => self.set_error(e.to_string()),
        Err(_) => self.set_error("Sign-in task failed.".to_string()),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.sign_out_rx) {
      if let Ok(Err(e)) = result {
        warn!(err = %e, "admin: sign-out call failed");
      }
      self.session = None;
      self.admin = AdminPanel::default();
      self.mode = AppMode::Browse;
      self.set_info("Signed out".to_string());
    }

    if let Some(result) = take_ready(&mut self.tasks.session_rx) {
      match result {
        Ok((open_panel, Some(session))) => {
          self.session = Some(session);
          if open_panel {
            self.enter_admin();
          }
        }
        Ok((open_panel, None)) => self.session_lost(open_panel),
        Err(_) => self.set_error("Session check failed.".to_string()),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.categories_rx) {
      match result {
        Ok(Ok(categories)) => self.admin.set_categories(categories),
        Ok(Err(e)) => self.set_error(e.to_string()),
        Err(_) => self.set_error("Category task failed.".to_string()),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.characters_rx) {
      match result {
        Ok((category_id, Ok(characters))) => self.admin.set_characters(&category_id, characters),
        Ok((_, Err(e))) => self.set_error(e.to_string()),
        Err(_) => self.set_error("Character task failed.".to_string()),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.create_rx) {
      self.admin.busy = false;
      match result {
        Ok(Ok(name)) => {
          self.set_info(format!("Character \"{}\" created", name));
          self.admin.character_created();
          if let Some(id) = self.admin.selected_category().map(|c| c.id.clone()) {
            self.trigger_load_characters(id);
          }
        }
        Ok(Err(e)) => {
          self.set_error(e.to_string());
          self.verify_session(false);
        }
        Err(_) => self.set_error("Create task failed.".to_string()),
      }
    }

    if let Some(result) = take_ready(&mut self.tasks.post_rx) {
      self.admin.busy = false;
      match result {
        Ok(Ok(title)) => {
          self.set_info(format!("Video \"{}\" posted", title));
          self.admin.video_posted();
        }
        Ok(Err(e)) => {
          self.set_error(e.to_string());
          self.verify_session(false);
        }
        Err(_) => self.set_error("Post task failed.".to_string()),
      }
    }
  }

  /// Release the change feed.
  pub async fn shutdown(&mut self) {
    self.tasks.subscribe_rx = None;
    self.resubscribe_at = None;
    if let Some(subscription) = self.subscription.take() {
      subscription.unsubscribe().await;
    }
  }

  #[cfg(test)]
  pub fn is_subscribed(&self) -> bool {
    self.subscription.is_some()
  }

  // --- Browsing ---

  pub fn listing(&self) -> Option<Listing<'_>> {
    self.catalog.as_ref().map(|c| browse::listing(c, &self.selector, self.search.query()))
  }

  pub fn listing_len(&self) -> usize {
    self.listing().map_or(0, |l| l.len())
  }

  pub fn visible_len(&self) -> usize {
    self.pager.visible_count(self.listing_len())
  }

  pub fn has_more(&self) -> bool {
    self.pager.has_more(self.listing_len())
  }

  /// Items in the listing for `selector`, ignoring any search.
  pub fn tab_count(&self, selector: &Selector) -> usize {
    self.catalog.as_ref().map_or(0, |c| browse::listing(c, selector, "").len())
  }

  fn clamp_selection(&mut self) {
    let visible = self.visible_len();
    match self.list_state.selected() {
      _ if visible == 0 => self.list_state.select(Some(0)),
      Some(i) if i >= visible => self.list_state.select(Some(visible - 1)),
      None => self.list_state.select(Some(0)),
      _ => {}
    }
  }

  /// Any filter change starts over at the first page.
  fn filter_changed(&mut self) {
    self.pager.reset();
    self.list_state.select(Some(0));
    *self.list_state.offset_mut() = 0;
  }

  pub fn select_tab(&mut self, index: usize) {
    let Some(selector) = Selector::tabs().into_iter().nth(index) else { return };
    if selector == self.selector && self.search.query().is_empty() {
      return;
    }
    self.selector = selector;
    self.search.reset();
    self.filter_changed();
  }

  pub fn cycle_tab(&mut self, delta: isize) {
    let tabs = Selector::tabs();
    let current = tabs.iter().position(|t| *t == self.selector).unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(tabs.len() as isize) as usize;
    self.select_tab(next);
  }

  pub fn query_changed(&mut self) {
    self.search.query_changed();
    self.filter_changed();
  }

  pub fn clear_search(&mut self) {
    self.search.reset();
    self.filter_changed();
  }

  pub fn suggestions(&self) -> Vec<&CharacterWithVideos> {
    match &self.catalog {
      Some(catalog) => suggestions(&catalog.characters, self.search.query(), constants().suggestion_limit),
      None => Vec::new(),
    }
  }

  /// Show the suggestion at `index` in the detail view; clears the query and
  /// closes the list.
  pub fn select_suggestion(&mut self, index: usize) {
    let Some(id) = self.suggestions().get(index).map(|c| c.id().to_string()) else { return };
    self.search.reset();
    self.filter_changed();
    self.show_character(id);
  }

  fn show_character(&mut self, id: Id) {
    self.selected_character = Some(id);
    self.detail_state.select(Some(0));
    self.mode = AppMode::Detail;
  }

  pub fn close_detail(&mut self) {
    self.selected_character = None;
    self.mode = AppMode::Browse;
  }

  pub fn selected_character(&self) -> Option<&CharacterWithVideos> {
    let id = self.selected_character.as_ref()?;
    self.catalog.as_ref()?.character(id)
  }

  /// Move the list highlight. With the sentinel trigger, reaching the last
  /// visible row reveals the next page.
  pub fn move_selection(&mut self, delta: isize) {
    let visible = self.visible_len();
    if visible == 0 {
      return;
    }
    let current = self.list_state.selected().unwrap_or(0) as isize;
    let next = (current + delta).clamp(0, visible as isize - 1) as usize;
    self.list_state.select(Some(next));
    if self.advance == AdvanceTrigger::Sentinel {
      let len = self.listing_len();
      if self.pager.reveal(next, len) {
        debug!(visible = self.visible_len(), "pager: sentinel advanced");
      }
    }
  }

  /// Explicit "load more" (button trigger).
  pub fn load_more(&mut self) {
    if self.advance == AdvanceTrigger::Button && self.has_more() {
      self.pager.advance();
    }
  }

  pub fn open_selected(&mut self) {
    let selected = self.list_state.selected().unwrap_or(0);
    let id = match self.listing() {
      Some(Listing::Characters(chars)) if selected < self.visible_len() => {
        chars.get(selected).map(|c| c.id().to_string())
      }
      _ => None,
    };
    if let Some(id) = id {
      self.show_character(id);
    }
  }

  pub fn move_detail_selection(&mut self, delta: isize) {
    let count = self.selected_character().map_or(0, |c| c.playable().len());
    if count == 0 {
      return;
    }
    let current = self.detail_state.selected().unwrap_or(0) as isize;
    self.detail_state.select(Some((current + delta).clamp(0, count as isize - 1) as usize));
  }

  /// The video whose card is currently highlighted.
  pub fn highlighted_video(&self) -> Option<&Video> {
    match self.mode {
      AppMode::Detail => {
        let character = self.selected_character()?;
        character.playable().get(self.detail_state.selected().unwrap_or(0)).copied()
      }
      AppMode::Browse | AppMode::Search => {
        let selected = self.list_state.selected().unwrap_or(0);
        if selected >= self.visible_len() {
          return None;
        }
        match self.listing()? {
          Listing::Edits(videos) => videos.get(selected).copied(),
          Listing::Characters(chars) => {
            chars.get(selected).copied().and_then(|c| c.videos.iter().find(|v| v.has_embed()))
          }
        }
      }
      _ => None,
    }
  }

  pub fn video_action(&mut self, action: VideoAction) {
    let Some(link) = self.highlighted_video().map(|v| v.youtube_link.clone()) else { return };
    let result = match action {
      VideoAction::Open => match extract_video_id(&link) {
        Some(id) => share::open_url(&youtube::watch_url(id)),
        None => share::open_url(&link),
      },
      VideoAction::Copy => {
        share::copy_to_clipboard(&link).map(|()| self.set_info("Link copied to clipboard".to_string()))
      }
      VideoAction::Download => share::open_url(&youtube::download_url(&link)),
    };
    if let Err(e) = result {
      self.set_error(format!("{:#}", e));
    }
  }

  /// Fetch the highlighted video's thumbnail when previews are on.
  pub fn refresh_thumbnail(&mut self) {
    if self.display_mode.is_none() {
      return;
    }
    let Some(video_id) = self.highlighted_video().and_then(|v| extract_video_id(&v.youtube_link)).map(str::to_string)
    else {
      return;
    };
    let have = self.gfx.thumbnail.as_ref().is_some_and(|(id, _)| *id == video_id);
    if have || self.gfx.wanted.as_deref() == Some(video_id.as_str()) {
      return;
    }
    self.gfx.wanted = Some(video_id.clone());
    let client = self.http.clone();
    self.tasks.thumb_rx = Some(spawn_task(async move {
      let result = youtube::fetch_thumbnail(&client, &video_id).await;
      (video_id, result)
    }));
  }

  // --- Requests ---

  pub fn open_requests(&mut self) {
    self.mode = AppMode::Requests;
    self.trigger_load_requests();
  }

  pub fn close_requests(&mut self) {
    self.mode = AppMode::Browse;
  }

  fn trigger_load_requests(&mut self) {
    self.requests.loading = true;
    let backend = Arc::clone(&self.backend);
    let auto_fulfill = self.auto_fulfill;
    self.tasks.requests_rx =
      Some(spawn_task(async move { requests::load_requests(backend.as_ref(), auto_fulfill).await }));
  }

  pub fn submit_request(&mut self) {
    if self.requests.submitting {
      return;
    }
    let name = self.requests.input.value.clone();
    // Empty names fail here, before any network call.
    if name.trim().is_empty() {
      self.set_error(RequestError::EmptyName.to_string());
      return;
    }
    self.requests.submitting = true;
    let backend = Arc::clone(&self.backend);
    self.tasks.submit_rx = Some(spawn_task(async move { requests::submit_request(backend.as_ref(), &name).await }));
  }

  // --- Admin ---

  /// Admin panel when the backend still holds a live session, the sign-in
  /// form otherwise.
  pub fn open_admin(&mut self) {
    if self.session.is_none() {
      self.mode = AppMode::SignIn;
      return;
    }
    self.verify_session(true);
  }

  /// Ask the backend for the current session. Expired sessions come back as
  /// `None` unless the backend could refresh them.
  fn verify_session(&mut self, open_panel: bool) {
    let backend = Arc::clone(&self.backend);
    self.tasks.session_rx = Some(spawn_task(async move { (open_panel, backend.session().await) }));
  }

  fn session_lost(&mut self, open_panel: bool) {
    if self.session.take().is_none() && !open_panel {
      return;
    }
    info!("admin: session expired");
    self.admin = AdminPanel::default();
    if open_panel || self.mode == AppMode::Admin {
      self.mode = AppMode::SignIn;
    }
    self.set_error("Session expired. Please sign in again.".to_string());
  }

  fn enter_admin(&mut self) {
    self.mode = AppMode::Admin;
    let backend = Arc::clone(&self.backend);
    self.tasks.categories_rx = Some(spawn_task(async move { admin::load_categories(backend.as_ref()).await }));
  }

  pub fn submit_sign_in(&mut self) {
    if self.sign_in.busy {
      return;
    }
    let form = self.sign_in.form();
    if let Err(e) = form.check() {
      self.set_error(e.to_string());
      return;
    }
    self.sign_in.busy = true;
    let backend = Arc::clone(&self.backend);
    self.tasks.sign_in_rx = Some(spawn_task(async move { admin::sign_in(backend.as_ref(), form).await }));
  }

  pub fn sign_out(&mut self) {
    let backend = Arc::clone(&self.backend);
    self.tasks.sign_out_rx = Some(spawn_task(async move { admin::sign_out(backend.as_ref()).await }));
  }

  fn trigger_load_characters(&mut self, category_id: Id) {
    let backend = Arc::clone(&self.backend);
    self.tasks.characters_rx = Some(spawn_task(async move {
      let result = admin::load_characters(backend.as_ref(), &category_id).await;
      (category_id, result)
    }));
  }

  pub fn admin_cycle_category(&mut self, delta: isize) {
    if let Some(id) = self.admin.cycle_category(delta) {
      self.trigger_load_characters(id);
    }
  }

  pub fn submit_character(&mut self) {
    if self.admin.busy {
      return;
    }
    let (form, image) = self.admin.character_form();
    if let Err(e) = form.check() {
      self.set_error(e.to_string());
      return;
    }
    self.admin.busy = true;
    let backend = Arc::clone(&self.backend);
    self.tasks.create_rx =
      Some(spawn_task(async move { admin::create_character(backend.as_ref(), form, image).await }));
  }

  pub fn submit_video(&mut self) {
    if self.admin.busy {
      return;
    }
    let form = self.admin.video_form();
    if let Err(e) = form.check() {
      self.set_error(e.to_string());
      return;
    }
    self.admin.busy = true;
    let backend = Arc::clone(&self.backend);
    self.tasks.post_rx = Some(spawn_task(async move { admin::post_video(backend.as_ref(), form).await }));
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use chrono::{Duration as ChronoDuration, Utc};

  use super::*;
  use crate::backend::mock::{MockBackend, MockState};
  use crate::catalog::fixtures::*;
  use crate::model::RequestStatus;
  use crate::realtime::{ChangeEvent, ChangeKind};

  fn settings(advance: AdvanceTrigger) -> Settings {
    Settings {
      url: "https://test.supabase.co".into(),
      anon_key: "anon".into(),
      page_size: 2,
      advance,
      auto_fulfill: true,
      theme_name: None,
    }
  }

  fn state() -> MockState {
    MockState {
      categories: vec![category("c-anime", "Anime"), category("c-music", "Music")],
      characters: vec![
        character("a", "Asta", "c-anime"),
        character("g", "Goku", "c-anime"),
        character("n", "Naruto", "c-anime"),
        character("b", "Bocchi", "c-music"),
      ],
      videos: vec![
        video("v1", "c-anime", Some("a"), 1),
        video("v2", "c-anime", Some("a"), 2),
        video("v3", "c-anime", Some("g"), 3),
        video("v4", "c-anime", Some("n"), 4),
        video("v5", "c-music", Some("b"), 5),
        video("e1", "c-anime", None, 6),
        video("e2", "c-music", None, 7),
        video("e3", "c-anime", None, 8),
      ],
      ..Default::default()
    }
  }

  fn app_with(state: MockState, advance: AdvanceTrigger) -> (App, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::new(state));
    let app = App::new(backend.clone(), &settings(advance), None);
    (app, backend)
  }

  /// Poll until every spawned task has reported back.
  async fn settle(app: &mut App) {
    for _ in 0..200 {
      tokio::time::sleep(Duration::from_millis(1)).await;
      app.check_pending();
      if app.tasks.idle() {
        return;
      }
    }
    panic!("tasks did not settle");
  }

  fn change() -> ChangeEvent {
    ChangeEvent { kind: ChangeKind::Insert, table: "videos".into(), record_id: Some("v9".into()) }
  }

  #[tokio::test]
  async fn start_loads_catalog_and_subscribes() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    assert!(app.loading);
    settle(&mut app).await;
    assert!(!app.loading);
    assert!(app.is_subscribed());
    assert!(backend.subscription_open());
    let catalog = app.catalog.as_ref().unwrap();
    assert_eq!(catalog.standalone.len(), 3);
    assert_eq!(catalog.characters.len(), 4);
  }

  #[tokio::test]
  async fn failed_reload_keeps_previous_catalog() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    backend.state.lock().unwrap().failing_reads.push("videos");
    app.trigger_reload();
    settle(&mut app).await;
    assert_eq!(app.catalog.as_ref().unwrap().video_count(), 8);
    assert!(app.last_error.as_deref().unwrap().starts_with("Failed to load videos"));
  }

  #[tokio::test]
  async fn change_event_triggers_full_reload() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    let reads = backend.video_reads.load(Ordering::SeqCst);

    backend.state.lock().unwrap().videos.push(video("e4", "c-anime", None, 30));
    backend.emit_change(change()).await;
    settle(&mut app).await;
    assert_eq!(backend.video_reads.load(Ordering::SeqCst), reads + 1);
    assert_eq!(app.catalog.as_ref().unwrap().standalone[0].id, "e4");
  }

  #[tokio::test]
  async fn changes_during_a_load_schedule_one_follow_up() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    let reads = backend.video_reads.load(Ordering::SeqCst);

    app.trigger_reload();
    backend.emit_change(change()).await;
    backend.emit_change(change()).await;
    // The load task has not run yet; both events coalesce into one follow-up.
    app.check_pending();
    assert!(app.loading);
    settle(&mut app).await;
    assert_eq!(backend.video_reads.load(Ordering::SeqCst), reads + 2);
  }

  #[tokio::test]
  async fn shutdown_releases_subscription() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    app.shutdown().await;
    assert!(!app.is_subscribed());
    assert!(!backend.subscription_open());
  }

  #[tokio::test]
  async fn switching_tabs_resets_pagination() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    assert_eq!(app.listing_len(), 3);
    assert_eq!(app.visible_len(), 2);
    app.load_more();
    assert_eq!(app.visible_len(), 3);
    assert!(!app.has_more());

    app.select_tab(1);
    assert_eq!(app.selector, Selector::Category("Anime".into()));
    assert_eq!(app.listing_len(), 3);
    assert_eq!(app.visible_len(), 2);
    assert_eq!(app.tab_count(&Selector::Category("Movies".into())), 0);
  }

  #[tokio::test]
  async fn sentinel_advances_on_last_visible_row() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Sentinel);
    app.start();
    settle(&mut app).await;
    app.load_more();
    assert_eq!(app.visible_len(), 2);
    app.move_selection(1);
    assert_eq!(app.visible_len(), 3);
  }

  #[tokio::test]
  async fn search_query_resets_pager_and_overrides_tab() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    app.load_more();
    app.search.input.set("go");
    app.query_changed();
    assert!(app.search.open);
    assert_eq!(app.pager.visible_count(100), 2);
    let Some(Listing::Characters(chars)) = app.listing() else { panic!("expected characters") };
    assert_eq!(chars.len(), 1);
    assert_eq!(chars[0].name(), "Goku");
  }

  #[tokio::test]
  async fn picking_a_suggestion_opens_detail_and_clears_search() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    app.mode = AppMode::Search;
    app.search.input.set("n");
    app.query_changed();
    assert_eq!(app.suggestions().len(), 1);
    app.select_suggestion(0);
    assert_eq!(app.mode, AppMode::Detail);
    assert_eq!(app.selected_character().map(|c| c.name()), Some("Naruto"));
    assert_eq!(app.search.query(), "");
    assert!(!app.search.open);
    assert_eq!(app.highlighted_video().map(|v| v.id.as_str()), Some("v4"));
  }

  #[tokio::test]
  async fn blank_request_never_reaches_backend() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.requests.input.set("   ");
    app.submit_request();
    assert_eq!(app.last_error.as_deref(), Some("Please enter a character name"));
    assert_eq!(backend.calls(), 0);
  }

  #[tokio::test]
  async fn submitted_request_clears_input_and_reloads_list() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Button);
    app.open_requests();
    settle(&mut app).await;
    assert!(app.requests.list.is_empty());

    app.requests.input.set("Luffy");
    app.submit_request();
    settle(&mut app).await;
    assert!(app.requests.input.is_empty());
    assert_eq!(app.requests.list.len(), 1);
    assert_eq!(app.requests.list[0].status, RequestStatus::Pending);

    app.requests.input.set("luffy");
    app.submit_request();
    settle(&mut app).await;
    assert_eq!(app.last_error.as_deref(), Some("This character has already been requested"));
    assert_eq!(app.requests.input.value, "luffy");
  }

  #[tokio::test]
  async fn sign_in_then_admin_panel_loads_categories() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Button);
    app.open_admin();
    assert_eq!(app.mode, AppMode::SignIn);

    app.sign_in.email.set("op@example.com");
    app.sign_in.password.set("correct horse");
    app.submit_sign_in();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::Admin);
    assert!(app.session.is_some());
    assert_eq!(app.admin.categories.len(), 2);

    app.admin_cycle_category(1);
    settle(&mut app).await;
    let names: Vec<&str> = app.admin.characters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Asta", "Goku", "Naruto"]);

    app.admin.title.set("New edit");
    app.admin.link.set("https://youtu.be/dQw4w9WgXcQ");
    app.submit_video();
    settle(&mut app).await;
    assert_eq!(app.info_message.as_deref(), Some("Video \"New edit\" posted"));
    assert!(app.admin.title.is_empty());

    app.sign_out();
    settle(&mut app).await;
    assert!(app.session.is_none());
    assert_eq!(app.mode, AppMode::Browse);
  }

  #[tokio::test]
  async fn wrong_password_stays_on_sign_in() {
    let (mut app, _backend) = app_with(state(), AdvanceTrigger::Button);
    app.open_admin();
    app.sign_in.email.set("op@example.com");
    app.sign_in.password.set("hunter22");
    app.submit_sign_in();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::SignIn);
    assert_eq!(app.last_error.as_deref(), Some("Invalid login credentials"));
  }

  fn session_expiring_in(delta: ChronoDuration) -> Session {
    Session {
      access_token: "token".into(),
      refresh_token: None,
      expires_at: Some(Utc::now() + delta),
      email: Some("op@example.com".into()),
    }
  }

  #[tokio::test]
  async fn expired_session_sends_admin_back_to_sign_in() {
    let stale = session_expiring_in(-ChronoDuration::minutes(5));
    let (mut app, backend) = app_with(MockState { session: Some(stale.clone()), ..state() }, AdvanceTrigger::Button);
    app.session = Some(stale);
    app.open_admin();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::SignIn);
    assert!(app.session.is_none());
    assert_eq!(app.last_error.as_deref(), Some("Session expired. Please sign in again."));
    assert!(backend.state.lock().unwrap().session.is_none());
    assert!(app.admin.categories.is_empty());
  }

  #[tokio::test]
  async fn live_session_opens_admin_panel() {
    let live = session_expiring_in(ChronoDuration::hours(1));
    let (mut app, _backend) = app_with(MockState { session: Some(live.clone()), ..state() }, AdvanceTrigger::Button);
    app.session = Some(live);
    app.open_admin();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::Admin);
    assert_eq!(app.admin.categories.len(), 2);
  }

  #[tokio::test]
  async fn failed_post_with_lapsed_session_returns_to_sign_in() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.open_admin();
    app.sign_in.email.set("op@example.com");
    app.sign_in.password.set("correct horse");
    app.submit_sign_in();
    settle(&mut app).await;
    app.admin_cycle_category(1);
    settle(&mut app).await;

    {
      let mut state = backend.state.lock().unwrap();
      state.fail_writes = true;
      state.session = Some(session_expiring_in(-ChronoDuration::seconds(1)));
    }
    app.admin.title.set("New edit");
    app.admin.link.set("https://youtu.be/dQw4w9WgXcQ");
    app.submit_video();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::SignIn);
    assert!(app.session.is_none());
  }

  #[tokio::test]
  async fn feed_outage_is_reported_and_restore_reloads() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    let reads = backend.video_reads.load(Ordering::SeqCst);

    backend.emit_status(FeedStatus::Down("socket closed by server".into())).await;
    app.check_pending();
    assert!(app.last_error.as_deref().unwrap().starts_with("Live updates interrupted"));

    backend.emit_status(FeedStatus::Restored).await;
    settle(&mut app).await;
    assert_eq!(backend.video_reads.load(Ordering::SeqCst), reads + 1);
    assert_eq!(app.last_error, None);
    assert_eq!(app.info_message.as_deref(), Some("Live updates restored"));
  }

  #[tokio::test]
  async fn ended_feed_is_resubscribed_after_backoff() {
    let (mut app, backend) = app_with(state(), AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;

    backend.close_feed();
    app.check_pending();
    assert!(!app.is_subscribed());
    assert_eq!(app.last_error.as_deref(), Some("Live updates disconnected, reconnecting…"));
    assert!(app.resubscribe_at.is_some_and(|at| at > Instant::now()));
    assert_eq!(app.feed_backoff, Duration::from_secs(2));

    app.check_pending();
    assert!(app.tasks.subscribe_rx.is_none());

    let reads = backend.video_reads.load(Ordering::SeqCst);
    app.resubscribe_at = Some(Instant::now());
    settle(&mut app).await;
    assert!(app.is_subscribed());
    assert!(backend.subscription_open());
    assert_eq!(backend.video_reads.load(Ordering::SeqCst), reads + 1);
    assert_eq!(app.feed_backoff, FEED_RETRY_INITIAL);
  }

  #[tokio::test]
  async fn failed_subscribe_retries_with_growing_backoff() {
    let (mut app, backend) = app_with(MockState { failing_reads: vec!["realtime"], ..state() }, AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    assert!(app.last_error.as_deref().unwrap().starts_with("Live updates unavailable"));
    assert!(!app.is_subscribed());

    app.resubscribe_at = Some(Instant::now());
    settle(&mut app).await;
    assert_eq!(app.feed_backoff, Duration::from_secs(4));

    backend.state.lock().unwrap().failing_reads.clear();
    app.resubscribe_at = Some(Instant::now());
    settle(&mut app).await;
    assert!(app.is_subscribed());
    assert_eq!(app.info_message.as_deref(), Some("Live updates restored"));
  }

  #[tokio::test]
  async fn unplayable_videos_are_never_highlighted() {
    let mut state = state();
    state.videos.retain(|v| v.character_id.is_some());
    state.videos.push(channel_video("e9", "c-anime", None, 40));
    state.videos.push(channel_video("v9", "c-music", Some("b"), 41));
    let (mut app, _backend) = app_with(state, AdvanceTrigger::Button);
    app.start();
    settle(&mut app).await;
    assert_eq!(app.listing_len(), 0);
    assert_eq!(app.highlighted_video(), None);

    app.select_tab(2);
    let Some(Listing::Characters(chars)) = app.listing() else { panic!("expected characters") };
    assert_eq!(chars.len(), 1);
    assert_eq!(app.highlighted_video().map(|v| v.id.as_str()), Some("v5"));
    app.open_selected();
    app.move_detail_selection(1);
    assert_eq!(app.highlighted_video().map(|v| v.id.as_str()), Some("v5"));
  }
}
