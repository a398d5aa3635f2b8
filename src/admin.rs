//! Operator panel: sign-in, form validation, image upload, and the
//! create-character / post-video operations.

use chrono::Utc;
use image::ImageFormat;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use crate::backend::{Backend, BackendError};
use crate::constants::constants;
use crate::input::TextInput;
use crate::model::{Category, Character, Id, NewCharacter, NewVideo, Session};
use crate::youtube::{embed_url, extract_video_id};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
  /// Client-side validation failure. Raised before any network call.
  #[error("{0}")]
  Invalid(String),

  #[error("{context}")]
  Backend {
    context: &'static str,
    #[source]
    source: BackendError,
  },

  #[error("{0}")]
  Auth(String),

  #[error("Could not read image: {0}")]
  Io(#[from] std::io::Error),
}

impl AdminError {
  fn invalid(message: &str) -> Self {
    AdminError::Invalid(message.to_string())
  }

  fn backend(context: &'static str) -> impl FnOnce(BackendError) -> Self {
    move |source| {
      warn!(err = %source, "admin: {}", context);
      AdminError::Backend { context, source }
    }
  }
}

/// Validation code of the first error on `field`, if that field failed.
fn field_code(errors: &Option<ValidationErrors>, field: &str) -> Option<String> {
  let errors = errors.as_ref()?;
  let fields = errors.field_errors();
  fields.get(field).copied().and_then(|errs| errs.first()).map(|e| e.code.to_string())
}

// --- Forms ---

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct CharacterForm {
  #[validate(length(min = 1, max = 100))]
  pub name: String,
  #[validate(length(min = 1))]
  pub category_id: String,
}

impl CharacterForm {
  pub fn new(name: &str, category_id: Option<&str>) -> Self {
    Self { name: name.trim().to_string(), category_id: category_id.unwrap_or_default().to_string() }
  }

  /// First failing field in form order.
  pub fn check(&self) -> Result<(), AdminError> {
    let errors = self.validate().err();
    if field_code(&errors, "name").is_some() {
      return Err(AdminError::invalid(if self.name.is_empty() {
        "Character name is required"
      } else {
        "Character name must be less than 100 characters"
      }));
    }
    if field_code(&errors, "category_id").is_some() {
      return Err(AdminError::invalid("Invalid category selected"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct VideoForm {
  #[validate(length(min = 1, max = 500))]
  pub title: String,
  #[validate(url)]
  pub youtube_link: String,
  /// `None` posts a standalone edit.
  pub character_id: Option<Id>,
  #[validate(length(min = 1))]
  pub category_id: String,
}

impl VideoForm {
  pub fn new(title: &str, link: &str, character_id: Option<&str>, category_id: Option<&str>) -> Self {
    Self {
      title: title.trim().to_string(),
      youtube_link: link.trim().to_string(),
      character_id: character_id.map(str::to_string),
      category_id: category_id.unwrap_or_default().to_string(),
    }
  }

  pub fn check(&self) -> Result<(), AdminError> {
    let errors = self.validate().err();
    if field_code(&errors, "title").is_some() {
      return Err(AdminError::invalid(if self.title.is_empty() {
        "Video title is required"
      } else {
        "Video title must be less than 500 characters"
      }));
    }
    if field_code(&errors, "youtube_link").is_some() {
      return Err(AdminError::invalid("Invalid URL"));
    }
    if extract_video_id(&self.youtube_link).is_none() {
      return Err(AdminError::invalid("Must be a valid YouTube URL"));
    }
    if field_code(&errors, "category_id").is_some() {
      return Err(AdminError::invalid("Invalid category selected"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct SignInForm {
  #[validate(email, length(max = 255))]
  pub email: String,
  #[validate(length(min = 6, max = 100))]
  pub password: String,
}

impl SignInForm {
  pub fn new(email: &str, password: &str) -> Self {
    Self { email: email.trim().to_string(), password: password.to_string() }
  }

  pub fn check(&self) -> Result<(), AdminError> {
    let errors = self.validate().err();
    match field_code(&errors, "email").as_deref() {
      Some("email") => return Err(AdminError::invalid("Invalid email address")),
      Some(_) => return Err(AdminError::invalid("Email must be less than 255 characters")),
      None => {}
    }
    if field_code(&errors, "password").is_some() {
      return Err(AdminError::invalid(if self.password.chars().count() < 6 {
        "Password must be at least 6 characters"
      } else {
        "Password must be less than 100 characters"
      }));
    }
    Ok(())
  }
}

// --- Images ---

/// Where a new character's avatar comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
  None,
  /// Local file, uploaded to storage.
  File(PathBuf),
  /// Already hosted elsewhere; stored as-is.
  Url(String),
}

impl ImageSource {
  pub fn parse(raw: &str) -> Self {
    let raw = raw.trim();
    if raw.is_empty() {
      ImageSource::None
    } else if raw.starts_with("http://") || raw.starts_with("https://") {
      ImageSource::Url(raw.to_string())
    } else {
      ImageSource::File(PathBuf::from(raw))
    }
  }
}

/// A validated local image, ready for upload.
#[derive(Debug)]
pub struct ImageUpload {
  pub file_name: String,
  pub content_type: &'static str,
  pub bytes: Vec<u8>,
}

fn base36(mut n: u64) -> String {
  const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  if n == 0 {
    return "0".to_string();
  }
  let mut out = Vec::new();
  while n > 0 {
    out.push(DIGITS[(n % 36) as usize]);
    n /= 36;
  }
  out.reverse();
  String::from_utf8(out).unwrap_or_default()
}

/// `{random base36}-{unix millis}.{ext}`
pub fn upload_file_name<R: Rng + ?Sized>(rng: &mut R, ext: &str) -> String {
  format!("{}-{}.{}", base36(rng.r#gen()), Utc::now().timestamp_millis(), ext)
}

/// Size and type checks, then read. No network involved.
pub async fn read_image(path: &Path) -> Result<ImageUpload, AdminError> {
  let meta = tokio::fs::metadata(path).await?;
  if meta.len() > constants().max_image_bytes {
    return Err(AdminError::invalid("Image size must be less than 5MB"));
  }
  let not_an_image = || AdminError::invalid("Please select an image file");
  ImageFormat::from_path(path).map_err(|_| not_an_image())?;

  let bytes = tokio::fs::read(path).await?;
  let format = image::guess_format(&bytes).map_err(|_| not_an_image())?;
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_lowercase)
    .or_else(|| format.extensions_str().first().map(|e| e.to_string()))
    .unwrap_or_else(|| "img".to_string());
  let file_name = upload_file_name(&mut rand::thread_rng(), &ext);

  Ok(ImageUpload { file_name, content_type: format.to_mime_type(), bytes })
}

// --- Operations ---

pub async fn sign_in(backend: &dyn Backend, form: SignInForm) -> Result<Session, AdminError> {
  form.check()?;
  match backend.sign_in(&form.email, &form.password).await {
    Ok(session) => Ok(session),
    Err(BackendError::Api { message, .. }) if !message.is_empty() => {
      warn!(%message, "admin: sign-in rejected");
      Err(AdminError::Auth(message))
    }
    Err(e) => {
      warn!(err = %e, "admin: sign-in failed");
      Err(AdminError::Auth("Authentication failed".to_string()))
    }
  }
}

pub async fn sign_out(backend: &dyn Backend) -> Result<(), AdminError> {
  backend.sign_out().await.map_err(AdminError::backend("Failed to sign out"))
}

pub async fn load_categories(backend: &dyn Backend) -> Result<Vec<Category>, AdminError> {
  backend.categories().await.map_err(AdminError::backend("Failed to load categories"))
}

pub async fn load_characters(backend: &dyn Backend, category_id: &str) -> Result<Vec<Character>, AdminError> {
  backend.characters_in_category(category_id).await.map_err(AdminError::backend("Failed to load characters"))
}

/// Validate, upload the avatar if one was given, then insert.
/// Returns the created character's name.
pub async fn create_character(
  backend: &dyn Backend,
  form: CharacterForm,
  image: ImageSource,
) -> Result<String, AdminError> {
  form.check()?;

  let image_url = match image {
    ImageSource::None => None,
    ImageSource::Url(url) => match reqwest::Url::parse(&url) {
      Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(url),
      _ => return Err(AdminError::invalid("Invalid image URL")),
    },
    ImageSource::File(path) => {
      let upload = read_image(&path).await?;
      info!(file = %upload.file_name, bytes = upload.bytes.len(), "admin: uploading image");
      let url = backend
        .upload_image(&upload.file_name, upload.bytes, upload.content_type)
        .await
        .map_err(AdminError::backend("Failed to upload image"))?;
      Some(url)
    }
  };

  let new = NewCharacter { name: form.name.clone(), category_id: form.category_id, image_url };
  backend.insert_character(&new).await.map_err(AdminError::backend("Failed to create character"))?;
  info!(name = %form.name, "admin: character created");
  Ok(form.name)
}

/// Validate and insert. Returns the posted title.
pub async fn post_video(backend: &dyn Backend, form: VideoForm) -> Result<String, AdminError> {
  form.check()?;
  let new = NewVideo {
    title: form.title.clone(),
    youtube_link: form.youtube_link,
    category_id: form.category_id,
    character_id: form.character_id,
  };
  backend.insert_video(&new).await.map_err(AdminError::backend("Failed to post video"))?;
  info!(title = %form.title, standalone = new.character_id.is_none(), "admin: video posted");
  Ok(form.title)
}

// --- Panel state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminField {
  #[default]
  Category,
  CharacterName,
  CharacterImage,
  Character,
  VideoTitle,
  VideoLink,
}

impl AdminField {
  pub const ORDER: [AdminField; 6] = [
    AdminField::Category,
    AdminField::CharacterName,
    AdminField::CharacterImage,
    AdminField::Character,
    AdminField::VideoTitle,
    AdminField::VideoLink,
  ];

  pub fn label(self) -> &'static str {
    match self {
      AdminField::Category => "Category",
      AdminField::CharacterName => "Character Name",
      AdminField::CharacterImage => "Character Image (file path or URL, optional)",
      AdminField::Character => "Character",
      AdminField::VideoTitle => "Video Title",
      AdminField::VideoLink => "YouTube Link",
    }
  }

  fn step(self, delta: isize) -> Self {
    let len = Self::ORDER.len() as isize;
    let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0) as isize;
    Self::ORDER[(idx + delta).rem_euclid(len) as usize]
  }

  pub fn next(self) -> Self {
    self.step(1)
  }

  pub fn prev(self) -> Self {
    self.step(-1)
  }

  /// Fields belonging to the "Add New Character" form.
  pub fn in_character_form(self) -> bool {
    matches!(self, AdminField::CharacterName | AdminField::CharacterImage)
  }
}

#[derive(Debug, Default)]
pub struct AdminPanel {
  pub categories: Vec<Category>,
  pub category: Option<usize>,
  /// Characters of the selected category, ordered by name.
  pub characters: Vec<Character>,
  /// `None` posts a standalone edit.
  pub character: Option<usize>,
  pub name: TextInput,
  pub image: TextInput,
  pub title: TextInput,
  pub link: TextInput,
  pub focus: AdminField,
  pub busy: bool,
}

impl AdminPanel {
  pub fn selected_category(&self) -> Option<&Category> {
    self.category.and_then(|i| self.categories.get(i))
  }

  pub fn selected_character(&self) -> Option<&Character> {
    self.character.and_then(|i| self.characters.get(i))
  }

  /// Replace the category list, keeping the selection by id when possible.
  pub fn set_categories(&mut self, categories: Vec<Category>) {
    let previous = self.selected_category().map(|c| c.id.clone());
    self.categories = categories;
    self.category = previous.and_then(|id| self.categories.iter().position(|c| c.id == id));
  }

  pub fn set_characters(&mut self, category_id: &str, characters: Vec<Character>) {
    if self.selected_category().is_some_and(|c| c.id == category_id) {
      self.characters = characters;
      self.character = None;
    }
  }

  /// Move the category selection. Returns the newly selected id when it changed.
  pub fn cycle_category(&mut self, delta: isize) -> Option<Id> {
    if self.categories.is_empty() {
      return None;
    }
    let len = self.categories.len() as isize;
    let next = match self.category {
      Some(i) => (i as isize + delta).rem_euclid(len) as usize,
      None if delta < 0 => self.categories.len() - 1,
      None => 0,
    };
    if self.category == Some(next) {
      return None;
    }
    self.category = Some(next);
    self.characters.clear();
    self.character = None;
    self.selected_category().map(|c| c.id.clone())
  }

  /// Step through `None, 0, 1, .., len-1` and wrap.
  pub fn cycle_character(&mut self, delta: isize) {
    let slots = self.characters.len() as isize + 1;
    let current = self.character.map_or(0, |i| i as isize + 1);
    let next = (current + delta).rem_euclid(slots);
    self.character = if next == 0 { None } else { Some(next as usize - 1) };
  }

  pub fn focused_input(&mut self) -> Option<&mut TextInput> {
    match self.focus {
      AdminField::CharacterName => Some(&mut self.name),
      AdminField::CharacterImage => Some(&mut self.image),
      AdminField::VideoTitle => Some(&mut self.title),
      AdminField::VideoLink => Some(&mut self.link),
      AdminField::Category | AdminField::Character => None,
    }
  }

  pub fn character_form(&self) -> (CharacterForm, ImageSource) {
    let category = self.selected_category().map(|c| c.id.as_str());
    (CharacterForm::new(&self.name.value, category), ImageSource::parse(&self.image.value))
  }

  pub fn video_form(&self) -> VideoForm {
    VideoForm::new(
      &self.title.value,
      &self.link.value,
      self.selected_character().map(|c| c.id.as_str()),
      self.selected_category().map(|c| c.id.as_str()),
    )
  }

  /// Embed URL for the link being typed.
  pub fn preview(&self) -> Option<String> {
    embed_url(&self.link.value)
  }

  pub fn character_created(&mut self) {
    self.name.clear();
    self.image.clear();
  }

  pub fn video_posted(&mut self) {
    self.title.clear();
    self.link.clear();
    self.character = None;
  }
}

#[derive(Debug, Default)]
pub struct SignInPanel {
  pub email: TextInput,
  pub password: TextInput,
  pub on_password: bool,
  pub busy: bool,
}

impl SignInPanel {
  pub fn focused_input(&mut self) -> &mut TextInput {
    if self.on_password { &mut self.password } else { &mut self.email }
  }

  pub fn form(&self) -> SignInForm {
    SignInForm::new(&self.email.value, &self.password.value)
  }
}
