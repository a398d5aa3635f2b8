//! reqwest client for a Supabase project: PostgREST tables, Storage,
//! GoTrue password sessions, and the Realtime change feed.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response, Url, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, BackendResult};
use crate::constants::constants;
use crate::model::{
  Category, Character, CharacterRequest, Id, NewCharacter, NewCharacterRequest, NewVideo, Session, Video,
};
use crate::realtime::{self, Subscription};

pub struct SupabaseClient {
  http: Client,
  base: Url,
  anon_key: String,
  session: RwLock<Option<Session>>,
}

/// PostgREST / GoTrue error bodies, in their several shapes.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
  code: Option<serde_json::Value>,
  message: Option<String>,
  msg: Option<String>,
  error_description: Option<String>,
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  refresh_token: Option<String>,
  expires_in: Option<i64>,
  user: Option<TokenUser>,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
  email: Option<String>,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
  email: &'a str,
  password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
  refresh_token: &'a str,
}

impl TokenResponse {
  fn into_session(self, issued: DateTime<Utc>, fallback_email: Option<String>) -> Session {
    Session {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at: self.expires_in.map(|secs| issued + ChronoDuration::seconds(secs)),
      email: self.user.and_then(|u| u.email).or(fallback_email),
    }
  }
}

impl SupabaseClient {
  pub fn new(url: &str, anon_key: &str) -> BackendResult<Self> {
    let mut normalized = url.trim().to_string();
    if !normalized.ends_with('/') {
      normalized.push('/');
    }
    let base = Url::parse(&normalized).map_err(|e| BackendError::Url(format!("{url}: {e}")))?;
    if !matches!(base.scheme(), "http" | "https") {
      return Err(BackendError::Url(format!("{url}: expected http or https")));
    }
    Ok(Self { http: Client::new(), base, anon_key: anon_key.to_string(), session: RwLock::new(None) })
  }

  fn endpoint(&self, path: &str) -> BackendResult<Url> {
    self.base.join(path).map_err(|e| BackendError::Url(e.to_string()))
  }

  /// `/rest/v1/{table}` with the given query parameters.
  fn table_url(&self, table: &str, params: &[(&str, &str)]) -> BackendResult<Url> {
    let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
    if !params.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (k, v) in params {
        pairs.append_pair(k, v);
      }
    }
    Ok(url)
  }

  fn current_session(&self) -> Option<Session> {
    self.session.read().ok().and_then(|s| s.clone())
  }

  /// The live session's token, refreshed when needed, or the anon key.
  async fn bearer(&self) -> String {
    self.session().await.map_or_else(|| self.anon_key.clone(), |s| s.access_token)
  }

  async fn authed(&self, req: RequestBuilder) -> RequestBuilder {
    req.header("apikey", &self.anon_key).header(header::AUTHORIZATION, format!("Bearer {}", self.bearer().await))
  }

  /// POST to the GoTrue token endpoint with the given grant.
  async fn token_grant<B: Serialize + ?Sized>(&self, grant_type: &str, body: &B) -> BackendResult<TokenResponse> {
    let mut url = self.endpoint("auth/v1/token")?;
    url.query_pairs_mut().append_pair("grant_type", grant_type);
    let req = self.http.post(url).header("apikey", &self.anon_key).json(body);
    let resp = check(req.send().await?).await?;
    resp.json().await.map_err(|e| BackendError::Decode(format!("token: {e}")))
  }

  async fn refresh_session(&self, stale: &Session) -> BackendResult<Session> {
    let Some(refresh_token) = stale.refresh_token.as_deref() else { return Err(BackendError::Unauthenticated) };
    let token = self.token_grant("refresh_token", &RefreshGrant { refresh_token }).await?;
    let session = token.into_session(Utc::now(), stale.email.clone());
    self.store_session(Some(session.clone()));
    info!("supabase: session refreshed");
    Ok(session)
  }

  async fn select<T: DeserializeOwned>(&self, table: &str, params: &[(&str, &str)]) -> BackendResult<Vec<T>> {
    let url = self.table_url(table, params)?;
    debug!(table, "supabase: select");
    let resp = check(self.authed(self.http.get(url)).await.send().await?).await?;
    resp.json::<Vec<T>>().await.map_err(|e| BackendError::Decode(format!("{table}: {e}")))
  }

  async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> BackendResult<()> {
    let url = self.table_url(table, &[])?;
    debug!(table, "supabase: insert");
    let req = self.authed(self.http.post(url)).await.header("Prefer", "return=minimal").json(&[row]);
    check(req.send().await?).await?;
    Ok(())
  }

  fn store_session(&self, session: Option<Session>) {
    if let Ok(mut slot) = self.session.write() {
      *slot = session;
    }
  }
}

/// Pass successful responses through; decode error bodies otherwise.
async fn check(resp: Response) -> BackendResult<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let text = resp.text().await.unwrap_or_default();
  let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
  let code = body.code.map(|c| match c {
    serde_json::Value::String(s) => s,
    other => other.to_string(),
  });
  let message = body
    .message
    .or(body.msg)
    .or(body.error_description)
    .or(body.error)
    .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });
  Err(BackendError::Api { status: status.as_u16(), code, message })
}

/// `in.("a","b")` filter value for PostgREST.
fn in_filter(ids: &[Id]) -> String {
  let quoted: Vec<String> = ids.iter().map(|id| format!("\"{}\"", id.replace('"', "\\\""))).collect();
  format!("in.({})", quoted.join(","))
}

#[async_trait]
impl Backend for SupabaseClient {
  async fn categories(&self) -> BackendResult<Vec<Category>> {
    self.select("categories", &[("select", "*"), ("order", "name.asc")]).await
  }

  async fn characters(&self) -> BackendResult<Vec<Character>> {
    self.select("characters", &[("select", "*")]).await
  }

  async fn characters_in_category(&self, category_id: &str) -> BackendResult<Vec<Character>> {
    let filter = format!("eq.{category_id}");
    self.select("characters", &[("select", "*"), ("category_id", &filter), ("order", "name.asc")]).await
  }

  async fn videos(&self) -> BackendResult<Vec<Video>> {
    self.select("videos", &[("select", "*"), ("order", "created_at.desc")]).await
  }

  async fn character_requests(&self) -> BackendResult<Vec<CharacterRequest>> {
    self.select("character_requests", &[("select", "*"), ("order", "status.asc,created_at.desc")]).await
  }

  async fn pending_requests(&self) -> BackendResult<Vec<CharacterRequest>> {
    self.select("character_requests", &[("select", "*"), ("status", "eq.pending")]).await
  }

  async fn insert_character(&self, character: &NewCharacter) -> BackendResult<()> {
    self.insert("characters", character).await
  }

  async fn insert_video(&self, video: &NewVideo) -> BackendResult<()> {
    self.insert("videos", video).await
  }

  async fn insert_request(&self, request: &NewCharacterRequest) -> BackendResult<()> {
    self.insert("character_requests", request).await
  }

  async fn fulfill_requests(&self, ids: &[Id], at: DateTime<Utc>) -> BackendResult<()> {
    if ids.is_empty() {
      return Ok(());
    }
    let filter = in_filter(ids);
    let url = self.table_url("character_requests", &[("id", &filter)])?;
    let body = json!({ "status": "fulfilled", "fulfilled_at": at.to_rfc3339() });
    let req = self.authed(self.http.patch(url)).await.header("Prefer", "return=minimal").json(&body);
    check(req.send().await?).await?;
    info!(count = ids.len(), "supabase: requests fulfilled");
    Ok(())
  }

  async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<String> {
    let bucket = &constants().image_bucket;
    let url = self.endpoint(&format!("storage/v1/object/{bucket}/{path}"))?;
    let req = self
      .authed(self.http.post(url))
      .await
      .header(header::CONTENT_TYPE, content_type)
      .header(header::CACHE_CONTROL, &constants().image_cache_control)
      .header("x-upsert", "false")
      .body(bytes);
    check(req.send().await?).await?;
    let public = self.endpoint(&format!("storage/v1/object/public/{bucket}/{path}"))?;
    info!(path, "supabase: image uploaded");
    Ok(public.to_string())
  }

  async fn subscribe_video_changes(&self) -> BackendResult<Subscription> {
    let url = realtime::websocket_url(&self.base, &self.anon_key)?;
    let token = self.session().await.map(|s| s.access_token);
    let c = constants();
    let join = realtime::join_message(&c.video_channel, &c.video_table, token.as_deref());
    Ok(Subscription::spawn(url, join))
  }

  async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
    let token = self.token_grant("password", &PasswordGrant { email, password }).await?;
    let session = token.into_session(Utc::now(), Some(email.to_string()));
    self.store_session(Some(session.clone()));
    info!(email, "supabase: signed in");
    Ok(session)
  }

  async fn sign_out(&self) -> BackendResult<()> {
    let Some(session) = self.current_session() else { return Ok(()) };
    self.store_session(None);
    let url = self.endpoint("auth/v1/logout")?;
    let req = self
      .http
      .post(url)
      .header("apikey", &self.anon_key)
      .header(header::AUTHORIZATION, format!("Bearer {}", session.access_token));
    match req.send().await {
      Ok(resp) => {
        check(resp).await?;
      }
      Err(e) => warn!(err = %e, "supabase: logout call failed, session dropped locally"),
    }
    Ok(())
  }

  /// The stored session; an expired one is refreshed once, and dropped
  /// when that fails.
  async fn session(&self) -> Option<Session> {
    let current = self.current_session()?;
    if !current.is_expired(Utc::now()) {
      return Some(current);
    }
    match self.refresh_session(&current).await {
      Ok(fresh) => Some(fresh),
      Err(e) => {
        warn!(err = %e, "supabase: session expired and could not be refreshed");
        self.store_session(None);
        None
      }
    }
  }
}
