//! Change feed over the Supabase Realtime websocket.
//!
//! A [`Subscription`] owns the background socket task. The task reconnects
//! after drops and reports them as [`FeedStatus`]. It is released either
//! explicitly through [`Subscription::unsubscribe`] or implicitly on drop, which
//! signals the task to send `phx_leave` and close the socket.

use futures::{Sink, SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::constants::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Insert,
  Update,
  Delete,
}

impl ChangeKind {
  fn parse(s: &str) -> Option<Self> {
    match s.to_ascii_uppercase().as_str() {
      "INSERT" => Some(ChangeKind::Insert),
      "UPDATE" => Some(ChangeKind::Update),
      "DELETE" => Some(ChangeKind::Delete),
      _ => None,
    }
  }
}

/// A row change notification on a watched table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
  pub kind: ChangeKind,
  pub table: String,
  pub record_id: Option<String>,
}

/// One Phoenix channel frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoenixMessage {
  pub topic: String,
  pub event: String,
  #[serde(default)]
  pub payload: Value,
  #[serde(rename = "ref", default)]
  pub reference: Option<String>,
}

impl PhoenixMessage {
  fn new(topic: &str, event: &str, payload: Value, reference: u64) -> Self {
    Self { topic: topic.to_string(), event: event.to_string(), payload, reference: Some(reference.to_string()) }
  }
}

/// Build the `phx_join` frame for a `postgres_changes` listener on `table`.
pub fn join_message(channel: &str, table: &str, access_token: Option<&str>) -> PhoenixMessage {
  let mut payload = json!({
    "config": {
      "broadcast": { "self": false },
      "presence": { "key": "" },
      "postgres_changes": [{ "event": "*", "schema": "public", "table": table }]
    }
  });
  if let Some(token) = access_token {
    payload["access_token"] = Value::String(token.to_string());
  }
  PhoenixMessage::new(&format!("realtime:{channel}"), "phx_join", payload, 1)
}

/// Turn an `http(s)://project` base URL into the realtime websocket endpoint.
pub fn websocket_url(base: &Url, anon_key: &str) -> Result<Url, BackendError> {
  let mut url = base.join("realtime/v1/websocket").map_err(|e| BackendError::Url(e.to_string()))?;
  let scheme = match base.scheme() {
    "https" => "wss",
    "http" => "ws",
    other => return Err(BackendError::Url(format!("unsupported scheme '{other}'"))),
  };
  url.set_scheme(scheme).map_err(|_| BackendError::Url(format!("cannot switch {base} to {scheme}")))?;
  url.query_pairs_mut().append_pair("apikey", anon_key).append_pair("vsn", "1.0.0");
  Ok(url)
}

/// Extract a change notification from a raw text frame.
///
/// Understands both the `postgres_changes` envelope and the older
/// per-event (`INSERT`/`UPDATE`/`DELETE`) frames. Anything else is `None`.
pub fn parse_change(text: &str) -> Option<ChangeEvent> {
  let msg: PhoenixMessage = serde_json::from_str(text).ok()?;
  let data = match msg.event.as_str() {
    "postgres_changes" => msg.payload.get("data")?,
    other if ChangeKind::parse(other).is_some() => &msg.payload,
    _ => return None,
  };
  let kind = ChangeKind::parse(data.get("type")?.as_str()?)?;
  let table = data.get("table").and_then(Value::as_str).unwrap_or_default().to_string();
  let record = match kind {
    ChangeKind::Delete => data.get("old_record"),
    _ => data.get("record"),
  };
  let record_id = record.and_then(|r| r.get("id")).and_then(Value::as_str).map(str::to_string);
  Some(ChangeEvent { kind, table, record_id })
}

/// Health of the live feed, reported alongside change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
  /// The socket dropped; the task reconnects after a backoff.
  Down(String),
  /// Joined again after a drop. Changes in between were missed.
  Restored,
}

/// Live change feed handle.
pub struct Subscription {
  events: mpsc::Receiver<ChangeEvent>,
  status: mpsc::Receiver<FeedStatus>,
  /// The event sender is gone: the feed task ended.
  closed: bool,
  leave: Option<oneshot::Sender<()>>,
  handle: Option<JoinHandle<()>>,
}

impl Subscription {
  /// Connect to `url`, join with `join`, and forward change events. The task
  /// reconnects on its own until the subscription is released.
  pub fn spawn(url: Url, join: PhoenixMessage) -> Self {
    let (tx, rx) = mpsc::channel(32);
    let (status_tx, status_rx) = mpsc::channel(8);
    let (leave_tx, leave_rx) = oneshot::channel();
    let feed = Feed { url, join, events: tx, status: status_tx };
    let handle = tokio::spawn(feed.run(leave_rx));
    Self { events: rx, status: status_rx, closed: false, leave: Some(leave_tx), handle: Some(handle) }
  }

  /// A subscription fed by external senders, with no socket behind it.
  #[cfg(test)]
  pub fn detached(events: mpsc::Receiver<ChangeEvent>, status: mpsc::Receiver<FeedStatus>) -> Self {
    Self { events, status, closed: false, leave: None, handle: None }
  }

  /// Drain every event received since the last call.
  pub fn drain(&mut self) -> Vec<ChangeEvent> {
    let mut out = Vec::new();
    loop {
      match self.events.try_recv() {
        Ok(event) => out.push(event),
        Err(mpsc::error::TryRecvError::Empty) => break,
        Err(mpsc::error::TryRecvError::Disconnected) => {
          self.closed = true;
          break;
        }
      }
    }
    out
  }

  /// Drain feed health reports.
  pub fn statuses(&mut self) -> Vec<FeedStatus> {
    let mut out = Vec::new();
    while let Ok(status) = self.status.try_recv() {
      out.push(status);
    }
    out
  }

  /// True once [`drain`](Self::drain) found the feed task gone.
  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Leave the channel and wait briefly for the socket task to finish.
  pub async fn unsubscribe(mut self) {
    if let Some(tx) = self.leave.take() {
      let _ = tx.send(());
    }
    self.events.close();
    if let Some(handle) = self.handle.take()
      && tokio::time::timeout(Duration::from_secs(2), handle).await.is_err()
    {
      warn!("realtime: leave timed out");
    }
    info!("realtime: unsubscribed");
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.events.close();
    let signalled = self.leave.take().is_some_and(|tx| tx.send(()).is_ok());
    if !signalled && let Some(handle) = self.handle.take() {
      handle.abort();
    }
  }
}

/// How one socket connection ended.
#[derive(Debug)]
enum SocketEnd {
  /// Leave requested, or nobody listens any more.
  Released,
  /// Closed by the server.
  Dropped(String),
}

/// The background half of a [`Subscription`].
struct Feed {
  url: Url,
  join: PhoenixMessage,
  events: mpsc::Sender<ChangeEvent>,
  status: mpsc::Sender<FeedStatus>,
}

impl Feed {
  /// Keep the channel joined until released, reconnecting with a doubling
  /// backoff. A connection that got joined resets the backoff.
  async fn run(self, mut leave_rx: oneshot::Receiver<()>) {
    let initial = Duration::from_secs(1);
    let max = Duration::from_secs(constants().realtime_retry_max_secs);
    let mut backoff = initial;
    let mut reconnecting = false;
    loop {
      let mut joined = false;
      let reason = match self.connect_once(&mut leave_rx, reconnecting, &mut joined).await {
        Ok(SocketEnd::Released) => {
          debug!("realtime: socket released");
          return;
        }
        Ok(SocketEnd::Dropped(reason)) => reason,
        Err(e) => e.to_string(),
      };
      if joined {
        backoff = initial;
      }
      warn!(err = %reason, retry_in = ?backoff, "realtime: feed dropped");
      if let Err(mpsc::error::TrySendError::Closed(_)) = self.status.try_send(FeedStatus::Down(reason)) {
        return;
      }
      tokio::select! {
        _ = &mut leave_rx => return,
        _ = tokio::time::sleep(backoff) => {}
      }
      backoff = (backoff * 2).min(max);
      reconnecting = true;
    }
  }

  /// One connection: join, pump frames, heartbeat. Sets `joined` once the
  /// server acknowledges the join.
  async fn connect_once(
    &self,
    leave_rx: &mut oneshot::Receiver<()>,
    reconnecting: bool,
    joined: &mut bool,
  ) -> Result<SocketEnd, BackendError> {
    let ws = tokio::select! {
      _ = &mut *leave_rx => return Ok(SocketEnd::Released),
      conn = connect_async(self.url.as_str()) => conn.map_err(|e| BackendError::Realtime(e.to_string()))?.0,
    };
    let (mut sink, mut stream) = ws.split();
    let topic = self.join.topic.clone();
    let join_ref = self.join.reference.clone();
    send_frame(&mut sink, &self.join).await?;
    debug!(topic = %topic, "realtime: join sent");

    let mut heartbeat = tokio::time::interval(Duration::from_secs(constants().realtime_heartbeat_secs));
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;
    // Ref of the heartbeat still waiting for its reply.
    let mut unanswered: Option<String> = None;

    loop {
      tokio::select! {
        _ = &mut *leave_rx => {
          let leave = PhoenixMessage::new(&topic, "phx_leave", json!({}), next_ref);
          let _ = send_frame(&mut sink, &leave).await;
          let _ = sink.close().await;
          return Ok(SocketEnd::Released);
        }
        _ = heartbeat.tick() => {
          if unanswered.is_some() {
            return Err(BackendError::Realtime("heartbeat timed out".to_string()));
          }
          let beat = PhoenixMessage::new("phoenix", "heartbeat", json!({}), next_ref);
          unanswered = beat.reference.clone();
          next_ref += 1;
          send_frame(&mut sink, &beat).await?;
        }
        msg = stream.next() => match msg {
          Some(Ok(Message::Text(text))) => {
            if let Some(event) = parse_change(&text) {
              debug!(kind = ?event.kind, table = %event.table, "realtime: change");
              if self.events.send(event).await.is_err() {
                return Ok(SocketEnd::Released);
              }
            } else if let Some(reply) = parse_reply(&text) {
              if reply.topic == topic && reply.reference == join_ref {
                if let Err(reason) = reply.outcome {
                  return Err(BackendError::Realtime(reason));
                }
                *joined = true;
                info!(topic = %topic, reconnecting, "realtime: joined");
                if reconnecting {
                  let _ = self.status.try_send(FeedStatus::Restored);
                }
              } else if reply.topic == "phoenix" && reply.reference == unanswered {
                unanswered = None;
              }
            }
          }
          Some(Ok(Message::Close(_))) | None => {
            return Ok(SocketEnd::Dropped("socket closed by server".to_string()));
          }
          Some(Ok(_)) => {}
          Some(Err(e)) => return Err(BackendError::Realtime(e.to_string())),
        }
      }
    }
  }
}

async fn send_frame<S>(sink: &mut S, msg: &PhoenixMessage) -> Result<(), BackendError>
where
  S: Sink<Message> + Unpin,
  S::Error: std::fmt::Display,
{
  let frame = serde_json::to_string(msg).map_err(|e| BackendError::Decode(e.to_string()))?;
  sink.send(Message::Text(frame.into())).await.map_err(|e| BackendError::Realtime(e.to_string()))
}

/// A `phx_reply` frame: which request it answers and how.
#[derive(Debug, PartialEq)]
struct Reply {
  topic: String,
  reference: Option<String>,
  /// `Err` carries the server's response when `status` is not `ok`.
  outcome: Result<(), String>,
}

fn parse_reply(text: &str) -> Option<Reply> {
  let msg: PhoenixMessage = serde_json::from_str(text).ok()?;
  if msg.event != "phx_reply" {
    return None;
  }
  let outcome = match msg.payload.get("status").and_then(Value::as_str) {
    Some("ok") => Ok(()),
    _ => Err(msg.payload.get("response").map(Value::to_string).unwrap_or_else(|| "join refused".to_string())),
  };
  Some(Reply { topic: msg.topic, reference: msg.reference, outcome })
}

#[cfg(test)]
mod tests {
  use assert_matches::assert_matches;
  use tokio::net::TcpListener;

  use super::*;

  #[test]
  fn parses_postgres_changes_insert() {
    let text = r#"{
      "topic": "realtime:videos-changes",
      "event": "postgres_changes",
      "payload": {"data": {"type": "INSERT", "table": "videos", "schema": "public",
                           "record": {"id": "v9"}, "commit_timestamp": "2025-01-01T00:00:00Z"},
                  "ids": [1]},
      "ref": null
    }"#;
    let ev = parse_change(text).unwrap();
    assert_eq!(ev.kind, ChangeKind::Insert);
    assert_eq!(ev.table, "videos");
    assert_eq!(ev.record_id.as_deref(), Some("v9"));
  }

  #[test]
  fn delete_takes_id_from_old_record() {
    let text = r#"{"topic": "realtime:videos-changes", "event": "DELETE",
      "payload": {"type": "DELETE", "table": "videos", "old_record": {"id": "v3"}}, "ref": null}"#;
    let ev = parse_change(text).unwrap();
    assert_eq!(ev.kind, ChangeKind::Delete);
    assert_eq!(ev.record_id.as_deref(), Some("v3"));
  }

  #[test]
  fn ignores_replies_and_heartbeats() {
    let reply = r#"{"topic": "phoenix", "event": "phx_reply", "payload": {"status": "ok", "response": {}}, "ref": "2"}"#;
    assert_eq!(parse_change(reply), None);
    let reply = parse_reply(reply).unwrap();
    assert_eq!(reply.topic, "phoenix");
    assert_eq!(reply.reference.as_deref(), Some("2"));
    assert_eq!(reply.outcome, Ok(()));
    assert_eq!(parse_change("not json"), None);
    assert_eq!(parse_reply("not json"), None);
  }

  #[test]
  fn refused_join_is_reported() {
    let reply = r#"{"topic": "realtime:videos-changes", "event": "phx_reply",
      "payload": {"status": "error", "response": {"reason": "unauthorized"}}, "ref": "1"}"#;
    let reply = parse_reply(reply).unwrap();
    assert_matches!(reply.outcome, Err(reason) if reason.contains("unauthorized"));
  }

  #[test]
  fn join_frame_watches_all_events_on_table() {
    let join = join_message("videos-changes", "videos", Some("jwt"));
    assert_eq!(join.topic, "realtime:videos-changes");
    assert_eq!(join.event, "phx_join");
    let change = &join.payload["config"]["postgres_changes"][0];
    assert_eq!(change["event"], "*");
    assert_eq!(change["table"], "videos");
    assert_eq!(join.payload["access_token"], "jwt");
    let wire = serde_json::to_value(&join).unwrap();
    assert_eq!(wire["ref"], "1");
  }

  #[test]
  fn websocket_url_switches_scheme() {
    let base = Url::parse("https://abc.supabase.co/").unwrap();
    let url = websocket_url(&base, "anon").unwrap();
    assert_eq!(url.as_str(), "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0");
    let local = Url::parse("http://localhost:54321/").unwrap();
    assert_eq!(websocket_url(&local, "k").unwrap().scheme(), "ws");
  }

  #[tokio::test]
  async fn drain_collects_pending_events_and_drop_closes_channel() {
    let (tx, rx) = mpsc::channel(4);
    let (_status_tx, status_rx) = mpsc::channel(4);
    let mut sub = Subscription::detached(rx, status_rx);
    let ev = ChangeEvent { kind: ChangeKind::Update, table: "videos".into(), record_id: None };
    tx.send(ev.clone()).await.unwrap();
    tx.send(ev).await.unwrap();
    assert_eq!(sub.drain().len(), 2);
    assert!(sub.drain().is_empty());
    drop(sub);
    assert!(tx.is_closed());
  }

  #[tokio::test]
  async fn dropped_sender_marks_subscription_closed() {
    let (tx, rx) = mpsc::channel(4);
    let (_status_tx, status_rx) = mpsc::channel(4);
    let mut sub = Subscription::detached(rx, status_rx);
    tx.send(ChangeEvent { kind: ChangeKind::Insert, table: "videos".into(), record_id: None }).await.unwrap();
    drop(tx);
    assert_eq!(sub.drain().len(), 1);
    assert!(sub.is_closed());
  }

  /// Poll until at least `n` statuses arrived.
  async fn statuses(sub: &mut Subscription, n: usize) -> Vec<FeedStatus> {
    let mut out = Vec::new();
    for _ in 0..500 {
      out.extend(sub.statuses());
      if out.len() >= n {
        return out;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} statuses, got {out:?}");
  }

  /// Accept one websocket, acknowledge the join, then hang up.
  async fn ack_and_close(listener: &TcpListener) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let Some(Ok(Message::Text(frame))) = ws.next().await else { panic!("expected a join frame") };
    let join: PhoenixMessage = serde_json::from_str(&frame).unwrap();
    assert_eq!(join.event, "phx_join");
    let reply = PhoenixMessage {
      topic: join.topic,
      event: "phx_reply".into(),
      payload: json!({ "status": "ok", "response": {} }),
      reference: join.reference,
    };
    ws.send(Message::Text(serde_json::to_string(&reply).unwrap().into())).await.unwrap();
    ws.close(None).await.unwrap();
  }

  #[tokio::test]
  async fn unreachable_socket_reports_down_and_still_releases() {
    let url = Url::parse("ws://127.0.0.1:1/realtime/v1/websocket").unwrap();
    let mut sub = Subscription::spawn(url, join_message("videos-changes", "videos", None));
    let seen = statuses(&mut sub, 1).await;
    assert_matches!(&seen[0], FeedStatus::Down(_));
    assert!(sub.drain().is_empty());
    assert!(!sub.is_closed());
    tokio::time::timeout(Duration::from_secs(1), sub.unsubscribe()).await.unwrap();
  }

  #[tokio::test]
  async fn server_hangup_reconnects_and_reports_restore() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/realtime/v1/websocket", listener.local_addr().unwrap())).unwrap();
    let mut sub = Subscription::spawn(url, join_message("videos-changes", "videos", None));
    ack_and_close(&listener).await;
    ack_and_close(&listener).await;
    let seen = statuses(&mut sub, 2).await;
    assert_matches!(&seen[0], FeedStatus::Down(reason) if reason.contains("closed"));
    assert_eq!(seen[1], FeedStatus::Restored);
    sub.unsubscribe().await;
  }
}
