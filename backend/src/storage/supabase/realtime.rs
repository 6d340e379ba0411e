//! Realtime change feed over the Phoenix channel protocol.
//!
//! One socket per subscription: join `realtime:<channel>` with a
//! `postgres_changes` filter for the table, heartbeat every 25 seconds, and
//! leave the channel when the subscription is released.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{ChangeEvent, ChangeKind};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::storage::traits::{ChangeFeed, ChangeSubscription};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const EVENT_BUFFER: usize = 64;
const DB_SCHEMA: &str = "public";

/// Phoenix channel frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    pub fn join(topic: &str, table: &str, access_token: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": DB_SCHEMA, "table": table }
                    ],
                    "private": false
                },
                "access_token": access_token
            }),
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn heartbeat(reference: u64) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    /// Row change carried by this frame, if it is one for `topic`
    pub fn change_event(&self, topic: &str) -> Option<ChangeEvent> {
        if self.topic != topic || self.event != "postgres_changes" {
            return None;
        }

        let data = self.payload.get("data")?;
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .map(ChangeKind::from_wire)
            .unwrap_or(ChangeKind::Other);
        let table = data.get("table").and_then(Value::as_str)?.to_string();

        Some(ChangeEvent { table, kind })
    }

    /// `Some(true)` for an ok reply, `Some(false)` for an error reply
    pub fn reply_ok(&self) -> Option<bool> {
        if self.event != "phx_reply" {
            return None;
        }
        let status = self.payload.get("status").and_then(Value::as_str)?;
        Some(status == "ok")
    }

    /// Why the server gave up on `topic`, if this frame says it did
    pub fn channel_error(&self, topic: &str) -> Option<String> {
        if self.topic != topic {
            return None;
        }
        let status_error = self.payload.get("status").and_then(Value::as_str) == Some("error");
        match self.event.as_str() {
            "phx_error" | "phx_close" => Some(self.event.clone()),
            "phx_reply" | "system" if status_error => Some(self.payload.to_string()),
            _ => None,
        }
    }
}

/// Realtime change feed client
#[derive(Clone)]
pub struct SupabaseRealtime {
    config: BackendConfig,
}

impl SupabaseRealtime {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChangeFeed for SupabaseRealtime {
    async fn subscribe(&self, channel: &str, table: &str) -> BackendResult<ChangeSubscription> {
        let url = self.config.realtime_url()?;
        let topic = format!("realtime:{}", channel);
        let mut socket = ChannelSocket {
            topic: topic.clone(),
            next_ref: 1,
        };

        // Connect, join and wait for the join reply under one deadline.
        let joined = tokio::time::timeout(self.config.request_timeout, async {
            let (ws_stream, _) = connect_async(url.as_str()).await?;
            info!("Connected to realtime feed for channel '{}'", channel);

            let join_ref = socket.take_ref();
            let join = PhoenixMessage::join(&topic, table, self.config.bearer_token(), join_ref);
            let (mut write, mut read) = ws_stream.split();
            write.send(WsMessage::Text(serde_json::to_string(&join)?.into())).await?;
            debug!("Sent phx_join for {}", topic);

            await_join_reply(&mut read, &topic, &join_ref.to_string()).await?;
            Ok::<_, BackendError>((write, read))
        })
        .await;

        let (write, read) = match joined {
            Ok(result) => result?,
            Err(_) => {
                return Err(BackendError::WebSocket(format!(
                    "Timed out after {:?} joining {}",
                    self.config.request_timeout, topic
                )))
            }
        };
        info!("Joined realtime channel {}", topic);

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (release_tx, release_rx) = oneshot::channel();
        tokio::spawn(async move {
            socket.run(write, read, events_tx, release_rx).await;
        });

        Ok(ChangeSubscription::new(channel, events_rx, release_tx))
    }
}

/// Read frames until the server answers the join sent with `join_ref`
async fn await_join_reply<R>(read: &mut R, topic: &str, join_ref: &str) -> BackendResult<()>
where
    R: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = read.next().await {
        let text = match message? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let frame: PhoenixMessage = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Ignoring malformed realtime frame: {}", e);
                continue;
            }
        };

        if frame.topic != topic || frame.reference.as_deref() != Some(join_ref) {
            continue;
        }
        match frame.reply_ok() {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(BackendError::WebSocket(format!(
                    "Join of {} rejected: {}",
                    topic, frame.payload
                )))
            }
            None => {}
        }
    }

    Err(BackendError::WebSocket(format!(
        "Socket closed before {} was joined",
        topic
    )))
}

struct ChannelSocket {
    topic: String,
    next_ref: u64,
}

impl ChannelSocket {
    fn take_ref(&mut self) -> u64 {
        let reference = self.next_ref;
        self.next_ref += 1;
        reference
    }

    async fn run<W, R>(
        &mut self,
        mut write: W,
        mut read: R,
        events: mpsc::Sender<ChangeEvent>,
        mut release: oneshot::Receiver<()>,
    ) where
        W: futures::Sink<WsMessage> + Unpin,
        W::Error: std::fmt::Display,
        R: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = &mut release => {
                    self.leave(&mut write).await;
                    break;
                }
                _ = events.closed() => {
                    self.leave(&mut write).await;
                    break;
                }
                _ = heartbeat.tick() => {
                    let reference = self.take_ref();
                    let frame = PhoenixMessage::heartbeat(reference);
                    if let Err(e) = send_frame(&mut write, &frame).await {
                        error!("Heartbeat failed on {}: {}", self.topic, e);
                        break;
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            let frame: PhoenixMessage = match serde_json::from_str(text.as_str()) {
                                Ok(frame) => frame,
                                Err(e) => {
                                    warn!("Ignoring malformed realtime frame: {}", e);
                                    continue;
                                }
                            };

                            if let Some(reason) = frame.channel_error(&self.topic) {
                                error!("Realtime channel {} failed: {}", self.topic, reason);
                                break;
                            } else if let Some(ok) = frame.reply_ok() {
                                if ok {
                                    debug!("Realtime reply ok on {}", frame.topic);
                                } else {
                                    warn!("Realtime reply error on {}: {}", frame.topic, frame.payload);
                                }
                            } else if let Some(event) = frame.change_event(&self.topic) {
                                debug!("Change on {}: {:?}", event.table, event.kind);
                                if events.send(event).await.is_err() {
                                    self.leave(&mut write).await;
                                    break;
                                }
                            }
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            if let Err(e) = write.send(WsMessage::Pong(data)).await {
                                error!("Pong failed on {}: {}", self.topic, e);
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("Realtime socket closed for {}", self.topic);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Realtime socket error on {}: {}", self.topic, e);
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn leave<W>(&mut self, write: &mut W)
    where
        W: futures::Sink<WsMessage> + Unpin,
        W::Error: std::fmt::Display,
    {
        let reference = self.take_ref();
        let frame = PhoenixMessage::leave(&self.topic, reference);
        if let Err(e) = send_frame(write, &frame).await {
            warn!("Failed to leave {}: {}", self.topic, e);
        }
        if let Err(e) = write.close().await {
            debug!("Socket close for {} reported: {}", self.topic, e);
        }
        info!("Released realtime channel {}", self.topic);
    }
}

async fn send_frame<W>(write: &mut W, frame: &PhoenixMessage) -> Result<(), String>
where
    W: futures::Sink<WsMessage> + Unpin,
    W::Error: std::fmt::Display,
{
    let text = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    write
        .send(WsMessage::Text(text.into()))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_filters_table_changes() {
        let frame = PhoenixMessage::join("realtime:realtime reservations", "reservations", "anon", 1);
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"],
            json!([{ "event": "*", "schema": "public", "table": "reservations" }])
        );
        assert_eq!(value["payload"]["access_token"], "anon");
    }

    #[test]
    fn test_heartbeat_and_leave_frames() {
        let heartbeat = serde_json::to_value(PhoenixMessage::heartbeat(7)).unwrap();
        assert_eq!(heartbeat["topic"], "phoenix");
        assert_eq!(heartbeat["event"], "heartbeat");
        assert!(heartbeat.get("join_ref").is_none());

        let leave = serde_json::to_value(PhoenixMessage::leave("realtime:x", 8)).unwrap();
        assert_eq!(leave["event"], "phx_leave");
        assert_eq!(leave["ref"], "8");
    }

    #[test]
    fn test_decodes_postgres_change() {
        let frame: PhoenixMessage = serde_json::from_str(
            r#"{
                "topic": "realtime:realtime reservations",
                "event": "postgres_changes",
                "payload": {
                    "data": {
                        "type": "DELETE",
                        "table": "reservations",
                        "schema": "public",
                        "old_record": {"id": 3}
                    },
                    "ids": [12345]
                },
                "ref": null
            }"#,
        )
        .unwrap();

        let event = frame.change_event("realtime:realtime reservations").unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.table, "reservations");

        assert!(frame.change_event("realtime:other").is_none());
    }

    #[test]
    fn test_reply_status() {
        let ok: PhoenixMessage = serde_json::from_str(
            r#"{"topic": "realtime:x", "event": "phx_reply", "payload": {"status": "ok", "response": {}}, "ref": "1"}"#,
        )
        .unwrap();
        assert_eq!(ok.reply_ok(), Some(true));
        assert!(ok.change_event("realtime:x").is_none());

        let failed: PhoenixMessage = serde_json::from_str(
            r#"{"topic": "realtime:x", "event": "phx_reply", "payload": {"status": "error", "response": {"reason": "bad token"}}, "ref": "1"}"#,
        )
        .unwrap();
        assert_eq!(failed.reply_ok(), Some(false));
    }

    #[test]
    fn test_channel_errors_end_the_subscription() {
        let rejected: PhoenixMessage = serde_json::from_str(
            r#"{"topic": "realtime:x", "event": "system", "payload": {"status": "error", "message": "table not in publication"}}"#,
        )
        .unwrap();
        assert!(rejected.channel_error("realtime:x").is_some());
        assert!(rejected.channel_error("realtime:y").is_none());

        let closed: PhoenixMessage =
            serde_json::from_str(r#"{"topic": "realtime:x", "event": "phx_close", "payload": {}}"#).unwrap();
        assert_eq!(closed.channel_error("realtime:x").as_deref(), Some("phx_close"));

        let heartbeat_ok: PhoenixMessage = serde_json::from_str(
            r#"{"topic": "phoenix", "event": "phx_reply", "payload": {"status": "ok"}, "ref": "2"}"#,
        )
        .unwrap();
        assert!(heartbeat_ok.channel_error("realtime:x").is_none());
    }

    fn text_frame(json: &str) -> Result<WsMessage, tokio_tungstenite::tungstenite::Error> {
        Ok(WsMessage::Text(json.to_string().into()))
    }

    #[tokio::test]
    async fn test_join_waits_for_matching_reply() {
        let mut read = futures::stream::iter(vec![
            text_frame(r#"{"topic": "realtime:x", "event": "presence_state", "payload": {}}"#),
            text_frame(r#"{"topic": "phoenix", "event": "phx_reply", "payload": {"status": "error"}, "ref": "1"}"#),
            text_frame(r#"{"topic": "realtime:x", "event": "phx_reply", "payload": {"status": "ok", "response": {}}, "ref": "1"}"#),
        ]);

        assert!(await_join_reply(&mut read, "realtime:x", "1").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_join_is_an_error() {
        let mut read = futures::stream::iter(vec![text_frame(
            r#"{"topic": "realtime:x", "event": "phx_reply", "payload": {"status": "error", "response": {"reason": "invalid token"}}, "ref": "1"}"#,
        )]);

        let result = await_join_reply(&mut read, "realtime:x", "1").await;
        assert!(matches!(result, Err(BackendError::WebSocket(message)) if message.contains("invalid token")));
    }

    #[tokio::test]
    async fn test_socket_closed_before_join_reply() {
        let mut read = futures::stream::iter(Vec::<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>::new());
        assert!(await_join_reply(&mut read, "realtime:x", "1").await.is_err());
    }

    #[tokio::test]
    async fn test_release_sends_leave_and_closes() {
        let (write, mut sent) = futures::channel::mpsc::unbounded::<WsMessage>();
        let read = futures::stream::pending::<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>();
        let (events_tx, _events_rx) = mpsc::channel(1);
        let (release_tx, release_rx) = oneshot::channel();
        let mut socket = ChannelSocket {
            topic: "realtime:x".to_string(),
            next_ref: 2,
        };

        release_tx.send(()).unwrap();
        socket.run(write, read, events_tx, release_rx).await;

        let frame = match sent.next().await {
            Some(WsMessage::Text(text)) => serde_json::from_str::<PhoenixMessage>(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        };
        assert_eq!(frame.event, "phx_leave");
        assert_eq!(frame.topic, "realtime:x");
        assert_eq!(frame.reference.as_deref(), Some("2"));
        assert!(sent.next().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_error_closes_the_event_stream() {
        let (write, _sent) = futures::channel::mpsc::unbounded::<WsMessage>();
        let read = futures::stream::iter(vec![text_frame(
            r#"{"topic": "realtime:x", "event": "system", "payload": {"status": "error", "message": "realtime disabled"}}"#,
        )])
        .chain(futures::stream::pending());
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let (_release_tx, release_rx) = oneshot::channel();
        let mut socket = ChannelSocket {
            topic: "realtime:x".to_string(),
            next_ref: 2,
        };

        tokio::time::timeout(Duration::from_secs(5), socket.run(write, read, events_tx, release_rx))
            .await
            .expect("a failed channel must stop the socket loop");
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unanswered_handshake_times_out() {
        // Accepts the TCP connection but never answers the websocket upgrade.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let config = BackendConfig::new(&format!("http://127.0.0.1:{}", port), "anon")
            .unwrap()
            .with_request_timeout(Duration::from_millis(300));
        let feed = SupabaseRealtime::new(config);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            feed.subscribe("realtime reservations", "reservations"),
        )
        .await
        .expect("subscribe must give up on its own deadline");

        assert!(matches!(result, Err(BackendError::WebSocket(message)) if message.contains("Timed out")));
        server.abort();
    }

    #[test]
    fn test_system_frames_are_not_changes() {
        let frame: PhoenixMessage = serde_json::from_str(
            r#"{"topic": "realtime:x", "event": "system", "payload": {"status": "ok", "message": "subscribed"}}"#,
        )
        .unwrap();
        assert!(frame.change_event("realtime:x").is_none());
        assert_eq!(frame.reply_ok(), None);
    }
}
