use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use campus_db::SqliteStore;
use campus_digest::summarizer::DEFAULT_WINDOW;
use campus_digest::{DigestPanel, DigestTicket, Generator, Summarizer, SummaryError};
use campus_types::error::ChatError;
use campus_types::events::{GatewayCommand, GatewayEvent};
use campus_types::models::{Digest, Message};

use crate::channel::Channel;
use crate::registry::Registry;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Everything a gateway session needs from the process.
pub struct GatewayServices<G> {
    pub store: SqliteStore,
    pub registry: Registry,
    pub summarizer: Arc<Summarizer<SqliteStore, G>>,
}

impl<G> Clone for GatewayServices<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            summarizer: self.summarizer.clone(),
        }
    }
}

type SummaryResult = (DigestTicket, Result<Digest, SummaryError>);

/// Per-connection state: at most one open channel and one summary panel.
struct Session<G> {
    conn_id: Uuid,
    services: GatewayServices<G>,
    channel: Option<Channel<SqliteStore>>,
    panel: DigestPanel,
    summary_tx: mpsc::UnboundedSender<SummaryResult>,
}

/// Serve one WebSocket client until it disconnects or stops answering pings.
pub async fn handle_connection<G>(socket: WebSocket, services: GatewayServices<G>)
where
    G: Generator + 'static,
{
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (summary_tx, mut summary_rx) = mpsc::unbounded_channel::<SummaryResult>();

    let mut session = Session {
        conn_id,
        services,
        channel: None,
        panel: DigestPanel::new(),
        summary_tx,
    };

    info!("Gateway connection {} established", conn_id);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    'conn: loop {
        let outgoing: Vec<GatewayEvent> = tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(msg)) = incoming else { break 'conn };
                match msg {
                    WsMessage::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(cmd) => session.handle_command(cmd).await,
                        Err(e) => {
                            warn!(
                                "Connection {} bad command: {} -- raw: {}",
                                conn_id,
                                e,
                                text.chars().take(200).collect::<String>()
                            );
                            vec![GatewayEvent::Error {
                                kind: "bad_command".into(),
                                message: e.to_string(),
                            }]
                        }
                    },
                    WsMessage::Pong(_) => {
                        pong_received = true;
                        Vec::new()
                    }
                    WsMessage::Close(_) => break 'conn,
                    _ => Vec::new(),
                }
            }
            Some(message) = next_live(&mut session.channel) => {
                vec![GatewayEvent::MessageCreate { message }]
            }
            Some((ticket, result)) = summary_rx.recv() => {
                session.finish_summary(ticket, result).into_iter().collect()
            }
            _ = heartbeat.tick() => {
                if pong_received {
                    pong_received = false;
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection {}", missed_heartbeats, conn_id);
                        break 'conn;
                    }
                }
                if sender.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break 'conn;
                }
                Vec::new()
            }
        };

        for event in &outgoing {
            if send_event(&mut sender, event).await.is_err() {
                break 'conn;
            }
        }
    }

    session.shutdown();
    info!("Gateway connection {} closed", conn_id);
}

impl<G> Session<G>
where
    G: Generator + 'static,
{
    async fn handle_command(&mut self, cmd: GatewayCommand) -> Vec<GatewayEvent> {
        match cmd {
            GatewayCommand::Open { group_id } => self.open(group_id).await,
            GatewayCommand::Send { author, body } => self.send(&author, &body).await,
            GatewayCommand::Close => match self.close_channel() {
                Some(group_id) => vec![GatewayEvent::Closed { group_id }],
                None => Vec::new(),
            },
            GatewayCommand::Summarize { window } => self.summarize(window.unwrap_or(DEFAULT_WINDOW)),
        }
    }

    async fn open(&mut self, group_id: Uuid) -> Vec<GatewayEvent> {
        let mut events = Vec::new();
        if self.channel.as_ref().map(Channel::group_id) != Some(group_id) {
            // Leaving a group abandons its summary too.
            self.panel.reset();
        }
        if let Some(previous) = self.close_channel() {
            events.push(GatewayEvent::Closed { group_id: previous });
        }

        let services = &self.services;
        match Channel::open(
            group_id,
            &services.store,
            services.store.clone(),
            services.registry.clone(),
        )
        .await
        {
            Ok(channel) => {
                info!("Connection {} opened group {}", self.conn_id, group_id);
                events.push(GatewayEvent::Opened {
                    group: channel.group().clone(),
                    messages: channel.messages().to_vec(),
                });
                self.channel = Some(channel);
            }
            Err(e) => {
                warn!("Connection {} failed to open group {}: {}", self.conn_id, group_id, e);
                events.push(chat_error(&e));
            }
        }
        events
    }

    async fn send(&mut self, author: &str, body: &str) -> Vec<GatewayEvent> {
        let Some(channel) = self.channel.as_mut() else {
            return vec![no_channel()];
        };

        match channel.send(author, body).await {
            Ok(stored) => {
                // Anything appended before ours was published before our append
                // returned, so it is already queued; emit it all in key order.
                let mut fresh = channel.drain_pending();
                fresh.push(stored);
                fresh.sort_by_key(Message::ordering_key);
                fresh
                    .into_iter()
                    .map(|message| GatewayEvent::MessageCreate { message })
                    .collect()
            }
            Err(e) => {
                warn!("Connection {} send failed: {}", self.conn_id, e);
                vec![chat_error(&e)]
            }
        }
    }

    fn summarize(&mut self, window: usize) -> Vec<GatewayEvent> {
        let Some(group_id) = self.channel.as_ref().map(Channel::group_id) else {
            return vec![no_channel()];
        };

        let ticket = self.panel.begin(group_id);
        let summarizer = self.services.summarizer.clone();
        let tx = self.summary_tx.clone();
        tokio::spawn(async move {
            if let Some(result) = summarizer
                .summarize_until_cancelled(group_id, window, ticket.cancel_token())
                .await
            {
                // The connection may be gone by now.
                let _ = tx.send((ticket, result));
            }
        });

        debug!("Connection {} requested summary of group {}", self.conn_id, group_id);
        Vec::new()
    }

    fn finish_summary(
        &mut self,
        ticket: DigestTicket,
        result: Result<Digest, SummaryError>,
    ) -> Option<GatewayEvent> {
        let group_id = ticket.group_id();
        let failure = result.as_ref().err().cloned();
        if !self.panel.finish(&ticket, result) {
            return None;
        }

        Some(match failure {
            None => GatewayEvent::DigestReady {
                digest: self.panel.digest()?.clone(),
            },
            Some(err) => GatewayEvent::DigestFailed {
                group_id,
                kind: err.kind().into(),
                error: err.to_string(),
                previous: self.panel.digest().cloned(),
            },
        })
    }

    fn close_channel(&mut self) -> Option<Uuid> {
        let mut channel = self.channel.take()?;
        channel.close();
        Some(channel.group_id())
    }
}

impl<G> Session<G> {
    fn shutdown(&mut self) {
        self.panel.reset();
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }
}

async fn next_live(channel: &mut Option<Channel<SqliteStore>>) -> Option<Message> {
    match channel {
        Some(channel) => channel.next_message().await,
        None => std::future::pending().await,
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(text) => sender.send(WsMessage::Text(text.into())).await,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            Ok(())
        }
    }
}

fn chat_error(err: &ChatError) -> GatewayEvent {
    GatewayEvent::Error {
        kind: err.kind().into(),
        message: err.to_string(),
    }
}

fn no_channel() -> GatewayEvent {
    GatewayEvent::Error {
        kind: "no_channel".into(),
        message: "open a group first".into(),
    }
}
