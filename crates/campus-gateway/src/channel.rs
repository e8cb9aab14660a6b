use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use campus_db::{GroupDirectory, MessageStore};
use campus_types::error::ChatError;
use campus_types::events::LiveEvent;
use campus_types::models::{Group, Message, MessageId, NewMessage, SortOrder};

use crate::registry::{DeliveryError, Registry, SubscriptionHandle};

/// One session's ordered, deduplicated view of a group's messages: the full
/// history at open time followed by the live tail.
pub struct Channel<S> {
    group: Group,
    store: S,
    registry: Registry,
    subscription: Option<SubscriptionHandle>,
    live_rx: mpsc::UnboundedReceiver<LiveEvent>,
    /// Sorted by ordering key.
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl<S: MessageStore> Channel<S> {
    /// Resolve the group, subscribe to its live events, then backfill history.
    ///
    /// Subscribing first means anything appended while the history query runs
    /// is buffered; whatever the query also returned is dropped on merge.
    pub async fn open<D: GroupDirectory>(
        group_id: Uuid,
        directory: &D,
        store: S,
        registry: Registry,
    ) -> Result<Self, ChatError> {
        let group = directory.get(group_id).await?;

        let (tx, live_rx) = mpsc::unbounded_channel();
        let subscription = registry.subscribe(group_id, move |event: &LiveEvent| {
            tx.send(event.clone()).map_err(|_| DeliveryError::Closed)
        });

        let mut channel = Self {
            group,
            store,
            registry,
            subscription: Some(subscription),
            live_rx,
            messages: Vec::new(),
            seen: HashSet::new(),
        };

        // On error `channel` is dropped here, which releases the subscription.
        let history = channel.store.query(group_id, SortOrder::Asc, None).await?;
        for message in history {
            channel.merge(message);
        }

        info!(
            "Channel opened on group {} with {} messages",
            group_id,
            channel.messages.len()
        );
        Ok(channel)
    }

    /// Post to this channel's group. Input is validated before the store is
    /// touched. The stored message is merged here and again when its live
    /// event arrives; only the first merge has any effect.
    pub async fn send(&mut self, author: &str, body: &str) -> Result<Message, ChatError> {
        let message = NewMessage::new(author, body)?;
        let stored = self.store.append(self.group.id, message).await?;
        if !self.is_closed() {
            self.merge(stored.clone());
        }
        Ok(stored)
    }
}

impl<S> Channel<S> {
    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn group_id(&self) -> Uuid {
        self.group.id
    }

    /// The current view, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_closed(&self) -> bool {
        self.subscription.is_none()
    }

    /// Merge a live event. Returns whether the view changed: events for other
    /// groups, already-known messages, and anything after `close` are ignored.
    pub fn on_live_message(&mut self, event: LiveEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        if event.group_id != self.group.id || event.message.group_id != self.group.id {
            warn!(
                "Channel on group {} dropped event for group {}",
                self.group.id, event.group_id
            );
            return false;
        }
        self.merge(event.message)
    }

    /// Wait for the next live message that is new to this view. Returns `None`
    /// once the channel is closed.
    pub async fn next_message(&mut self) -> Option<Message> {
        loop {
            if self.is_closed() {
                return None;
            }
            let event = self.live_rx.recv().await?;
            let message = event.message.clone();
            if self.on_live_message(event) {
                return Some(message);
            }
        }
    }

    /// Merge every event already delivered, without waiting. Returns the
    /// messages that were new, in merge order.
    pub fn drain_pending(&mut self) -> Vec<Message> {
        let mut merged = Vec::new();
        while let Ok(event) = self.live_rx.try_recv() {
            let message = event.message.clone();
            if self.on_live_message(event) {
                merged.push(message);
            }
        }
        merged
    }

    /// Release the live subscription. Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.registry.unsubscribe(handle);
            self.live_rx.close();
            debug!("Channel on group {} closed", self.group.id);
        }
    }

    /// Insert at the message's ordering-key position unless its id is already
    /// present. Arrivals in store order always land at the tail.
    fn merge(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        let key = message.ordering_key();
        let pos = self.messages.partition_point(|m| m.ordering_key() < key);
        self.messages.insert(pos, message);
        true
    }
}

impl<S> Drop for Channel<S> {
    fn drop(&mut self) {
        self.close();
    }
}
