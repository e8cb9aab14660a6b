use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Digest, Group, Message};

/// One newly appended message, as pushed to live listeners. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub group_id: Uuid,
    pub message: Message,
}

impl LiveEvent {
    pub fn new(message: Message) -> Self {
        Self {
            group_id: message.group_id,
            message,
        }
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// A channel was opened; `messages` is the full ordered backfill
    Opened { group: Group, messages: Vec<Message> },

    /// A message was merged into the open channel's view
    MessageCreate { message: Message },

    /// The open channel was closed
    Closed { group_id: Uuid },

    /// A summary finished for the current group
    DigestReady { digest: Digest },

    /// A summary failed; `previous` is the last digest still on display
    DigestFailed {
        group_id: Uuid,
        kind: String,
        error: String,
        previous: Option<Digest>,
    },

    /// A command failed
    Error { kind: String, message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Open a channel on a group, closing any channel already open
    Open { group_id: Uuid },

    /// Post to the open channel
    Send { author: String, body: String },

    /// Close the open channel
    Close,

    /// Summarize the open channel's group
    Summarize {
        #[serde(default)]
        window: Option<usize>,
    },
}
