use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use campus_db::{GroupDirectory, MessageStore};
use campus_types::models::{Digest, Message, SortOrder};

use crate::error::SummaryError;
use crate::gemini::Generator;

pub const DEFAULT_WINDOW: usize = 5;
pub const MAX_WINDOW: usize = 100;

/// Summary text for a group nobody has written in yet.
pub const NO_ACTIVITY_SUMMARY: &str =
    "No messages found in this group chat yet. Start a conversation to get a summary!";

const PROMPT_INSTRUCTIONS: &str = "Please provide a concise summary of the following chat \
conversation between students. Focus on the main topics discussed, key points, questions asked, \
and any important information shared. Keep it brief and organized.";

/// Digests a group's most recent messages. Reads the store directly and never
/// touches live subscriptions, so a slow or failing generation service cannot
/// hold up chat.
pub struct Summarizer<S, G> {
    store: S,
    generator: G,
}

impl<S, G> Summarizer<S, G>
where
    S: MessageStore + GroupDirectory,
    G: Generator,
{
    pub fn new(store: S, generator: G) -> Self {
        Self { store, generator }
    }

    /// Summarize the last `window` messages of a group. Every call is
    /// independent; a refresh is just another call.
    pub async fn summarize(&self, group_id: Uuid, window: usize) -> Result<Digest, SummaryError> {
        if window == 0 || window > MAX_WINDOW {
            return Err(SummaryError::InvalidInput(format!(
                "window must be between 1 and {}",
                MAX_WINDOW
            )));
        }

        let group = self.store.get(group_id).await?;

        // Newest first from the store; flip to reading order.
        let limit = u32::try_from(window).unwrap_or(u32::MAX);
        let mut messages = self
            .store
            .query(group_id, SortOrder::Desc, Some(limit))
            .await?;
        messages.reverse();

        if messages.is_empty() {
            return Ok(Digest {
                group_id,
                window: messages,
                summary: NO_ACTIVITY_SUMMARY.to_string(),
            });
        }

        let prompt = build_prompt(&messages);
        info!(
            "Summarizing {} messages of '{}' ({})",
            messages.len(),
            group.subject_name,
            group_id
        );

        let summary = self.generator.generate(&prompt).await.map_err(|e| {
            warn!("Summary for group {} failed: {}", group_id, e);
            e
        })?;

        Ok(Digest {
            group_id,
            window: messages,
            summary,
        })
    }

    /// Like `summarize`, but gives up as soon as `cancel` fires. A cancelled
    /// request yields `None` and its in-flight generation call is dropped.
    pub async fn summarize_until_cancelled(
        &self,
        group_id: Uuid,
        window: usize,
        cancel: &CancellationToken,
    ) -> Option<Result<Digest, SummaryError>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Summary for group {} abandoned", group_id);
                None
            }
            result = self.summarize(group_id, window) => Some(result),
        }
    }
}

/// Render messages, oldest first, as the generation prompt.
pub fn build_prompt(messages: &[Message]) -> String {
    let conversation = messages
        .iter()
        .map(|m| format!("{}: {}", m.author, m.body))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{PROMPT_INSTRUCTIONS}\n\nChat conversation:\n{conversation}\n\nSummary:")
}
