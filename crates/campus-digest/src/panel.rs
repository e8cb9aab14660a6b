use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use campus_types::models::Digest;

use crate::error::SummaryError;

/// One summary request started by `DigestPanel::begin`. Hand it back to
/// `finish` together with the result.
#[derive(Debug, Clone)]
pub struct DigestTicket {
    group_id: Uuid,
    generation: u64,
    cancel: CancellationToken,
}

impl DigestTicket {
    pub fn group_id(&self) -> Uuid {
        self.group_id
    }

    /// Fires when the request is superseded or the panel is reset.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// What one viewer currently sees of the summary feature: the group being
/// summarized, the last digest that succeeded and the last failure.
///
/// A failed refresh leaves the previous digest in place next to the error.
/// Only the most recent request is ever applied; results of superseded
/// requests, or of a group the viewer has since left, are dropped.
#[derive(Debug, Default)]
pub struct DigestPanel {
    group_id: Option<Uuid>,
    digest: Option<Digest>,
    error: Option<SummaryError>,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

impl DigestPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `group_id`. Any request already in flight is
    /// cancelled. Moving to another group also clears what was shown for the
    /// old one.
    pub fn begin(&mut self, group_id: Uuid) -> DigestTicket {
        self.cancel_in_flight();
        if self.group_id != Some(group_id) {
            self.group_id = Some(group_id);
            self.digest = None;
        }
        self.error = None;

        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());
        DigestTicket {
            group_id,
            generation: self.generation,
            cancel,
        }
    }

    /// Record the outcome of a request. Returns `false` when the ticket is no
    /// longer the current request and the result was discarded.
    pub fn finish(&mut self, ticket: &DigestTicket, result: Result<Digest, SummaryError>) -> bool {
        if self.in_flight.is_none()
            || ticket.generation != self.generation
            || self.group_id != Some(ticket.group_id)
        {
            debug!(
                "Discarding superseded summary result for group {}",
                ticket.group_id
            );
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(digest) => {
                self.digest = Some(digest);
                self.error = None;
            }
            Err(err) => self.error = Some(err),
        }
        true
    }

    /// Leave the current group: cancel any request and clear the panel.
    pub fn reset(&mut self) {
        self.cancel_in_flight();
        self.group_id = None;
        self.digest = None;
        self.error = None;
    }

    pub fn group_id(&self) -> Option<Uuid> {
        self.group_id
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    pub fn error(&self) -> Option<&SummaryError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    // Every begin and reset moves to a new generation, so tickets handed out
    // before it can no longer match.
    fn cancel_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.generation += 1;
    }
}
