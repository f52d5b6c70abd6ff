//! The [`CorrectionDispatcher`] — fire-and-forget correction calls.
//!
//! Each accepted segment is handed to the external [`Corrector`] on its own
//! tokio task; completion comes back to the session loop as a
//! [`SessionMsg::Corrected`] message tagged with the session epoch active at
//! submission.  Calls run fully concurrently and may resolve in any order —
//! ordering is the merger's job, not the dispatcher's.
//!
//! Failure policy: any error from the external call resolves the segment as
//! `Failed` with the raw text standing in for the correction.  The pipeline
//! never blocks the user on correction failure and never retries.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::correct::Corrector;
use crate::recognition::SessionId;

use super::sequencer::Segment;
use super::session::SessionMsg;

// ---------------------------------------------------------------------------
// CorrectionDispatcher
// ---------------------------------------------------------------------------

/// Tracks outstanding correction calls and spawns one task per segment.
///
/// Owned by the session controller; all methods run on the session event
/// loop, so the pending set needs no locking.
pub struct CorrectionDispatcher {
    corrector: Arc<dyn Corrector>,
    resolutions: mpsc::UnboundedSender<SessionMsg>,
    pending: HashSet<u64>,
    min_chars: usize,
}

impl CorrectionDispatcher {
    /// Create a dispatcher resolving through `resolutions`.
    ///
    /// `min_chars` is the short-circuit threshold: a segment whose raw text
    /// has fewer characters skips the external call entirely and resolves as
    /// corrected-with-raw immediately (noise fragments are not worth a call).
    pub fn new(
        corrector: Arc<dyn Corrector>,
        resolutions: mpsc::UnboundedSender<SessionMsg>,
        min_chars: usize,
    ) -> Self {
        Self {
            corrector,
            resolutions,
            pending: HashSet::new(),
            min_chars,
        }
    }

    /// Dispatch a pending segment for correction.
    ///
    /// Fire-and-forget: completion (success or raw-text fallback) arrives on
    /// the resolutions channel.  A second dispatch for a sequence number that
    /// is still outstanding is ignored.
    pub fn dispatch(
        &mut self,
        session: SessionId,
        segment: Segment,
        context_hint: Option<String>,
    ) {
        if !self.pending.insert(segment.sequence) {
            log::warn!(
                "dispatcher: segment #{} already has an outstanding call, ignoring",
                segment.sequence
            );
            return;
        }

        // Short-circuit: noise fragments resolve without an external call.
        if segment.raw_text.chars().count() < self.min_chars {
            log::debug!(
                "dispatcher: segment #{} below {} chars, skipping external call",
                segment.sequence,
                self.min_chars
            );
            let raw = segment.raw_text.clone();
            let resolved = segment.resolve_corrected(raw);
            let _ = self.resolutions.send(SessionMsg::Corrected {
                session,
                segment: resolved,
            });
            return;
        }

        let corrector = Arc::clone(&self.corrector);
        let resolutions = self.resolutions.clone();

        tokio::spawn(async move {
            let result = corrector
                .correct(&segment.raw_text, context_hint.as_deref())
                .await;

            let resolved = match result {
                Ok(corrected) => segment.resolve_corrected(corrected),
                Err(e) => {
                    log::warn!(
                        "dispatcher: correction failed for segment #{} ({e}), \
                         falling back to raw text",
                        segment.sequence
                    );
                    segment.resolve_failed()
                }
            };

            // The session loop may be gone (shutdown); nothing to do then.
            let _ = resolutions.send(SessionMsg::Corrected {
                session,
                segment: resolved,
            });
        });
    }

    /// Mark a sequence number resolved; returns `false` when it was not
    /// outstanding (stale or cancelled-epoch resolution).
    pub fn resolve(&mut self, sequence: u64) -> bool {
        self.pending.remove(&sequence)
    }

    /// Forget all outstanding calls (cancellation / fresh session).  The
    /// spawned tasks still run to completion, but their resolutions carry a
    /// stale session epoch and are ignored by the session loop.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of correction calls currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
