//! Segment model and the [`SegmentSequencer`].
//!
//! The sequencer consumes the raw transcript event stream and decides which
//! finals become [`Segment`]s.  Interim events never produce a segment (they
//! are surfaced to the UI as a live preview only), whitespace-only finals are
//! dropped, and a final identical to the most recently accepted one is
//! suppressed — recognizers may re-emit an identical final before or after
//! trailing interim noise.
//!
//! Accepted segments get a dense, strictly increasing sequence number, so the
//! merger can commit completions in submission order with no holes.

use crate::recognition::TranscriptEvent;

// ---------------------------------------------------------------------------
// SegmentState
// ---------------------------------------------------------------------------

/// Lifecycle of one finalized chunk of speech text.
///
/// `Pending → Corrected` or `Pending → Failed`; `Failed` is terminal but
/// still yields text (the raw fallback) — a segment is never silently
/// dropped once accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Accepted, correction not yet resolved.
    Pending,
    /// Correction succeeded; `corrected_text` holds the service output.
    Corrected,
    /// Correction failed; `corrected_text` holds the raw fallback.
    Failed,
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One finalized chunk of speech text tracked through correction and merging.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Position in submission order, unique and strictly increasing per
    /// session, starting at 1.
    pub sequence: u64,
    /// The trimmed final transcript text as accepted.
    pub raw_text: String,
    /// Correction lifecycle state.
    pub state: SegmentState,
    /// Correction output (or raw fallback); `None` while `Pending`.
    pub corrected_text: Option<String>,
}

impl Segment {
    pub(crate) fn pending(sequence: u64, raw_text: String) -> Self {
        Self {
            sequence,
            raw_text,
            state: SegmentState::Pending,
            corrected_text: None,
        }
    }

    /// Mark the segment corrected with the service output.
    pub fn resolve_corrected(mut self, corrected: String) -> Self {
        self.state = SegmentState::Corrected;
        self.corrected_text = Some(corrected);
        self
    }

    /// Mark the segment failed; the raw text stands as final.
    pub fn resolve_failed(mut self) -> Self {
        self.state = SegmentState::Failed;
        self.corrected_text = Some(self.raw_text.clone());
        self
    }

    /// The text this segment contributes to the draft.
    ///
    /// Falls back to `raw_text` while still pending (used when a pending
    /// segment must be rendered, e.g. in logs).
    pub fn final_text(&self) -> &str {
        self.corrected_text.as_deref().unwrap_or(&self.raw_text)
    }
}

// ---------------------------------------------------------------------------
// SegmentSequencer
// ---------------------------------------------------------------------------

/// Turns accepted final events into sequence-numbered [`Segment`]s.
///
/// # Example
/// ```rust
/// use voice_report::pipeline::SegmentSequencer;
/// use voice_report::recognition::TranscriptEvent;
///
/// let mut seq = SegmentSequencer::new();
/// let seg = seq.accept(&TranscriptEvent::finalized(1, "きょうは")).unwrap();
/// assert_eq!(seg.sequence, 1);
/// // identical re-emitted final is suppressed
/// assert!(seq.accept(&TranscriptEvent::finalized(1, "きょうは")).is_none());
/// ```
#[derive(Debug, Default)]
pub struct SegmentSequencer {
    last_sequence: u64,
    last_final_text: Option<String>,
}

impl SegmentSequencer {
    /// Create a sequencer with no accepted finals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a transcript event; returns a new pending [`Segment`] when the
    /// event is a non-empty, non-duplicate final.
    ///
    /// * Interim events always return `None`.
    /// * Whitespace-only finals are dropped.
    /// * A final whose trimmed text equals the most recently accepted final's
    ///   text is suppressed.
    pub fn accept(&mut self, event: &TranscriptEvent) -> Option<Segment> {
        if !event.is_final() {
            return None;
        }

        let text = event.text.trim();
        if text.is_empty() {
            log::debug!("sequencer: dropping whitespace-only final");
            return None;
        }

        if self.last_final_text.as_deref() == Some(text) {
            log::debug!("sequencer: suppressing duplicate final {text:?}");
            return None;
        }

        self.last_sequence += 1;
        self.last_final_text = Some(text.to_string());

        log::debug!(
            "sequencer: accepted final #{} ({} chars)",
            self.last_sequence,
            text.chars().count()
        );
        Some(Segment::pending(self.last_sequence, text.to_string()))
    }

    /// Sequence number of the most recently accepted final (0 when none).
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Reset for a new session: sequence counter and duplicate-suppression
    /// memory return to initial state.
    pub fn reset(&mut self) {
        self.last_sequence = 0;
        self.last_final_text = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::TranscriptEvent;

    #[test]
    fn interim_events_never_produce_a_segment() {
        let mut seq = SegmentSequencer::new();
        assert!(seq.accept(&TranscriptEvent::interim(1, "きょう")).is_none());
        assert!(seq.accept(&TranscriptEvent::interim(1, "きょうは")).is_none());
        assert_eq!(seq.last_sequence(), 0);
    }

    #[test]
    fn finals_get_dense_increasing_sequence_numbers() {
        let mut seq = SegmentSequencer::new();
        let a = seq.accept(&TranscriptEvent::finalized(1, "きょうは")).unwrap();
        let b = seq
            .accept(&TranscriptEvent::finalized(1, "お客様が来ました"))
            .unwrap();
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(a.state, SegmentState::Pending);
    }

    #[test]
    fn consecutive_identical_finals_yield_one_segment() {
        let mut seq = SegmentSequencer::new();
        assert!(seq.accept(&TranscriptEvent::finalized(1, "こんにちは")).is_some());
        assert!(seq.accept(&TranscriptEvent::finalized(1, "こんにちは")).is_none());
        assert_eq!(seq.last_sequence(), 1);
    }

    #[test]
    fn duplicate_suppression_compares_trimmed_text() {
        let mut seq = SegmentSequencer::new();
        assert!(seq.accept(&TranscriptEvent::finalized(1, "こんにちは")).is_some());
        // Same text with trailing whitespace is still a duplicate.
        assert!(seq.accept(&TranscriptEvent::finalized(1, "こんにちは ")).is_none());
    }

    #[test]
    fn non_consecutive_repeat_is_accepted_again() {
        let mut seq = SegmentSequencer::new();
        assert!(seq.accept(&TranscriptEvent::finalized(1, "はい")).is_some());
        assert!(seq.accept(&TranscriptEvent::finalized(1, "そうです")).is_some());
        // "はい" again after different text is a genuine new utterance.
        let again = seq.accept(&TranscriptEvent::finalized(1, "はい")).unwrap();
        assert_eq!(again.sequence, 3);
    }

    #[test]
    fn whitespace_only_final_is_dropped() {
        let mut seq = SegmentSequencer::new();
        assert!(seq.accept(&TranscriptEvent::finalized(1, "   ")).is_none());
        assert!(seq.accept(&TranscriptEvent::finalized(1, "")).is_none());
        assert_eq!(seq.last_sequence(), 0);
    }

    #[test]
    fn accepted_raw_text_is_trimmed() {
        let mut seq = SegmentSequencer::new();
        let seg = seq
            .accept(&TranscriptEvent::finalized(1, "  きょうは  "))
            .unwrap();
        assert_eq!(seg.raw_text, "きょうは");
    }

    #[test]
    fn reset_restarts_numbering_and_dedup_memory() {
        let mut seq = SegmentSequencer::new();
        seq.accept(&TranscriptEvent::finalized(1, "こんにちは"));
        seq.reset();
        // Same text is accepted again after reset, with sequence restarting.
        let seg = seq.accept(&TranscriptEvent::finalized(2, "こんにちは")).unwrap();
        assert_eq!(seg.sequence, 1);
    }

    #[test]
    fn resolve_corrected_sets_state_and_text() {
        let mut seq = SegmentSequencer::new();
        let seg = seq.accept(&TranscriptEvent::finalized(1, "きょうわ")).unwrap();
        let seg = seg.resolve_corrected("今日は".into());
        assert_eq!(seg.state, SegmentState::Corrected);
        assert_eq!(seg.final_text(), "今日は");
    }

    #[test]
    fn resolve_failed_falls_back_to_raw_text() {
        let mut seq = SegmentSequencer::new();
        let seg = seq.accept(&TranscriptEvent::finalized(1, "きょうわ")).unwrap();
        let seg = seg.resolve_failed();
        assert_eq!(seg.state, SegmentState::Failed);
        assert_eq!(seg.final_text(), "きょうわ");
    }
}
