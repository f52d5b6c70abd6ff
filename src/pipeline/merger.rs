//! The [`DraftMerger`] — orders completed segments into the answer buffer.
//!
//! Correction calls resolve in arbitrary order, but the visible draft must
//! read in submission order.  The merger therefore *holds back* a segment
//! that completes before its predecessor and commits it only once every
//! earlier segment has been applied — segment 3 resolving before segment 2
//! waits, then both flush in order.
//!
//! The user may overwrite the buffer at any time; a manual edit is
//! authoritative, and later completions append after the edited text rather
//! than splicing into it.

use std::collections::BTreeMap;

use super::sequencer::Segment;

// ---------------------------------------------------------------------------
// DraftMerger
// ---------------------------------------------------------------------------

/// The editable accumulated answer text for one question.
///
/// Only ever mutated on the session event loop, so it needs no locking.
///
/// # Example
/// ```rust
/// use voice_report::pipeline::{DraftMerger, SegmentSequencer};
/// use voice_report::recognition::TranscriptEvent;
///
/// let mut seq = SegmentSequencer::new();
/// let mut merger = DraftMerger::new();
///
/// let a = seq.accept(&TranscriptEvent::finalized(1, "きょうは")).unwrap();
/// let b = seq.accept(&TranscriptEvent::finalized(1, "晴れでした")).unwrap();
///
/// // b resolves first — held until a applies, then both flush in order.
/// merger.apply(b.resolve_corrected("晴れでした。".into()));
/// assert_eq!(merger.text(), "");
/// merger.apply(a.resolve_corrected("今日は".into()));
/// assert_eq!(merger.text(), "今日は 晴れでした。");
/// ```
#[derive(Debug, Default)]
pub struct DraftMerger {
    text: String,
    last_applied: u64,
    manually_edited: bool,
    held: BTreeMap<u64, Segment>,
}

impl DraftMerger {
    /// Create an empty merger.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Apply a completed segment.
    ///
    /// Stale segments (`sequence <= last_applied`) are discarded — duplicate
    /// or superseded completions are not an error.  An out-of-order
    /// completion is held until its predecessor applies; sequence numbers are
    /// dense, so every hold is eventually released by the missing segment's
    /// own resolution (success or failure).
    pub fn apply(&mut self, segment: Segment) {
        if segment.sequence <= self.last_applied {
            log::debug!(
                "merger: discarding stale segment #{} (last applied #{})",
                segment.sequence,
                self.last_applied
            );
            return;
        }

        self.held.insert(segment.sequence, segment);

        // Flush the longest committable prefix.
        while let Some(seg) = self.held.remove(&(self.last_applied + 1)) {
            self.append(seg.final_text());
            self.last_applied = seg.sequence;
            log::debug!("merger: committed segment #{}", seg.sequence);
        }
    }

    /// Overwrite the buffer with user-typed text.
    ///
    /// The edit is authoritative: segments completing afterwards append after
    /// the new content instead of replacing it.
    pub fn set_manual_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.manually_edited = true;
    }

    /// Reset everything to initial state (clearing / restarting a question).
    pub fn clear(&mut self) {
        self.text.clear();
        self.last_applied = 0;
        self.manually_edited = false;
        self.held.clear();
    }

    /// Re-baseline sequencing for a fresh listening session while keeping
    /// the draft: the next segment 1 appends after the existing text.
    pub fn rebase(&mut self) {
        self.last_applied = 0;
        self.held.clear();
    }

    fn append(&mut self, chunk: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(chunk);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The current draft text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Highest committed sequence number (0 when none).
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// `true` once the user has overwritten the buffer this question.
    pub fn manually_edited(&self) -> bool {
        self.manually_edited
    }

    /// Number of completed segments waiting for an earlier one.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sequencer::Segment;

    fn corrected(sequence: u64, text: &str) -> Segment {
        Segment::pending(sequence, text.to_string()).resolve_corrected(text.to_string())
    }

    #[test]
    fn in_order_segments_join_with_single_space() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "今日は"));
        merger.apply(corrected(2, "お客様が来ました"));
        assert_eq!(merger.text(), "今日は お客様が来ました");
        assert_eq!(merger.last_applied(), 2);
    }

    #[test]
    fn first_segment_has_no_leading_space() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "今日は"));
        assert_eq!(merger.text(), "今日は");
    }

    #[test]
    fn out_of_order_completion_is_held_then_flushed_in_order() {
        let mut merger = DraftMerger::new();

        // Segment 2 resolves before segment 1.
        merger.apply(corrected(2, "二番目"));
        assert_eq!(merger.text(), "");
        assert_eq!(merger.held_count(), 1);

        merger.apply(corrected(1, "一番目"));
        assert_eq!(merger.text(), "一番目 二番目");
        assert_eq!(merger.held_count(), 0);
        assert_eq!(merger.last_applied(), 2);
    }

    #[test]
    fn long_out_of_order_run_flushes_as_one_prefix() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(3, "c"));
        merger.apply(corrected(2, "b"));
        assert_eq!(merger.text(), "");
        merger.apply(corrected(1, "a"));
        assert_eq!(merger.text(), "a b c");
    }

    #[test]
    fn stale_segment_is_discarded() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "一番目"));
        merger.apply(corrected(1, "重複"));
        assert_eq!(merger.text(), "一番目");
        assert_eq!(merger.last_applied(), 1);
    }

    #[test]
    fn late_lower_sequence_after_higher_applied_is_discarded() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "a"));
        merger.apply(corrected(2, "b"));
        merger.apply(corrected(1, "late"));
        assert_eq!(merger.text(), "a b");
    }

    #[test]
    fn failed_segment_contributes_its_raw_text() {
        let mut merger = DraftMerger::new();
        merger.apply(Segment::pending(1, "きょうわ".into()).resolve_failed());
        assert_eq!(merger.text(), "きょうわ");
    }

    #[test]
    fn manual_edit_overwrites_and_later_segments_append_after_it() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "元のテキスト"));

        merger.set_manual_text("X");
        assert!(merger.manually_edited());
        assert_eq!(merger.text(), "X");

        merger.apply(corrected(2, "追記"));
        assert_eq!(merger.text(), "X 追記");
    }

    #[test]
    fn held_segment_flushes_after_manual_edit_without_overwriting_it() {
        let mut merger = DraftMerger::new();
        // Segment 2 completes first and is held.
        merger.apply(corrected(2, "二番目"));
        merger.set_manual_text("手で直した");
        // Segment 1 completes; both flush after the edited text.
        merger.apply(corrected(1, "一番目"));
        assert_eq!(merger.text(), "手で直した 一番目 二番目");
    }

    #[test]
    fn manual_edit_to_empty_then_append_has_no_leading_space() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "a"));
        merger.set_manual_text("");
        merger.apply(corrected(2, "b"));
        assert_eq!(merger.text(), "b");
    }

    #[test]
    fn clear_resets_everything() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "a"));
        merger.set_manual_text("edited");
        merger.clear();

        assert_eq!(merger.text(), "");
        assert_eq!(merger.last_applied(), 0);
        assert!(!merger.manually_edited());

        // Numbering restarts.
        merger.apply(corrected(1, "b"));
        assert_eq!(merger.text(), "b");
    }

    #[test]
    fn rebase_keeps_text_but_restarts_numbering() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(1, "前の回"));
        merger.rebase();

        // Fresh session starts at sequence 1 again and appends.
        merger.apply(corrected(1, "新しい回"));
        assert_eq!(merger.text(), "前の回 新しい回");
    }

    #[test]
    fn rebase_drops_held_segments() {
        let mut merger = DraftMerger::new();
        merger.apply(corrected(2, "held"));
        merger.rebase();
        merger.apply(corrected(1, "fresh"));
        assert_eq!(merger.text(), "fresh");
        assert_eq!(merger.held_count(), 0);
    }
}
