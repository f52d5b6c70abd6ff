//! Streaming transcript capture & correction pipeline.
//!
//! This module is the core of the crate: it turns a continuous, possibly
//! error-prone interim/final transcript event stream into a stable, ordered,
//! human-editable answer buffer, while concurrently correcting each finalized
//! segment through an external service.
//!
//! # Architecture
//!
//! ```text
//! RecognitionEngine ──▶ SegmentSequencer ──▶ CorrectionDispatcher
//!       (events)          (dedup + order)      (concurrent calls)
//!                                                      │
//!                                                      ▼
//!            SessionController ◀────────────────  DraftMerger
//!          (lifecycle + status)            (strict-order commits)
//!
//! SharedState (Arc<Mutex<SessionState>>) ←── read by the UI at will
//! ```
//!
//! Three independent timelines are reconciled here: live out-of-order
//! interim/final events, variable-latency correction calls that complete out
//! of submission order, and user edits that can land between either.  All
//! pipeline state transitions are serialized through the
//! [`SessionController`] event loop; correction failure degrades silently to
//! raw text and is never fatal.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_report::correct::PassthroughCorrector;
//! use voice_report::pipeline::{SessionCommand, SessionController};
//! # use voice_report::recognition::RecognitionEngine;
//! # fn make_engine() -> Arc<dyn RecognitionEngine> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller = SessionController::new(
//!         make_engine(),
//!         Arc::new(PassthroughCorrector),
//!         Some("今日はどんなお客様の対応をしましたか？".into()),
//!         3,
//!     );
//!
//!     let handle = controller.spawn();
//!     handle.send(SessionCommand::Start).await;
//!     // ... later:
//!     handle.send(SessionCommand::Stop).await;
//!     println!("{}", handle.text());
//! }
//! ```

pub mod dispatcher;
pub mod merger;
pub mod sequencer;
pub mod session;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use dispatcher::CorrectionDispatcher;
pub use merger::DraftMerger;
pub use sequencer::{Segment, SegmentSequencer, SegmentState};
pub use session::{
    new_shared_state, SessionCommand, SessionController, SessionHandle, SessionPhase,
    SessionState, SharedState,
};
