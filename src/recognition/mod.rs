//! Recognition session collaborator seam.
//!
//! The pipeline never talks to a speech engine directly.  An engine
//! implements [`RecognitionEngine`] and delivers [`EngineSignal`]s over a
//! `tokio::sync::mpsc` channel — events pushed into a queue the session loop
//! consumes, rather than nested callbacks, so ordering and cancellation stay
//! explicit and testable without real audio hardware.
//!
//! # Signal stream
//!
//! ```text
//! start_listening(session, tx)
//!   ├─▶ EngineSignal::Event(interim)   live, unconfirmed preview text
//!   ├─▶ EngineSignal::Event(final)     text the engine will not revise
//!   ├─▶ EngineSignal::Error(_)         terminal for this listening session
//!   └─▶ EngineSignal::Ended            engine confirmed termination
//! ```
//!
//! Engines must deliver events in non-decreasing emission order.  Whether an
//! engine is usable at all is detectable up front via
//! [`RecognitionEngine::is_supported`] so callers can fall back to manual
//! text entry.

pub mod engine;

pub use engine::{ListeningHandle, RecognitionEngine};

#[cfg(test)]
pub use engine::{ScriptStep, ScriptedEngine};

use std::time::Instant;

use thiserror::Error;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Identifies one listening session (a session *epoch*).
///
/// Every in-flight correction and engine signal is tagged with the session id
/// active at submission time; resolutions carrying a stale id are ignored.
pub type SessionId = u64;

// ---------------------------------------------------------------------------
// TranscriptEvent
// ---------------------------------------------------------------------------

/// Whether a transcript chunk is still provisional or will not change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Provisional recognition output that may still be revised.
    Interim,
    /// Recognition output the engine will not revise further.
    Final,
}

/// One chunk of recognizer output.  Ephemeral — never persisted.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    /// The listening session this event belongs to.
    pub session: SessionId,
    /// Recognized text (may be empty or whitespace-only noise).
    pub text: String,
    /// Interim preview or confirmed final.
    pub kind: EventKind,
    /// When the engine emitted the event.
    pub emitted_at: Instant,
}

impl TranscriptEvent {
    /// Build an interim (provisional) event.
    pub fn interim(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            text: text.into(),
            kind: EventKind::Interim,
            emitted_at: Instant::now(),
        }
    }

    /// Build a final (confirmed) event.
    pub fn finalized(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            text: text.into(),
            kind: EventKind::Final,
            emitted_at: Instant::now(),
        }
    }

    /// `true` when the engine will not revise this text further.
    pub fn is_final(&self) -> bool {
        self.kind == EventKind::Final
    }
}

// ---------------------------------------------------------------------------
// EngineSignal
// ---------------------------------------------------------------------------

/// Everything an engine can deliver over its event channel.
#[derive(Debug, Clone)]
pub enum EngineSignal {
    /// A transcript chunk, interim or final.
    Event(TranscriptEvent),
    /// The engine hit a terminal error; no further events will follow.
    Error(RecognitionError),
    /// The engine confirmed termination after a stop request (or on its own).
    Ended,
}

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Errors a recognition engine can raise.  All are terminal for the current
/// listening session; the pipeline never retries listening on its own.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// No speech engine is available in this environment.
    #[error("speech recognition is not supported in this environment")]
    Unsupported,

    /// The user (or OS) denied microphone access.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The audio device failed or disappeared.
    #[error("audio device error: {0}")]
    Device(String),

    /// The engine aborted mid-session (network drop, internal failure).
    #[error("recognition aborted: {0}")]
    Runtime(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
