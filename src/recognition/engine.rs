//! The [`RecognitionEngine`] trait and listening-session handle.
//!
//! [`RecognitionEngine`] is the object-safe seam between the pipeline and
//! whatever actually produces speech events — a platform speech API, a
//! network recognizer, or (in tests) [`ScriptedEngine`], which replays a
//! timed script of signals.
//!
//! Engines deliver [`EngineSignal`]s over the `tokio::sync::mpsc` sender
//! passed to [`start_listening`](RecognitionEngine::start_listening) and must
//! send [`EngineSignal::Ended`] once — after a stop request or when they end
//! on their own — so the session controller knows termination is confirmed.

use tokio::sync::{mpsc, oneshot};

use super::{EngineSignal, RecognitionError, SessionId};

// ---------------------------------------------------------------------------
// RecognitionEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech recognition engines.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn RecognitionEngine>` and shared with the session controller.
///
/// # Contract
///
/// - [`is_supported`](Self::is_supported) must be cheap and side-effect free;
///   callers check it before attempting to listen.
/// - `start_listening` begins a continuous listening session and returns a
///   [`ListeningHandle`].  Signals flow through `events` until the engine
///   sends [`EngineSignal::Ended`] or [`EngineSignal::Error`].
/// - Events must arrive in non-decreasing emission order.
pub trait RecognitionEngine: Send + Sync {
    /// `true` when a speech engine is actually usable in this environment.
    fn is_supported(&self) -> bool;

    /// Start a continuous listening session delivering signals to `events`.
    fn start_listening(
        &self,
        session: SessionId,
        events: mpsc::Sender<EngineSignal>,
    ) -> Result<ListeningHandle, RecognitionError>;
}

// Compile-time assertion: Box<dyn RecognitionEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecognitionEngine>) {}
};

// ---------------------------------------------------------------------------
// ListeningHandle
// ---------------------------------------------------------------------------

/// Handle to a running listening session.
///
/// [`stop`](Self::stop) *requests* termination; the engine confirms by
/// sending [`EngineSignal::Ended`] on its event channel.  Dropping the handle
/// without calling `stop` leaves the engine running until its own end of
/// stream (the session controller always stops explicitly).
#[derive(Debug)]
pub struct ListeningHandle {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ListeningHandle {
    /// Wrap the stop side of an engine's shutdown channel.
    pub fn new(stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
        }
    }

    /// Request the engine to end this listening session.  Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The engine task may already be gone; that's fine.
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedEngine (test double)
// ---------------------------------------------------------------------------

/// One step of a [`ScriptedEngine`] script.
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit an interim event with this text.
    Interim(&'static str),
    /// Emit a final event with this text.
    Final(&'static str),
    /// Emit a terminal engine error.
    Error(RecognitionError),
}

/// Test engine that replays a timed script of signals.
///
/// Each step is `(delay_ms, step)`: the engine sleeps, then emits.  A stop
/// request interrupts the script and sends [`EngineSignal::Ended`]; an
/// exhausted script keeps the session open until stopped, like a continuous
/// recognizer waiting for more speech.
#[cfg(test)]
pub struct ScriptedEngine {
    script: Vec<(u64, ScriptStep)>,
    supported: bool,
    start_error: Option<RecognitionError>,
}

#[cfg(test)]
impl ScriptedEngine {
    /// Engine that replays `script` after `start_listening`.
    pub fn new(script: Vec<(u64, ScriptStep)>) -> Self {
        Self {
            script,
            supported: true,
            start_error: None,
        }
    }

    /// Engine whose `is_supported` returns `false`.
    pub fn unsupported() -> Self {
        Self {
            script: Vec::new(),
            supported: false,
            start_error: Some(RecognitionError::Unsupported),
        }
    }

    /// Engine that fails `start_listening` with `err`.
    pub fn failing(err: RecognitionError) -> Self {
        Self {
            script: Vec::new(),
            supported: true,
            start_error: Some(err),
        }
    }
}

#[cfg(test)]
impl RecognitionEngine for ScriptedEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start_listening(
        &self,
        session: SessionId,
        events: mpsc::Sender<EngineSignal>,
    ) -> Result<ListeningHandle, RecognitionError> {
        if let Some(err) = &self.start_error {
            return Err(err.clone());
        }

        let script = self.script.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            for (delay_ms, step) in script {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = events.send(EngineSignal::Ended).await;
                        return;
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
                }

                let signal = match step {
                    ScriptStep::Interim(text) => EngineSignal::Event(
                        super::TranscriptEvent::interim(session, text),
                    ),
                    ScriptStep::Final(text) => EngineSignal::Event(
                        super::TranscriptEvent::finalized(session, text),
                    ),
                    ScriptStep::Error(err) => EngineSignal::Error(err),
                };

                if events.send(signal).await.is_err() {
                    return; // session loop gone
                }
            }

            // Script exhausted — stay "listening" until stopped.
            let _ = (&mut stop_rx).await;
            let _ = events.send(EngineSignal::Ended).await;
        });

        Ok(ListeningHandle::new(stop_tx))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
