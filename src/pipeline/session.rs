//! Session controller — lifecycle, event loop, and shared status.
//!
//! [`SessionController`] owns the whole pipeline for one question: the
//! [`SegmentSequencer`], the [`CorrectionDispatcher`], and the
//! [`DraftMerger`].  It responds to [`SessionCommand`]s and to internal
//! [`SessionMsg`]s on a single event loop, so every state transition
//! (`accept`, dispatch resolution, `apply`) is serialized — no locks guard
//! pipeline state, because nothing else mutates it.
//!
//! # Event loop
//!
//! ```text
//! SessionCommand::Start
//!   └─▶ bump session epoch, reset sequencing, engine.start_listening
//!
//! EngineSignal::Event(interim)  ──▶ live preview only (SharedState.interim)
//! EngineSignal::Event(final)    ──▶ sequencer.accept ──▶ dispatcher.dispatch
//!                                     └─ spawned correction task
//! SessionMsg::Corrected         ──▶ epoch check ──▶ merger.apply ──▶ draft
//!
//! SessionCommand::Stop
//!   └─▶ promote trailing interim as a final, engine stop, Stopping → Idle
//! SessionCommand::Cancel
//!   └─▶ bump epoch (in-flight resolutions become stale no-ops), Idle
//! ```
//!
//! The UI never calls into the loop synchronously: it sends commands through
//! a [`SessionHandle`] and reads a [`SharedState`] snapshot the loop updates
//! after every transition.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::correct::Corrector;
use crate::recognition::{
    EngineSignal, EventKind, ListeningHandle, RecognitionEngine, SessionId, TranscriptEvent,
};

use super::dispatcher::CorrectionDispatcher;
use super::merger::DraftMerger;
use super::sequencer::{Segment, SegmentSequencer, SegmentState};

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Listening lifecycle of a dictation session.
///
/// ```text
/// Idle ──start──▶ Listening ──stop──▶ Stopping ──engine Ended──▶ Idle
///                     └──cancel / engine error──▶ Idle
/// ```
///
/// "Processing" (≥1 correction call in flight) is an overlay flag orthogonal
/// to this phase — see [`SessionState::is_processing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not listening; the draft can be edited or cleared.
    Idle,
    /// The recognition engine is live and delivering events.
    Listening,
    /// Stop requested; waiting for the engine to confirm termination.
    Stopping,
}

impl SessionPhase {
    /// `true` while the engine is (or may still be) delivering events.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Listening | SessionPhase::Stopping)
    }

    /// Short human-readable label for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Listening => "Listening",
            SessionPhase::Stopping => "Stopping",
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// SessionState / SharedState
// ---------------------------------------------------------------------------

/// Snapshot of everything the surrounding UI needs.
///
/// Held behind [`SharedState`]; the session loop overwrites it after every
/// transition, the UI reads it whenever it likes.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current listening phase.
    pub phase: SessionPhase,
    /// The merged, editable answer text.
    pub draft: String,
    /// Live, unconfirmed preview text (interim recognition output).
    pub interim: Option<String>,
    /// Number of correction calls currently in flight.
    pub in_flight: usize,
    /// Terminal session error (engine unsupported, permission denied, …).
    pub error_message: Option<String>,
    /// Non-blocking notice (correction degraded, rejected command, …).
    pub warning: Option<String>,
}

impl SessionState {
    /// `true` while at least one correction call is in flight.
    pub fn is_processing(&self) -> bool {
        self.in_flight > 0
    }
}

/// Thread-safe handle to [`SessionState`].
///
/// Cheap to clone.  Lock for a short read; the session loop is the only
/// writer.
pub type SharedState = Arc<Mutex<SessionState>>;

/// Construct a fresh [`SharedState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionState::default()))
}

// ---------------------------------------------------------------------------
// Commands and internal messages
// ---------------------------------------------------------------------------

/// Commands sent from the UI to the session loop.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Begin a new listening session.  Valid only from `Idle`; starting
    /// while active is rejected with a non-blocking warning.
    Start,
    /// Request the engine to end; trailing interim text is promoted to a
    /// final segment and flushed through the normal pipeline.
    Stop,
    /// Abandon the current listening session; in-flight correction results
    /// are discarded and the draft stays as it was at cancellation.
    Cancel,
    /// Overwrite the draft with user-typed text (authoritative).
    SetManualText(String),
    /// Reset the draft to initial state.  Valid only from `Idle`.
    ClearDraft,
}

/// Internal messages consumed by the session loop.
///
/// Every message carries the session epoch active when its producer was
/// started; the loop drops messages whose epoch is stale, which is what
/// makes cancellation race-safe against in-flight correction calls.
#[derive(Debug)]
pub enum SessionMsg {
    /// A signal forwarded from the recognition engine.
    Engine {
        session: SessionId,
        signal: EngineSignal,
    },
    /// A correction call resolved (corrected or failed-with-raw).
    Corrected {
        session: SessionId,
        segment: Segment,
    },
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns and drives the capture & correction pipeline for one question.
///
/// Create with [`new`](Self::new), then either [`spawn`](Self::spawn) it onto
/// the runtime and drive it through the returned [`SessionHandle`], or call
/// [`run`](Self::run) directly with a command receiver.
pub struct SessionController {
    engine: Arc<dyn RecognitionEngine>,
    state: SharedState,
    sequencer: SegmentSequencer,
    merger: DraftMerger,
    dispatcher: CorrectionDispatcher,
    /// Question being answered; passed to the corrector as advisory context.
    question: Option<String>,
    /// Current session epoch; 0 until the first `start()`.
    session: SessionId,
    listening: Option<ListeningHandle>,
    interim: Option<String>,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
    msg_rx: mpsc::UnboundedReceiver<SessionMsg>,
}

impl SessionController {
    /// Create a controller for one question.
    ///
    /// * `engine`    — recognition engine collaborator.
    /// * `corrector` — correction service collaborator.
    /// * `question`  — optional question text used as the correction
    ///   context hint.
    /// * `min_chars` — short-circuit threshold below which segments skip the
    ///   external correction call.
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        corrector: Arc<dyn Corrector>,
        question: Option<String>,
        min_chars: usize,
    ) -> Self {
        // Internal queue is unbounded: the loop enqueues short-circuit
        // resolutions while draining it, so a bounded send from the consumer
        // task could deadlock.
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let dispatcher = CorrectionDispatcher::new(corrector, msg_tx.clone(), min_chars);

        Self {
            engine,
            state: new_shared_state(),
            sequencer: SegmentSequencer::new(),
            merger: DraftMerger::new(),
            dispatcher,
            question,
            session: 0,
            listening: None,
            interim: None,
            msg_tx,
            msg_rx,
        }
    }

    /// Clone the shared status handle the loop keeps updated.
    pub fn shared_state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Spawn the event loop onto the tokio runtime and return a handle.
    pub fn spawn(self) -> SessionHandle {
        let state = self.shared_state();
        let (command_tx, command_rx) = mpsc::channel(16);
        tokio::spawn(self.run(command_rx));
        SessionHandle { command_tx, state }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the session loop until the command channel is closed.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                // msg_rx can never yield None while self holds a sender.
                Some(msg) = self.msg_rx.recv() => self.handle_msg(msg),
            }
        }

        if let Some(mut handle) = self.listening.take() {
            handle.stop();
        }
        log::info!("session: command channel closed, loop shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start => self.handle_start(),
            SessionCommand::Stop => self.handle_stop(),
            SessionCommand::Cancel => self.handle_cancel(),
            SessionCommand::SetManualText(text) => {
                log::debug!("session: manual edit ({} chars)", text.chars().count());
                self.merger.set_manual_text(text);
                self.push_state();
            }
            SessionCommand::ClearDraft => self.handle_clear(),
        }
    }

    fn handle_start(&mut self) {
        if self.phase() != SessionPhase::Idle {
            // Explicit policy: reject, never an implicit restart.
            log::warn!("session: start rejected — already listening");
            self.set_warning("already listening — stop before starting again");
            return;
        }

        if !self.engine.is_supported() {
            log::error!("session: recognition engine unsupported");
            self.set_error(crate::recognition::RecognitionError::Unsupported.to_string());
            return;
        }

        self.session += 1;
        self.sequencer.reset();
        self.merger.rebase();
        self.dispatcher.clear();
        self.interim = None;

        let session = self.session;
        let (event_tx, mut event_rx) = mpsc::channel::<EngineSignal>(32);

        match self.engine.start_listening(session, event_tx) {
            Ok(handle) => {
                // Forward engine signals into the serialized message queue,
                // tagged with the epoch they belong to.
                let msg_tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    while let Some(signal) = event_rx.recv().await {
                        if msg_tx.send(SessionMsg::Engine { session, signal }).is_err() {
                            break;
                        }
                    }
                });

                log::debug!("session: listening (epoch {session})");
                self.listening = Some(handle);
                {
                    let mut st = self.state.lock().unwrap();
                    st.phase = SessionPhase::Listening;
                    st.error_message = None;
                    st.warning = None;
                    st.interim = None;
                }
                self.push_state();
            }
            Err(e) => {
                log::error!("session: failed to start listening: {e}");
                self.set_error(e.to_string());
            }
        }
    }

    fn handle_stop(&mut self) {
        if self.phase() != SessionPhase::Listening {
            log::debug!("session: stop ignored — not listening");
            return;
        }

        // Speech cut off by the user stopping early is still speech: promote
        // the trailing unconfirmed interim through the normal pipeline.
        if let Some(text) = self.interim.take() {
            let promoted = TranscriptEvent::finalized(self.session, text);
            if let Some(segment) = self.sequencer.accept(&promoted) {
                log::debug!(
                    "session: promoted trailing interim as segment #{}",
                    segment.sequence
                );
                self.dispatch(segment);
            }
        }

        if let Some(handle) = self.listening.as_mut() {
            handle.stop();
        }

        self.state.lock().unwrap().phase = SessionPhase::Stopping;
        self.push_state();
    }

    fn handle_cancel(&mut self) {
        log::debug!("session: cancel (epoch {} invalidated)", self.session);

        // Everything in flight now carries a stale epoch and resolves as a
        // no-op; the draft stays exactly as it was at this moment.
        self.session += 1;
        self.dispatcher.clear();
        self.interim = None;

        if let Some(mut handle) = self.listening.take() {
            handle.stop();
        }

        self.state.lock().unwrap().phase = SessionPhase::Idle;
        self.push_state();
    }

    fn handle_clear(&mut self) {
        if self.phase() != SessionPhase::Idle {
            log::warn!("session: clear rejected while listening");
            self.set_warning("stop dictation before clearing the draft");
            return;
        }

        // Corrections still in flight from before the clear must not
        // resurrect text into the emptied buffer — stale-epoch them.
        self.session += 1;
        self.dispatcher.clear();
        self.sequencer.reset();
        self.merger.clear();
        self.interim = None;
        self.push_state();
    }

    // -----------------------------------------------------------------------
    // Internal message handlers
    // -----------------------------------------------------------------------

    fn handle_msg(&mut self, msg: SessionMsg) {
        match msg {
            SessionMsg::Engine { session, signal } => {
                if session != self.session {
                    log::debug!("session: dropping stale engine signal (epoch {session})");
                    return;
                }
                self.handle_signal(signal);
            }
            SessionMsg::Corrected { session, segment } => {
                if session != self.session {
                    log::debug!(
                        "session: dropping stale correction for segment #{} (epoch {session})",
                        segment.sequence
                    );
                    return;
                }
                self.handle_resolution(segment);
            }
        }
    }

    fn handle_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::Event(event) => match event.kind {
                EventKind::Interim => {
                    self.interim = Some(event.text);
                    self.push_state();
                }
                EventKind::Final => {
                    if let Some(segment) = self.sequencer.accept(&event) {
                        self.dispatch(segment);
                    }
                    // Any final supersedes the live preview.
                    self.interim = None;
                    self.push_state();
                }
            },
            EngineSignal::Error(e) => {
                // Terminal for listening only: segments already in the
                // pipeline keep correcting and merging.
                log::error!("session: recognition error: {e}");
                self.listening = None;
                self.interim = None;
                {
                    let mut st = self.state.lock().unwrap();
                    st.phase = SessionPhase::Idle;
                    st.error_message = Some(e.to_string());
                }
                self.push_state();
            }
            EngineSignal::Ended => {
                log::debug!("session: engine confirmed termination");
                self.listening = None;
                self.interim = None;
                self.state.lock().unwrap().phase = SessionPhase::Idle;
                self.push_state();
            }
        }
    }

    fn handle_resolution(&mut self, segment: Segment) {
        if !self.dispatcher.resolve(segment.sequence) {
            log::debug!(
                "session: resolution for segment #{} no longer outstanding",
                segment.sequence
            );
            return;
        }

        if segment.state == SegmentState::Failed {
            // Degraded, not fatal — the draft gets the raw text and the UI
            // may show a transient notice.
            self.set_warning("correction unavailable — raw text used");
        }

        self.merger.apply(segment);
        self.push_state();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, segment: Segment) {
        self.dispatcher
            .dispatch(self.session, segment, self.question.clone());
    }

    fn phase(&self) -> SessionPhase {
        self.state.lock().unwrap().phase
    }

    fn push_state(&self) {
        let mut st = self.state.lock().unwrap();
        st.draft = self.merger.text().to_string();
        st.interim = self.interim.clone();
        st.in_flight = self.dispatcher.in_flight();
    }

    fn set_error(&self, message: String) {
        let mut st = self.state.lock().unwrap();
        st.phase = SessionPhase::Idle;
        st.error_message = Some(message);
    }

    fn set_warning(&self, message: &str) {
        self.state.lock().unwrap().warning = Some(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Cheap handle for driving a spawned session loop.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    state: SharedState,
}

impl SessionHandle {
    /// Send a command to the session loop.
    pub async fn send(&self, cmd: SessionCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            log::warn!("session handle: loop is gone, command dropped");
        }
    }

    /// Snapshot the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    /// The current draft text.
    pub fn text(&self) -> String {
        self.state.lock().unwrap().draft.clone()
    }

    /// Clone of the shared status handle.
    pub fn shared_state(&self) -> SharedState {
        Arc::clone(&self.state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correct::CorrectError;
    use crate::recognition::{RecognitionError, ScriptStep, ScriptedEngine};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Corrector with per-input latency and reply (None = fail), counting
    /// external calls.
    struct LatencyCorrector {
        replies: HashMap<String, (u64, Option<String>)>,
        calls: AtomicUsize,
    }

    impl LatencyCorrector {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        /// Reply to `raw` with `reply` after `delay_ms` (None = fail).
        fn with(mut self, raw: &str, delay_ms: u64, reply: Option<&str>) -> Self {
            self.replies
                .insert(raw.to_string(), (delay_ms, reply.map(|s| s.to_string())));
            self
        }
    }

    #[async_trait]
    impl Corrector for LatencyCorrector {
        async fn correct(
            &self,
            raw: &str,
            _ctx: Option<&str>,
        ) -> Result<String, CorrectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay_ms, reply) = self
                .replies
                .get(raw)
                .cloned()
                .unwrap_or((0, Some(raw.to_string())));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            reply.ok_or(CorrectError::Timeout)
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn spawn_session(
        engine: ScriptedEngine,
        corrector: Arc<dyn Corrector>,
    ) -> SessionHandle {
        SessionController::new(Arc::new(engine), corrector, Some("質問".into()), 3).spawn()
    }

    /// Poll the shared state until `pred` holds (3 s budget).
    async fn wait_for(handle: &SessionHandle, pred: impl Fn(&SessionState) -> bool) {
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if pred(&handle.snapshot()) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("condition not reached; state: {:?}", handle.snapshot()));
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Spec scenario: the second final resolves first, yet the draft reads in
    /// submission order once both are in.
    #[tokio::test]
    async fn out_of_order_completions_commit_in_submission_order() {
        let engine = ScriptedEngine::new(vec![
            (5, ScriptStep::Final("きょうは")),
            (10, ScriptStep::Final("おきゃくさまがきました")),
        ]);
        let corrector = LatencyCorrector::new()
            .with("きょうは", 250, Some("今日は"))
            .with("おきゃくさまがきました", 20, Some("お客様が来ました"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.draft == "今日は お客様が来ました").await;
    }

    /// Two consecutive identical finals yield exactly one merged segment.
    #[tokio::test]
    async fn duplicate_finals_yield_a_single_segment() {
        let engine = ScriptedEngine::new(vec![
            (5, ScriptStep::Final("こんにちはお客様")),
            (10, ScriptStep::Final("こんにちはお客様")),
        ]);
        let corrector = LatencyCorrector::new().with("こんにちはお客様", 10, Some("こんにちは、お客様"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.draft == "こんにちは、お客様").await;

        // Give the duplicate time to (wrongly) merge, then re-check.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(handle.text(), "こんにちは、お客様");
    }

    /// A failed correction degrades that one segment to raw text; neighbours
    /// are unaffected and a non-blocking warning is raised.
    #[tokio::test]
    async fn failed_correction_falls_back_to_raw_for_that_segment_only() {
        let engine = ScriptedEngine::new(vec![
            (5, ScriptStep::Final("しっぱいするぶん")),
            (10, ScriptStep::Final("せいこうするぶん")),
        ]);
        let corrector = LatencyCorrector::new()
            .with("しっぱいするぶん", 10, None)
            .with("せいこうするぶん", 10, Some("成功する文"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.draft == "しっぱいするぶん 成功する文").await;
        assert!(handle.snapshot().warning.is_some());
        assert!(handle.snapshot().error_message.is_none());
    }

    /// A manual edit is authoritative: a correction submitted before the
    /// edit appends after it instead of overwriting it.
    #[tokio::test]
    async fn manual_edit_precedence_over_later_completions() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Final("あとからとどくぶん"))]);
        let corrector =
            LatencyCorrector::new().with("あとからとどくぶん", 250, Some("後から届く文"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;

        // Edit while the correction is still in flight.
        wait_for(&handle, |st| st.in_flight == 1).await;
        handle.send(SessionCommand::SetManualText("X".into())).await;

        wait_for(&handle, |st| st.draft == "X 後から届く文").await;
    }

    /// A correction resolving after cancel() must leave the buffer exactly
    /// as it was at cancellation time.
    #[tokio::test]
    async fn cancellation_discards_in_flight_resolutions() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Final("とりけされるぶん"))]);
        let corrector =
            LatencyCorrector::new().with("とりけされるぶん", 150, Some("取り消される文"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.in_flight == 1).await;
        handle.send(SessionCommand::Cancel).await;
        wait_for(&handle, |st| st.phase == SessionPhase::Idle).await;

        // Let the stale resolution arrive.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(handle.text(), "");
    }

    /// Below the minimum length threshold no external call is made and the
    /// raw text lands in the draft immediately.
    #[tokio::test]
    async fn short_final_skips_the_external_call() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Final("a"))]);
        let corrector = Arc::new(LatencyCorrector::new());
        let calls = Arc::clone(&corrector);

        let handle = spawn_session(engine, corrector);
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.draft == "a").await;
        assert_eq!(calls.calls.load(Ordering::SeqCst), 0);
    }

    /// Interim events update the live preview but never the draft.
    #[tokio::test]
    async fn interim_events_update_preview_only() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Interim("きょうはたく"))]);
        let handle = spawn_session(engine, Arc::new(LatencyCorrector::new()));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.interim.as_deref() == Some("きょうはたく")).await;
        assert_eq!(handle.text(), "");
    }

    /// stop() promotes trailing interim text into a final segment and the
    /// session returns to Idle once the engine confirms.
    #[tokio::test]
    async fn stop_promotes_trailing_interim() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Interim("とちゅうまでのはつわ"))]);
        let corrector =
            LatencyCorrector::new().with("とちゅうまでのはつわ", 10, Some("途中までの発話"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;
        wait_for(&handle, |st| st.interim.is_some()).await;

        handle.send(SessionCommand::Stop).await;
        wait_for(&handle, |st| {
            st.phase == SessionPhase::Idle && st.draft == "途中までの発話"
        })
        .await;
        assert!(handle.snapshot().interim.is_none());
    }

    /// A recognition runtime error terminates listening but segments already
    /// in the pipeline keep correcting and merging.
    #[tokio::test]
    async fn engine_error_stops_listening_but_not_corrections() {
        let engine = ScriptedEngine::new(vec![
            (5, ScriptStep::Final("さきにかくていしたぶん")),
            (20, ScriptStep::Error(RecognitionError::Device("stream died".into()))),
        ]);
        let corrector = LatencyCorrector::new()
            .with("さきにかくていしたぶん", 150, Some("先に確定した文"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| {
            st.phase == SessionPhase::Idle && st.error_message.is_some()
        })
        .await;

        // The in-flight correction still lands.
        wait_for(&handle, |st| st.draft == "先に確定した文").await;
    }

    /// start() while already listening is rejected with a warning and the
    /// live session keeps running.
    #[tokio::test]
    async fn start_while_listening_is_rejected() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Final("ひとことめです"))]);
        let handle = spawn_session(engine, Arc::new(LatencyCorrector::new()));

        handle.send(SessionCommand::Start).await;
        wait_for(&handle, |st| st.phase == SessionPhase::Listening).await;

        handle.send(SessionCommand::Start).await;
        wait_for(&handle, |st| st.warning.is_some()).await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Listening);
    }

    /// An unsupported engine fails the session attempt up front.
    #[tokio::test]
    async fn unsupported_engine_surfaces_error_and_stays_idle() {
        let handle = spawn_session(ScriptedEngine::unsupported(), Arc::new(LatencyCorrector::new()));
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| st.error_message.is_some()).await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Idle);
    }

    /// A start_listening failure (e.g. permission denied) surfaces as a
    /// terminal session error.
    #[tokio::test]
    async fn start_failure_surfaces_error() {
        let handle = spawn_session(
            ScriptedEngine::failing(RecognitionError::PermissionDenied),
            Arc::new(LatencyCorrector::new()),
        );
        handle.send(SessionCommand::Start).await;

        wait_for(&handle, |st| {
            st.error_message.as_deref() == Some("microphone permission denied")
        })
        .await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Idle);
    }

    /// Stopping and starting again appends fresh segments after the kept
    /// draft instead of discarding them as stale.  The scripted engine
    /// replays its script on every start, so the same utterance arrives in
    /// both rounds; re-baselined sequencing must append it, not drop it.
    #[tokio::test]
    async fn restart_appends_after_existing_draft() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Final("まえのかいのぶん"))]);
        let corrector =
            LatencyCorrector::new().with("まえのかいのぶん", 10, Some("前の回の文"));

        let handle = spawn_session(engine, Arc::new(corrector));

        handle.send(SessionCommand::Start).await;
        wait_for(&handle, |st| st.draft == "前の回の文").await;
        handle.send(SessionCommand::Stop).await;
        wait_for(&handle, |st| st.phase == SessionPhase::Idle).await;

        handle.send(SessionCommand::Start).await;
        wait_for(&handle, |st| st.draft == "前の回の文 前の回の文").await;
    }

    /// ClearDraft from Idle resets the buffer; while listening it is
    /// rejected.
    #[tokio::test]
    async fn clear_draft_only_from_idle() {
        let engine = ScriptedEngine::new(vec![(5, ScriptStep::Final("けすまえのぶん"))]);
        let corrector = LatencyCorrector::new().with("けすまえのぶん", 10, Some("消す前の文"));

        let handle = spawn_session(engine, Arc::new(corrector));
        handle.send(SessionCommand::Start).await;
        wait_for(&handle, |st| st.draft == "消す前の文").await;

        // Rejected while listening.
        handle.send(SessionCommand::ClearDraft).await;
        wait_for(&handle, |st| st.warning.is_some()).await;
        assert_eq!(handle.text(), "消す前の文");

        handle.send(SessionCommand::Stop).await;
        wait_for(&handle, |st| st.phase == SessionPhase::Idle).await;

        handle.send(SessionCommand::ClearDraft).await;
        wait_for(&handle, |st| st.draft.is_empty()).await;
    }
}
