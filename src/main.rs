//! Application entry point — voice-report CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the tokio runtime (multi-thread, 2 workers).
//! 4. Build the corrector ([`ApiCorrector`], or [`PassthroughCorrector`]
//!    when correction is disabled).
//! 5. For each configured question, spawn a [`SessionController`] and drive
//!    it from stdin until the answer is confirmed.
//! 6. Format the finished report and write it to the reports directory.
//!
//! # Typed-input engine
//!
//! Machines without a speech engine still need to exercise the pipeline, so
//! this binary ships [`TypedEngine`]: every entered line is delivered as a
//! *final* transcript event, flowing through sequencing, correction and
//! merging exactly like recognizer output.  Lines starting with `/` are
//! commands:
//!
//! | Command        | Effect                                   |
//! |----------------|------------------------------------------|
//! | `/done`        | stop, wait for corrections, keep answer  |
//! | `/cancel`      | abandon dictation for this question      |
//! | `/edit <text>` | overwrite the draft by hand              |
//! | `/clear`       | reset the draft (when not listening)     |
//! | `/show`        | print the current draft                  |

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use voice_report::{
    config::{AppConfig, AppPaths},
    correct::{ApiCorrector, Corrector, PassthroughCorrector},
    pipeline::{SessionCommand, SessionController, SessionHandle, SessionPhase},
    recognition::{
        EngineSignal, ListeningHandle, RecognitionEngine, RecognitionError, SessionId,
        TranscriptEvent,
    },
    report::{format_report, AnswerSheet},
};

// ---------------------------------------------------------------------------
// TypedEngine — stand-in RecognitionEngine fed from stdin
// ---------------------------------------------------------------------------

/// Delivers typed lines as final transcript events.
///
/// `start_listening` stores the session's event sender; `push_final` routes
/// a line into it tagged with that session.  Stopping sends
/// [`EngineSignal::Ended`], matching the contract real engines follow.
struct TypedEngine {
    sink: Mutex<Option<(SessionId, mpsc::Sender<EngineSignal>)>>,
}

impl TypedEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
        })
    }

    /// Deliver `text` as a final event for the active session, if any.
    async fn push_final(&self, text: &str) {
        let entry = self.sink.lock().unwrap().clone();
        if let Some((session, tx)) = entry {
            let event = TranscriptEvent::finalized(session, text);
            let _ = tx.send(EngineSignal::Event(event)).await;
        }
    }
}

impl RecognitionEngine for TypedEngine {
    fn is_supported(&self) -> bool {
        true
    }

    fn start_listening(
        &self,
        session: SessionId,
        events: mpsc::Sender<EngineSignal>,
    ) -> Result<ListeningHandle, RecognitionError> {
        *self.sink.lock().unwrap() = Some((session, events.clone()));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = stop_rx.await;
            let _ = events.send(EngineSignal::Ended).await;
        });

        Ok(ListeningHandle::new(stop_tx))
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-report starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 workers — the event loop plus correction calls)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Corrector
    let language = config
        .recognition
        .language
        .split('-')
        .next()
        .unwrap_or("en")
        .to_string();

    let corrector: Arc<dyn Corrector> = if config.correction.enabled {
        log::info!(
            "correction via {} ({})",
            config.correction.base_url,
            config.correction.model
        );
        Arc::new(ApiCorrector::from_config(&config.correction, &language))
    } else {
        log::info!("correction disabled — raw text will be used as-is");
        Arc::new(PassthroughCorrector)
    };

    rt.block_on(run_report_flow(config, corrector))
}

// ---------------------------------------------------------------------------
// Report flow
// ---------------------------------------------------------------------------

/// Drive one session per question, then format and save the report.
async fn run_report_flow(config: AppConfig, corrector: Arc<dyn Corrector>) -> anyhow::Result<()> {
    let engine = TypedEngine::new();
    let mut sheet = AnswerSheet::new(config.report.questions.clone());

    // Stdin reader thread — blocking reads cannot live on the runtime.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            use std::io::BufRead;
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        })
        .expect("failed to spawn stdin-reader thread");

    let total = sheet.question_count();
    println!("音声レポート — 質問は全部で {total} 問です。");
    println!("1行入力するごとに認識結果として処理されます。/done で回答を確定します。\n");

    for index in 0..total {
        let question = match sheet.question(index) {
            Some(q) => q.to_string(),
            None => break,
        };

        println!("── 質問 {}/{} ──", index + 1, total);
        println!("{question}\n");

        let controller = SessionController::new(
            Arc::clone(&engine) as Arc<dyn RecognitionEngine>,
            Arc::clone(&corrector),
            Some(question.clone()),
            config.correction.min_chars,
        );
        let handle = controller.spawn();
        handle.send(SessionCommand::Start).await;

        if let Some(answer) = drive_question(&engine, &handle, &mut line_rx).await {
            sheet.set_answer(index, &answer);
            println!("回答: {answer}\n");
        } else {
            println!("（この質問はスキップされました）\n");
        }
    }

    // 6. Format and persist the finished report.
    let staff_name = if config.report.staff_name.is_empty() {
        "スタッフ".to_string()
    } else {
        config.report.staff_name.clone()
    };

    let today = chrono::Local::now();
    let report = format_report(&sheet, &staff_name, today.date_naive());

    println!("\n{report}\n");

    let paths = AppPaths::new();
    std::fs::create_dir_all(&paths.reports_dir)?;
    let file = paths
        .reports_dir
        .join(format!("report-{}.txt", today.format("%Y%m%d-%H%M%S")));
    std::fs::write(&file, &report)?;
    log::info!("report written to {}", file.display());
    println!("保存しました: {}", file.display());

    Ok(())
}

/// Feed stdin lines into one question's session until `/done` or `/cancel`.
///
/// Returns the confirmed answer text, or `None` when the question was
/// abandoned.
async fn drive_question(
    engine: &TypedEngine,
    handle: &SessionHandle,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> Option<String> {
    while let Some(line) = lines.recv().await {
        let line = line.trim().to_string();

        match line.as_str() {
            "/done" => {
                handle.send(SessionCommand::Stop).await;
                wait_for_drain(handle).await;
                let text = handle.text();
                return if text.trim().is_empty() { None } else { Some(text) };
            }
            "/cancel" => {
                handle.send(SessionCommand::Cancel).await;
                return None;
            }
            "/clear" => {
                handle.send(SessionCommand::ClearDraft).await;
            }
            "/show" => {
                let st = handle.snapshot();
                println!("[{}] {}", st.phase.label(), st.draft);
                if let Some(interim) = &st.interim {
                    println!("  … {interim}");
                }
            }
            _ if line.starts_with("/edit ") => {
                let text = line.trim_start_matches("/edit ").to_string();
                handle.send(SessionCommand::SetManualText(text)).await;
            }
            "" => {}
            _ => {
                engine.push_final(&line).await;
            }
        }

        // Surface degradations without interrupting the flow.
        let st = handle.snapshot();
        if let Some(warning) = st.warning {
            log::warn!("{warning}");
        }
        if let Some(error) = st.error_message {
            eprintln!("音声入力を利用できません（{error}）。テキストを直接入力してください。");
        }
    }

    // Stdin closed — take whatever has been merged so far.
    handle.send(SessionCommand::Stop).await;
    wait_for_drain(handle).await;
    let text = handle.text();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Wait until listening has ended and every correction has merged.
async fn wait_for_drain(handle: &SessionHandle) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let st = handle.snapshot();
        if st.phase == SessionPhase::Idle && st.in_flight == 0 {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            log::warn!("timed out waiting for corrections to settle");
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
