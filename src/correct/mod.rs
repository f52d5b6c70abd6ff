//! Text-correction collaborator.
//!
//! The correction service cleans up raw dictation output — spelling, script
//! conversion, punctuation — and must never be assumed to change structure or
//! meaning.  This module provides:
//!
//! * [`Corrector`] — async trait implemented by all correction backends.
//! * [`ApiCorrector`] — OpenAI-compatible REST API corrector.
//! * [`PassthroughCorrector`] — no-op backend used when correction is
//!   disabled in config.
//! * [`PromptBuilder`] — builds minimal-touch correction prompts (ja / en).
//! * [`CorrectError`] — error variants for correction calls.
//!
//! The pipeline treats every [`CorrectError`] identically: the affected
//! segment falls back to its raw text and the user is never blocked.

pub mod corrector;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use corrector::{ApiCorrector, CorrectError, Corrector, PassthroughCorrector};
pub use prompt::PromptBuilder;
