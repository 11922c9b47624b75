//! Delegate engine interfaces and the execution engine.
//!
//! The actual speech-to-text and LLM enhancement engines are external
//! collaborators; this module only fixes their call boundary. Every
//! delegate call returns an explicit `Result` — job failure is a value,
//! never an unwinding mechanism.

use std::path::Path;

use crate::error::EngineError;

pub mod executor;

pub use executor::{Executor, JobOutcome};

/// Parameters for one transcription call, derived from the job options.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest<'a> {
    /// Location of the source audio.
    pub audio_path: &'a Path,
    /// Optional clip range in seconds (start, end).
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    /// Emit word/segment timestamps into the transcript text.
    pub enable_timestamps: bool,
    /// Decode in fixed-length chunks of this many seconds.
    pub chunk_length: Option<u32>,
}

/// Progress callback handed to the transcription engine: (stage name,
/// stage-local fraction in [0, 1]). The engine may call it from the slot
/// thread only; signals are throttled at the source, not here.
pub type ProgressSignal<'a> = &'a dyn Fn(&str, f64);

/// A speech-to-text engine bound to one worker slot.
///
/// Instances are heavyweight (model runtime) and are not shared between
/// slots; the dispatcher builds one per slot and rebuilds it when the
/// slot is recycled. `&mut self` allows lazy model loading on first use.
pub trait TranscriptionEngine: Send {
    /// Human-readable engine name for logs and artifact headers.
    fn name(&self) -> &str;

    /// Transcribes the requested audio, reporting inference progress
    /// through `progress`. Returns the transcript text.
    fn transcribe(
        &mut self,
        request: &TranscriptionRequest<'_>,
        progress: ProgressSignal<'_>,
    ) -> Result<String, EngineError>;
}

/// An LLM transcript enhancement engine bound to one worker slot.
pub trait EnhancementEngine: Send {
    /// Human-readable engine name, recorded in enhanced artifact headers.
    fn name(&self) -> &str;

    /// Rewrites the transcript body, optionally steered by a custom
    /// instruction. Returns the enhanced text.
    fn enhance(&mut self, transcript: &str, instruction: Option<&str>)
        -> Result<String, EngineError>;
}

/// The delegate pair owned by one worker slot.
pub struct EngineSet {
    pub transcriber: Box<dyn TranscriptionEngine>,
    pub enhancer: Box<dyn EnhancementEngine>,
}
