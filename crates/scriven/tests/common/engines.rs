//! Scripted delegate engines for integration tests.
//!
//! Each engine follows a cloneable `Script` so a test can hand the same
//! behavior to every slot through the engine factory and inspect what the
//! engines were asked to do afterwards.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use scriven::engine::ProgressSignal;
use scriven::{
    EngineError, EngineFactory, EngineSet, EnhancementEngine, TranscriptionEngine,
    TranscriptionRequest,
};

/// What a scripted transcriber should do, plus a log of the requests it saw.
#[derive(Clone)]
pub struct TranscriberScript {
    /// Text to return, or an error message to fail with.
    pub outcome: Result<String, String>,
    /// (stage, fraction) signals emitted before returning.
    pub signals: Vec<(String, f64)>,
    /// Timestamp flags observed, newest last.
    pub seen_timestamps: Arc<Mutex<Vec<bool>>>,
}

impl TranscriberScript {
    pub fn returning(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            signals: vec![("inference".to_string(), 0.5), ("inference".to_string(), 1.0)],
            seen_timestamps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            signals: vec![("inference".to_string(), 0.5)],
            seen_timestamps: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct ScriptedTranscriber(pub TranscriberScript);

impl TranscriptionEngine for ScriptedTranscriber {
    fn name(&self) -> &str {
        "scripted-stt"
    }

    fn transcribe(
        &mut self,
        request: &TranscriptionRequest<'_>,
        progress: ProgressSignal<'_>,
    ) -> Result<String, EngineError> {
        self.0
            .seen_timestamps
            .lock()
            .unwrap()
            .push(request.enable_timestamps);
        for (stage, fraction) in &self.0.signals {
            progress(stage, *fraction);
        }
        self.0
            .outcome
            .clone()
            .map_err(EngineError::Transcription)
    }
}

/// Enhancement behavior plus a log of the instructions it received.
#[derive(Clone)]
pub struct EnhancerScript {
    /// Prefix prepended to the transcript, or an error message.
    pub outcome: Result<String, String>,
    pub seen_instructions: Arc<Mutex<Vec<Option<String>>>>,
}

impl EnhancerScript {
    pub fn prefixing(prefix: &str) -> Self {
        Self {
            outcome: Ok(prefix.to_string()),
            seen_instructions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            seen_instructions: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct ScriptedEnhancer(pub EnhancerScript);

impl EnhancementEngine for ScriptedEnhancer {
    fn name(&self) -> &str {
        "scripted-llm"
    }

    fn enhance(
        &mut self,
        transcript: &str,
        instruction: Option<&str>,
    ) -> Result<String, EngineError> {
        self.0
            .seen_instructions
            .lock()
            .unwrap()
            .push(instruction.map(str::to_string));
        match &self.0.outcome {
            Ok(prefix) => Ok(format!("{}{}", prefix, transcript)),
            Err(message) => Err(EngineError::Enhancement(message.clone())),
        }
    }
}

/// Builds an engine factory out of two scripts.
pub fn scripted_factory(transcriber: TranscriberScript, enhancer: EnhancerScript) -> EngineFactory {
    Arc::new(move || EngineSet {
        transcriber: Box::new(ScriptedTranscriber(transcriber.clone())),
        enhancer: Box::new(ScriptedEnhancer(enhancer.clone())),
    })
}

/// Factory for the common happy path: transcription succeeds, enhancement
/// prepends a marker.
pub fn default_factory() -> EngineFactory {
    scripted_factory(
        TranscriberScript::returning("raw words"),
        EnhancerScript::prefixing("enhanced: "),
    )
}
