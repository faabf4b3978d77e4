//! Speech output
//!
//! The session hands every final reply to a `SpeechOutput` exactly once.
//! `SpeechController` owns the user-facing controls (mute, volume, stop) and
//! forwards utterances to a platform `SpeechSink`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

const SPEECH_RATE: f32 = 1.05;
const SPEECH_PITCH: f32 = 1.05;

/// Speech-output collaborator as seen by the session
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str);

    /// Halt audible playback. Never affects generation.
    fn stop(&self) {}
}

/// Speech output that discards everything
#[derive(Debug, Default)]
pub struct SilentSpeech;

impl SpeechOutput for SilentSpeech {
    fn speak(&self, _text: &str) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub volume: f32,
    pub rate: f32,
    pub pitch: f32,
}

/// Platform text-to-speech engine
pub trait SpeechSink: Send + Sync {
    fn play(&self, utterance: Utterance);
    fn cancel(&self);
}

/// Sink that only logs what would have been spoken
#[derive(Debug, Default)]
pub struct LogSpeechSink;

impl SpeechSink for LogSpeechSink {
    fn play(&self, utterance: Utterance) {
        info!(
            volume = utterance.volume,
            chars = utterance.text.len(),
            "Speaking reply"
        );
    }

    fn cancel(&self) {
        debug!("Speech cancelled");
    }
}

pub struct SpeechController<S: SpeechSink> {
    sink: S,
    muted: AtomicBool,
    volume: Mutex<f32>,
}

impl<S: SpeechSink> SpeechController<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            muted: AtomicBool::new(false),
            volume: Mutex::new(1.0),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Muting also silences anything currently playing
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
        if muted {
            self.sink.cancel();
        }
    }

    pub fn toggle_mute(&self) -> bool {
        let muted = !self.is_muted();
        self.set_muted(muted);
        muted
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 1.0 } else { volume.clamp(0.0, 1.0) };
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = volume;
    }
}

impl<S: SpeechSink> SpeechOutput for SpeechController<S> {
    fn speak(&self, text: &str) {
        if self.is_muted() {
            return;
        }

        // A new reply interrupts whatever is still playing
        self.sink.cancel();
        self.sink.play(Utterance {
            text: text.to_string(),
            volume: self.volume(),
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
        });
    }

    fn stop(&self) {
        self.sink.cancel();
    }
}
