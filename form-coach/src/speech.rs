// Spoken feedback dispatch
//
// Speech synthesis itself lives behind `SpeechSink`. Dispatch is
// fire-and-forget: every utterance runs on its own detached thread, is never
// joined and never cancelled, so utterances may overlap. Failures are logged
// and dropped; the visual feedback path never sees them.

use std::sync::Arc;
use std::thread;

/// Text-to-speech backend
pub trait SpeechSink: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech backend unavailable: {0}")]
    Unavailable(String),
    #[error("Synthesis error: {0}")]
    SynthesisError(String),
    #[error("Playback error: {0}")]
    PlaybackError(String),
}

/// Speech sink that only logs what would have been said
pub struct LogSpeech;

impl SpeechSink for LogSpeech {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        log::info!("[Speech] '{}'", text);
        Ok(())
    }
}

/// Hands utterances to a `SpeechSink` without waiting for them
#[derive(Clone)]
pub struct SpeechDispatcher {
    sink: Option<Arc<dyn SpeechSink>>,
}

impl SpeechDispatcher {
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Dispatcher that drops every utterance (voice disabled)
    pub fn muted() -> Self {
        Self { sink: None }
    }

    pub fn is_muted(&self) -> bool {
        self.sink.is_none()
    }

    /// Launch `text` on a detached thread and return immediately.
    /// Returns false when nothing was launched.
    pub fn dispatch(&self, text: &str) -> bool {
        let Some(sink) = self.sink.clone() else {
            return false;
        };
        if text.is_empty() {
            return false;
        }

        let text = text.to_string();
        let spawned = thread::Builder::new()
            .name("coach-speech".to_string())
            .spawn(move || {
                if let Err(e) = sink.speak(&text) {
                    log::warn!("[Speech] dropped '{}': {}", text, e);
                }
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                log::warn!("[Speech] could not start speech thread: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::mpsc::{channel, Sender};
    use std::time::Duration;

    struct ChannelSpeech(Mutex<Sender<String>>);

    impl SpeechSink for ChannelSpeech {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            let _ = self.0.lock().send(text.to_string());
            Ok(())
        }
    }

    struct FailingSpeech;

    impl SpeechSink for FailingSpeech {
        fn speak(&self, _text: &str) -> Result<(), SpeechError> {
            Err(SpeechError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn dispatch_reaches_sink() {
        let (tx, rx) = channel();
        let dispatcher = SpeechDispatcher::new(Arc::new(ChannelSpeech(Mutex::new(tx))));

        assert!(dispatcher.dispatch("Good squat!"));
        let spoken = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("utterance should arrive");
        assert_eq!(spoken, "Good squat!");
    }

    #[test]
    fn muted_dispatcher_launches_nothing() {
        let dispatcher = SpeechDispatcher::muted();
        assert!(dispatcher.is_muted());
        assert!(!dispatcher.dispatch("Go deeper"));
    }

    #[test]
    fn empty_text_is_not_spoken() {
        let (tx, rx) = channel();
        let dispatcher = SpeechDispatcher::new(Arc::new(ChannelSpeech(Mutex::new(tx))));
        assert!(!dispatcher.dispatch(""));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let dispatcher = SpeechDispatcher::new(Arc::new(FailingSpeech));
        assert!(dispatcher.dispatch("Push higher"));
    }
}
