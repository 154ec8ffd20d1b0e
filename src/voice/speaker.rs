//! Spoken replies: synthesis followed by local playback

use std::io::Write;

use async_trait::async_trait;

use super::{AudioPlayback, TextToSpeech};
use crate::render::SpeechSink;
use crate::{Error, Result};

/// Console marker printed for every synthesized audio chunk
const PROGRESS_MARKER: &str = "[audio]";

/// Speaks text through a TTS service and the default output device
pub struct Speaker {
    tts: TextToSpeech,
    show_progress: bool,
}

impl Speaker {
    /// Create a speaker, optionally printing a progress marker per audio chunk
    #[must_use]
    pub const fn new(tts: TextToSpeech, show_progress: bool) -> Self {
        Self { tts, show_progress }
    }
}

#[async_trait]
impl SpeechSink for Speaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let show_progress = self.show_progress;
        let audio = self
            .tts
            .synthesize(text, |_| {
                if show_progress {
                    print!("{PROGRESS_MARKER}");
                    let _ = std::io::stdout().flush();
                }
            })
            .await?;

        if show_progress {
            println!();
        }

        // cpal streams are not Send, so the device lives on a blocking thread
        tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&audio))
            .await
            .map_err(|e| Error::Synthesis(format!("playback task failed: {e}")))?
            .map_err(|e| Error::Synthesis(e.to_string()))
    }
}
