//! End-of-speech detection
//!
//! Splits a live microphone feed into one utterance using RMS energy: wait for
//! speech, keep everything until the speaker has been quiet for the
//! end-silence timeout, then hand the samples to recognition.

use std::time::Duration;

use super::SAMPLE_RATE;

/// Minimum audio energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum voiced audio for a segment to count as an utterance (0.3 s)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Hard cap on one utterance (60 s)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 60;

/// Timeouts for one recognition capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSettings {
    /// Silence after speech that ends the utterance
    pub end_silence: Duration,
    /// Silence before any speech after which the capture gives up
    pub initial_silence: Duration,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            end_silence: Duration::from_millis(6000),
            initial_silence: Duration::from_millis(5000),
        }
    }
}

/// Progress of the current capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// No speech heard yet
    Waiting,
    /// Speech heard, accumulating until the end-silence timeout
    Speaking,
    /// Utterance finished, ready to be taken
    Complete,
    /// Initial-silence timeout elapsed without speech
    NoSpeech,
}

/// Detects the start and end of a single utterance
pub struct UtteranceSegmenter {
    state: SegmentState,
    buffer: Vec<f32>,
    voiced: usize,
    silence: usize,
    waited: usize,
    end_silence_samples: usize,
    initial_silence_samples: usize,
}

impl UtteranceSegmenter {
    /// Create a segmenter for 16 kHz mono audio
    #[must_use]
    pub fn new(settings: ListenSettings) -> Self {
        Self {
            state: SegmentState::Waiting,
            buffer: Vec::new(),
            voiced: 0,
            silence: 0,
            waited: 0,
            end_silence_samples: duration_to_samples(settings.end_silence),
            initial_silence_samples: duration_to_samples(settings.initial_silence),
        }
    }

    /// Feed one chunk of samples and return the resulting state
    pub fn process(&mut self, samples: &[f32]) -> SegmentState {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmentState::Waiting => {
                if is_speech {
                    self.state = SegmentState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.voiced = samples.len();
                    self.silence = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.waited += samples.len();
                    if self.waited >= self.initial_silence_samples {
                        tracing::debug!(waited = self.waited, "no speech before timeout");
                        self.state = SegmentState::NoSpeech;
                    }
                }
            }
            SegmentState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.voiced += samples.len();
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                if self.buffer.len() >= MAX_UTTERANCE_SAMPLES {
                    tracing::debug!(samples = self.buffer.len(), "utterance hit length cap");
                    self.state = SegmentState::Complete;
                } else if self.silence >= self.end_silence_samples {
                    if self.voiced >= MIN_SPEECH_SAMPLES {
                        tracing::debug!(
                            samples = self.buffer.len(),
                            voiced = self.voiced,
                            "utterance complete"
                        );
                        self.state = SegmentState::Complete;
                    } else {
                        // Too short to be speech; the blip counts toward the initial wait
                        tracing::trace!(voiced = self.voiced, "discarding short noise burst");
                        self.waited += self.buffer.len();
                        self.buffer.clear();
                        self.voiced = 0;
                        self.silence = 0;
                        self.state = if self.waited >= self.initial_silence_samples {
                            SegmentState::NoSpeech
                        } else {
                            SegmentState::Waiting
                        };
                    }
                }
            }
            SegmentState::Complete | SegmentState::NoSpeech => {}
        }

        self.state
    }

    /// Take the captured utterance and reset for the next capture
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.buffer);
        self.reset();
        samples
    }

    /// Reset to waiting for speech
    pub fn reset(&mut self) {
        self.state = SegmentState::Waiting;
        self.buffer.clear();
        self.voiced = 0;
        self.silence = 0;
        self.waited = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_to_samples(duration: Duration) -> usize {
    (duration.as_millis() * u128::from(SAMPLE_RATE) / 1000) as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
