//! Voice processing module
//!
//! Microphone capture with end-of-speech detection, speech recognition,
//! speech synthesis and playback.

mod capture;
mod playback;
mod segmenter;
mod speaker;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, record_utterance, samples_to_wav};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use segmenter::{ListenSettings, SegmentState, UtteranceSegmenter, calculate_energy};
pub use speaker::Speaker;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
