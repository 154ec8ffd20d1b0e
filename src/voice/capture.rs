//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::segmenter::{ListenSettings, SegmentState, UtteranceSegmenter};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often the capture buffer is drained while listening
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures audio from the default input device
///
/// Holds a live `cpal` stream, so it must stay on the thread that created it.
/// Use [`record_utterance`] from async code via `spawn_blocking`.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device at 16 kHz mono
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no 16 kHz mono input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("audio capture stopped");
        }
    }

    /// Drain the samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Listen on the default microphone until one utterance is complete
///
/// Blocks the calling thread. Returns `None` when nobody spoke before the
/// initial-silence timeout.
///
/// # Errors
///
/// Returns error if the input device cannot be opened or stops delivering
/// audio
pub fn record_utterance(settings: ListenSettings) -> Result<Option<Vec<f32>>> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let utterance = segment_feed(settings, POLL_INTERVAL, || capture.take_buffer());

    capture.stop();
    utterance
}

/// Poll `next_chunk` every `poll` until the segmenter settles
///
/// A feed that yields no samples for the initial-silence timeout is treated
/// as a stalled device.
fn segment_feed<F>(
    settings: ListenSettings,
    poll: Duration,
    mut next_chunk: F,
) -> Result<Option<Vec<f32>>>
where
    F: FnMut() -> Vec<f32>,
{
    let mut segmenter = UtteranceSegmenter::new(settings);
    let mut last_audio = Instant::now();

    loop {
        std::thread::sleep(poll);

        let samples = next_chunk();
        if samples.is_empty() {
            let stalled = last_audio.elapsed();
            if stalled >= settings.initial_silence {
                tracing::warn!(
                    stalled_ms = stalled.as_millis(),
                    "input device stopped delivering audio"
                );
                return Err(Error::Audio("input device stopped delivering audio".to_string()));
            }
            continue;
        }
        last_audio = Instant::now();

        match segmenter.process(&samples) {
            SegmentState::Complete => return Ok(Some(segmenter.take_utterance())),
            SegmentState::NoSpeech => return Ok(None),
            SegmentState::Waiting | SegmentState::Speaking => {}
        }
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
