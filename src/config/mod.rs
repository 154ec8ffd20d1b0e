//! Configuration management for VibeSpec

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::completion::{ChatEndpoint, OpenAiChat, RetryPolicy};
use crate::voice::{ListenSettings, SpeechToText, TextToSpeech};
use crate::{Error, Result};

use file::VibeSpecConfigFile;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
const DEFAULT_AZURE_VOICE: &str = "en-US-BrianMultilingualNeural";
const DEFAULT_OPENAI_VOICE: &str = "alloy";
const DEFAULT_LANGUAGE: &str = "en-US";

/// VibeSpec configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat completion service
    pub completion: CompletionConfig,

    /// Speech recognition and synthesis
    pub speech: SpeechConfig,

    /// Turn loop behaviour
    pub session: SessionConfig,
}

/// How user utterances are captured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Typed lines on standard input
    #[default]
    Text,
    /// Microphone capture plus speech recognition
    Speech,
}

impl InputMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "speech" | "voice" => Ok(Self::Speech),
            other => Err(Error::Config(format!("unknown input mode '{other}'"))),
        }
    }
}

/// Hosted service family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Azure OpenAI / Azure Speech
    Azure,
    /// `OpenAI` or a compatible server
    OpenAi,
}

impl Provider {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Which service answers
    pub provider: Provider,

    /// Model identifier, or deployment name on Azure
    pub model: String,

    /// Azure OpenAI resource endpoint
    pub azure_endpoint: Option<String>,

    /// Azure OpenAI API key
    pub azure_api_key: Option<String>,

    /// Azure OpenAI REST API version
    pub azure_api_version: String,

    /// `OpenAI` API key
    pub openai_api_key: Option<String>,

    /// `OpenAI`-compatible base URL
    pub openai_base_url: String,
}

impl CompletionConfig {
    /// Build the streaming client for the configured provider
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the provider's endpoint or key is missing
    pub fn build(&self) -> Result<OpenAiChat> {
        let (endpoint, key) = match self.provider {
            Provider::Azure => {
                let endpoint = self.azure_endpoint.clone().ok_or_else(|| {
                    Error::Config("AZURE_OPENAI_API_ENDPOINT is not set".to_string())
                })?;
                let key = self.azure_api_key.clone().ok_or_else(|| {
                    Error::Config("AZURE_OPENAI_API_KEY is not set".to_string())
                })?;
                (
                    ChatEndpoint::Azure {
                        endpoint,
                        api_version: self.azure_api_version.clone(),
                    },
                    key,
                )
            }
            Provider::OpenAi => {
                let key = self
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;
                (
                    ChatEndpoint::OpenAi {
                        base_url: self.openai_base_url.clone(),
                    },
                    key,
                )
            }
        };

        OpenAiChat::new(endpoint, key, self.model.clone())
    }
}

/// Speech recognition and synthesis configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Speak conversational replies
    pub enabled: bool,

    /// Which service recognizes and synthesizes
    pub provider: Provider,

    /// Azure Speech region
    pub region: Option<String>,

    /// Azure Speech key
    pub azure_key: Option<String>,

    /// `OpenAI` API key (Whisper and TTS)
    pub openai_key: Option<String>,

    /// Synthesis voice
    pub voice: String,

    /// Recognition and synthesis language
    pub language: String,

    /// Whisper model
    pub stt_model: String,

    /// `OpenAI` TTS model
    pub tts_model: String,

    /// `OpenAI` TTS speed multiplier
    pub tts_speed: f32,

    /// Capture timeouts
    pub listen: ListenSettings,

    /// Print `[audio]` for every synthesized chunk
    pub show_progress: bool,
}

impl SpeechConfig {
    /// Build the recognizer for the configured provider
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if credentials are missing
    pub fn recognizer(&self) -> Result<SpeechToText> {
        match self.provider {
            Provider::Azure => {
                let (key, region) = self.azure_credentials()?;
                SpeechToText::new_azure(key, region, self.language.clone())
            }
            Provider::OpenAi => SpeechToText::new_whisper(
                self.openai_credentials()?,
                self.stt_model.clone(),
                self.language.clone(),
            ),
        }
    }

    /// Build the synthesizer for the configured provider
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if credentials are missing
    pub fn synthesizer(&self) -> Result<TextToSpeech> {
        match self.provider {
            Provider::Azure => {
                let (key, region) = self.azure_credentials()?;
                TextToSpeech::new_azure(key, region, self.voice.clone(), self.language.clone())
            }
            Provider::OpenAi => TextToSpeech::new_openai(
                self.openai_credentials()?,
                self.voice.clone(),
                self.tts_model.clone(),
                self.tts_speed,
            ),
        }
    }

    fn azure_credentials(&self) -> Result<(String, String)> {
        let key = self
            .azure_key
            .clone()
            .ok_or_else(|| Error::Config("AZURE_SPEECH_KEY is not set".to_string()))?;
        let region = self
            .region
            .clone()
            .ok_or_else(|| Error::Config("AZURE_SPEECH_REGION is not set".to_string()))?;
        Ok((key, region))
    }

    fn openai_credentials(&self) -> Result<String> {
        self.openai_key
            .clone()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

/// Turn loop configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How user utterances are captured
    pub input: InputMode,

    /// File replacing the built-in system prompt
    pub system_prompt_file: Option<PathBuf>,

    /// Completion retry policy
    pub retry: RetryPolicy,
}

/// Command-line overrides, applied above env and file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Input mode from `--input`
    pub input: Option<InputMode>,

    /// `--no-voice`: print replies without speaking them
    pub no_voice: bool,

    /// Chat model or Azure deployment from `--model`
    pub model: Option<String>,

    /// Prompt file from `--system-prompt`
    pub system_prompt: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::from_sources(
            file::load_config_file(),
            |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
            overrides,
        )
    }

    /// Resolve configuration from explicit sources (cli > env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a provider or input mode name is invalid
    pub fn from_sources<F>(fc: VibeSpecConfigFile, env: F, overrides: &Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Completion (env > toml > default)
        let azure_endpoint = env("AZURE_OPENAI_API_ENDPOINT").or(fc.llm.endpoint);
        let provider = match env("VIBESPEC_LLM_PROVIDER").or(fc.llm.provider) {
            Some(name) => Provider::parse(&name)?,
            None if azure_endpoint.is_some() => Provider::Azure,
            None => Provider::OpenAi,
        };
        let openai_key = env("OPENAI_API_KEY").or(fc.api_keys.openai);

        let completion = CompletionConfig {
            provider,
            model: overrides
                .model
                .clone()
                .or_else(|| env("VIBESPEC_LLM_MODEL"))
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            azure_endpoint,
            azure_api_key: env("AZURE_OPENAI_API_KEY").or(fc.api_keys.azure_openai),
            azure_api_version: env("AZURE_OPENAI_API_VERSION")
                .or(fc.llm.api_version)
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            openai_api_key: openai_key.clone(),
            openai_base_url: env("OPENAI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        };

        // Speech (env > toml > default); the TTS names are accepted as aliases
        let region = env("AZURE_SPEECH_REGION")
            .or_else(|| env("AZURE_TTS_REGION"))
            .or(fc.speech.region);
        let azure_key = env("AZURE_SPEECH_KEY")
            .or_else(|| env("AZURE_TTS_API_KEY"))
            .or(fc.api_keys.azure_speech);
        let speech_provider = match env("VIBESPEC_SPEECH_PROVIDER").or(fc.speech.provider) {
            Some(name) => Provider::parse(&name)?,
            None if region.is_none() && openai_key.is_some() => Provider::OpenAi,
            None => Provider::Azure,
        };
        let default_voice = match speech_provider {
            Provider::Azure => DEFAULT_AZURE_VOICE,
            Provider::OpenAi => DEFAULT_OPENAI_VOICE,
        };
        let defaults = ListenSettings::default();

        let speech = SpeechConfig {
            enabled: !overrides.no_voice && fc.speech.enabled.unwrap_or(true),
            provider: speech_provider,
            region,
            azure_key,
            openai_key,
            voice: env("VIBESPEC_TTS_VOICE")
                .or(fc.speech.voice)
                .unwrap_or_else(|| default_voice.to_string()),
            language: fc
                .speech
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            stt_model: fc
                .speech
                .stt_model
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: fc.speech.tts_model.unwrap_or_else(|| "tts-1".to_string()),
            tts_speed: fc.speech.tts_speed.unwrap_or(1.0),
            listen: ListenSettings {
                end_silence: fc
                    .speech
                    .end_silence_ms
                    .map_or(defaults.end_silence, Duration::from_millis),
                initial_silence: fc
                    .speech
                    .initial_silence_ms
                    .map_or(defaults.initial_silence, Duration::from_millis),
            },
            show_progress: fc.speech.show_progress.unwrap_or(true),
        };

        if overrides.no_voice {
            tracing::info!("voice output disabled via --no-voice");
        }

        // Session (cli > env > toml > default)
        let input = match overrides.input {
            Some(mode) => mode,
            None => env("VIBESPEC_INPUT")
                .or(fc.session.input)
                .map(|name| InputMode::parse(&name))
                .transpose()?
                .unwrap_or_default(),
        };
        let retry_defaults = RetryPolicy::default();

        let session = SessionConfig {
            input,
            system_prompt_file: overrides
                .system_prompt
                .clone()
                .or_else(|| env("VIBESPEC_SYSTEM_PROMPT").map(PathBuf::from))
                .or_else(|| fc.session.system_prompt_file.map(PathBuf::from)),
            retry: RetryPolicy {
                max_attempts: fc
                    .session
                    .retry_attempts
                    .unwrap_or(retry_defaults.max_attempts),
                delay: fc
                    .session
                    .retry_delay_ms
                    .map_or(retry_defaults.delay, Duration::from_millis),
            },
        };

        tracing::debug!(
            llm_provider = ?completion.provider,
            model = %completion.model,
            speech_provider = ?speech.provider,
            input = ?session.input,
            "configuration resolved"
        );

        Ok(Self {
            completion,
            speech,
            session,
        })
    }
}
