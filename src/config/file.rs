//! TOML configuration file loading
//!
//! Supports `~/.config/vibespec/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VibeSpecConfigFile {
    /// Chat completion service
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech recognition and synthesis
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Turn loop behaviour
    #[serde(default)]
    pub session: SessionFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LlmFileConfig {
    /// "azure" or "openai"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model identifier, or deployment name on Azure (e.g. "gpt-4o")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Azure OpenAI resource endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Azure OpenAI REST API version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Base URL for OpenAI-compatible servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SpeechFileConfig {
    /// Speak conversational replies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// "azure" or "openai"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Azure Speech region (e.g. "eastus")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Recognition language tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Synthesis voice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Whisper model (OpenAI only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_model: Option<String>,

    /// TTS model (OpenAI only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_model: Option<String>,

    /// TTS speed multiplier (OpenAI only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_speed: Option<f32>,

    /// Silence after speech that ends an utterance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_silence_ms: Option<u64>,

    /// Silence before speech after which listening gives up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_silence_ms: Option<u64>,

    /// Print `[audio]` for every synthesized chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_progress: Option<bool>,
}

/// Turn loop configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SessionFileConfig {
    /// "text" or "speech"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// File whose contents replace the built-in system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<String>,

    /// Completion attempts per turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,

    /// Pause between completion attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiKeysFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_openai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_speech: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VibeSpecConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VibeSpecConfigFile {
    config_file_path().map_or_else(VibeSpecConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> VibeSpecConfigFile {
    if !path.exists() {
        return VibeSpecConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VibeSpecConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VibeSpecConfigFile::default()
        }
    }
}

/// Serialize and write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or writing fails
pub fn write_config_file(path: &Path, config: &VibeSpecConfigFile) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// Return the config file path: `~/.config/vibespec/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vibespec").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config: VibeSpecConfigFile = toml::from_str(
            r#"
            [llm]
            provider = "azure"
            endpoint = "https://res.openai.azure.com"

            [speech]
            region = "eastus"
            end_silence_ms = 4000
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider.as_deref(), Some("azure"));
        assert_eq!(config.llm.model, None);
        assert_eq!(config.speech.end_silence_ms, Some(4000));
        assert_eq!(config.session.input, None);
        assert_eq!(config.api_keys.openai, None);
    }

    #[test]
    fn empty_file_is_default() {
        let config: VibeSpecConfigFile = toml::from_str("").unwrap();
        assert!(config.llm.provider.is_none());
        assert!(config.speech.enabled.is_none());
    }

    #[test]
    fn serializes_only_set_fields() {
        let config = VibeSpecConfigFile {
            llm: LlmFileConfig {
                model: Some("gpt-4o".to_string()),
                ..LlmFileConfig::default()
            },
            ..VibeSpecConfigFile::default()
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[llm]"));
        assert!(toml.contains("model = \"gpt-4o\""));
        assert!(!toml.contains("provider"));
    }

    #[test]
    fn missing_file_is_default() {
        let config = load_from(Path::new("/nonexistent/vibespec/config.toml"));
        assert!(config.llm.model.is_none());
    }
}
