//! Application configuration.
//!
//! The configuration is loaded once at startup and then passed by reference
//! into every collaborator. Nothing reads credentials from ambient state at
//! call time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default export settings.
    pub export: ExportDefaults,

    /// Generation provider credentials and selections.
    pub providers: ProvidersConfig,

    /// Rate-limit retry policy for script generation.
    pub retry: RetryConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Recording frame rate.
    pub fps: u32,

    /// Hold time for each panel, in seconds.
    pub panel_duration_secs: u32,

    /// Whether dialogue is drawn onto frames.
    pub show_dialogue: bool,

    /// Dialogue style: "bubble" or "subtitle".
    pub dialogue_style: String,

    /// Background audio volume [0.0, 1.0].
    pub audio_volume: f32,

    /// Pause between sequential image writes (ms).
    pub image_download_delay_ms: u64,

    /// Target video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Directory where exports are written.
    pub output_dir: PathBuf,
}

/// Credentials and overrides for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    /// API key (bearer token or provider-specific header).
    pub api_key: Option<String>,

    /// Model override.
    pub model: Option<String>,

    /// Endpoint override (used by the local provider).
    pub base_url: Option<String>,
}

/// Provider selections and per-provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider used for script/dialogue generation.
    pub text_provider: String,

    /// Provider used for panel artwork.
    pub image_provider: String,

    pub siliconflow: ProviderCredentials,
    pub pollinations: ProviderCredentials,
    pub huggingface: ProviderCredentials,
    pub stability: ProviderCredentials,
    pub openrouter: ProviderCredentials,
    pub openai: ProviderCredentials,
    pub anthropic: ProviderCredentials,
    pub local: ProviderCredentials,
}

/// Rate-limit retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay unit; attempt `n` waits `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 10,
            panel_duration_secs: 3,
            show_dialogue: true,
            dialogue_style: "bubble".to_string(),
            audio_volume: 0.5,
            image_download_delay_ms: 300,
            video_bitrate_kbps: 3000,
            output_dir: PathBuf::from("exports"),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            text_provider: "openrouter".to_string(),
            image_provider: "siliconflow".to_string(),
            siliconflow: ProviderCredentials::default(),
            pollinations: ProviderCredentials::default(),
            huggingface: ProviderCredentials::default(),
            stability: ProviderCredentials::default(),
            openrouter: ProviderCredentials::default(),
            openai: ProviderCredentials::default(),
            anthropic: ProviderCredentials::default(),
            local: ProviderCredentials::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ProvidersConfig {
    /// Look up credentials by provider identifier.
    pub fn credentials(&self, provider: &str) -> Option<&ProviderCredentials> {
        match provider {
            "siliconflow" => Some(&self.siliconflow),
            "pollinations" => Some(&self.pollinations),
            "huggingface" => Some(&self.huggingface),
            "stability" => Some(&self.stability),
            "openrouter" => Some(&self.openrouter),
            "openai" => Some(&self.openai),
            "anthropic" => Some(&self.anthropic),
            "local" => Some(&self.local),
            _ => None,
        }
    }

    fn credentials_mut(&mut self) -> [(&'static str, &mut ProviderCredentials); 8] {
        [
            ("SILICONFLOW", &mut self.siliconflow),
            ("POLLINATIONS", &mut self.pollinations),
            ("HUGGINGFACE", &mut self.huggingface),
            ("STABILITY", &mut self.stability),
            ("OPENROUTER", &mut self.openrouter),
            ("OPENAI", &mut self.openai),
            ("ANTHROPIC", &mut self.anthropic),
            ("LOCAL", &mut self.local),
        ]
    }

    /// Apply `STORYREEL_<PROVIDER>_API_KEY` overrides using the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, creds) in self.credentials_mut() {
            if let Some(key) = lookup(&format!("STORYREEL_{name}_API_KEY")) {
                if !key.trim().is_empty() {
                    creds.api_key = Some(key);
                }
            }
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    ///
    /// Environment API-key overrides are applied after the file is read.
    pub fn load() -> Self {
        let mut config = Self::load_from(&config_file_path());
        config
            .providers
            .apply_env_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storyreel").join("config.json")
}
