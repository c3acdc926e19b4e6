use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7777";
const DEFAULT_OUTPUT_DIR: &str = ".cache/outputs";
const DEFAULT_LLM_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ML_SERVICE_URL: &str = "http://127.0.0.1:8001";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub service_url: String,
}

/// Everything the daemon reads from its environment, loaded once at startup.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind_addr: SocketAddr,
    pub output_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub log_level: LevelFilter,
    pub llm: LlmConfig,
    pub vision: VisionConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("EDITOR_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("EDITOR_BIND_ADDR must be a socket address like 127.0.0.1:7777")?;

        let log_level = match var("EDITOR_LOG") {
            Some(level) => level
                .parse::<LevelFilter>()
                .with_context(|| format!("EDITOR_LOG has unknown level '{}'", level))?,
            None => LevelFilter::INFO,
        };

        let timeout_secs = match var("EDITOR_LLM_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .with_context(|| format!("EDITOR_LLM_TIMEOUT_SECS must be whole seconds, got '{}'", secs))?,
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };

        Ok(DaemonConfig {
            bind_addr,
            output_dir: PathBuf::from(var("EDITOR_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())),
            ffmpeg_bin: var("FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_bin: var("FFPROBE_BIN").unwrap_or_else(|| "ffprobe".to_string()),
            log_level,
            llm: LlmConfig {
                api_base: var("OPENAI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_LLM_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key: var("OPENAI_API_KEY"),
                model: var("EDITOR_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                temperature: 0.0,
                timeout: Duration::from_secs(timeout_secs),
            },
            vision: VisionConfig {
                service_url: var("ML_SERVICE_URL")
                    .unwrap_or_else(|| DEFAULT_ML_SERVICE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }
}
