use crate::error::{AppResult, ConfigError};
use tokio::sync::Semaphore;

/// 并发上限的最大值（Semaphore 能容纳的许可数）
pub const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS;

/// 并发数必须在 `1..=MAX_CONCURRENCY` 之内
pub fn check_concurrency(value: usize) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_CONCURRENCY {
        return Err(ConfigError::InvalidConcurrency { value });
    }
    Ok(())
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时进行的评估数量
    pub max_concurrent_evaluations: usize,
    /// 单次 LLM 调用超时（秒）
    pub request_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_evaluations: 5,
            request_timeout_secs: 180,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_temperature: 0.3,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_evaluations: env_parse("MAX_CONCURRENT_EVALUATIONS")
                .unwrap_or(default.max_concurrent_evaluations),
            request_timeout_secs: env_parse("LLM_TIMEOUT_SECS")
                .unwrap_or(default.request_timeout_secs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL")
                .unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(default.llm_temperature),
        }
    }

    /// 检查真正调用 LLM 之前必须具备的配置
    pub fn validate(&self) -> AppResult<()> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "OPENAI_API_KEY".to_string(),
            }
            .into());
        }
        check_concurrency(self.max_concurrent_evaluations)?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
