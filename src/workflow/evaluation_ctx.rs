//! 评估上下文
//!
//! 一次运行中所有评估调用共享的只读信息

use std::time::Duration;

use crate::config::{check_concurrency, Config};
use crate::error::ConfigError;
use crate::models::EvaluationMode;

/// 内置系统提示词
pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一名严谨、公正的助教，负责根据评分标准评估学生作业。\
请严格依据评分标准和参考资料给出评价，评语要具体、可操作，并指出作业中的优点和需要改进之处。";

/// 评估上下文
///
/// 每次运行创建一次，之后只读，通过 `Arc` 在并发任务间共享。
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub mode: EvaluationMode,
    /// 评分标准
    pub rubric: String,
    /// 参考资料
    pub knowledge_base: String,
    /// 教师补充说明
    pub custom_instructions: String,
    /// 输出格式要求（仅自由格式）
    pub output_format_instructions: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    /// 同时进行的评估数量
    pub concurrency_limit: usize,
    /// 单次调用超时
    pub request_timeout: Duration,
}

impl EvaluationContext {
    /// 以配置中的模型参数创建上下文，其余字段为空
    pub fn new(mode: EvaluationMode, rubric: impl Into<String>, config: &Config) -> Self {
        Self {
            mode,
            rubric: rubric.into(),
            knowledge_base: String::new(),
            custom_instructions: String::new(),
            output_format_instructions: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            concurrency_limit: config.max_concurrent_evaluations,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// 检查模式所需的输入是否齐全
    ///
    /// - 结构化评估必须有评分标准
    /// - 自由格式评估必须有输出格式说明
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_concurrency(self.concurrency_limit)?;
        match self.mode {
            EvaluationMode::Structured if self.rubric.trim().is_empty() => {
                Err(ConfigError::MissingRubric)
            }
            EvaluationMode::FreeForm
                if self
                    .output_format_instructions
                    .as_deref()
                    .map_or(true, |s| s.trim().is_empty()) =>
            {
                Err(ConfigError::MissingOutputFormat)
            }
            _ => Ok(()),
        }
    }
}
