//! LLM 服务 - 业务能力层
//!
//! 只负责"发一条请求、拿一段文本"，不关心评分流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务
//! - 支持 JSON Schema 约束输出（结构化评估）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 要求模型按此 JSON Schema 返回
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub description: String,
    pub schema: JsonValue,
}

/// 一次聊天请求
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_message: Option<String>,
    pub user_message: String,
    pub temperature: f32,
    /// `Some` 时要求严格结构化输出
    pub response_schema: Option<ResponseSchema>,
}

/// 聊天后端
///
/// 评估流程只依赖这个接口，测试中用假实现替代真实网络调用。
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 返回模型回复的文本内容
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;
}

/// LLM 服务
///
/// 职责：
/// - 调用兼容 OpenAI 的 Chat Completions 接口
/// - 只处理单次请求
/// - 不出现学生列表
/// - 不关心并发和重试
pub struct LlmService {
    client: Client<OpenAIConfig>,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    fn build_messages(
        request: &ChatRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = request.system_message.as_deref() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(build_failed)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_message.as_str())
            .build()
            .map_err(build_failed)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }
}

#[async_trait]
impl ChatBackend for LlmService {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", request.model);
        debug!("用户消息长度: {} 字符", request.user_message.len());

        let messages = Self::build_messages(&request)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature);

        if let Some(schema) = &request.response_schema {
            builder.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: Some(schema.description.clone()),
                    name: schema.name.clone(),
                    schema: Some(schema.schema.clone()),
                    strict: Some(true),
                },
            });
        }

        let api_request = builder.build().map_err(build_failed)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                LlmError::api_failed(&request.model, e)
            })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyContent {
                model: request.model,
            })
    }
}

fn build_failed(e: impl std::error::Error + Send + Sync + 'static) -> LlmError {
    LlmError::RequestBuildFailed {
        source: Box::new(e),
    }
}
