//! 单名学生的评估流程 - 流程层
//!
//! 核心职责：定义"评估一名学生"的完整过程
//!
//! 流程顺序：
//! 1. 按固定顺序拼装提示词
//! 2. 调用 LLM（带超时）
//! 3. 结构化模式解码并校验返回 JSON；自由格式只检查非空
//!
//! 任何失败都只影响这一名学生，由编排层记录为该学生的失败结果。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::EvaluationError;
use crate::models::{EvaluationMode, EvaluationOutcome, StructuredEvaluation};
use crate::services::llm_service::{ChatBackend, ChatRequest, ResponseSchema};
use crate::utils::logging::truncate_text;
use crate::workflow::evaluation_ctx::EvaluationContext;

/// 编排层调度的工作单元
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        student_name: &str,
        submission_text: &str,
    ) -> Result<EvaluationOutcome, EvaluationError>;
}

/// 结构化评估的 JSON Schema
pub fn evaluation_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "general_feedback": {
                "type": "string",
                "description": "General feedback about the student's work"
            },
            "criteria": {
                "type": "array",
                "description": "List of criterion evaluations",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Name of the evaluation criterion" },
                        "score": { "type": "integer", "description": "Score for this criterion" },
                        "max_score": { "type": "integer", "description": "Maximum possible score for this criterion" },
                        "comment": { "type": "string", "description": "Comment explaining the score" }
                    },
                    "required": ["name", "score", "max_score", "comment"],
                    "additionalProperties": false
                }
            },
            "final_score": { "type": "number", "description": "Final grade" },
            "max_score": { "type": "number", "description": "Maximum possible grade" }
        },
        "required": ["general_feedback", "criteria", "final_score", "max_score"],
        "additionalProperties": false
    })
}

/// 拼装用户提示词
///
/// 顺序：评分标准 → 参考资料 → 教师补充说明 → [自由格式: 输出格式要求] → 学生作业。
/// 空的参考资料和补充说明整段省略；自由格式下评分标准为空时也省略。
pub fn build_user_prompt(
    context: &EvaluationContext,
    student_name: &str,
    submission_text: &str,
) -> String {
    let mut sections: Vec<(String, &str)> = Vec::new();

    let rubric_required = context.mode == EvaluationMode::Structured;
    if rubric_required || !context.rubric.trim().is_empty() {
        sections.push(("评分标准".to_string(), context.rubric.as_str()));
    }

    if !context.knowledge_base.trim().is_empty() {
        sections.push(("参考资料 / 知识库".to_string(), context.knowledge_base.as_str()));
    }

    if !context.custom_instructions.trim().is_empty() {
        sections.push(("教师补充说明".to_string(), context.custom_instructions.as_str()));
    }

    if context.mode == EvaluationMode::FreeForm {
        let format = context.output_format_instructions.as_deref().unwrap_or("");
        sections.push(("输出格式要求".to_string(), format));
    }

    sections.push((format!("待评估的学生作业（{}）", student_name), submission_text));

    sections
        .iter()
        .map(|(heading, body)| format!("## {}\n{}", heading, body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 单次评估调用
///
/// 持有共享上下文和 LLM 后端，本身无状态，可在多个任务间共享。
pub struct EvaluationCall {
    backend: Arc<dyn ChatBackend>,
    context: Arc<EvaluationContext>,
}

impl EvaluationCall {
    pub fn new(backend: Arc<dyn ChatBackend>, context: Arc<EvaluationContext>) -> Self {
        Self { backend, context }
    }

    fn build_request(&self, student_name: &str, submission_text: &str) -> ChatRequest {
        let response_schema = match self.context.mode {
            EvaluationMode::Structured => Some(ResponseSchema {
                name: "evaluation_result".to_string(),
                description: "Rubric-based grade breakdown for one student".to_string(),
                schema: evaluation_schema(),
            }),
            EvaluationMode::FreeForm => None,
        };

        let system_message = Some(self.context.system_prompt.clone())
            .filter(|s| !s.trim().is_empty());

        ChatRequest {
            model: self.context.model.clone(),
            system_message,
            user_message: build_user_prompt(&self.context, student_name, submission_text),
            temperature: self.context.temperature,
            response_schema,
        }
    }
}

/// 把模型回复转换为评估结果
pub fn parse_response(
    mode: EvaluationMode,
    content: String,
) -> Result<EvaluationOutcome, EvaluationError> {
    if content.trim().is_empty() {
        return Err(EvaluationError::EmptyResponse);
    }

    match mode {
        EvaluationMode::Structured => {
            let evaluation: StructuredEvaluation = serde_json::from_str(content.trim())
                .map_err(|source| EvaluationError::SchemaValidation { source })?;
            Ok(EvaluationOutcome::Structured(evaluation))
        }
        // 原样交给报告层，不做任何修改
        EvaluationMode::FreeForm => Ok(EvaluationOutcome::FreeForm { raw_text: content }),
    }
}

#[async_trait]
impl Evaluator for EvaluationCall {
    async fn evaluate(
        &self,
        student_name: &str,
        submission_text: &str,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let request = self.build_request(student_name, submission_text);
        debug!(
            "[{}] 提示词长度: {} 字符, 作业预览: {}",
            student_name,
            request.user_message.chars().count(),
            truncate_text(submission_text, 40)
        );

        let timeout = self.context.request_timeout;
        let content = tokio::time::timeout(timeout, self.backend.complete(request))
            .await
            .map_err(|_| EvaluationError::Timeout { timeout })??;

        parse_response(self.context.mode, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::LlmError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 记录请求并返回固定回复的假后端
    struct FakeBackend {
        reply: Result<String, String>,
        delay: Duration,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeBackend {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map_err(|_| LlmError::EmptyContent {
                model: request.model,
            })
        }
    }

    fn context(mode: EvaluationMode) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(mode, "RUBRIC", &Config::default());
        ctx.knowledge_base = "KNOWLEDGE".to_string();
        ctx.custom_instructions = "CUSTOM".to_string();
        ctx.output_format_instructions = Some("FORMAT".to_string());
        ctx
    }

    fn call(backend: Arc<FakeBackend>, ctx: EvaluationContext) -> EvaluationCall {
        EvaluationCall::new(backend, Arc::new(ctx))
    }

    const VALID_JSON: &str = r#"{"general_feedback":"Bon travail","criteria":[{"name":"Clarté","score":8,"max_score":10,"comment":"ok"}],"final_score":16,"max_score":20}"#;

    #[test]
    fn test_prompt_section_order_structured() {
        let prompt = build_user_prompt(&context(EvaluationMode::Structured), "Jane Doe", "WORK");

        let positions: Vec<usize> = ["RUBRIC", "KNOWLEDGE", "CUSTOM", "Jane Doe", "WORK"]
            .iter()
            .map(|needle| prompt.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(!prompt.contains("FORMAT"));
        assert!(prompt.starts_with("## 评分标准\nRUBRIC"));
    }

    #[test]
    fn test_prompt_section_order_free_form() {
        let prompt = build_user_prompt(&context(EvaluationMode::FreeForm), "Jane Doe", "WORK");

        let custom = prompt.find("CUSTOM").unwrap();
        let format = prompt.find("## 输出格式要求\nFORMAT").unwrap();
        let work = prompt.find("WORK").unwrap();
        assert!(custom < format && format < work);
    }

    #[test]
    fn test_prompt_omits_empty_sections() {
        let mut ctx = context(EvaluationMode::FreeForm);
        ctx.rubric = String::new();
        ctx.knowledge_base = "  \n".to_string();
        ctx.custom_instructions = String::new();

        let prompt = build_user_prompt(&ctx, "Bob", "WORK");

        assert_eq!(
            prompt,
            "## 输出格式要求\nFORMAT\n\n## 待评估的学生作业（Bob）\nWORK"
        );
    }

    #[tokio::test]
    async fn test_structured_call_sends_schema_and_decodes() {
        let backend = Arc::new(FakeBackend::replying(VALID_JSON));
        let evaluation = call(backend.clone(), context(EvaluationMode::Structured));

        let outcome = evaluation.evaluate("Alice", "texte").await.unwrap();

        let structured = outcome.as_structured().unwrap();
        assert_eq!(structured.final_score, 16.0);
        assert_eq!(structured.criteria[0].name, "Clarté");

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let schema = requests[0].response_schema.as_ref().unwrap();
        assert_eq!(schema.schema["required"][1], "criteria");
        assert_eq!(requests[0].system_message.as_deref(), Some(crate::workflow::DEFAULT_SYSTEM_PROMPT));
        assert!((requests[0].temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_structured_call_rejects_missing_field() {
        let backend = Arc::new(FakeBackend::replying(
            r#"{"general_feedback":"x","criteria":[],"final_score":3}"#,
        ));
        let err = call(backend, context(EvaluationMode::Structured))
            .evaluate("Alice", "texte")
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::SchemaValidation { .. }));
    }

    #[tokio::test]
    async fn test_structured_call_rejects_non_json() {
        let backend = Arc::new(FakeBackend::replying("Voici mon évaluation : 15/20"));
        let err = call(backend, context(EvaluationMode::Structured))
            .evaluate("Alice", "texte")
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::SchemaValidation { .. }));
    }

    #[tokio::test]
    async fn test_free_form_returns_text_unmodified() {
        let backend = Arc::new(FakeBackend::replying("Line1\n\nLine2\n"));
        let outcome = call(backend.clone(), context(EvaluationMode::FreeForm))
            .evaluate("Alice", "texte")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EvaluationOutcome::FreeForm {
                raw_text: "Line1\n\nLine2\n".to_string()
            }
        );
        assert!(backend.requests.lock().unwrap()[0].response_schema.is_none());
    }

    #[tokio::test]
    async fn test_blank_reply_is_failure() {
        let backend = Arc::new(FakeBackend::replying("  \n"));
        let err = call(backend, context(EvaluationMode::FreeForm))
            .evaluate("Alice", "texte")
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_backend_error_is_failure() {
        let backend = Arc::new(FakeBackend {
            reply: Err("boom".to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        });
        let err = call(backend, context(EvaluationMode::FreeForm))
            .evaluate("Alice", "texte")
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Llm(LlmError::EmptyContent { .. })));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend = Arc::new(FakeBackend {
            reply: Ok("trop tard".to_string()),
            delay: Duration::from_millis(500),
            requests: Mutex::new(Vec::new()),
        });
        let mut ctx = context(EvaluationMode::FreeForm);
        ctx.request_timeout = Duration::from_millis(20);

        let err = call(backend, ctx).evaluate("Alice", "texte").await.unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Timeout { timeout } if timeout == Duration::from_millis(20)
        ));
        assert!(err.to_string().contains("20ms"), "{}", err);
    }

    #[test]
    fn test_blank_system_prompt_is_not_sent() {
        let mut ctx = context(EvaluationMode::FreeForm);
        ctx.system_prompt = " ".to_string();
        let request = call(Arc::new(FakeBackend::replying("")), ctx).build_request("A", "B");
        assert!(request.system_message.is_none());
    }
}
