//! # Submission Grader
//!
//! 批量评估学生作业的 Rust 应用程序：解压作业包，交给 LLM 逐个评估，导出报告
//!
//! ## 架构设计
//!
//! 本系统采用三层架构：
//!
//! ### ① 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个能力只处理一件事
//! - `archive_extractor` - 解压 zip 并按学生归档
//! - `DocumentNormalizer` - 文档转文本
//! - `LlmService` - LLM 调用能力（可选 JSON Schema 约束）
//! - `ReportRenderer` - 结果打包成 zip
//!
//! ### ② 流程层（Workflow）
//! - `workflow/` - 定义"一名学生"的完整评估流程
//! - `EvaluationContext` - 所有学生共享的只读上下文
//! - `EvaluationCall` - 组装提示词 → 调用 LLM → 校验结果
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/app` - 一次运行的完整流程
//! - `orchestrator/batch_evaluator` - 并发评估所有学生
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, EvaluationError};
pub use models::{
    EvaluationMode, EvaluationOutcome, ReportFormat, RunResult, RunSpec, StudentOutcome,
    Submission,
};
pub use orchestrator::{App, BatchEvaluator, Progress, RunSummary};
pub use workflow::{EvaluationCall, EvaluationContext, Evaluator};
