//! 评估结果模型

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;

/// 评估模式（每次运行选定一次）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// 按评分结构返回分项成绩
    Structured,
    /// 返回自由格式文本
    FreeForm,
}

/// 报告主文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// 一个 Excel 工作簿：汇总表 + 每名学生一个工作表
    Excel,
    /// 每名学生一个 Word 文档
    Word,
    /// 每名学生一个 HTML 文档
    Html,
}

impl ReportFormat {
    /// 未指定时的默认格式：结构化评估用 Excel，自由格式用 Word
    pub fn default_for(mode: EvaluationMode) -> Self {
        match mode {
            EvaluationMode::Structured => ReportFormat::Excel,
            EvaluationMode::FreeForm => ReportFormat::Word,
        }
    }
}

/// 单项评分
///
/// `score` 不保证落在 `0..=max_score` 之间，模型给什么就保留什么。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionScore {
    pub name: String,
    pub score: i64,
    pub max_score: i64,
    pub comment: String,
}

/// 结构化评估结果
///
/// 同时也是 LLM 返回 JSON 的解码目标：所有字段必填，多余字段视为不合格。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredEvaluation {
    pub general_feedback: String,
    pub criteria: Vec<CriterionScore>,
    pub final_score: f64,
    pub max_score: f64,
}

/// 一次评估调用的成功结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Structured(StructuredEvaluation),
    FreeForm { raw_text: String },
}

impl EvaluationOutcome {
    pub fn as_structured(&self) -> Option<&StructuredEvaluation> {
        match self {
            EvaluationOutcome::Structured(s) => Some(s),
            EvaluationOutcome::FreeForm { .. } => None,
        }
    }
}

/// 单个学生的最终结果（成功或失败）
#[derive(Debug)]
pub struct StudentOutcome {
    pub student_name: String,
    pub result: Result<EvaluationOutcome, EvaluationError>,
}

impl StudentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 一次批量评估的全部结果
///
/// `outcomes` 按提交顺序排列，与完成顺序无关。
#[derive(Debug)]
pub struct RunResult {
    pub mode: EvaluationMode,
    pub outcomes: Vec<StudentOutcome>,
}

impl RunResult {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// 成功的 (学生, 结果)
    pub fn successes(&self) -> impl Iterator<Item = (&str, &EvaluationOutcome)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(outcome) => Some((o.student_name.as_str(), outcome)),
            Err(_) => None,
        })
    }

    /// 失败的 (学生, 错误)
    pub fn failures(&self) -> impl Iterator<Item = (&str, &EvaluationError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(e) => Some((o.student_name.as_str(), e)),
        })
    }

    /// 查找某个学生的结果
    pub fn get(&self, student_name: &str) -> Option<&StudentOutcome> {
        self.outcomes.iter().find(|o| o.student_name == student_name)
    }
}
