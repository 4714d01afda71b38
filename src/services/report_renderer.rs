//! 报告生成服务 - 业务能力层
//!
//! 把一次运行的结果打包成可下载的 zip。核心流程只依赖 [`ReportRenderer`]。
//!
//! 内置的 [`ZipReportRenderer`] 按 [`ReportFormat`] 生成主文档：
//! - `Excel`: `evaluations_etudiants.xlsx`，汇总表 + 每名学生一个工作表
//! - `Word`: `word/<姓名>.docx`
//! - `Html`: `html/<姓名>.html`
//!
//! 无论哪种格式，每名成功的学生都有一份 `markdown/<姓名>.txt`，
//! 另附 `summary.json`，失败的学生单独列出。

use crate::error::RenderError;
use crate::models::{EvaluationOutcome, ReportFormat, RunResult, StructuredEvaluation};
use crate::services::excel_report::excel_workbook;
use crate::services::word_report::word_document;
use serde::Serialize;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 结果 → 压缩包字节
pub trait ReportRenderer: Send + Sync {
    fn render(&self, result: &RunResult, format: ReportFormat) -> Result<Vec<u8>, RenderError>;
}

/// Excel 工作簿在压缩包里的文件名
pub const EXCEL_REPORT_NAME: &str = "evaluations_etudiants.xlsx";

/// 内置 zip 报告
#[derive(Debug, Default, Clone)]
pub struct ZipReportRenderer;

#[derive(Serialize)]
struct SummaryEntry<'a> {
    student_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ReportRenderer for ZipReportRenderer {
    fn render(&self, result: &RunResult, format: ReportFormat) -> Result<Vec<u8>, RenderError> {
        // Stored：macOS 自带解压工具兼容性更好
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        if format == ReportFormat::Excel {
            zip.start_file(EXCEL_REPORT_NAME, options)?;
            zip.write_all(&excel_workbook(result)?)?;
        }

        for (student_name, outcome) in result.successes() {
            let safe_name = sanitize_filename(student_name);

            match format {
                ReportFormat::Excel => {}
                ReportFormat::Word => {
                    zip.start_file(format!("word/{}.docx", safe_name), options)?;
                    zip.write_all(&word_document(student_name, outcome)?)?;
                }
                ReportFormat::Html => {
                    zip.start_file(format!("html/{}.html", safe_name), options)?;
                    zip.write_all(render_html(student_name, outcome).as_bytes())?;
                }
            }

            zip.start_file(format!("markdown/{}.txt", safe_name), options)?;
            zip.write_all(render_markdown(student_name, outcome).as_bytes())?;
        }

        let summary: Vec<SummaryEntry<'_>> = result
            .outcomes
            .iter()
            .map(|o| {
                let structured = o.result.as_ref().ok().and_then(|r| r.as_structured());
                SummaryEntry {
                    student_name: &o.student_name,
                    final_score: structured.map(|s| s.final_score),
                    max_score: structured.map(|s| s.max_score),
                    error: o.result.as_ref().err().map(|e| e.to_string()),
                }
            })
            .collect();
        zip.start_file("summary.json", options)?;
        zip.write_all(&serde_json::to_vec_pretty(&summary)?)?;

        Ok(zip.finish()?.into_inner())
    }
}

/// 文件名只保留字母数字、空格、`-` 和 `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 自由格式文本按空行切分为段落块，保持原顺序
pub fn text_blocks(raw_text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in raw_text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

// ========== Markdown ==========

/// Markdown 纯文本版本
pub fn render_markdown(student_name: &str, outcome: &EvaluationOutcome) -> String {
    match outcome {
        EvaluationOutcome::Structured(evaluation) => structured_markdown(student_name, evaluation),
        EvaluationOutcome::FreeForm { raw_text } => {
            format!("# 评估 - {}\n\n{}\n", student_name, raw_text)
        }
    }
}

fn structured_markdown(student_name: &str, evaluation: &StructuredEvaluation) -> String {
    let mut lines = vec![
        format!("# 评估 - {}", student_name),
        String::new(),
        "## 最终成绩".to_string(),
        String::new(),
        format!("**{} / {}**", evaluation.final_score, evaluation.max_score),
        String::new(),
        "## 分项评分".to_string(),
        String::new(),
    ];

    for criterion in &evaluation.criteria {
        lines.push(format!("### {}", criterion.name));
        lines.push(String::new());
        lines.push(format!(
            "**得分：** {} / {}",
            criterion.score, criterion.max_score
        ));
        lines.push(String::new());
        lines.push(format!("**评语：** {}", criterion.comment));
        lines.push(String::new());
    }

    lines.push("## 总体反馈".to_string());
    lines.push(String::new());
    lines.push(evaluation.general_feedback.clone());
    lines.push(String::new());

    lines.join("\n")
}

// ========== HTML ==========

/// HTML 主文档
pub fn render_html(student_name: &str, outcome: &EvaluationOutcome) -> String {
    let title = format!("评估 - {}", student_name);
    let mut body = format!("<h1>{}</h1>\n", escape_html(&title));

    match outcome {
        EvaluationOutcome::Structured(evaluation) => {
            body.push_str("<h2>最终成绩</h2>\n");
            body.push_str(&format!(
                "<p class=\"grade\"><strong>{} / {}</strong></p>\n",
                evaluation.final_score, evaluation.max_score
            ));
            body.push_str("<h2>分项评分</h2>\n");
            for criterion in &evaluation.criteria {
                body.push_str(&format!("<h3>{}</h3>\n", escape_html(&criterion.name)));
                body.push_str(&format!(
                    "<p><strong>得分：</strong>{} / {}</p>\n",
                    criterion.score, criterion.max_score
                ));
                body.push_str(&format!(
                    "<p><strong>评语：</strong>{}</p>\n",
                    escape_html(&criterion.comment)
                ));
            }
            body.push_str("<h2>总体反馈</h2>\n");
            push_paragraphs(&mut body, &evaluation.general_feedback);
        }
        EvaluationOutcome::FreeForm { raw_text } => push_paragraphs(&mut body, raw_text),
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(&title),
        body
    )
}

fn push_paragraphs(body: &mut String, text: &str) {
    for block in text_blocks(text) {
        body.push_str("<p>");
        body.push_str(&escape_html(&block).replace('\n', "<br>\n"));
        body.push_str("</p>\n");
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
