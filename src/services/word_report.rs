//! Word 报告：每名学生一个 .docx

use std::io::Cursor;

use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Run};

use crate::error::RenderError;
use crate::models::{EvaluationOutcome, StructuredEvaluation};
use crate::services::report_renderer::text_blocks;

// 字号单位为半磅
const TITLE_SIZE: usize = 40;
const GRADE_SIZE: usize = 32;
const HEADING_SIZES: [usize; 3] = [32, 28, 26];

/// 生成一名学生的 Word 文档
pub fn word_document(
    student_name: &str,
    outcome: &EvaluationOutcome,
) -> Result<Vec<u8>, RenderError> {
    let title = Paragraph::new()
        .add_run(
            Run::new()
                .add_text(format!("评估 - {}", student_name))
                .bold()
                .size(TITLE_SIZE),
        )
        .align(AlignmentType::Center);
    let mut docx = Docx::new().add_paragraph(title);

    docx = match outcome {
        EvaluationOutcome::Structured(evaluation) => structured_body(docx, evaluation),
        EvaluationOutcome::FreeForm { raw_text } => free_form_body(docx, raw_text),
    };

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| RenderError::Word {
            student_name: student_name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

fn structured_body(mut docx: Docx, evaluation: &StructuredEvaluation) -> Docx {
    docx = docx
        .add_paragraph(heading("最终成绩", 1))
        .add_paragraph(Paragraph::new().add_run(
            Run::new()
                .add_text(format!("{} / {}", evaluation.final_score, evaluation.max_score))
                .bold()
                .size(GRADE_SIZE),
        ))
        .add_paragraph(heading("分项评分", 1));

    for criterion in &evaluation.criteria {
        docx = docx
            .add_paragraph(heading(&criterion.name, 2))
            .add_paragraph(labelled(
                "得分：",
                &format!("{} / {}", criterion.score, criterion.max_score),
            ))
            .add_paragraph(labelled("评语：", &criterion.comment));
    }

    docx = docx.add_paragraph(heading("总体反馈", 1));
    for block in text_blocks(&evaluation.general_feedback) {
        docx = docx.add_paragraph(text_paragraph(&block));
    }
    docx
}

/// 自由格式：按空行分段，`#` / `##` / `###` 开头的段落作为标题
fn free_form_body(mut docx: Docx, raw_text: &str) -> Docx {
    for block in text_blocks(raw_text) {
        let paragraph = match markdown_heading(&block) {
            Some((level, text)) => heading(text, level),
            None => text_paragraph(&block),
        };
        docx = docx.add_paragraph(paragraph);
    }
    docx
}

fn markdown_heading(block: &str) -> Option<(usize, &str)> {
    let trimmed = block.trim();
    ["### ", "## ", "# "]
        .iter()
        .zip([3, 2, 1])
        .find_map(|(prefix, level)| trimmed.strip_prefix(prefix).map(|text| (level, text)))
}

fn heading(text: &str, level: usize) -> Paragraph {
    let size = HEADING_SIZES[level.clamp(1, HEADING_SIZES.len()) - 1];
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(size))
}

fn labelled(label: &str, value: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(label).bold())
        .add_run(Run::new().add_text(value))
}

/// 段落内的换行保留为软换行
fn text_paragraph(block: &str) -> Paragraph {
    let mut run = Run::new();
    for (index, line) in block.lines().enumerate() {
        if index > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    Paragraph::new().add_run(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CriterionScore;
    use crate::services::document_normalizer::{BuiltinNormalizer, DocumentNormalizer};

    fn read_back(bytes: &[u8]) -> String {
        BuiltinNormalizer
            .normalize("evaluation.docx", bytes)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_structured_document_sections() {
        let outcome = EvaluationOutcome::Structured(StructuredEvaluation {
            general_feedback: "Travail solide & clair.".to_string(),
            criteria: vec![CriterionScore {
                name: "Clarté".to_string(),
                score: 8,
                max_score: 10,
                comment: "Bien structuré".to_string(),
            }],
            final_score: 16.5,
            max_score: 20.0,
        });

        let text = read_back(&word_document("Jane Doe", &outcome).unwrap());

        assert_eq!(
            text.split("\n\n").collect::<Vec<_>>(),
            vec![
                "评估 - Jane Doe",
                "最终成绩",
                "16.5 / 20",
                "分项评分",
                "Clarté",
                "得分：8 / 10",
                "评语：Bien structuré",
                "总体反馈",
                "Travail solide & clair.",
            ]
        );
    }

    #[test]
    fn test_free_form_headings_and_blocks() {
        let outcome = EvaluationOutcome::FreeForm {
            raw_text: "# Résumé\n\nBon travail\nglobal\n\n## Points forts".to_string(),
        };

        let text = read_back(&word_document("Alice", &outcome).unwrap());

        assert_eq!(
            text.split("\n\n").collect::<Vec<_>>(),
            vec!["评估 - Alice", "Résumé", "Bon travailglobal", "Points forts"]
        );
    }

    #[test]
    fn test_markdown_heading_levels() {
        assert_eq!(markdown_heading("# Titre"), Some((1, "Titre")));
        assert_eq!(markdown_heading("### Sous"), Some((3, "Sous")));
        assert_eq!(markdown_heading("#sans espace"), None);
        assert_eq!(markdown_heading("Texte"), None);
    }
}
