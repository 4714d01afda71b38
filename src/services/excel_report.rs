//! Excel 报告
//!
//! 一个工作簿：第一个工作表是所有成功学生的成绩汇总，之后每名学生一个工作表。

use std::collections::HashSet;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::models::{EvaluationOutcome, RunResult, StructuredEvaluation};
use crate::services::report_renderer::text_blocks;

/// 汇总表名称
pub const SUMMARY_SHEET: &str = "汇总";

const SHEET_NAME_MAX_CHARS: usize = 31;

struct Styles {
    header: Format,
    cell: Format,
    title: Format,
    label: Format,
    grade: Format,
    wrapped: Format,
}

impl Styles {
    fn new() -> Self {
        let border = Format::new().set_border(FormatBorder::Thin);
        Self {
            header: Format::new()
                .set_bold()
                .set_font_size(12)
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(0x4472C4))
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center),
            cell: border.clone(),
            title: Format::new().set_bold().set_font_size(14),
            label: Format::new().set_bold().set_font_size(12),
            grade: Format::new().set_bold().set_font_size(14),
            wrapped: border.set_text_wrap().set_align(FormatAlign::Top),
        }
    }
}

/// 生成整个工作簿
pub fn excel_workbook(result: &RunResult) -> Result<Vec<u8>, XlsxError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet();
    summary.set_name(SUMMARY_SHEET)?;
    write_summary(summary, result, &styles)?;

    let mut used_names: HashSet<String> = HashSet::new();
    used_names.insert(SUMMARY_SHEET.to_lowercase());

    for (student_name, outcome) in result.successes() {
        let sheet_name = unique_sheet_name(student_name, &mut used_names);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&sheet_name)?;

        let title = format!("评估 - {}", student_name);
        sheet.merge_range(0, 0, 0, 3, &title, &styles.title)?;

        match outcome {
            EvaluationOutcome::Structured(evaluation) => {
                write_structured(sheet, evaluation, &styles)?;
            }
            EvaluationOutcome::FreeForm { raw_text } => {
                sheet.set_column_width(0, 100)?;
                for (row, block) in (2u32..).zip(text_blocks(raw_text)) {
                    sheet.write_string_with_format(row, 0, block, &styles.wrapped)?;
                }
            }
        }
    }

    workbook.save_to_buffer()
}

fn write_summary(
    sheet: &mut Worksheet,
    result: &RunResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    for (col, header) in (0u16..).zip(["学生", "最终成绩", "满分"]) {
        sheet.write_string_with_format(0, col, header, &styles.header)?;
    }

    for (row, (student_name, outcome)) in (1u32..).zip(result.successes()) {
        sheet.write_string_with_format(row, 0, student_name, &styles.cell)?;
        if let Some(evaluation) = outcome.as_structured() {
            sheet.write_number_with_format(row, 1, evaluation.final_score, &styles.cell)?;
            sheet.write_number_with_format(row, 2, evaluation.max_score, &styles.cell)?;
        }
    }

    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(1, 15)?;
    sheet.set_column_width(2, 15)?;
    Ok(())
}

fn write_structured(
    sheet: &mut Worksheet,
    evaluation: &StructuredEvaluation,
    styles: &Styles,
) -> Result<(), XlsxError> {
    let mut row: u32 = 2;

    for (col, header) in (0u16..).zip(["评分项", "得分", "满分", "评语"]) {
        sheet.write_string_with_format(row, col, header, &styles.header)?;
    }
    row += 1;

    for criterion in &evaluation.criteria {
        sheet.write_string_with_format(row, 0, &criterion.name, &styles.cell)?;
        sheet.write_number_with_format(row, 1, criterion.score as f64, &styles.cell)?;
        sheet.write_number_with_format(row, 2, criterion.max_score as f64, &styles.cell)?;
        sheet.write_string_with_format(row, 3, &criterion.comment, &styles.wrapped)?;
        row += 1;
    }
    row += 1;

    sheet.write_string_with_format(row, 0, "最终成绩", &styles.label)?;
    sheet.write_string_with_format(
        row,
        1,
        format!("{} / {}", evaluation.final_score, evaluation.max_score),
        &styles.grade,
    )?;
    row += 2;

    sheet.write_string_with_format(row, 0, "总体反馈", &styles.label)?;
    row += 1;
    sheet.merge_range(row, 0, row + 5, 3, &evaluation.general_feedback, &styles.wrapped)?;

    sheet.set_column_width(0, 25)?;
    sheet.set_column_width(1, 10)?;
    sheet.set_column_width(2, 12)?;
    sheet.set_column_width(3, 50)?;
    Ok(())
}

/// 工作表名称：去掉 Excel 不允许的字符，最多 31 个字符
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(SHEET_NAME_MAX_CHARS)
        .collect();
    let cleaned = cleaned.trim_matches('\'');

    if cleaned.is_empty() {
        "学生".to_string()
    } else {
        cleaned.to_string()
    }
}

/// 同名（不区分大小写）时追加序号
fn unique_sheet_name(student_name: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(student_name);
    let mut candidate = base.clone();
    let mut counter = 2;

    while !used.insert(candidate.to_lowercase()) {
        let suffix = format!(" ({})", counter);
        let keep = SHEET_NAME_MAX_CHARS - suffix.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &suffix;
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;
    use crate::models::{CriterionScore, EvaluationMode, StudentOutcome};
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    fn structured(final_score: f64) -> EvaluationOutcome {
        EvaluationOutcome::Structured(StructuredEvaluation {
            general_feedback: "Travail solide.".to_string(),
            criteria: vec![CriterionScore {
                name: "Clarté".to_string(),
                score: 8,
                max_score: 10,
                comment: "Bien structuré".to_string(),
            }],
            final_score,
            max_score: 20.0,
        })
    }

    fn outcome(name: &str, result: Result<EvaluationOutcome, EvaluationError>) -> StudentOutcome {
        StudentOutcome {
            student_name: name.to_string(),
            result,
        }
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Jane Doe"), "Jane Doe");
        assert_eq!(sanitize_sheet_name("a/b:c[d]"), "a_b_c_d_");
        assert_eq!(sanitize_sheet_name("'quoted'"), "quoted");
        assert_eq!(sanitize_sheet_name("   "), "学生");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).chars().count(), 31);
    }

    #[test]
    fn test_unique_sheet_names() {
        let mut used = HashSet::new();
        used.insert(SUMMARY_SHEET.to_lowercase());

        assert_eq!(unique_sheet_name("a/b", &mut used), "a_b");
        assert_eq!(unique_sheet_name("a:b", &mut used), "a_b (2)");
        assert_eq!(unique_sheet_name("A_B", &mut used), "A_B (3)");
        assert_eq!(unique_sheet_name("汇总", &mut used), "汇总 (2)");

        let long = "y".repeat(40);
        assert_eq!(unique_sheet_name(&long, &mut used).chars().count(), 31);
        let second = unique_sheet_name(&long, &mut used);
        assert!(second.ends_with(" (2)"));
        assert_eq!(second.chars().count(), 31);
    }

    #[test]
    fn test_workbook_has_summary_then_student_sheets() {
        let result = RunResult {
            mode: EvaluationMode::Structured,
            outcomes: vec![
                outcome("Jane Doe", Ok(structured(16.5))),
                outcome("John", Err(EvaluationError::EmptyResponse)),
                outcome("Zoé", Ok(structured(12.0))),
            ],
        };

        let bytes = excel_workbook(&result).unwrap();
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();

        assert_eq!(workbook.sheet_names(), vec![SUMMARY_SHEET, "Jane Doe", "Zoé"]);

        let summary = workbook.worksheet_range(SUMMARY_SHEET).unwrap();
        assert_eq!(summary.get_value((0, 0)), Some(&Data::String("学生".to_string())));
        assert_eq!(summary.get_value((1, 0)), Some(&Data::String("Jane Doe".to_string())));
        assert_eq!(summary.get_value((1, 1)), Some(&Data::Float(16.5)));
        assert_eq!(summary.get_value((1, 2)), Some(&Data::Float(20.0)));
        assert_eq!(summary.get_value((2, 0)), Some(&Data::String("Zoé".to_string())));

        let sheet = workbook.worksheet_range("Jane Doe").unwrap();
        assert_eq!(
            sheet.get_value((0, 0)),
            Some(&Data::String("评估 - Jane Doe".to_string()))
        );
        assert_eq!(sheet.get_value((3, 0)), Some(&Data::String("Clarté".to_string())));
        assert_eq!(sheet.get_value((3, 1)), Some(&Data::Float(8.0)));
        assert_eq!(
            sheet.get_value((5, 1)),
            Some(&Data::String("16.5 / 20".to_string()))
        );
        assert_eq!(
            sheet.get_value((8, 0)),
            Some(&Data::String("Travail solide.".to_string()))
        );
    }

    #[test]
    fn test_free_form_sheet_one_row_per_block() {
        let result = RunResult {
            mode: EvaluationMode::FreeForm,
            outcomes: vec![outcome(
                "Alice",
                Ok(EvaluationOutcome::FreeForm {
                    raw_text: "Points forts\n\nPoints faibles".to_string(),
                }),
            )],
        };

        let bytes = excel_workbook(&result).unwrap();
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();

        let summary = workbook.worksheet_range(SUMMARY_SHEET).unwrap();
        assert_eq!(summary.get_value((1, 0)), Some(&Data::String("Alice".to_string())));

        let sheet = workbook.worksheet_range("Alice").unwrap();
        assert_eq!(sheet.get_value((2, 0)), Some(&Data::String("Points forts".to_string())));
        assert_eq!(sheet.get_value((3, 0)), Some(&Data::String("Points faibles".to_string())));
    }
}
