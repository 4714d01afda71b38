use crate::error::{AppError, AppResult, FileError};
use crate::models::evaluation::{EvaluationMode, ReportFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 评估任务描述（TOML 任务文件）
///
/// ```toml
/// mode = "structured"
/// submissions_archive = "travaux.zip"
/// output = "evaluations.zip"
/// report_format = "excel"
/// custom_instructions = "..."
///
/// [rubric]
/// files = ["grille.docx"]
///
/// [knowledge]
/// urls = ["https://example.com/cours"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    pub mode: EvaluationMode,
    pub submissions_archive: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// 报告主文档格式；不填则按评估模式选择
    pub report_format: Option<ReportFormat>,
    #[serde(default)]
    pub rubric: SourceSpec,
    #[serde(default)]
    pub knowledge: SourceSpec,
    #[serde(default)]
    pub custom_instructions: String,
    #[serde(default)]
    pub output_format_instructions: String,
    /// 系统提示词文件；不填则使用内置提示词
    pub system_prompt_file: Option<PathBuf>,
    /// 覆盖环境变量中的模型
    pub model: Option<String>,
    /// 覆盖环境变量中的并发数
    pub max_concurrent: Option<usize>,
}

/// 一段输入材料的来源：文件、网页和直接输入的文本，可组合
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub text: String,
}

impl SourceSpec {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.urls.is_empty() && self.text.trim().is_empty()
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("evaluations_etudiants.zip")
}

impl RunSpec {
    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|source| {
            AppError::File(FileError::TomlParseFailed {
                path: origin.to_string(),
                source,
            })
        })
    }

    /// 实际使用的报告格式
    pub fn report_format(&self) -> ReportFormat {
        self.report_format
            .unwrap_or_else(|| ReportFormat::default_for(self.mode))
    }

    /// 把所有相对路径解析为相对于 `base_dir`
    pub fn resolve_paths(mut self, base_dir: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        resolve(&mut self.submissions_archive);
        resolve(&mut self.output);
        self.rubric.files.iter_mut().for_each(resolve);
        self.knowledge.files.iter_mut().for_each(resolve);
        if let Some(p) = self.system_prompt_file.as_mut() {
            resolve(p);
        }
        self
    }
}

/// 从 TOML 文件加载任务描述，相对路径以任务文件所在目录为准
pub async fn load_run_spec(path: &Path) -> AppResult<RunSpec> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let spec = RunSpec::from_toml_str(&content, &path.display().to_string())?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    tracing::info!("已加载任务文件: {}", path.display());
    Ok(spec.resolve_paths(base_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_structured_spec() {
        let spec = RunSpec::from_toml_str(
            r#"
mode = "structured"
submissions_archive = "travaux.zip"

[rubric]
text = "Clarté /10"
"#,
            "inline",
        )
        .unwrap();

        assert_eq!(spec.mode, EvaluationMode::Structured);
        assert_eq!(spec.output, PathBuf::from("evaluations_etudiants.zip"));
        assert!(!spec.rubric.is_empty());
        assert!(spec.knowledge.is_empty());
        assert!(spec.max_concurrent.is_none());
        assert_eq!(spec.report_format(), ReportFormat::Excel);
    }

    #[test]
    fn test_parse_free_form_with_overrides() {
        let spec = RunSpec::from_toml_str(
            r#"
mode = "free_form"
submissions_archive = "in/travaux.zip"
output = "/tmp/out.zip"
output_format_instructions = "Résumé puis points forts"
model = "gpt-4.1"
max_concurrent = 20

[knowledge]
urls = ["https://example.com/cours"]
"#,
            "inline",
        )
        .unwrap()
        .resolve_paths(Path::new("/jobs"));

        assert_eq!(spec.mode, EvaluationMode::FreeForm);
        assert_eq!(spec.submissions_archive, PathBuf::from("/jobs/in/travaux.zip"));
        assert_eq!(spec.output, PathBuf::from("/tmp/out.zip"));
        assert_eq!(spec.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(spec.max_concurrent, Some(20));
        assert_eq!(spec.knowledge.urls.len(), 1);
        assert_eq!(spec.report_format(), ReportFormat::Word);
    }

    #[test]
    fn test_explicit_report_format() {
        let spec = RunSpec::from_toml_str(
            "mode = \"structured\"\nsubmissions_archive = \"a.zip\"\nreport_format = \"html\"\n",
            "inline",
        )
        .unwrap();
        assert_eq!(spec.report_format(), ReportFormat::Html);

        let err = RunSpec::from_toml_str(
            "mode = \"structured\"\nsubmissions_archive = \"a.zip\"\nreport_format = \"pdf\"\n",
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::TomlParseFailed { .. })));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = RunSpec::from_toml_str(
            "mode = \"excel\"\nsubmissions_archive = \"a.zip\"\n",
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::TomlParseFailed { .. })));
    }
}
