//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 串起一次完整的评估运行：
//!
//! 1. **加载任务**：读取 TOML 任务文件
//! 2. **准备上下文**：解析评分标准、参考资料（文件 / 网页 / 文本）
//! 3. **提取作业**：解压并按学生归档，逐个文件转成文本
//! 4. **批量评估**：委托 [`BatchEvaluator`]
//! 5. **导出报告**：按任务文件的 `report_format` 生成 zip 并写入磁盘
//!
//! 致命错误（压缩包无效、没有学生、没有可读作业、缺少必要输入）在任何评估调用之前返回。

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{load_run_spec, ReportFormat, RunResult, RunSpec, SourceSpec, Submission};
use crate::orchestrator::batch_evaluator::{BatchEvaluator, Progress};
use crate::services::archive_extractor::extract_student_submissions;
use crate::services::document_normalizer::{BuiltinNormalizer, DocumentNormalizer};
use crate::services::llm_service::{ChatBackend, LlmService};
use crate::services::report_renderer::{ReportRenderer, ZipReportRenderer};
use crate::services::url_fetcher::{parse_urls_from_text, UrlFetcher};
use crate::utils::logging::{log_startup, log_students_loaded, print_final_stats};
use crate::workflow::{EvaluationCall, EvaluationContext, DEFAULT_SYSTEM_PROMPT};

/// 一次运行的统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub output: String,
}

/// 应用主结构
pub struct App {
    config: Config,
    backend: Arc<dyn ChatBackend>,
    normalizer: Arc<dyn DocumentNormalizer>,
    renderer: Arc<dyn ReportRenderer>,
}

impl App {
    /// 初始化应用（真实 LLM 服务 + 内置解析器和报告）
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        log_startup(&config.llm_model_name, config.max_concurrent_evaluations);

        let backend = Arc::new(LlmService::new(&config));
        Ok(Self::with_components(
            config,
            backend,
            Arc::new(BuiltinNormalizer),
            Arc::new(ZipReportRenderer),
        ))
    }

    /// 使用自定义组件创建应用
    pub fn with_components(
        config: Config,
        backend: Arc<dyn ChatBackend>,
        normalizer: Arc<dyn DocumentNormalizer>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            config,
            backend,
            normalizer,
            renderer,
        }
    }

    /// 按任务文件运行
    pub async fn run(&self, job_path: &Path) -> Result<RunSummary> {
        let spec = load_run_spec(job_path).await?;
        self.run_spec(spec).await
    }

    /// 运行一次评估
    pub async fn run_spec(&self, spec: RunSpec) -> Result<RunSummary> {
        // 准备共享上下文
        let context = Arc::new(self.build_context(&spec).await?);

        // 提取学生作业
        info!("\n📁 正在解析学生作业: {}", spec.submissions_archive.display());
        let archive_bytes = fs::read(&spec.submissions_archive).await.map_err(|e| {
            AppError::file_read_failed(spec.submissions_archive.display().to_string(), e)
        })?;
        let students = extract_student_submissions(&archive_bytes).map_err(AppError::from)?;
        if students.is_empty() {
            return Err(AppError::NoStudents.into());
        }

        let submissions: Vec<(String, String)> = students
            .values()
            .filter_map(|submission| {
                self.normalize_submission(submission)
                    .map(|text| (submission.student_name.clone(), text))
            })
            .collect();
        log_students_loaded(students.len(), submissions.len());
        if submissions.is_empty() {
            return Err(AppError::NoReadableSubmissions.into());
        }

        // 批量评估
        let evaluator = Arc::new(EvaluationCall::new(self.backend.clone(), context.clone()));
        let batch = BatchEvaluator::new(evaluator, context.mode, context.concurrency_limit)
            .map_err(AppError::from)?;

        let on_progress = |progress: Progress<'_>| {
            info!(
                "⏳ 评估进度 ({}/{}) - 已完成: {}",
                progress.completed, progress.total, progress.student_name
            );
        };
        let result = batch.run(submissions, Some(&on_progress)).await;

        for (student_name, error) in result.failures() {
            warn!("❌ {} 评估失败: {}", student_name, error);
        }

        // 导出报告
        let output = spec.output.display().to_string();
        self.write_report(&result, spec.report_format(), &spec.output).await?;

        print_final_stats(result.succeeded(), result.failed(), result.total(), &output);

        Ok(RunSummary {
            total: result.total(),
            succeeded: result.succeeded(),
            failed: result.failed(),
            output,
        })
    }

    async fn build_context(&self, spec: &RunSpec) -> Result<EvaluationContext> {
        info!("📋 读取评分标准...");
        let rubric = self.collect_source(&spec.rubric).await?;

        info!("📖 读取参考资料...");
        let knowledge_base = self.collect_source(&spec.knowledge).await?;

        let system_prompt = match &spec.system_prompt_file {
            Some(path) => fs::read_to_string(path)
                .await
                .with_context(|| format!("无法读取系统提示词: {}", path.display()))?,
            None => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        let mut context = EvaluationContext::new(spec.mode, rubric, &self.config);
        context.knowledge_base = knowledge_base;
        context.custom_instructions = spec.custom_instructions.clone();
        context.output_format_instructions = Some(spec.output_format_instructions.clone())
            .filter(|s| !s.trim().is_empty());
        context.system_prompt = system_prompt;
        if let Some(model) = &spec.model {
            context.model = model.clone();
        }
        if let Some(limit) = spec.max_concurrent {
            context.concurrency_limit = limit;
        }

        context.validate().map_err(AppError::from)?;
        Ok(context)
    }

    /// 合并一段材料的所有来源：文件 → 网页 → 直接输入的文本
    async fn collect_source(&self, source: &SourceSpec) -> Result<String> {
        if source.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::new();

        for path in &source.files {
            let bytes = fs::read(path)
                .await
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            if let Some(text) = self.normalize_file(&filename, &bytes) {
                parts.push(format!("=== {} ===\n{}", filename, text));
            }
        }

        let mut urls = Vec::new();
        for entry in &source.urls {
            let parsed = parse_urls_from_text(entry);
            for rejected in &parsed.rejected {
                warn!("⚠️ URL 格式无效，已忽略: {}", rejected);
            }
            urls.extend(parsed.valid);
        }
        if !urls.is_empty() {
            info!("🌐 获取 {} 个网页的内容...", urls.len());
            let fetcher = UrlFetcher::new()?;
            for (url, text) in fetcher.fetch_all(&urls).await {
                parts.push(format!("=== {} ===\n{}", url, text));
            }
        }

        let text = source.text.trim();
        if !text.is_empty() {
            parts.push(format!("=== 直接输入 ===\n{}", text));
        }

        Ok(parts.join("\n\n"))
    }

    /// 单个文件转文本；不支持或解析失败时返回 `None`
    fn normalize_file(&self, filename: &str, bytes: &[u8]) -> Option<String> {
        match self.normalizer.normalize(filename, bytes) {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(Some(_)) => {
                debug!("文件没有文本内容: {}", filename);
                None
            }
            Ok(None) => {
                debug!("跳过不支持的文件: {}", filename);
                None
            }
            Err(e) => {
                warn!("⚠️ {}", e);
                None
            }
        }
    }

    /// 合并一名学生的所有可读文件；一个都读不出来时返回 `None`
    fn normalize_submission(&self, submission: &Submission) -> Option<String> {
        let parts: Vec<String> = submission
            .files
            .iter()
            .filter_map(|file| {
                self.normalize_file(&file.relative_filename, &file.raw_bytes)
                    .map(|text| format!("=== {} ===\n{}", file.relative_filename, text))
            })
            .collect();

        if parts.is_empty() {
            warn!("⚠️ 没有可读取的文件: {}", submission.student_name);
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    async fn write_report(
        &self,
        result: &RunResult,
        format: ReportFormat,
        output: &Path,
    ) -> AppResult<()> {
        info!("📝 正在生成报告 ({:?})...", format);
        let bytes = self.renderer.render(result, format)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
        }
        fs::write(output, bytes)
            .await
            .map_err(|e| AppError::file_write_failed(output.display().to_string(), e))?;
        Ok(())
    }
}
