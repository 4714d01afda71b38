use crate::config::MAX_CONCURRENCY;
use thiserror::Error;

/// 应用程序错误类型
///
/// 只用于"整次运行失败"的场景；单个学生的评估失败见 [`EvaluationError`]。
#[derive(Debug, Error)]
pub enum AppError {
    /// 压缩包相关错误
    #[error("压缩包错误: {0}")]
    Archive(#[from] ArchiveError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 报告生成错误
    #[error("报告错误: {0}")]
    Render(#[from] RenderError),
    /// 压缩包里没有任何学生
    #[error("压缩包中没有找到任何学生作业")]
    NoStudents,
    /// 所有学生的文件都无法读取
    #[error("没有任何可读取的学生作业")]
    NoReadableSubmissions,
}

/// 压缩包相关错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 不是合法的 zip 容器
    #[error("无效的压缩包: {source}")]
    InvalidArchive {
        #[source]
        source: zip::result::ZipError,
    },
    /// 读取压缩包条目失败
    #[error("读取压缩包条目失败 ({entry}): {source}")]
    EntryRead {
        entry: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 请求构建失败
    #[error("LLM 请求构建失败: {source}")]
    RequestBuildFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 并发数必须为正整数
    #[error("并发数必须在 1 到 {max} 之间 (当前: {value})", max = MAX_CONCURRENCY)]
    InvalidConcurrency { value: usize },
    /// 结构化评估缺少评分标准
    #[error("结构化评估需要提供评分标准（文件或文本）")]
    MissingRubric,
    /// 自由格式评估缺少输出格式说明
    #[error("自由格式评估需要提供输出格式说明")]
    MissingOutputFormat,
}

/// 文档解析错误
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// 文档内部结构损坏
    #[error("文档解析失败 ({filename}): {reason}")]
    Malformed { filename: String, reason: String },
}

/// 报告生成错误
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("写入报告压缩包失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("写入报告内容失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("序列化汇总失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("生成 Excel 报告失败: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),
    #[error("生成 Word 文档失败 ({student_name}): {reason}")]
    Word {
        student_name: String,
        reason: String,
    },
}

/// 单个学生的评估失败
///
/// 这是数据而不是致命错误：编排层把它记录进 `RunResult`，运行继续。
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// 网络或 API 错误
    #[error("{0}")]
    Llm(#[from] LlmError),
    /// 单次调用超时
    #[error("LLM 调用超时 ({timeout:?})")]
    Timeout { timeout: std::time::Duration },
    /// 返回文本为空
    #[error("LLM 返回的评估内容为空")]
    EmptyResponse,
    /// 返回 JSON 不符合评分结构
    #[error("评估结果不符合结构要求: {source}")]
    SchemaValidation {
        #[source]
        source: serde_json::Error,
    },
    /// 评估任务内部 panic
    #[error("评估任务异常终止: {message}")]
    TaskPanicked { message: String },
    /// 评估任务没有返回结果
    #[error("评估任务被中止")]
    TaskAborted,
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }
}

impl LlmError {
    /// 创建LLM API调用错误
    pub fn api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
