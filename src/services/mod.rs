pub mod archive_extractor;
pub mod document_normalizer;
pub mod excel_report;
pub mod llm_service;
pub mod report_renderer;
pub mod url_fetcher;
pub mod word_report;

pub use archive_extractor::{derive_student_name, extract_student_submissions};
pub use document_normalizer::{BuiltinNormalizer, DocumentNormalizer};
pub use excel_report::excel_workbook;
pub use llm_service::{ChatBackend, ChatRequest, LlmService, ResponseSchema};
pub use report_renderer::{ReportRenderer, ZipReportRenderer};
pub use url_fetcher::UrlFetcher;
pub use word_report::word_document;
