//! 文档解析服务 - 业务能力层
//!
//! 把单个文件转换成纯文本。核心流程只依赖 [`DocumentNormalizer`] 这个接口，
//! [`BuiltinNormalizer`] 是随程序附带的实现。

use crate::error::NormalizeError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use regex::Regex;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::LazyLock;
use zip::ZipArchive;

/// 可以解析的扩展名，其余格式静默忽略
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["pdf", "docx", "xlsx", "xls", "txt", "md", "html", "htm"];

/// 文档 → 文本
///
/// - `Ok(Some(text))`: 解析成功
/// - `Ok(None)`: 不支持的格式，调用方静默忽略
/// - `Err(_)`: 支持的格式但无法解析
pub trait DocumentNormalizer: Send + Sync {
    fn normalize(&self, filename: &str, bytes: &[u8]) -> Result<Option<String>, NormalizeError>;
}

/// 小写扩展名
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// 内置解析器
///
/// txt/md 直接解码；html 去标签；docx 读取包内 XML；
/// pdf 用 `pdf-extract`；xlsx/xls 用 `calamine`。
#[derive(Debug, Default, Clone)]
pub struct BuiltinNormalizer;

impl DocumentNormalizer for BuiltinNormalizer {
    fn normalize(&self, filename: &str, bytes: &[u8]) -> Result<Option<String>, NormalizeError> {
        let Some(extension) = extension_of(filename) else {
            return Ok(None);
        };
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(None);
        }

        let text = match extension.as_str() {
            "txt" | "md" => String::from_utf8_lossy(bytes).into_owned(),
            "html" | "htm" => html_to_text(&String::from_utf8_lossy(bytes), false),
            "docx" => docx_to_text(filename, bytes)?,
            "xlsx" | "xls" => spreadsheet_to_text(filename, bytes)?,
            _ => pdf_to_text(filename, bytes)?,
        };
        Ok(Some(text))
    }
}

// ========== PDF ==========

/// pdf：逐页提取文本
///
/// 解析库遇到损坏的文件可能 panic，这里统一转成 `Malformed`。
fn pdf_to_text(filename: &str, bytes: &[u8]) -> Result<String, NormalizeError> {
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| malformed(filename, "PDF 解析器异常终止"))?
    .map_err(|e| malformed(filename, e))?;

    Ok(extracted.trim().to_string())
}

// ========== 表格 ==========

/// xlsx/xls：按工作表输出，每行非空单元格用 ` | ` 连接
fn spreadsheet_to_text(filename: &str, bytes: &[u8]) -> Result<String, NormalizeError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| malformed(filename, e))?;

    let mut parts = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| malformed(filename, e))?;

        let mut lines = vec![format!("=== Sheet: {} ===", sheet_name)];
        for row in range.rows() {
            let values: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, Data::Empty))
                .map(|cell| cell.to_string())
                .collect();
            if !values.is_empty() {
                lines.push(values.join(" | "));
            }
        }

        if lines.len() > 1 {
            parts.push(lines.join("\n"));
        }
    }

    Ok(parts.join("\n\n"))
}

// ========== HTML ==========

static DROPPED_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("合法正则")
});
static PAGE_CHROME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(nav|header|footer)\b[^>]*>.*?</(nav|header|footer)\s*>").expect("合法正则")
});
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/tr|/h[1-6]|/title)\b[^>]*>").expect("合法正则")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]+>").expect("合法正则"));

/// HTML → 文本，去掉脚本和样式，每行去空白并丢弃空行
///
/// `drop_page_chrome` 为 true 时同时去掉导航、页眉和页脚（网页抓取时使用）。
pub fn html_to_text(html: &str, drop_page_chrome: bool) -> String {
    let mut text = DROPPED_BLOCKS.replace_all(html, "").into_owned();
    if drop_page_chrome {
        text = PAGE_CHROME.replace_all(&text, "").into_owned();
    }
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "\n");
    let text = decode_entities(&text);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ========== Word ==========

static DOCX_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("合法正则"));
static DOCX_TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("合法正则"));

fn read_package_part(
    filename: &str,
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    part: &str,
) -> Result<Option<String>, NormalizeError> {
    let mut file = match archive.by_name(part) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(malformed(filename, e)),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| malformed(filename, e))?;
    Ok(Some(xml))
}

fn open_package<'a>(
    filename: &str,
    bytes: &'a [u8],
) -> Result<ZipArchive<Cursor<&'a [u8]>>, NormalizeError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| malformed(filename, e))
}

fn malformed(filename: &str, reason: impl std::fmt::Display) -> NormalizeError {
    NormalizeError::Malformed {
        filename: filename.to_string(),
        reason: reason.to_string(),
    }
}

/// docx：每个非空段落一块，块之间空一行（表格单元格同样是段落）
fn docx_to_text(filename: &str, bytes: &[u8]) -> Result<String, NormalizeError> {
    let mut archive = open_package(filename, bytes)?;
    let xml = read_package_part(filename, &mut archive, "word/document.xml")?
        .ok_or_else(|| malformed(filename, "缺少 word/document.xml"))?;

    let paragraphs: Vec<String> = DOCX_PARAGRAPH
        .find_iter(&xml)
        .map(|p| {
            DOCX_TEXT_RUN
                .captures_iter(p.as_str())
                .map(|c| decode_entities(&c[1]))
                .collect::<String>()
        })
        .filter(|p| !p.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n\n"))
}
