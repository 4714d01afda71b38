//! 压缩包解析服务 - 业务能力层
//!
//! 只负责把任意结构的作业压缩包还原成"学生 → 文件列表"，不关心文件内容。
//!
//! 支持两种目录结构，调用方无需声明：
//! 1. 简单结构：根目录下每个文件夹就是一名学生
//! 2. Moodle 导出：`作业/姓名_学号_assignsubmission_类型/文件`

use crate::error::ArchiveError;
use crate::models::Submission;
use indexmap::IndexMap;
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use tracing::debug;
use zip::ZipArchive;

/// macOS 打包时附带的元数据目录
const METADATA_FOLDER: &str = "__MACOSX";

/// Moodle 学生目录：`姓名_数字_assignsubmission_...`，姓名非贪婪匹配
static MOODLE_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_\d+_assignsubmission_").expect("Moodle 目录正则必须合法")
});

/// 从单个目录名中识别学生姓名
///
/// 只识别 Moodle 导出格式，返回去掉首尾空白的姓名；不匹配时返回 `None`。
pub fn derive_student_name(folder_name: &str) -> Option<String> {
    let captures = MOODLE_FOLDER.captures(folder_name)?;
    let name = captures.get(1)?.as_str().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// 从压缩包中提取每名学生的作业
///
/// - 跳过目录、`__MACOSX` 下的条目和以 `.` 开头的隐藏文件
/// - 跳过直接放在根目录的文件（无法归属到学生）
/// - 由浅到深查找第一个 Moodle 格式的目录，找不到则使用第一级目录名
/// - 同名学生的文件按遍历顺序合并
///
/// 空压缩包返回空结果，由调用方决定如何提示。
pub fn extract_student_submissions(
    archive_bytes: &[u8],
) -> Result<IndexMap<String, Submission>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|source| ArchiveError::InvalidArchive { source })?;

    let mut students: IndexMap<String, Submission> = IndexMap::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| ArchiveError::EntryRead {
                entry: format!("#{}", index),
                source: Box::new(source),
            })?;

        let entry_name = entry.name().to_string();
        if entry.is_dir() || entry_name.contains(METADATA_FOLDER) {
            continue;
        }

        let segments = path_segments(&entry_name);
        let Some((filename, folders)) = segments.split_last() else {
            continue;
        };

        if filename.starts_with('.') {
            continue;
        }

        if folders.is_empty() {
            debug!("跳过根目录文件: {}", entry_name);
            continue;
        }

        let student_name = folders
            .iter()
            .find_map(|folder| derive_student_name(folder))
            .unwrap_or_else(|| folders[0].to_string());

        let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut content)
            .map_err(|source| ArchiveError::EntryRead {
                entry: entry_name.clone(),
                source: Box::new(source),
            })?;

        debug!(
            "归档文件 {} → 学生 {} ({} 字节)",
            entry_name,
            student_name,
            content.len()
        );

        students
            .entry(student_name.clone())
            .or_insert_with(|| Submission::new(student_name))
            .push_file(*filename, content);
    }

    Ok(students)
}

/// 按 `/` 拆分条目路径，忽略空段和 `.`
fn path_segments(entry_name: &str) -> Vec<&str> {
    entry_name
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}
