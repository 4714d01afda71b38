//! 学生作业

/// 作业中的单个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFile {
    /// 文件名（不含学生目录）
    pub relative_filename: String,
    pub raw_bytes: Vec<u8>,
}

/// 一名学生的全部作业文件
///
/// 文件顺序即压缩包遍历顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub student_name: String,
    pub files: Vec<SubmissionFile>,
}

impl Submission {
    pub fn new(student_name: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            files: Vec::new(),
        }
    }

    pub fn push_file(&mut self, relative_filename: impl Into<String>, raw_bytes: Vec<u8>) {
        self.files.push(SubmissionFile {
            relative_filename: relative_filename.into(),
            raw_bytes,
        });
    }

    /// 所有文件名（按遍历顺序）
    pub fn filenames(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(|f| f.relative_filename.as_str())
            .collect()
    }
}
