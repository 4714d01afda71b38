//! 批量评估器 - 编排层
//!
//! ## 职责
//!
//! 为每名学生调度一次独立的评估调用，并汇总所有结果。
//!
//! ## 核心功能
//!
//! 1. **并发控制**：Semaphore 作为准入闸门，同时进行的评估不超过上限
//! 2. **失败隔离**：单个任务的错误或 panic 只记录为该学生的失败结果
//! 3. **进度回调**：所有完成事件经由唯一的收集循环，计数严格递增
//! 4. **结果完整**：N 名学生恰好得到 N 个结果，顺序与提交顺序一致
//!
//! ## 设计特点
//!
//! - 每名学生一个 tokio 任务，许可在任务内部获取，上限可以很大
//! - 完成顺序不确定，不依赖完成顺序
//! - 不做任何业务判断，评估细节委托给 [`Evaluator`]

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::check_concurrency;
use crate::error::{ConfigError, EvaluationError};
use crate::models::{EvaluationMode, EvaluationOutcome, RunResult, StudentOutcome};
use crate::workflow::Evaluator;

/// 一次完成事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    /// 已完成数量，从 1 递增到 `total`
    pub completed: usize,
    pub total: usize,
    /// 刚完成的学生
    pub student_name: &'a str,
}

/// 进度回调，可以借用调用方的状态
pub type ProgressFn<'a> = dyn Fn(Progress<'_>) + Send + Sync + 'a;

/// 批量评估器
pub struct BatchEvaluator {
    evaluator: Arc<dyn Evaluator>,
    mode: EvaluationMode,
    concurrency_limit: usize,
}

type TaskOutput = (usize, String, Result<EvaluationOutcome, EvaluationError>);

impl BatchEvaluator {
    /// 创建批量评估器，`concurrency_limit` 必须在 `1..=MAX_CONCURRENCY` 之内
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        mode: EvaluationMode,
        concurrency_limit: usize,
    ) -> Result<Self, ConfigError> {
        check_concurrency(concurrency_limit)?;
        Ok(Self {
            evaluator,
            mode,
            concurrency_limit,
        })
    }

    /// 评估所有学生
    ///
    /// `submissions` 为 (学生姓名, 作业文本)。重复的姓名只评估第一次出现的那份。
    /// 所有任务结束后才返回；单个失败不会中断其他任务。
    pub async fn run(
        &self,
        submissions: Vec<(String, String)>,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> RunResult {
        let submissions = dedupe_by_name(submissions);
        let total = submissions.len();
        let names: Vec<String> = submissions.iter().map(|(name, _)| name.clone()).collect();

        info!(
            "📦 开始评估 {} 名学生 (最大并发: {})",
            total, self.concurrency_limit
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();

        for (index, (student_name, submission_text)) in submissions.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let evaluator = self.evaluator.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        AssertUnwindSafe(evaluator.evaluate(&student_name, &submission_text))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|payload| {
                                Err(EvaluationError::TaskPanicked {
                                    message: panic_message(payload.as_ref()),
                                })
                            })
                    }
                    Err(_) => Err(EvaluationError::TaskAborted),
                };
                (index, student_name, result)
            });
        }

        // 唯一的收集点：计数和回调在这里串行完成
        let mut slots: Vec<Option<StudentOutcome>> = (0..total).map(|_| None).collect();
        let mut completed = 0;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, student_name, result)) => {
                    completed += 1;
                    log_completion(completed, total, &student_name, &result);
                    notify(on_progress, completed, total, &student_name);
                    slots[index] = Some(StudentOutcome {
                        student_name,
                        result,
                    });
                }
                Err(e) => {
                    error!("评估任务执行失败: {}", e);
                }
            }
        }

        // 没能返回结果的任务记为中止，保证每名学生都有结果
        let mut outcomes = Vec::with_capacity(total);
        for (slot, student_name) in slots.into_iter().zip(names) {
            let outcome = match slot {
                Some(outcome) => outcome,
                None => {
                    completed += 1;
                    let result = Err(EvaluationError::TaskAborted);
                    log_completion(completed, total, &student_name, &result);
                    notify(on_progress, completed, total, &student_name);
                    StudentOutcome {
                        student_name,
                        result,
                    }
                }
            };
            outcomes.push(outcome);
        }

        RunResult {
            mode: self.mode,
            outcomes,
        }
    }
}

fn dedupe_by_name(submissions: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    submissions
        .into_iter()
        .filter(|(name, _)| {
            let first = seen.insert(name.clone());
            if !first {
                warn!("⚠️ 学生 {} 重复出现，只评估第一份作业", name);
            }
            first
        })
        .collect()
}

fn notify(
    on_progress: Option<&ProgressFn<'_>>,
    completed: usize,
    total: usize,
    student_name: &str,
) {
    if let Some(callback) = on_progress {
        callback(Progress {
            completed,
            total,
            student_name,
        });
    }
}

fn log_completion(
    completed: usize,
    total: usize,
    student_name: &str,
    result: &Result<EvaluationOutcome, EvaluationError>,
) {
    match result {
        Ok(_) => info!("[{}/{}] ✓ {} 评估完成", completed, total, student_name),
        Err(e) => warn!("[{}/{}] ❌ {} 评估失败: {}", completed, total, student_name, e),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}
