//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量调度和整体流程，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 加载任务文件，准备评分标准和参考资料
//! - 解压学生作业并转成文本
//! - 导出报告，输出全局统计信息
//!
//! ### `batch_evaluator` - 批量评估器
//! - 每名学生一个任务，Semaphore 控制并发
//! - 隔离单个失败，汇总完整结果
//! - 串行上报进度
//!
//! ## 层次关系
//!
//! ```text
//! app (处理一次运行)
//!     ↓
//! batch_evaluator (处理 Vec<学生>)
//!     ↓
//! workflow::EvaluationCall (处理单个学生)
//!     ↓
//! services (能力层：llm / 解压 / 文档 / 报告)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管流程，batch_evaluator 管并发
//! 2. **向下依赖**：编排层 → workflow → services
//! 3. **无业务逻辑**：只做调度和统计，不做具体评分判断

pub mod app;
pub mod batch_evaluator;

// 重新导出主要类型
pub use app::{App, RunSummary};
pub use batch_evaluator::{BatchEvaluator, Progress, ProgressFn};
