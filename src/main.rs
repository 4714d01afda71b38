use std::path::PathBuf;

use anyhow::{bail, Result};
use submission_grader::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env
    dotenvy::dotenv().ok();

    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env();

    // 任务文件：命令行参数 > GRADING_JOB > grading.toml
    let job_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GRADING_JOB").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("grading.toml"));

    // 初始化并运行应用
    let summary = App::initialize(config)?.run(&job_path).await?;

    if summary.succeeded == 0 {
        bail!("所有学生评估均失败，请检查日志");
    }

    Ok(())
}
