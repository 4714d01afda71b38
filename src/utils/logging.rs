/// 日志工具模块
///
/// 提供运行横幅和统计输出的辅助函数
use tracing::info;

/// 记录程序启动信息
pub fn log_startup(model: &str, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量作业评估模式");
    info!("🤖 模型: {}", model);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录学生作业加载信息
pub fn log_students_loaded(found: usize, readable: usize) {
    info!("✓ 压缩包中找到 {} 名学生", found);
    info!("📋 其中 {} 名学生有可读取的作业\n", readable);
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `output_path`: 报告路径
pub fn print_final_stats(success: usize, failed: usize, total: usize, output_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部评估完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", output_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
