//! 网页抓取服务 - 业务能力层
//!
//! 只负责把参考资料网页变成纯文本

use crate::services::document_normalizer::html_to_text;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
    )
    .expect("URL 正则必须合法")
});

/// 按空白切分后的 URL 解析结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedUrls {
    /// 合法的 http/https 地址
    pub valid: Vec<String>,
    /// 无法识别的片段
    pub rejected: Vec<String>,
}

/// 从文本中提取 URL（按空白分隔，只保留 http/https）
pub fn parse_urls_from_text(text: &str) -> ParsedUrls {
    let (valid, rejected) = text
        .split_whitespace()
        .map(str::to_string)
        .partition(|candidate| URL_PATTERN.is_match(candidate));
    ParsedUrls { valid, rejected }
}

/// 网页抓取服务
pub struct UrlFetcher {
    client: reqwest::Client,
}

impl UrlFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("无法创建 HTTP 客户端")?;
        Ok(Self { client })
    }

    /// 抓取单个网页并提取正文文本
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", url))?
            .error_for_status()
            .with_context(|| format!("服务器返回错误: {}", url))?;

        let body = response
            .text()
            .await
            .with_context(|| format!("读取响应失败: {}", url))?;

        Ok(html_to_text(&body, true))
    }

    /// 依次抓取多个网页，失败或内容为空的跳过
    ///
    /// 返回 (url, 文本) 列表
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<(String, String)> {
        let mut results = Vec::new();
        for url in urls {
            match self.fetch_text(url).await {
                Ok(text) if !text.is_empty() => {
                    info!("🌐 已获取网页内容: {} ({} 字符)", url, text.chars().count());
                    results.push((url.clone(), text));
                }
                Ok(_) => warn!("⚠️ 网页没有可用文本: {}", url),
                Err(e) => warn!("⚠️ 无法获取网页 {}: {:#}", url, e),
            }
        }
        if results.len() < urls.len() {
            warn!("⚠️ {} 个 URL 未能获取", urls.len() - results.len());
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urls_from_text() {
        let text = "https://exemple.com/cours\n  http://localhost:8080/ref?x=1 ftp://nope.org \
                    pas-une-url https://192.168.1.10 http://sans-tld";

        let parsed = parse_urls_from_text(text);
        assert_eq!(
            parsed.valid,
            vec![
                "https://exemple.com/cours",
                "http://localhost:8080/ref?x=1",
                "https://192.168.1.10",
            ]
        );
        assert_eq!(
            parsed.rejected,
            vec!["ftp://nope.org", "pas-une-url", "http://sans-tld"]
        );
    }

    #[test]
    fn test_rejected_tokens_counted_per_token() {
        // 一条记录里两个合法地址，不能掩盖另一条记录里的无效地址
        let entries = ["https://a.com/x https://b.com/y", "pas-une-url"];
        let rejected: usize = entries
            .iter()
            .map(|entry| parse_urls_from_text(entry).rejected.len())
            .sum();
        assert_eq!(rejected, 1);
    }
}
