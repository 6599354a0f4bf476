//! 製品ページの取得
//!
//! プロキシ指定時は `プロキシURL?url=対象URL` に問い合わせる。
//! 再試行はしない（失敗はそのまま呼び出し側へ返す）

use crate::error::{PasteError, Result};
use reqwest::Url;
use std::time::Duration;

const USER_AGENT: &str = concat!("smart-paste/", env!("CARGO_PKG_VERSION"));

/// 実際に問い合わせるURLを組み立てる
pub fn build_request_url(target: &str, proxy: Option<&str>) -> Result<Url> {
    let target_url = Url::parse(target.trim())
        .map_err(|e| PasteError::Fetch(format!("URLが不正です: {} ({})", target, e)))?;

    if !matches!(target_url.scheme(), "http" | "https") {
        return Err(PasteError::Fetch(format!("http/https 以外のURLは取得できません: {}", target)));
    }

    match proxy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(proxy) => Url::parse_with_params(proxy, &[("url", target_url.as_str())])
            .map_err(|e| PasteError::Fetch(format!("プロキシURLが不正です: {} ({})", proxy, e))),
        None => Ok(target_url),
    }
}

/// ページ本文を取得
pub async fn fetch_page(target: &str, proxy: Option<&str>, timeout_seconds: u64) -> Result<String> {
    let request_url = build_request_url(target, proxy)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PasteError::Fetch(e.to_string()))?;

    tracing::info!(url = %target, via_proxy = proxy.is_some(), "ページを取得");

    let response = client
        .get(request_url)
        .send()
        .await
        .map_err(|e| PasteError::Fetch(format!("{}: {}", target, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PasteError::Fetch(format!("HTTP {}: {}", status, target)));
    }

    let body = response
        .text()
        .await
        .map_err(|e| PasteError::Fetch(format!("{}: {}", target, e)))?;

    tracing::debug!(chars = body.len(), "ページ取得完了");
    Ok(body)
}
