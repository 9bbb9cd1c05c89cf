//! 带缓存的搜索流程：查缓存 -> nix-env -> 标注已安装状态 -> 写回缓存

use std::sync::Arc;
use std::time::Duration;

use super::{NixPackageInfo, PackageListing, PackageQueryService, PackageRecord, SearchResponse};
use crate::cache::{Fingerprint, SearchResultCache};
use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::installed::{InstalledSnapshot, ProbeChain};

pub struct SearchOrchestrator {
    service: Arc<dyn PackageQueryService>,
    cache: Arc<SearchResultCache>,
    installed: Arc<ProbeChain>,
    search_timeout: Duration,
    result_limit: usize,
    max_query_len: usize,
    description_limit: usize,
}

impl SearchOrchestrator {
    pub fn new(
        service: Arc<dyn PackageQueryService>,
        cache: Arc<SearchResultCache>,
        installed: Arc<ProbeChain>,
        config: &Config,
    ) -> Self {
        Self {
            service,
            cache,
            installed,
            search_timeout: config.search_timeout(),
            result_limit: config.result_limit,
            max_query_len: config.max_query_len,
            description_limit: config.description_limit,
        }
    }

    /// 执行一次搜索，错误也以响应形式返回
    pub async fn query(&self, raw_query: &str) -> SearchResponse {
        let query = raw_query.trim();
        if query.is_empty() {
            return SearchResponse::empty();
        }

        match self.try_query(query).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("搜索 '{}' 失败: {}", query, e);
                SearchResponse::failure(e.to_string())
            }
        }
    }

    async fn try_query(&self, query: &str) -> Result<SearchResponse> {
        if query.chars().count() > self.max_query_len {
            return Err(SearchError::InvalidQuery(format!(
                "query longer than {} characters",
                self.max_query_len
            )));
        }

        let key = Fingerprint::of(query);
        if let Some(entry) = self.cache.get(&key) {
            log::info!("缓存命中 '{}' ({})", query, entry.key);
            let mut response = (*entry.payload).clone();
            response.cached = true;
            return Ok(response);
        }

        log::info!("正在搜索 '{}'...", query);
        let listing = tokio::time::timeout(self.search_timeout, self.service.search(query))
            .await
            .map_err(|_| SearchError::QueryTimeout(self.search_timeout.as_secs()))??;

        let snapshot = self.installed.current().await;
        let response = self.assemble(listing, &snapshot)?;

        self.cache.put(key, response.clone());
        log::info!("已缓存 '{}' 的搜索结果 ({} 条)", query, response.results.len());
        Ok(response)
    }

    fn assemble(&self, listing: PackageListing, snapshot: &InstalledSnapshot) -> Result<SearchResponse> {
        let total = listing.len();
        let available = snapshot.is_available();

        let results = listing
            .into_iter()
            .take(self.result_limit)
            .map(|(name, value)| {
                let info: NixPackageInfo = serde_json::from_value(value)
                    .map_err(|e| SearchError::Parse(format!("{}: {}", name, e)))?;
                Ok(PackageRecord {
                    installed: snapshot.is_installed(&name),
                    installed_data_available: available,
                    version: info.version.unwrap_or_else(|| "unknown".to_string()),
                    description: info
                        .meta
                        .description
                        .map(|text| clean_description(&text, self.description_limit))
                        .filter(|text| !text.is_empty())
                        .unwrap_or_else(|| "No description".to_string()),
                    name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResponse::success(results, total, available))
    }
}

/// 合并连续空白为单个空格，并截断到 `limit` 个字符
fn clean_description(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(limit)
        .collect()
}
