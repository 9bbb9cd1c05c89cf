//! 缓存管理：统计与清空

use std::sync::Arc;

use serde::Serialize;

use crate::cache::SearchResultCache;
use crate::installed::ProbeChain;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub search_cache: SearchCacheSection,
    pub installed_cache: InstalledCacheSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCacheSection {
    pub entries: usize,
    /// 秒，没有条目时为 null
    pub avg_age: Option<u64>,
    pub ttl: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledCacheSection {
    pub packages: usize,
    /// 秒，从未刷新时为 null
    pub age: Option<u64>,
    pub ttl: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub cleared: bool,
    pub entries_removed: usize,
}

pub struct CacheAdministration {
    cache: Arc<SearchResultCache>,
    installed: Arc<ProbeChain>,
}

impl CacheAdministration {
    pub fn new(cache: Arc<SearchResultCache>, installed: Arc<ProbeChain>) -> Self {
        Self { cache, installed }
    }

    pub fn stats(&self) -> CacheStats {
        let search = self.cache.stats();
        let snapshot = self.installed.snapshot();

        CacheStats {
            search_cache: SearchCacheSection {
                entries: search.count,
                avg_age: search.average_age_secs.map(|secs| secs.round() as u64),
                ttl: self.cache.ttl().as_secs(),
            },
            installed_cache: InstalledCacheSection {
                packages: snapshot.names.len(),
                age: snapshot.age().map(|age| age.as_secs()),
                ttl: self.installed.ttl().as_secs(),
            },
        }
    }

    /// 清空搜索缓存并重置已安装快照
    pub fn clear(&self) -> ClearReport {
        let removed = self.cache.clear();
        self.installed.reset();
        log::info!("已清空缓存，移除 {} 个条目", removed);
        ClearReport {
            cleared: true,
            entries_removed: removed,
        }
    }
}
