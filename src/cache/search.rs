//! 搜索结果缓存：读取时检查 TTL，超过高水位后清理过期条目

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::fingerprint::Fingerprint;
use crate::search::SearchResponse;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: Fingerprint,
    pub payload: Arc<SearchResponse>,
    pub created_at: Instant,
}

impl CacheEntry {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// 统计信息，平均年龄包含已过期但尚未清理的条目
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchCacheStats {
    pub count: usize,
    pub average_age_secs: Option<f64>,
}

pub struct SearchResultCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    ttl: Duration,
    sweep_threshold: usize,
}

impl SearchResultCache {
    pub fn new(ttl: Duration, sweep_threshold: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            sweep_threshold,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &Fingerprint) -> Option<CacheEntry> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &Fingerprint, now: Instant) -> Option<CacheEntry> {
        let entries = self.lock();
        entries
            .get(key)
            .filter(|entry| entry.age(now) < self.ttl)
            .cloned()
    }

    pub fn put(&self, key: Fingerprint, payload: SearchResponse) {
        self.put_at(key, payload, Instant::now())
    }

    fn put_at(&self, key: Fingerprint, payload: SearchResponse, now: Instant) {
        let mut entries = self.lock();
        entries.insert(
            key,
            CacheEntry {
                key,
                payload: Arc::new(payload),
                created_at: now,
            },
        );

        if entries.len() > self.sweep_threshold {
            let removed = Self::sweep_locked(&mut entries, self.ttl, now);
            if removed > 0 {
                log::info!("清理了 {} 个过期缓存条目", removed);
            }
        }
    }

    /// 删除所有超过 TTL 的条目，返回删除数量；运行时由 put 在超过高水位时触发
    #[cfg(test)]
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.lock();
        Self::sweep_locked(&mut entries, self.ttl, Instant::now())
    }

    fn sweep_locked(entries: &mut HashMap<Fingerprint, CacheEntry>, ttl: Duration, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.age(now) <= ttl);
        before - entries.len()
    }

    pub fn stats(&self) -> SearchCacheStats {
        self.stats_at(Instant::now())
    }

    fn stats_at(&self, now: Instant) -> SearchCacheStats {
        let entries = self.lock();
        let count = entries.len();
        let average_age_secs = if count == 0 {
            None
        } else {
            let total: f64 = entries.values().map(|e| e.age(now).as_secs_f64()).sum();
            Some(total / count as f64)
        };
        SearchCacheStats {
            count,
            average_age_secs,
        }
    }

    /// 清空缓存，返回清空前的条目数
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
