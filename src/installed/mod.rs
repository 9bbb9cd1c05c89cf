//! 已安装包检测模块 — 按顺序尝试多个检测策略，结果带 TTL 缓存

pub mod matcher;
pub mod parser;
pub mod probes;

pub use matcher::is_installed;
pub use probes::default_probes;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{ProbeError, SearchError};

/// 一种已安装包检测方式
#[async_trait]
pub trait InstallationProbe: Send + Sync {
    fn name(&self) -> &str;

    /// 成功时返回裸包名集合（可以为空）
    async fn detect(&self) -> Result<HashSet<String>, ProbeError>;
}

/// 某次刷新得到的已安装包集合，整体替换，不做局部修改
#[derive(Debug, Clone, Default)]
pub struct InstalledSnapshot {
    pub names: HashSet<String>,
    /// None 表示从未刷新或已被重置
    pub captured_at: Option<Instant>,
}

impl InstalledSnapshot {
    pub fn is_available(&self) -> bool {
        !self.names.is_empty()
    }

    pub fn is_installed(&self, candidate: &str) -> bool {
        is_installed(candidate, &self.names)
    }

    pub fn age(&self) -> Option<Duration> {
        self.captured_at.map(|at| at.elapsed())
    }

    fn is_stale(&self, ttl: Duration, now: Instant) -> bool {
        match self.captured_at {
            Some(at) => now.saturating_duration_since(at) >= ttl,
            None => true,
        }
    }
}

pub struct ProbeChain {
    probes: Vec<Box<dyn InstallationProbe>>,
    ttl: Duration,
    probe_timeout: Duration,
    snapshot: RwLock<Arc<InstalledSnapshot>>,
    /// 每次 reset() 加一，刷新完成时据此判断结果是否已作废
    generation: AtomicU64,
    /// 串行化刷新，避免并发请求同时执行检测命令
    refresh_gate: Mutex<()>,
}

impl ProbeChain {
    pub fn new(probes: Vec<Box<dyn InstallationProbe>>, ttl: Duration, probe_timeout: Duration) -> Self {
        Self {
            probes,
            ttl,
            probe_timeout,
            snapshot: RwLock::new(Arc::new(InstalledSnapshot::default())),
            generation: AtomicU64::new(0),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 当前快照，不触发刷新
    pub fn snapshot(&self) -> Arc<InstalledSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 仅当期间没有发生 reset() 时写入快照；结果总是返回给调用方
    fn store(&self, snapshot: InstalledSnapshot, generation: u64) -> Arc<InstalledSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) == generation {
            *slot = snapshot.clone();
        } else {
            log::info!("刷新期间缓存已被清空，丢弃本次检测结果");
        }
        snapshot
    }

    /// 返回快照，过期时先刷新
    pub async fn current(&self) -> Arc<InstalledSnapshot> {
        self.current_at(Instant::now()).await
    }

    async fn current_at(&self, now: Instant) -> Arc<InstalledSnapshot> {
        let snapshot = self.snapshot();
        if !snapshot.is_stale(self.ttl, now) {
            return snapshot;
        }

        let _gate = self.refresh_gate.lock().await;
        // 等待期间可能已经有其他请求完成了刷新
        let snapshot = self.snapshot();
        if !snapshot.is_stale(self.ttl, now) {
            return snapshot;
        }
        self.refresh_locked().await
    }

    /// 立即刷新快照
    pub async fn refresh(&self) -> Arc<InstalledSnapshot> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Arc<InstalledSnapshot> {
        let generation = self.generation.load(Ordering::SeqCst);
        log::info!("正在刷新已安装包缓存...");
        let names = match self.detect().await {
            Ok(names) => names,
            Err(e) => {
                log::warn!("{}，已安装状态功能暂时停用", e);
                HashSet::new()
            }
        };
        // 全部失败也更新时间戳，避免每个请求都重新尝试
        let snapshot = InstalledSnapshot {
            names,
            captured_at: Some(Instant::now()),
        };
        self.store(snapshot, generation)
    }

    /// 依次尝试每个策略，返回第一个成功的结果
    async fn detect(&self) -> Result<HashSet<String>, SearchError> {
        for probe in &self.probes {
            log::debug!("尝试 '{}'...", probe.name());
            match tokio::time::timeout(self.probe_timeout, probe.detect()).await {
                Ok(Ok(names)) => {
                    log::info!("通过 '{}' 找到 {} 个已安装包", probe.name(), names.len());
                    return Ok(names);
                }
                Ok(Err(e)) => log::warn!("'{}' 失败: {}", probe.name(), e),
                Err(_) => log::warn!(
                    "'{}' 失败: {}",
                    probe.name(),
                    ProbeError::Timeout {
                        command: probe.name().to_string(),
                        secs: self.probe_timeout.as_secs(),
                    }
                ),
            }
        }
        Err(SearchError::ProbeUnavailable)
    }

    /// 重置为空快照，下次 current() 必定刷新
    pub fn reset(&self) {
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        *slot = Arc::new(InstalledSnapshot::default());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// 测试用检测策略，记录调用次数
    pub(crate) struct FakeProbe {
        label: String,
        result: Option<Vec<&'static str>>,
        delay: Duration,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeProbe {
        pub fn ok(label: &str, names: Vec<&'static str>) -> Self {
            Self {
                label: label.to_string(),
                result: Some(names),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(label: &str) -> Self {
            Self {
                result: None,
                ..Self::ok(label, Vec::new())
            }
        }

        pub fn slow(label: &str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok(label, vec!["slow"])
            }
        }
    }

    #[async_trait]
    impl InstallationProbe for FakeProbe {
        fn name(&self) -> &str {
            &self.label
        }

        async fn detect(&self) -> Result<HashSet<String>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.result {
                Some(names) => Ok(names.iter().map(|s| s.to_string()).collect()),
                None => Err(ProbeError::Empty(self.label.clone())),
            }
        }
    }

    fn build_chain(probes: Vec<FakeProbe>) -> (ProbeChain, Vec<Arc<AtomicUsize>>) {
        let counters = probes.iter().map(|p| p.calls.clone()).collect();
        let boxed = probes
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn InstallationProbe>)
            .collect();
        (
            ProbeChain::new(boxed, Duration::from_secs(300), Duration::from_millis(200)),
            counters,
        )
    }

    fn calls(counters: &[Arc<AtomicUsize>]) -> Vec<usize> {
        counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let (chain, counters) = build_chain(vec![
            FakeProbe::ok("a", vec!["firefox"]),
            FakeProbe::ok("b", vec!["vim"]),
            FakeProbe::ok("c", vec!["git"]),
        ]);

        let snapshot = chain.current().await;
        assert!(snapshot.names.contains("firefox"));
        assert_eq!(snapshot.names.len(), 1);
        assert_eq!(calls(&counters), vec![1, 0, 0]);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_strategy() {
        let (chain, counters) = build_chain(vec![
            FakeProbe::failing("a"),
            FakeProbe::ok("b", vec!["vim"]),
            FakeProbe::ok("c", vec!["git"]),
        ]);

        let snapshot = chain.current().await;
        assert!(snapshot.names.contains("vim"));
        assert_eq!(calls(&counters), vec![1, 1, 0]);
    }

    #[tokio::test]
    async fn test_empty_success_stops_chain() {
        let (chain, counters) = build_chain(vec![FakeProbe::ok("a", vec![]), FakeProbe::ok("b", vec!["vim"])]);

        let snapshot = chain.current().await;
        assert!(snapshot.names.is_empty());
        assert!(snapshot.captured_at.is_some());
        assert_eq!(calls(&counters), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_all_failures_yield_empty_snapshot_with_timestamp() {
        let (chain, counters) = build_chain(vec![
            FakeProbe::failing("a"),
            FakeProbe::failing("b"),
            FakeProbe::failing("c"),
        ]);

        let before = Instant::now();
        let snapshot = chain.current().await;
        assert!(snapshot.names.is_empty());
        assert!(!snapshot.is_available());
        assert!(snapshot.captured_at.unwrap() >= before);
        assert_eq!(calls(&counters), vec![1, 1, 1]);

        // 失败结果同样被缓存，TTL 内不再重试
        chain.current().await;
        assert_eq!(calls(&counters), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_timed_out_strategy_is_skipped() {
        let (chain, counters) = build_chain(vec![
            FakeProbe::slow("a", Duration::from_secs(5)),
            FakeProbe::ok("b", vec!["vim"]),
        ]);

        let snapshot = chain.current().await;
        assert!(snapshot.names.contains("vim"));
        assert_eq!(calls(&counters), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_snapshot_is_reused_within_ttl_and_refreshed_after() {
        let (chain, counters) = build_chain(vec![FakeProbe::ok("a", vec!["firefox"])]);
        let t0 = Instant::now();

        chain.current_at(t0).await;
        chain.current_at(t0 + Duration::from_secs(299)).await;
        assert_eq!(calls(&counters), vec![1]);

        // 时间戳取自检测完成之后，略晚于 t0
        chain.current_at(t0 + Duration::from_secs(301)).await;
        assert_eq!(calls(&counters), vec![2]);
    }

    #[tokio::test]
    async fn test_captured_at_is_taken_after_detection() {
        let chain = ProbeChain::new(
            vec![Box::new(FakeProbe {
                delay: Duration::from_millis(100),
                ..FakeProbe::ok("a", vec!["firefox"])
            })],
            Duration::from_secs(300),
            Duration::from_secs(2),
        );

        let before = Instant::now();
        let snapshot = chain.current().await;
        let captured_at = snapshot.captured_at.unwrap();
        assert!(captured_at.duration_since(before) >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_reset_during_refresh_is_not_overwritten() {
        let probe = FakeProbe {
            delay: Duration::from_millis(300),
            ..FakeProbe::ok("a", vec!["firefox"])
        };
        let counter = probe.calls.clone();
        let chain = Arc::new(ProbeChain::new(
            vec![Box::new(probe)],
            Duration::from_secs(300),
            Duration::from_secs(2),
        ));

        let in_flight = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.current().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        chain.reset();

        // 进行中的请求仍拿到检测结果，但不会写回已清空的缓存
        assert!(in_flight.await.unwrap().names.contains("firefox"));
        assert!(chain.snapshot().captured_at.is_none());

        chain.current().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(chain.snapshot().captured_at.is_some());
    }

    #[tokio::test]
    async fn test_reset_forces_refresh() {
        let (chain, counters) = build_chain(vec![FakeProbe::ok("a", vec!["firefox"])]);

        chain.current().await;
        chain.reset();
        let snapshot = chain.snapshot();
        assert!(snapshot.names.is_empty());
        assert!(snapshot.captured_at.is_none());

        chain.current().await;
        assert_eq!(calls(&counters), vec![2]);
    }

    #[tokio::test]
    async fn test_concurrent_callers_refresh_once() {
        let (chain, counters) = build_chain(vec![FakeProbe {
            delay: Duration::from_millis(50),
            ..FakeProbe::ok("a", vec!["firefox"])
        }]);
        let chain = Arc::new(chain);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let chain = chain.clone();
                tokio::spawn(async move { chain.current().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().names.contains("firefox"));
        }
        assert_eq!(calls(&counters), vec![1]);
    }

    #[test]
    fn test_snapshot_is_installed_delegates_to_matcher() {
        let snapshot = InstalledSnapshot {
            names: ["firefox".to_string()].into_iter().collect(),
            captured_at: Some(Instant::now()),
        };
        assert!(snapshot.is_installed("firefox-115.0"));
        assert!(!snapshot.is_installed("thunderbird"));
    }
}
