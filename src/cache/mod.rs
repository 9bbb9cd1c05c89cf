//! 缓存模块 — 搜索结果缓存与缓存键生成

pub mod fingerprint;
pub mod search;

pub use fingerprint::Fingerprint;
pub use search::SearchResultCache;
