//! 错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

/// 搜索流程中可能出现的错误，全部在 SearchOrchestrator 边界转换为错误响应
#[derive(Error, Debug)]
pub enum SearchError {
    /// nix-env 搜索超时
    #[error("Search timed out after {0}s. Try a more specific query.")]
    QueryTimeout(u64),

    /// nix-env 返回非零退出码
    #[error("Search failed: {0}")]
    QueryFailure(String),

    /// 外部工具输出无法解析
    #[error("Invalid response from nix-env: {0}")]
    Parse(String),

    /// 所有已安装包检测策略均失败
    #[error("Could not determine installed packages")]
    ProbeUnavailable,

    /// 查询字符串不合法
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Server error: {0}")]
    Unexpected(String),
}

impl From<std::io::Error> for SearchError {
    fn from(e: std::io::Error) -> Self {
        SearchError::Unexpected(e.to_string())
    }
}

/// 单个检测策略的失败原因，只在 ProbeChain 内部流转
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("无法启动 {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} 退出码 {code:?}: {stderr}")]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0} 没有输出")]
    Empty(String),

    #[error("{command} 超时 ({secs}s)")]
    Timeout { command: String, secs: u64 },
}

/// 截断 stderr，避免把整段输出塞进响应或日志
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
