//! 包搜索模块 — nix-env 查询封装与带缓存的搜索编排

pub mod orchestrator;
pub mod types;

pub use orchestrator::SearchOrchestrator;
pub use types::{NixPackageInfo, PackageListing, PackageRecord, SearchResponse};

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{truncate_message, Result, SearchError};

/// 外部包查询服务：查询字符串 -> 包名到元数据的有序映射
#[async_trait]
pub trait PackageQueryService: Send + Sync {
    async fn search(&self, query: &str) -> Result<PackageListing>;
}

/// `nix-env -qa '.*<query>.*' --json`
///
/// stdout 最多读取 `max_output_bytes` 字节，超出时结束子进程并报错。
#[derive(Debug, Clone)]
pub struct NixEnvSearch {
    command: String,
    max_output_bytes: usize,
}

impl NixEnvSearch {
    pub fn new(command: impl Into<String>, max_output_bytes: usize) -> Self {
        Self {
            command: command.into(),
            max_output_bytes,
        }
    }
}

#[async_trait]
impl PackageQueryService for NixEnvSearch {
    async fn search(&self, query: &str) -> Result<PackageListing> {
        let pattern = format!(".*{}.*", query);
        let mut child = Command::new(&self.command)
            .args(["-qa", pattern.as_str(), "--json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // stderr 单独读取，避免子进程因管道写满而阻塞
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        });

        let mut stdout = Vec::new();
        if let Some(pipe) = child.stdout.take() {
            pipe.take(self.max_output_bytes as u64 + 1)
                .read_to_end(&mut stdout)
                .await?;
        }

        if stdout.len() > self.max_output_bytes {
            let _ = child.start_kill();
            log::warn!("nix-env 输出超过 {} 字节，已终止", self.max_output_bytes);
            return Err(SearchError::QueryFailure(format!(
                "output exceeded {} bytes. Try a more specific query.",
                self.max_output_bytes
            )));
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        log::debug!("nix-env 输出 {} 字节", stdout.len());

        if !status.success() {
            return Err(SearchError::QueryFailure(truncate_message(
                &String::from_utf8_lossy(&stderr),
                200,
            )));
        }

        parse_listing(&String::from_utf8_lossy(&stdout))
    }
}

/// 解析 nix-env --json 输出，顶层必须是对象
pub fn parse_listing(stdout: &str) -> Result<PackageListing> {
    let value: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| SearchError::Parse(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(SearchError::Parse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
