//! 具体的已安装包检测策略

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::parser::{parse_env_query, parse_profile_list};
use super::InstallationProbe;
use crate::config::Config;
use crate::error::{truncate_message, ProbeError};

/// 运行检测命令并返回 stdout；非零退出码视为失败
///
/// 子进程设置了 kill_on_drop，外层超时丢弃 future 时会一并结束子进程。
pub async fn run_probe_command(program: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String, ProbeError> {
    let label = format!("{} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ProbeError::Spawn {
            command: label.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Exit {
            command: label,
            code: output.status.code(),
            stderr: truncate_message(&String::from_utf8_lossy(&output.stderr), 100),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// 新版 Nix：`nix profile list`
pub struct NixProfileProbe {
    command: String,
}

impl NixProfileProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl InstallationProbe for NixProfileProbe {
    fn name(&self) -> &str {
        "nix profile list"
    }

    async fn detect(&self) -> Result<HashSet<String>, ProbeError> {
        // TERM=dumb 尽量避免颜色输出，解析时仍会清理残留的转义序列
        let stdout = run_probe_command(
            &self.command,
            &["profile", "list"],
            &[("TERM", "dumb"), ("NO_COLOR", "1")],
        )
        .await?;
        Ok(parse_profile_list(&stdout))
    }
}

/// 旧版 Nix：`nix-env -q`，可指定 profile 路径
pub struct NixEnvProbe {
    command: String,
    profile: Option<PathBuf>,
    label: String,
}

impl NixEnvProbe {
    /// 当前用户的 profile
    pub fn user(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            profile: None,
            label: "nix-env -q".to_string(),
        }
    }

    /// 系统 profile，用户无权读取自己的 profile 时使用
    pub fn system(command: impl Into<String>, profile: impl Into<PathBuf>) -> Self {
        let profile = profile.into();
        Self {
            command: command.into(),
            label: format!("nix-env -q --profile {}", profile.display()),
            profile: Some(profile),
        }
    }
}

#[async_trait]
impl InstallationProbe for NixEnvProbe {
    fn name(&self) -> &str {
        &self.label
    }

    async fn detect(&self) -> Result<HashSet<String>, ProbeError> {
        let profile = self.profile.as_ref().map(|p| p.to_string_lossy().to_string());
        let mut args = vec!["-q"];
        if let Some(profile) = profile.as_deref() {
            args.push("--profile");
            args.push(profile);
        }

        let stdout = run_probe_command(&self.command, &args, &[]).await?;
        // 空输出无法和“没有 profile”区分，交给下一个策略
        if stdout.trim().is_empty() {
            return Err(ProbeError::Empty(self.label.clone()));
        }
        Ok(parse_env_query(&stdout))
    }
}

/// 默认检测顺序：nix profile list -> nix-env -q -> 系统 profile
pub fn default_probes(config: &Config) -> Vec<Box<dyn InstallationProbe>> {
    vec![
        Box::new(NixProfileProbe::new(config.nix_command.clone())),
        Box::new(NixEnvProbe::user(config.nix_env_command.clone())),
        Box::new(NixEnvProbe::system(
            config.nix_env_command.clone(),
            config.system_profile.clone(),
        )),
    ]
}
