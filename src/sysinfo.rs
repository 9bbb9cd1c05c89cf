use serde::Serialize;
use std::process::Command;

/// 运行环境信息，用于 /debug 排查检测失败的原因
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub user: Option<String>,
    pub home: Option<String>,
    pub nix_path: String,
    /// 有效用户 ID，判断是否有权读取用户 profile
    pub euid: u32,
    pub kernel: String,
    pub nix_version: String,
}

impl EnvironmentInfo {
    /// 会执行外部命令，需在阻塞线程中调用
    pub fn detect(nix_command: &str) -> Self {
        Self {
            user: std::env::var("USER").ok(),
            home: std::env::var("HOME").ok(),
            nix_path: std::env::var("NIX_PATH").unwrap_or_else(|_| "not set".to_string()),
            euid: Self::get_euid(),
            kernel: Self::run_cmd("uname", &["-r"]),
            nix_version: Self::run_cmd(nix_command, &["--version"]),
        }
    }

    fn run_cmd(cmd: &str, args: &[&str]) -> String {
        Command::new(cmd)
            .args(args)
            .output()
            .ok()
            .and_then(|o| {
                if o.status.success() {
                    let s = String::from_utf8_lossy(&o.stdout).trim().to_string();
                    if s.is_empty() { None } else { Some(s) }
                } else {
                    None
                }
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn get_euid() -> u32 {
        // SAFETY: geteuid 没有前置条件且不会失败
        unsafe { libc::geteuid() }
    }
}
