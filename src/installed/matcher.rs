//! 判断搜索结果是否已安装
//!
//! nix-env -qa 给出的名字通常是 `name-version` 形式，而检测命令给出的是裸包名，
//! 两者很少完全相等，所以这里是宽松的启发式匹配，不做依赖解析。
//! 前缀规则会把 `git` 和 `git-lfs` 这类名字视为同一个包，这是有意保留的误报。

use std::collections::HashSet;

use super::parser::base_name;

/// 命中的匹配规则，按判断顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// 完整名字相等
    Exact,
    /// 截断到第一个 `-` 后相等
    BaseName,
    /// 已安装名与基础名互为前缀
    Prefix,
}

pub fn match_rule(candidate: &str, installed: &HashSet<String>) -> Option<MatchRule> {
    if installed.is_empty() {
        return None;
    }
    if installed.contains(candidate) {
        return Some(MatchRule::Exact);
    }

    let base = base_name(candidate);
    if installed.contains(base) {
        return Some(MatchRule::BaseName);
    }

    if base.is_empty() {
        return None;
    }
    installed
        .iter()
        .filter(|name| !name.is_empty())
        .any(|name| name.starts_with(base) || base.starts_with(name.as_str()))
        .then_some(MatchRule::Prefix)
}

pub fn is_installed(candidate: &str, installed: &HashSet<String>) -> bool {
    match_rule(candidate, installed).is_some()
}
