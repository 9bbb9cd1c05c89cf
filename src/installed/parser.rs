//! 检测命令输出解析函数

use std::collections::HashSet;

/// `nix profile list` 中包名所在行的字段标记
const NAME_MARKER: &str = "Name:";

/// 字面形式的八进制转义，部分终端环境会原样输出这段文本
const OCTAL_ESCAPE: &str = "\\033[";

/// 清理 ANSI 颜色序列：ESC 字节形式 (`\x1b[...m`) 和字面八进制形式 (`\033[...m`)
pub fn strip_ansi(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        let sequence_body = if c == '\x1b' && rest[1..].starts_with('[') {
            Some(&rest[2..])
        } else if rest.starts_with(OCTAL_ESCAPE) {
            Some(&rest[OCTAL_ESCAPE.len()..])
        } else {
            None
        };

        match sequence_body {
            Some(body) => {
                let params = body
                    .find(|ch: char| !(ch.is_ascii_digit() || ch == ';'))
                    .unwrap_or(body.len());
                // 只吞掉完整的 SGR 序列，不完整的原样保留
                if body[params..].starts_with('m') {
                    rest = &body[params + 1..];
                } else {
                    result.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
            None => {
                result.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    result
}

/// 解析 `nix profile list` 输出，提取每个 `Name:` 字段
pub fn parse_profile_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(strip_ansi)
        .filter_map(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix(NAME_MARKER)
                .map(|name| name.trim().to_string())
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// `name-version` 中第一个分隔符之前的部分
pub fn base_name(compound: &str) -> &str {
    compound.split('-').next().unwrap_or(compound)
}

/// 解析 `nix-env -q` 输出：每行 `name-version`，取第一个 `-` 之前的部分
pub fn parse_env_query(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| base_name(line).to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
