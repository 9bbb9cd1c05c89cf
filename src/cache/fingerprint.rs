//! 查询字符串 -> 固定长度缓存键

use std::fmt;

const FINGERPRINT_LEN: usize = 16;

/// BLAKE3 截断到 128 位，跨进程重启保持稳定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn of(query: &str) -> Self {
        let hash = blake3::hash(query.as_bytes());
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..FINGERPRINT_LEN]);
        Fingerprint(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
