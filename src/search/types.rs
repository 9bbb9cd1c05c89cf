//! 搜索相关数据类型定义

use serde::{Deserialize, Serialize};

/// nix-env --json 输出：包名 -> 元数据，保持 nix-env 给出的顺序
pub type PackageListing = serde_json::Map<String, serde_json::Value>;

/// nix-env --json 中单个包的元数据
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NixPackageInfo {
    pub version: Option<String>,
    pub meta: NixPackageMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NixPackageMeta {
    pub description: Option<String>,
}

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub description: String,
    pub installed: bool,
    /// 快照非空时为 true，用于区分“确定未安装”和“无法判断”
    pub installed_data_available: bool,
}

/// /search 的响应体，也是缓存中保存的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<PackageRecord>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_check_available: Option<bool>,
}

impl SearchResponse {
    /// 空查询的响应
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            error: None,
            total: None,
            cached: false,
            installed_check_available: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty()
        }
    }

    pub fn success(results: Vec<PackageRecord>, total: usize, installed_check_available: bool) -> Self {
        Self {
            results,
            error: None,
            total: Some(total),
            cached: false,
            installed_check_available: Some(installed_check_available),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_response_shape() {
        let value = serde_json::to_value(SearchResponse::empty()).unwrap();
        assert_eq!(value, json!({"results": [], "error": null, "cached": false}));
    }

    #[test]
    fn test_success_response_uses_camel_case() {
        let record = PackageRecord {
            name: "hello-2.12".into(),
            version: "2.12".into(),
            description: "GNU Hello".into(),
            installed: false,
            installed_data_available: true,
        };
        let value = serde_json::to_value(SearchResponse::success(vec![record], 3, true)).unwrap();

        assert_eq!(value["total"], 3);
        assert_eq!(value["installedCheckAvailable"], true);
        assert_eq!(value["results"][0]["installedDataAvailable"], true);
        assert_eq!(value["error"], serde_json::Value::Null);
    }

    #[test]
    fn test_package_info_tolerates_missing_fields() {
        let info: NixPackageInfo = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert!(info.version.is_none());
        assert!(info.meta.description.is_none());

        let info: NixPackageInfo =
            serde_json::from_value(json!({"version": "1.0", "meta": {"description": "d"}})).unwrap();
        assert_eq!(info.version.as_deref(), Some("1.0"));
        assert_eq!(info.meta.description.as_deref(), Some("d"));
    }
}
