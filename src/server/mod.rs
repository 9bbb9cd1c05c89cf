//! HTTP 接口 — 把搜索与缓存管理操作暴露为 JSON 端点

pub mod http;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::admin::CacheAdministration;
use crate::cache::SearchResultCache;
use crate::config::Config;
use crate::installed::{InstallationProbe, ProbeChain};
use crate::search::{PackageQueryService, SearchOrchestrator};
use crate::sysinfo::EnvironmentInfo;
use self::http::{parse_request_head, read_request_head, Request, Response};

pub const SERVICE_NAME: &str = "lian-nix";

pub const ENDPOINTS: [&str; 5] = [
    "/search?q=query",
    "/health",
    "/cache/stats",
    "/cache/clear",
    "/debug",
];

/// 读取请求头的超时时间
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// /debug 中展示的已安装包数量
const DEBUG_SAMPLE: usize = 20;

pub struct ApiServer {
    orchestrator: SearchOrchestrator,
    admin: CacheAdministration,
    cache: Arc<SearchResultCache>,
    installed: Arc<ProbeChain>,
    port: u16,
    nix_command: String,
}

impl ApiServer {
    pub fn build(
        config: &Config,
        service: Arc<dyn PackageQueryService>,
        probes: Vec<Box<dyn InstallationProbe>>,
    ) -> Self {
        let cache = Arc::new(SearchResultCache::new(config.search_ttl(), config.sweep_threshold));
        let installed = Arc::new(ProbeChain::new(
            probes,
            config.installed_ttl(),
            config.probe_timeout(),
        ));

        Self {
            orchestrator: SearchOrchestrator::new(service, cache.clone(), installed.clone(), config),
            admin: CacheAdministration::new(cache.clone(), installed.clone()),
            cache,
            installed,
            port: config.port,
            nix_command: config.nix_command.clone(),
        }
    }

    pub fn installed(&self) -> Arc<ProbeChain> {
        self.installed.clone()
    }

    /// 接受连接直到 shutdown 完成，每个连接一个任务
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("正在关闭服务...");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    log::debug!("新连接: {}", peer);
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            log::error!("处理连接 {} 失败: {}", peer, e);
                        }
                    });
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let head = match tokio::time::timeout(READ_TIMEOUT, read_request_head(&mut stream)).await {
            Ok(result) => result?,
            Err(_) => {
                log::debug!("读取请求超时");
                return Ok(());
            }
        };

        let response = match head.as_deref().and_then(parse_request_head) {
            Some(request) => self.handle(&request).await,
            None => Response::with_status(400, json!({"error": "Bad request"})),
        };

        if response.status != 200 && response.status != 204 {
            log::debug!("响应状态 {}", response.status);
        }
        stream.write_all(&response.to_bytes()).await?;
        stream.shutdown().await
    }

    pub async fn handle(&self, request: &Request) -> Response {
        match request.method.as_str() {
            "GET" => {}
            "OPTIONS" => return Response::no_content(),
            _ => return Response::with_status(405, json!({"error": "Method not allowed"})),
        }

        match request.path.as_str() {
            "/search" => {
                let response = self.orchestrator.query(request.param("q").unwrap_or("")).await;
                Response::ok(to_json(&response))
            }
            "/health" => Response::ok(self.health()),
            "/cache/stats" => Response::ok(to_json(&self.admin.stats())),
            "/cache/clear" => Response::ok(to_json(&self.admin.clear())),
            "/debug" => self.debug().await,
            _ => Response::with_status(
                404,
                json!({"error": "Not found", "availableEndpoints": ENDPOINTS}),
            ),
        }
    }

    fn health(&self) -> Value {
        let snapshot = self.installed.snapshot();
        let cache_size = self.cache.len();
        json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "features": {
                "search": true,
                "installedStatus": snapshot.is_available(),
                "installedCount": snapshot.names.len(),
                "caching": true,
                "cacheSize": cache_size,
            },
            "cacheSize": cache_size,
            "port": self.port,
        })
    }

    async fn debug(&self) -> Response {
        let nix_command = self.nix_command.clone();
        let env = match tokio::task::spawn_blocking(move || EnvironmentInfo::detect(&nix_command)).await {
            Ok(env) => env,
            Err(e) => {
                return Response::with_status(500, json!({"error": format!("Server error: {}", e)}));
            }
        };

        // 与搜索一致：快照过期或被清空时先刷新
        let snapshot = self.installed.current().await;
        let mut sample: Vec<&String> = snapshot.names.iter().collect();
        sample.sort();
        sample.truncate(DEBUG_SAMPLE);

        let captured_at = snapshot
            .age()
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .map(|age| (Local::now() - age).to_rfc3339());

        Response::ok(json!({
            "installedPackages": sample,
            "totalInstalled": snapshot.names.len(),
            "cacheEntries": self.cache.len(),
            "capturedAt": captured_at,
            "env": env,
        }))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({"error": format!("Server error: {}", e)}))
}
