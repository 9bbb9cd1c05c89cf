mod admin;
mod cache;
mod config;
mod error;
mod installed;
mod search;
mod server;
mod sysinfo;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use installed::default_probes;
use search::NixEnvSearch;
use server::{ApiServer, ENDPOINTS};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 加载配置
    let config = config::Config::load_or_default()?;

    let service = Arc::new(NixEnvSearch::new(
        config.nix_env_command.clone(),
        config.max_output_bytes,
    ));
    let server = Arc::new(ApiServer::build(&config, service, default_probes(&config)));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;

    log::info!("NixOS 包搜索后端已启动: http://{}", addr);
    log::info!(
        "搜索结果缓存 {}s，已安装包缓存 {}s",
        config.search_ttl_secs,
        config.installed_ttl_secs
    );
    for endpoint in ENDPOINTS {
        log::info!("  http://{}{}", addr, endpoint);
    }

    // 后台预热已安装包快照，不阻塞启动
    let installed = server.installed();
    tokio::spawn(async move {
        installed.refresh().await;
    });

    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("监听 Ctrl-C 失败: {}", e);
            }
        })
        .await?;

    Ok(())
}
