//! XBee 串口 → HTTP 接入端点桥接进程。

mod bridge;

use bridge::{Bridge, build_bridge};
use bridge_config::BridgeConfig;
use bridge_serial::RetryPolicy;
use bridge_telemetry::{init_tracing, metrics};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = BridgeConfig::from_env()?;
    // 初始化结构化日志
    init_tracing(config.verbose);
    info!(
        ingest_url = %config.ingest_url,
        port_description = %config.port_description,
        baud_rate = config.baud_rate,
        delivery = ?config.delivery,
        "bridge_starting"
    );

    // 端点 URL 非法是唯一的致命装配错误
    let Bridge {
        mut source,
        handler,
        forward_worker,
    } = build_bridge(&config)?;

    // Ctrl-C 触发停机；监听失败时保持发送端存活，避免读循环误判为停机
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown_requested");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                warn!(error = %err, "ctrl_c_listener_failed");
                shutdown_tx.closed().await;
            }
        }
    });

    // 启动阶段按配置多次尝试；失败后仍进入读循环，由读循环继续重连
    let startup = RetryPolicy::new(config.connect_attempts, config.connect_delay());
    tokio::select! {
        connected = source.manager_mut().connect(&startup) => {
            if !connected {
                warn!(
                    target: "bridge.serial",
                    attempts = config.connect_attempts,
                    "startup_connect_failed"
                );
            }
        }
        _ = shutdown_rx.changed() => {}
    }

    source.run(handler, shutdown_rx).await;

    // 排空队列投递（仅 queued 模式）
    if let Some(worker) = forward_worker {
        if let Err(err) = worker.await {
            warn!(error = %err, "forward_worker_failed");
        }
    }

    let snapshot = metrics().snapshot();
    info!(
        bytes_read = snapshot.bytes_read,
        frames_extracted = snapshot.frames_extracted,
        parse_failures = snapshot.parse_failures,
        readings_forwarded = snapshot.readings_forwarded,
        forward_failures = snapshot.forward_failures,
        connect_attempts = snapshot.connect_attempts,
        connections_established = snapshot.connections_established,
        read_errors = snapshot.read_errors,
        "bridge_stopped"
    );
    Ok(())
}
