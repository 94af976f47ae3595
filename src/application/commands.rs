// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::usecases::process_url::AdmissionGateway;
use crate::config::settings::Settings;
use crate::domain::repositories::result_sink::ResultSink;
use crate::domain::services::admission_service::build_policy;
use crate::engines::build_strategy;
use crate::feeder::Feeder;
use crate::infrastructure::database::connection;
use crate::infrastructure::metrics::init_metrics;
use crate::infrastructure::repositories::url_info_repo_impl::UrlInfoRepositoryImpl;
use crate::presentation::routes;
use crate::queue::bridge::{QueueConsumer, QueuePublisher};
use crate::queue::broker::MessageBroker;
use crate::queue::connect_broker;
use crate::queue::memory_broker::MemoryBroker;
use crate::workers::{CrawlerManager, PoolOptions};

/// 启动准入网关
///
/// 连接消息代理后对外提供 HTTP RPC，收到取消信号后停止接收新请求
pub async fn run_gateway(settings: &Settings, cancel: CancellationToken) -> anyhow::Result<()> {
    init_metrics(&settings.metrics);

    let broker = connect_broker(&settings.broker)
        .await
        .context("Failed to connect to the message broker")?;

    serve_gateway(settings, broker, cancel).await
}

/// 启动爬虫进程
///
/// 顺序：数据库连接 → 迁移 → 抓取策略 → 消息代理 → 队列消费与工作池
pub async fn run_crawler(settings: &Settings, cancel: CancellationToken) -> anyhow::Result<()> {
    init_metrics(&settings.metrics);

    let sink = connect_sink(settings).await?;
    let broker = connect_broker(&settings.broker)
        .await
        .context("Failed to connect to the message broker")?;

    let manager = crawler_manager(settings, broker, sink)?;
    let report = manager.run(cancel).await?;
    info!(?report, "Crawler finished");
    Ok(())
}

/// 单进程运行网关与爬虫，二者共享内存代理
///
/// 爬虫先加入队列组，网关随后才开始监听
pub async fn run_standalone(settings: &Settings, cancel: CancellationToken) -> anyhow::Result<()> {
    init_metrics(&settings.metrics);

    if !settings.broker.is_memory() {
        warn!(url = %settings.broker.url, "Standalone mode ignores the configured broker and uses the in-memory one");
    }
    let broker: Arc<dyn MessageBroker> = Arc::new(MemoryBroker::new());

    let sink = connect_sink(settings).await?;
    let crawler = crawler_manager(settings, broker.clone(), sink)?.subscribe().await?;
    let crawler_task = tokio::spawn(crawler.run(cancel.clone()));

    let served = serve_gateway(settings, broker, cancel.clone()).await;
    // Gateway gone: stop the crawler side too
    cancel.cancel();

    let report = crawler_task.await.context("Crawler task failed")?;
    info!(?report, "Crawler finished");
    served
}

/// 读取 CSV 文件并提交给网关
pub async fn run_feed(settings: &Settings, path: &Path, cancel: CancellationToken) -> anyhow::Result<()> {
    let feeder = Feeder::new(&settings.feeder)?;
    let report = feeder
        .run(path, cancel)
        .await
        .with_context(|| format!("Feeding {} failed", path.display()))?;
    info!(?report, "Feed complete");
    Ok(())
}

/// 只执行数据库迁移
pub async fn run_migrate(settings: &Settings) -> anyhow::Result<()> {
    let db = connection::create_pool(&settings.database).await?;
    connection::run_migrations(&db).await?;
    Ok(())
}

async fn serve_gateway(
    settings: &Settings,
    broker: Arc<dyn MessageBroker>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let (policy, kill_switch) = build_policy(&settings.admission);
    if kill_switch.is_unavailable() {
        warn!("Kill switch engaged, every request will be answered with UNAVAILABLE");
    }
    info!(policy = policy.name(), "Admission policy ready");

    let publisher = QueuePublisher::new(broker, settings.queue.topic.clone());
    let gateway = Arc::new(AdmissionGateway::new(policy, publisher, cancel.clone()));
    let app = routes::routes(gateway).merge(routes::admin_routes(kill_switch));

    let addr = settings.server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn connect_sink(settings: &Settings) -> anyhow::Result<Arc<dyn ResultSink>> {
    let db = connection::create_pool(&settings.database)
        .await
        .context("Failed to connect to the database")?;
    connection::run_migrations(&db).await?;

    Ok(Arc::new(UrlInfoRepositoryImpl::new(Arc::new(db))))
}

fn crawler_manager(
    settings: &Settings,
    broker: Arc<dyn MessageBroker>,
    sink: Arc<dyn ResultSink>,
) -> anyhow::Result<CrawlerManager> {
    let strategy = build_strategy(&settings.crawler)?;
    info!(lanes = settings.crawler.lane_count(), "Worker pool configured");

    let consumer = QueueConsumer::new(broker, settings.queue.topic.clone(), settings.queue.group.clone());
    Ok(CrawlerManager::new(
        consumer,
        strategy,
        sink,
        PoolOptions::from_settings(&settings.crawler),
    ))
}
