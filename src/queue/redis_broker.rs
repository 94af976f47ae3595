// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::settings::BrokerSettings;
use crate::queue::broker::{BrokerError, Delivery, MessageBroker, Subscription};

const PAYLOAD_FIELD: &str = "data";
const CURSOR_START: &str = "0-0";

/// 基于 Redis Streams 的消息代理
///
/// 发布使用 `XADD`，队列组使用消费组（`XREADGROUP` / `XACK`）。
/// 订阅者定期用 `XAUTOCLAIM` 认领组内空闲过久的未确认消息，
/// 因此离开的成员未确认的消息会被重新投递。
pub struct RedisBroker {
    client: redis::Client,
    conn: MultiplexedConnection,
    block_ms: usize,
    batch_size: usize,
    retry_wait: Duration,
    claim_idle: Duration,
}

impl RedisBroker {
    /// 连接 Redis，失败时按指数退避重试
    ///
    /// # 参数
    ///
    /// * `settings` - 代理配置
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisBroker)` - 已连接的代理
    /// * `Err(BrokerError)` - 重试次数耗尽仍无法连接
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        let client = redis::Client::open(settings.url.as_str())?;
        let max_attempts = if settings.allow_reconnect {
            settings.max_reconnect_attempts.max(1)
        } else {
            1
        };
        let attempts = AtomicU32::new(0);
        let (attempts, client_ref) = (&attempts, &client);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(settings.reconnect_wait())
            .with_max_interval(settings.reconnect_wait() * 8)
            .with_max_elapsed_time(None)
            .build();

        let conn = backoff::future::retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let result =
                tokio::time::timeout(settings.timeout(), client_ref.get_multiplexed_async_connection()).await;

            let error = match result {
                Ok(Ok(conn)) => return Ok(conn),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", settings.timeout()),
            };

            if attempt >= max_attempts {
                return Err(backoff::Error::permanent(BrokerError::Connect(format!(
                    "{} (after {} attempts)",
                    error, attempt
                ))));
            }

            warn!(attempt, max_attempts, "Broker connection failed: {}", error);
            Err(backoff::Error::transient(BrokerError::Connect(error)))
        })
        .await?;

        info!("Connected to Redis broker");

        Ok(Self {
            client,
            conn,
            block_ms: settings.block_ms as usize,
            batch_size: settings.batch_size.max(1),
            retry_wait: settings.reconnect_wait(),
            claim_idle: settings.claim_idle(),
        })
    }

    async fn ensure_group(&self, topic: &str, group: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let created: Result<(), redis::RedisError> =
            conn.xgroup_create_mkstream(topic, group, "$").await;

        match created {
            Ok(()) => {
                debug!(topic, group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(BrokerError::Subscribe(e.to_string())),
        }
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _id: String = conn
            .xadd(topic, "*", &[(PAYLOAD_FIELD, payload.as_slice())])
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn queue_subscribe(&self, topic: &str, group: &str) -> Result<Subscription, BrokerError> {
        self.ensure_group(topic, group).await?;

        // Blocking reads use a dedicated connection
        let conn = self.client.get_multiplexed_async_connection().await?;
        let consumer = format!("{}-{}", group, Uuid::new_v4());
        let (tx, rx) = mpsc::channel(self.batch_size);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let poller = StreamPoller {
            client: self.client.clone(),
            conn,
            topic: topic.to_string(),
            group: group.to_string(),
            consumer,
            block_ms: self.block_ms,
            batch_size: self.batch_size,
            retry_wait: self.retry_wait,
            claim_idle: self.claim_idle,
            claims: ClaimSchedule::new(self.claim_idle, Instant::now()),
        };
        let task = tokio::spawn(poller.run(tx, ack_rx, stop.clone()));

        Ok(Subscription::new(rx, Some(ack_tx), stop, Some(task)))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// 认领进度
///
/// 游标回到起点前每轮都继续认领，扫完一遍后等待一个空闲周期
#[derive(Debug)]
struct ClaimSchedule {
    cursor: String,
    interval: Duration,
    next_at: Instant,
}

impl ClaimSchedule {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            cursor: CURSOR_START.to_string(),
            interval,
            next_at: now,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        now >= self.next_at
    }

    fn advance(&mut self, next_cursor: String, now: Instant) {
        if next_cursor == CURSOR_START {
            self.next_at = now + self.interval;
        }
        self.cursor = next_cursor;
    }

    fn postpone(&mut self, now: Instant) {
        self.cursor = CURSOR_START.to_string();
        self.next_at = now + self.interval;
    }
}

/// 订阅后台任务：认领空闲消息、拉取新消息并处理确认
struct StreamPoller {
    client: redis::Client,
    conn: MultiplexedConnection,
    topic: String,
    group: String,
    consumer: String,
    block_ms: usize,
    batch_size: usize,
    retry_wait: Duration,
    claim_idle: Duration,
    claims: ClaimSchedule,
}

impl StreamPoller {
    async fn run(
        mut self,
        deliveries: mpsc::Sender<Delivery>,
        mut acks: mpsc::UnboundedReceiver<String>,
        stop: CancellationToken,
    ) {
        info!(topic = %self.topic, group = %self.group, consumer = %self.consumer, "Stream subscription started");

        while !stop.is_cancelled() {
            self.flush_acks(&mut acks).await;

            if self.claims.is_due(Instant::now()) {
                let claimed = tokio::select! {
                    _ = stop.cancelled() => break,
                    claimed = self.claim() => claimed,
                };
                match claimed {
                    Ok(entries) => {
                        if !forward(entries, &deliveries, &stop).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(topic = %self.topic, "Pending claim failed: {}", e);
                        self.claims.postpone(Instant::now());
                        if e.is_io_error() || e.is_connection_dropped() {
                            self.reconnect(&stop).await;
                        }
                    }
                }
                continue;
            }

            let options = StreamReadOptions::default()
                .group(&self.group, &self.consumer)
                .count(self.batch_size)
                .block(self.block_ms);
            let keys = [self.topic.as_str()];
            let ids = [">"];

            let reply: Result<Option<StreamReadReply>, redis::RedisError> = tokio::select! {
                _ = stop.cancelled() => break,
                reply = self.conn.xread_options(&keys, &ids, &options) => reply,
            };

            let reply = match reply {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(e) => {
                    warn!(topic = %self.topic, "Stream read failed: {}", e);
                    self.reconnect(&stop).await;
                    continue;
                }
            };

            let entries = reply.keys.into_iter().flat_map(|key| key.ids).collect();
            if !forward(entries, &deliveries, &stop).await {
                break;
            }
        }

        // Receiver side is gone; acks sent before unsubscribe are still applied
        drop(deliveries);
        while let Some(id) = acks.recv().await {
            self.ack(&id).await;
        }

        info!(topic = %self.topic, consumer = %self.consumer, "Stream subscription stopped");
    }

    /// 把组内空闲超过 `claim_idle` 的未确认消息转到当前消费者名下
    async fn claim(&mut self) -> Result<Vec<StreamId>, redis::RedisError> {
        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.topic)
            .arg(&self.group)
            .arg(&self.consumer)
            .arg(self.claim_idle.as_millis() as u64)
            .arg(&self.claims.cursor)
            .arg("COUNT")
            .arg(self.batch_size)
            .query_async(&mut self.conn)
            .await?;

        if !reply.claimed.is_empty() {
            info!(topic = %self.topic, count = reply.claimed.len(), "Claimed idle pending messages");
        }
        self.claims.advance(reply.next_stream_id, Instant::now());
        Ok(reply.claimed)
    }

    async fn flush_acks(&mut self, acks: &mut mpsc::UnboundedReceiver<String>) {
        while let Ok(id) = acks.try_recv() {
            self.ack(&id).await;
        }
    }

    async fn ack(&mut self, id: &str) {
        let acked: Result<i64, redis::RedisError> = self.conn.xack(&self.topic, &self.group, &[id]).await;
        if let Err(e) = acked {
            warn!(topic = %self.topic, id, "Failed to ack message: {}", e);
        }
    }

    async fn reconnect(&mut self, stop: &CancellationToken) {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(self.retry_wait) => {}
        }

        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                info!(topic = %self.topic, "Broker connection re-established");
                self.conn = conn;
            }
            Err(e) => warn!(topic = %self.topic, "Broker reconnect failed: {}", e),
        }
    }
}

/// 逐条转发给订阅端，订阅端关闭或收到停止信号时返回 false
async fn forward(entries: Vec<StreamId>, deliveries: &mpsc::Sender<Delivery>, stop: &CancellationToken) -> bool {
    for entry in entries {
        let payload: Vec<u8> = entry.get(PAYLOAD_FIELD).unwrap_or_default();
        let delivery = Delivery {
            id: entry.id,
            payload,
        };

        tokio::select! {
            _ = stop.cancelled() => return false,
            sent = deliveries.send(delivery) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}
