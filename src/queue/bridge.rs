// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::models::ItemStage;
use crate::queue::broker::{BrokerError, MessageBroker, Subscription};
use crate::queue::codec::{CodecError, QueueMessage};
use crate::workers::pool::{DispatchError, Dispatcher};

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 编解码错误
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// 代理错误
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// 发布端：网关通过它把已接受的请求写入队列
#[derive(Clone)]
pub struct QueuePublisher {
    broker: Arc<dyn MessageBroker>,
    topic: String,
}

impl QueuePublisher {
    pub fn new(broker: Arc<dyn MessageBroker>, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 编码并发布消息
    pub async fn publish(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let payload = message.encode()?;
        self.broker.publish(&self.topic, payload).await?;
        debug!(topic = %self.topic, request_id = %message.request_id, "Message published");
        Ok(())
    }
}

/// 消费端运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// 收到的消息数
    pub received: u64,
    /// 成功交给工作池的消息数
    pub dispatched: u64,
    /// 无法解码而被丢弃的消息数
    pub malformed: u64,
}

/// 消费端：以队列组方式订阅主题，把消息解码为工作项交给工作池
pub struct QueueConsumer {
    broker: Arc<dyn MessageBroker>,
    topic: String,
    group: String,
}

impl QueueConsumer {
    pub fn new(broker: Arc<dyn MessageBroker>, topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
            group: group.into(),
        }
    }

    /// 加入队列组
    ///
    /// 订阅建立后发布的消息才会投递到本消费端
    pub async fn subscribe(self) -> Result<ActiveConsumer, QueueError> {
        let subscription = self.broker.queue_subscribe(&self.topic, &self.group).await?;
        info!(topic = %self.topic, group = %self.group, broker = self.broker.name(), "Queue consumer subscribed");

        Ok(ActiveConsumer {
            subscription,
            topic: self.topic,
        })
    }

    /// 订阅并运行消费循环
    pub async fn run(self, dispatcher: Dispatcher, cancel: CancellationToken) -> Result<ConsumerReport, QueueError> {
        Ok(self.subscribe().await?.run(dispatcher, cancel).await)
    }
}

/// 已加入队列组的消费端
pub struct ActiveConsumer {
    subscription: Subscription,
    topic: String,
}

impl ActiveConsumer {
    /// 运行消费循环，直到取消或订阅关闭
    ///
    /// 返回时 `dispatcher` 被丢弃，工作池随之开始收尾
    ///
    /// # 参数
    ///
    /// * `dispatcher` - 工作池派发句柄
    /// * `cancel` - 取消令牌
    ///
    /// # 返回值
    ///
    /// 消费统计
    pub async fn run(self, dispatcher: Dispatcher, cancel: CancellationToken) -> ConsumerReport {
        let mut subscription = self.subscription;
        let mut report = ConsumerReport::default();

        loop {
            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                delivery = subscription.next() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        warn!(topic = %self.topic, "Subscription closed by broker");
                        break;
                    }
                },
            };
            report.received += 1;

            let message = match QueueMessage::decode(&delivery.payload) {
                Ok(message) => message,
                Err(e) => {
                    report.malformed += 1;
                    warn!(id = %delivery.id, "Dropping malformed queue message: {}", e);
                    if let Err(e) = subscription.ack(&delivery) {
                        warn!(id = %delivery.id, "Failed to ack message: {}", e);
                    }
                    continue;
                }
            };

            let request_id = message.request_id.clone();
            debug!(stage = %ItemStage::Queued, request_id = %request_id, url = %message.url, "Message received");
            match dispatcher.dispatch(message.into_work_item()).await {
                Ok(()) => {
                    report.dispatched += 1;
                    if let Err(e) = subscription.ack(&delivery) {
                        warn!(id = %delivery.id, "Failed to ack message: {}", e);
                    }
                }
                Err(DispatchError::Cancelled) => {
                    info!(request_id = %request_id, "Dispatch abandoned on shutdown");
                    break;
                }
                Err(DispatchError::Closed) => {
                    warn!(request_id = %request_id, "Worker pool closed, consumer stopping");
                    break;
                }
            }
        }

        subscription.unsubscribe().await;
        info!(?report, "Queue consumer stopped");
        report
    }
}
