// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 消息代理错误
#[derive(Error, Debug)]
pub enum BrokerError {
    /// 连接失败
    #[error("Broker connection failed: {0}")]
    Connect(String),
    /// 发布失败
    #[error("Publish failed: {0}")]
    Publish(String),
    /// 订阅失败
    #[error("Subscribe failed: {0}")]
    Subscribe(String),
    /// Redis 错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    /// 订阅已关闭
    #[error("Subscription closed")]
    Closed,
}

/// 一条投递到订阅者的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 代理分配的消息ID，用于确认
    pub id: String,
    pub payload: Vec<u8>,
}

/// 队列组订阅句柄
///
/// 同一主题、同一组的多个订阅互为竞争消费者，每条消息只投递给其中一个
pub struct Subscription {
    deliveries: mpsc::Receiver<Delivery>,
    acks: Option<mpsc::UnboundedSender<String>>,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// 创建订阅句柄
    ///
    /// # 参数
    ///
    /// * `deliveries` - 消息接收端
    /// * `acks` - 确认发送端，代理不需要确认时为 None
    /// * `stop` - 停止后台拉取任务的令牌
    /// * `task` - 后台拉取任务
    pub fn new(
        deliveries: mpsc::Receiver<Delivery>,
        acks: Option<mpsc::UnboundedSender<String>>,
        stop: CancellationToken,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            deliveries,
            acks,
            stop,
            task,
        }
    }

    /// 接收下一条消息，订阅关闭后返回 None
    pub async fn next(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    /// 确认消息已处理
    pub fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        match &self.acks {
            Some(acks) => acks.send(delivery.id.clone()).map_err(|_| BrokerError::Closed),
            None => Ok(()),
        }
    }

    /// 取消订阅并等待后台任务退出
    pub async fn unsubscribe(mut self) {
        self.stop.cancel();
        self.deliveries.close();
        // Pending acks are flushed by the background task before it exits
        self.acks.take();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Subscription task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// 消息代理特质
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// 向主题发布一条消息
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// 以队列组方式订阅主题
    async fn queue_subscribe(&self, topic: &str, group: &str) -> Result<Subscription, BrokerError>;

    /// 代理名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: MessageBroker + ?Sized> MessageBroker for Arc<T> {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        (**self).publish(topic, payload).await
    }

    async fn queue_subscribe(&self, topic: &str, group: &str) -> Result<Subscription, BrokerError> {
        (**self).queue_subscribe(topic, group).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
