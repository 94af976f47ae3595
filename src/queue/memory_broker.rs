// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::queue::broker::{BrokerError, Delivery, MessageBroker, Subscription};

const MEMBER_BUFFER: usize = 1024;

#[derive(Default)]
struct GroupState {
    members: Vec<mpsc::Sender<Delivery>>,
    next: usize,
}

impl GroupState {
    fn pick(&mut self) -> Option<mpsc::Sender<Delivery>> {
        self.members.retain(|member| !member.is_closed());
        if self.members.is_empty() {
            return None;
        }
        let index = self.next % self.members.len();
        self.next = self.next.wrapping_add(1);
        Some(self.members[index].clone())
    }
}

#[derive(Default)]
struct BrokerState {
    /// topic -> group -> members
    topics: HashMap<String, HashMap<String, GroupState>>,
}

/// 进程内消息代理
///
/// 每个队列组内按轮询方式投递，供单进程模式和测试使用。
/// 只记录发布次数，不保留负载；发布时没有任何在线成员的组会丢弃该消息。
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
    sequence: AtomicU64,
    published: AtomicU64,
    fail_publish: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 成功发布的消息数
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::SeqCst) as usize
    }

    /// 让后续发布全部失败
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    fn targets(&self, topic: &str) -> Vec<(String, mpsc::Sender<Delivery>)> {
        let mut state = self.state.lock();
        state
            .topics
            .get_mut(topic)
            .map(|groups| {
                groups
                    .iter_mut()
                    .filter_map(|(name, group)| group.pick().map(|sender| (name.clone(), sender)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn pick_again(&self, topic: &str, group: &str) -> Option<mpsc::Sender<Delivery>> {
        let mut state = self.state.lock();
        state
            .topics
            .get_mut(topic)
            .and_then(|groups| groups.get_mut(group))
            .and_then(GroupState::pick)
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("broker rejected publish".to_string()));
        }

        self.published.fetch_add(1, Ordering::SeqCst);
        let id = format!("mem-{}", self.sequence.fetch_add(1, Ordering::SeqCst));

        for (group, mut sender) in self.targets(topic) {
            loop {
                let delivery = Delivery {
                    id: id.clone(),
                    payload: payload.clone(),
                };
                if sender.send(delivery).await.is_ok() {
                    break;
                }
                // member went away between pick and send
                match self.pick_again(topic, &group) {
                    Some(next) => sender = next,
                    None => {
                        tracing::warn!(topic, group = %group, "No live subscriber, message dropped");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    async fn queue_subscribe(&self, topic: &str, group: &str) -> Result<Subscription, BrokerError> {
        let (tx, rx) = mpsc::channel(MEMBER_BUFFER);
        self.state
            .lock()
            .topics
            .entry(topic.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .members
            .push(tx);

        tracing::debug!(topic, group, "Memory subscription registered");
        Ok(Subscription::new(rx, None, CancellationToken::new(), None))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
