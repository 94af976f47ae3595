// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::settings::AdmissionSettings;

/// 准入状态
///
/// 返回给调用方的请求级结果，与传输层错误相互独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionStatus {
    /// 已接受并发布到队列
    Accepted,
    /// 暂不接受，调用方稍后重试
    Retry,
    /// 网关不可用，调用方应停止发送
    Unavailable,
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AdmissionStatus::Accepted => write!(f, "ACCEPTED"),
            AdmissionStatus::Retry => write!(f, "RETRY"),
            AdmissionStatus::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

/// 准入策略的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accept,
    Retry,
    Unavailable,
}

impl AdmissionDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, AdmissionDecision::Accept)
    }
}

impl From<AdmissionDecision> for AdmissionStatus {
    fn from(decision: AdmissionDecision) -> Self {
        match decision {
            AdmissionDecision::Accept => AdmissionStatus::Accepted,
            AdmissionDecision::Retry => AdmissionStatus::Retry,
            AdmissionDecision::Unavailable => AdmissionStatus::Unavailable,
        }
    }
}

/// 准入控制策略特质
///
/// 在请求进入队列之前决定接受、延后还是拒绝
pub trait AdmissionPolicy: Send + Sync {
    /// 对一次请求作出判定
    fn decide(&self, url: &str) -> AdmissionDecision;

    /// 策略名称
    fn name(&self) -> &'static str;
}

/// 随机拒绝策略
///
/// 以固定的低概率返回 RETRY。设置种子后判定序列可复现。
pub struct RandomRejectPolicy {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomRejectPolicy {
    /// 创建随机拒绝策略
    ///
    /// # 参数
    ///
    /// * `probability` - 拒绝概率，超出 0.0 - 1.0 的值会被截断
    /// * `seed` - 随机数种子，None 时使用操作系统熵源
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            probability: probability.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }
}

impl AdmissionPolicy for RandomRejectPolicy {
    fn decide(&self, _url: &str) -> AdmissionDecision {
        let roll: f64 = self.rng.lock().random();
        if roll < self.probability {
            AdmissionDecision::Retry
        } else {
            AdmissionDecision::Accept
        }
    }

    fn name(&self) -> &'static str {
        "random_reject"
    }
}

/// 令牌桶限流策略
///
/// 令牌耗尽时返回 RETRY
pub struct RateLimitPolicy {
    limiter: DefaultDirectRateLimiter,
}

impl RateLimitPolicy {
    pub fn new(per_second: NonZeroU32, burst: Option<NonZeroU32>) -> Self {
        let mut quota = Quota::per_second(per_second);
        if let Some(burst) = burst {
            quota = quota.allow_burst(burst);
        }

        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl AdmissionPolicy for RateLimitPolicy {
    fn decide(&self, _url: &str) -> AdmissionDecision {
        match self.limiter.check() {
            Ok(()) => AdmissionDecision::Accept,
            Err(_) => AdmissionDecision::Retry,
        }
    }

    fn name(&self) -> &'static str {
        "rate_limit"
    }
}

/// 运维开关
///
/// 打开时所有请求返回 UNAVAILABLE，调用方据此停止发送
#[derive(Default)]
pub struct KillSwitchPolicy {
    unavailable: AtomicBool,
}

impl KillSwitchPolicy {
    pub fn new(unavailable: bool) -> Self {
        Self {
            unavailable: AtomicBool::new(unavailable),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }
}

impl AdmissionPolicy for KillSwitchPolicy {
    fn decide(&self, _url: &str) -> AdmissionDecision {
        if self.is_unavailable() {
            AdmissionDecision::Unavailable
        } else {
            AdmissionDecision::Accept
        }
    }

    fn name(&self) -> &'static str {
        "kill_switch"
    }
}

/// 组合策略
///
/// 按顺序评估各策略，第一个非 Accept 的判定即为结果
pub struct CompositePolicy {
    policies: Vec<Arc<dyn AdmissionPolicy>>,
}

impl CompositePolicy {
    pub fn new(policies: Vec<Arc<dyn AdmissionPolicy>>) -> Self {
        Self { policies }
    }
}

impl AdmissionPolicy for CompositePolicy {
    fn decide(&self, url: &str) -> AdmissionDecision {
        for policy in &self.policies {
            let decision = policy.decide(url);
            if !decision.is_accept() {
                tracing::debug!(policy = policy.name(), ?decision, "Admission check tripped");
                return decision;
            }
        }
        AdmissionDecision::Accept
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}

/// 根据配置构建准入策略
///
/// 顺序为：运维开关 → 限流 → 随机拒绝
///
/// # 返回值
///
/// 返回组合策略以及运维开关句柄，后者可在运行时切换
pub fn build_policy(settings: &AdmissionSettings) -> (Arc<dyn AdmissionPolicy>, Arc<KillSwitchPolicy>) {
    let kill_switch = Arc::new(KillSwitchPolicy::new(settings.unavailable));
    let mut policies: Vec<Arc<dyn AdmissionPolicy>> = vec![kill_switch.clone()];

    if let Some(rate) = settings.rate_per_second.and_then(NonZeroU32::new) {
        let burst = settings.burst.and_then(NonZeroU32::new);
        policies.push(Arc::new(RateLimitPolicy::new(rate, burst)));
    }

    if settings.reject_probability > 0.0 {
        policies.push(Arc::new(RandomRejectPolicy::new(
            settings.reject_probability,
            settings.seed,
        )));
    }

    (Arc::new(CompositePolicy::new(policies)), kill_switch)
}
