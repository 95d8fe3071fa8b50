//! 冷却/退避重试策略。
//!
//! 所有图片下载共用同一个 `BackoffPolicy`；等待通过 `Sleeper` 注入，测试时可替换为记录型实现。

use std::time::Duration;

/// 一次失败的类别，决定等待时长。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transient,
    EmptyBody,
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub timeout_base: Duration,
    pub transient_base: Duration,
    pub empty_body_delay: Duration,
    /// 每多一次尝试额外增加的等待（线性退避）。
    pub step: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_base: Duration::from_secs(3),
            transient_base: Duration::from_secs(2),
            empty_body_delay: Duration::from_secs(1),
            step: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// `attempt` 从 0 开始计数。
    pub fn delay(&self, kind: FailureKind, attempt: u32) -> Duration {
        match kind {
            FailureKind::Timeout => self.timeout_base + self.step * attempt,
            FailureKind::Transient => self.transient_base + self.step * attempt,
            FailureKind::EmptyBody => self.empty_body_delay,
        }
    }

    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts.max(1)
    }

    /// 失败后按策略等待；最后一次尝试之后不再等待。返回是否还应继续尝试。
    pub fn wait_before_retry(&self, sleeper: &dyn Sleeper, kind: FailureKind, attempt: u32) -> bool {
        if !self.has_next(attempt) {
            return false;
        }
        sleeper.sleep(self.delay(kind, attempt));
        true
    }
}
