//! 发送链路熔断器
//!
//! 连续失败达到阈值后打开，冷却窗口结束后自动复位为关闭。
//! 两态实现（开/关），冷却结束直接放量，无半开探测。
//! 状态为单一互斥保护单元：`is_open` 的读取-判定-复位与
//! `record_failure`/`record_success` 互相线性化，复位不会与新失败竞争

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{info, warn};

#[derive(Debug)]
struct BreakerState {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    open: bool,
}

/// 熔断器（仅保护发送链路，读链路不经过）
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                failure_count: 0,
                last_failure_at: None,
                open: false,
            }),
            failure_threshold,
            cooldown,
        }
    }

    // 计数器没有跨字段不变量，锁中毒时沿用内部状态即可
    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 是否处于打开状态
    ///
    /// 距最后一次失败已超过冷却窗口时，在同一临界区内复位
    /// （计数清零、关闭）后返回 false
    pub fn is_open(&self) -> bool {
        let mut state = self.lock_state();
        if state.open {
            let cooled_down = state
                .last_failure_at
                .map(|at| at.elapsed() >= self.cooldown)
                .unwrap_or(true);
            if cooled_down {
                state.open = false;
                state.failure_count = 0;
                state.last_failure_at = None;
                info!("Circuit breaker reset after cooldown");
            }
        }
        state.open
    }

    /// 记录一次失败；计数达到阈值时打开并告警
    pub fn record_failure(&self) {
        let mut state = self.lock_state();
        state.failure_count += 1;
        state.last_failure_at = Some(Instant::now());
        if state.failure_count >= self.failure_threshold && !state.open {
            state.open = true;
            warn!(
                failure_count = state.failure_count,
                "Circuit breaker opened after {} failures", state.failure_count
            );
        }
    }

    /// 记录一次成功：计数清零并关闭
    pub fn record_success(&self) {
        let mut state = self.lock_state();
        state.failure_count = 0;
        state.last_failure_at = None;
        state.open = false;
    }

    /// 当前失败计数（诊断与测试用）
    pub fn failure_count(&self) -> u32 {
        self.lock_state().failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试：达到阈值才打开
    #[test]
    fn opens_exactly_at_threshold() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));

        for _ in 0..4 {
            breaker.record_failure();
            assert!(!breaker.is_open());
        }

        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(breaker.failure_count(), 5);
    }

    /// 测试：成功后计数清零并关闭
    #[test]
    fn success_resets_counter_and_closes() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    /// 测试：冷却窗口结束后下一次检查自动复位
    #[test]
    fn auto_resets_after_cooldown() {
        let breaker = CircuitBreaker::new(5, Duration::from_millis(20));

        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());

        std::thread::sleep(Duration::from_millis(30));

        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    /// 测试：冷却期内保持打开
    #[test]
    fn stays_open_within_cooldown() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            breaker.record_failure();
        }

        assert!(breaker.is_open());
        assert!(breaker.is_open());
    }
}
