//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 准入契约
//!
//! 桥接模式的核心接口：定义"如何在特定存储介质上执行限流算法"。
//! 每个实现代表一种"算法+存储"的组合，本地与共享后端必须满足
//! 完全一致的窗口语义。
//!
//! 实现约束：
//! - 无状态接口：全部状态由存储介质（内存/Redis）管理
//! - 线程安全：同一 key 的决策严格串行，不同 key 互不阻塞
//! - 原子性：单次 `try_admit` 决策必须是原子的

use async_trait::async_trait;

use crate::clock;
use crate::error::RateLimitError;

/// 准入存储接口
///
/// `Ok(false)` 表示被限流，是正常结果；存储故障返回 `Err(Storage(_))`，
/// 绝不伪装成拒绝。是否失败关闭（拒绝）或失败打开（放行）由调用方决定。
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    /// 尝试获取许可（自动取当前时间）
    ///
    /// # 参数
    /// - `key`: 限流键（如 user:123、api:send_sms）
    /// - `freq`: 时间窗口内最大请求次数
    /// - `interval_ms`: 时间窗口长度（毫秒）
    /// - `capacity`: 环形数组容量（本地后端使用）
    async fn try_admit(
        &self,
        key: &str,
        freq: u32,
        interval_ms: u64,
        capacity: u32,
    ) -> Result<bool, RateLimitError> {
        self.try_admit_at(key, freq, interval_ms, capacity, clock::now_millis())
            .await
    }

    /// 尝试获取许可（显式时间戳，供测试与时间注入使用）
    async fn try_admit_at(
        &self,
        key: &str,
        freq: u32,
        interval_ms: u64,
        capacity: u32,
        now_ms: u64,
    ) -> Result<bool, RateLimitError>;

    /// 获取当前存储的请求数量（监控用途；未知 key 返回 0）
    async fn current_count(&self, key: &str) -> Result<u64, RateLimitError>;

    /// 丢弃 key 的进程内状态（注册中心淘汰钩子）
    ///
    /// 默认空实现：共享后端的状态属于所有进程，只由键过期回收。
    /// 本地后端覆盖此方法，保证被淘汰的 key 重新获取时不携带历史记录。
    /// 对已持有旧缓冲区的在途决策无影响。
    fn invalidate(&self, key: &str) {
        let _ = key;
    }

    /// 重置指定 key 的限流状态（测试/运维钩子）
    async fn reset(&self, key: &str) -> Result<(), RateLimitError>;
}
