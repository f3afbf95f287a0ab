//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 限流器句柄
//!
//! 对外的统一门面：持有一个准入执行器与该 key 的不可变配置，
//! 将决策委托给执行器（桥接模式中的 RefinedAbstraction 角色）。

use std::sync::Arc;
use tracing::debug;

use crate::clock;
use crate::config::{Algorithm, Backend, RateLimitConfig};
use crate::error::RateLimitError;
use crate::store::AdmissionStore;

/// 单个 key 的限流器句柄
///
/// 由注册中心创建并缓存；句柄本身无可变状态，可被任意多个
/// 调用方共享（`Arc<RateLimiter>`）。
pub struct RateLimiter {
    /// 准入执行器（算法+存储组合）
    store: Arc<dyn AdmissionStore>,
    /// 限流键
    key: String,
    /// 不可变配置
    config: RateLimitConfig,
}

impl RateLimiter {
    /// 创建限流器句柄
    pub fn new(store: Arc<dyn AdmissionStore>, key: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            store,
            key: key.into(),
            config,
        }
    }

    /// 尝试获取许可（自动取当前时间）
    ///
    /// `Ok(false)` 表示被限流；存储故障返回 `Err`。
    pub async fn try_admit(&self) -> Result<bool, RateLimitError> {
        self.try_admit_at(clock::now_millis()).await
    }

    /// 尝试获取许可（显式时间戳）
    pub async fn try_admit_at(&self, now_ms: u64) -> Result<bool, RateLimitError> {
        let allowed = self
            .store
            .try_admit_at(
                &self.key,
                self.config.freq,
                self.config.interval_ms,
                self.config.capacity,
                now_ms,
            )
            .await?;

        if !allowed {
            debug!(
                key = %self.key,
                algorithm = %self.config.algorithm,
                backend = %self.config.backend,
                "限流触发"
            );
        }

        Ok(allowed)
    }

    /// 当前存储的请求数量（监控用途）
    pub async fn current_count(&self) -> Result<u64, RateLimitError> {
        self.store.current_count(&self.key).await
    }

    /// 重置该 key 的限流状态
    pub async fn reset(&self) -> Result<(), RateLimitError> {
        self.store.reset(&self.key).await
    }

    /// 丢弃该 key 的进程内状态（注册中心淘汰时调用）
    pub(crate) fn invalidate(&self) {
        self.store.invalidate(&self.key);
    }

    /// 限流键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 算法类型
    pub fn algorithm(&self) -> Algorithm {
        self.config.algorithm
    }

    /// 存储类型
    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    /// 限流配置
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
