//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 限流守卫（显式装饰器）
//!
//! 在调用点从请求上下文派生限流 key，可选地覆盖默认限流参数，
//! 然后走准入契约。拒绝在这里被翻译为
//! [`RateLimitError::RateLimitExceeded`]，由上层决定如何呈现
//! （HTTP 状态码等不在本 crate 职责内）。

use std::sync::Arc;
use tracing::debug;

use crate::error::RateLimitError;
use crate::registry::LimiterRegistry;

/// 守卫级别的限流参数覆盖
#[derive(Debug, Clone, Copy)]
struct GuardLimits {
    freq: u32,
    interval_ms: u64,
    capacity: Option<u32>,
}

/// 限流守卫
///
/// 持有注册中心与一个 key 派生闭包。`C` 是调用方的请求上下文类型，
/// 闭包负责从中提取限流 key（用户ID、IP、API标识等）。
pub struct RateLimitGuard<C> {
    registry: Arc<LimiterRegistry>,
    key_fn: Box<dyn Fn(&C) -> String + Send + Sync>,
    limits: Option<GuardLimits>,
}

impl<C> RateLimitGuard<C> {
    /// 创建守卫
    pub fn new(
        registry: Arc<LimiterRegistry>,
        key_fn: impl Fn(&C) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            registry,
            key_fn: Box::new(key_fn),
            limits: None,
        }
    }

    /// 覆盖默认限流参数（容量自动推导为 freq + freq/2）
    pub fn with_limits(mut self, freq: u32, interval_ms: u64) -> Self {
        self.limits = Some(GuardLimits {
            freq,
            interval_ms,
            capacity: None,
        });
        self
    }

    /// 在覆盖参数的基础上显式指定容量
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        if let Some(limits) = self.limits.as_mut() {
            limits.capacity = Some(capacity);
        }
        self
    }

    /// 检查当前请求是否放行
    ///
    /// # 错误
    /// - 被限流 -> [`RateLimitError::RateLimitExceeded`]（携带派生出的 key）
    /// - 配置非法 / 存储故障按原样向上传播
    pub async fn check(&self, ctx: &C) -> Result<(), RateLimitError> {
        let key = (self.key_fn)(ctx);

        let limiter = match self.limits {
            Some(limits) => self.registry.get_or_create_with(
                &key,
                Some(limits.freq),
                Some(limits.interval_ms),
                limits.capacity,
            )?,
            None => self.registry.get_or_create(&key)?,
        };

        if limiter.try_admit().await? {
            Ok(())
        } else {
            debug!(key = %key, "守卫拦截请求");
            Err(RateLimitError::RateLimitExceeded(key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrySettings;
    use crate::factory::ExecutorFactory;

    struct Request {
        user_id: u64,
    }

    fn guarded_registry() -> Arc<LimiterRegistry> {
        let settings = RegistrySettings::default();
        Arc::new(LimiterRegistry::new(settings, Arc::new(ExecutorFactory::new())).unwrap())
    }

    #[tokio::test]
    async fn test_guard_admits_then_rejects() {
        let registry = guarded_registry();
        let guard = RateLimitGuard::new(registry, |req: &Request| format!("user:{}", req.user_id))
            .with_limits(2, 60_000);

        let req = Request { user_id: 7 };
        assert!(guard.check(&req).await.is_ok());
        assert!(guard.check(&req).await.is_ok());

        let result = guard.check(&req).await;
        match result {
            Err(RateLimitError::RateLimitExceeded(key)) => assert_eq!(key, "user:7"),
            other => panic!("预期 RateLimitExceeded，实际 {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_guard_keys_are_independent() {
        let registry = guarded_registry();
        let guard = RateLimitGuard::new(registry, |req: &Request| format!("user:{}", req.user_id))
            .with_limits(1, 60_000);

        assert!(guard.check(&Request { user_id: 1 }).await.is_ok());
        // 另一个用户不受影响
        assert!(guard.check(&Request { user_id: 2 }).await.is_ok());
        assert!(guard.check(&Request { user_id: 1 }).await.is_err());
    }

    #[tokio::test]
    async fn test_guard_invalid_override_propagates() {
        let registry = guarded_registry();
        let guard = RateLimitGuard::new(registry, |_: &Request| "fixed".to_string())
            .with_limits(10, 1000)
            .with_capacity(5);

        let result = guard.check(&Request { user_id: 1 }).await;
        assert!(matches!(
            result,
            Err(RateLimitError::InvalidConfiguration(_))
        ));
    }
}
