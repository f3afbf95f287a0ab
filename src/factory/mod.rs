//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 执行器工厂模块
//!
//! 根据（算法, 存储）组合创建对应的准入执行器，并按组合缓存实例，
//! 首次之后的查找为 O(1)。新的组合通过在 `create` 中注册新分支接入，
//! 注册中心无需改动。
//!
//! # 错误
//!
//! - 未配置 Redis 连接却请求共享后端 -> [`RateLimitError::BackendUnavailable`]
//! - 已声明但未实现的算法槽位 -> [`RateLimitError::NotImplemented`]
//! - 未知选择器字符串（配置层解析阶段）-> [`RateLimitError::UnsupportedCombination`]

use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::info;

use crate::config::{Algorithm, Backend, DEFAULT_KEY_PREFIX};
use crate::error::RateLimitError;
use crate::local_store::LocalSlidingWindowLog;
use crate::redis_store::RedisSlidingWindowLog;
use crate::store::AdmissionStore;

/// 执行器工厂
///
/// 执行器无 key 级状态耦合，同一组合的所有限流器共享一个实例。
pub struct ExecutorFactory {
    /// (算法, 存储) -> 执行器缓存
    executors: DashMap<(Algorithm, Backend), Arc<dyn AdmissionStore>>,
    /// Redis连接（仅共享后端需要，装配阶段注入）
    redis_conn: Option<ConnectionManager>,
    /// Redis键前缀
    key_prefix: String,
}

impl ExecutorFactory {
    /// 创建工厂（仅本地后端可用）
    pub fn new() -> Self {
        Self {
            executors: DashMap::new(),
            redis_conn: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// 注入Redis连接，启用共享后端
    pub fn with_redis(mut self, conn: ConnectionManager) -> Self {
        self.redis_conn = Some(conn);
        self
    }

    /// 设置Redis键前缀
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// 获取执行器实例（带缓存）
    pub fn get(
        &self,
        algorithm: Algorithm,
        backend: Backend,
    ) -> Result<Arc<dyn AdmissionStore>, RateLimitError> {
        if let Some(executor) = self.executors.get(&(algorithm, backend)) {
            return Ok(executor.clone());
        }

        let executor = self.create(algorithm, backend)?;
        info!(%algorithm, %backend, "创建限流执行器");

        // 并发首次访问可能构造出多个实例，entry 保证只有一个进入缓存
        Ok(self
            .executors
            .entry((algorithm, backend))
            .or_insert(executor)
            .clone())
    }

    /// 实际创建执行器
    fn create(
        &self,
        algorithm: Algorithm,
        backend: Backend,
    ) -> Result<Arc<dyn AdmissionStore>, RateLimitError> {
        match backend {
            Backend::Local => match algorithm {
                Algorithm::SlidingWindowLog => Ok(Arc::new(LocalSlidingWindowLog::new())),
                other => Err(RateLimitError::NotImplemented(other, backend)),
            },
            Backend::Redis => {
                let conn = self.redis_conn.clone().ok_or_else(|| {
                    RateLimitError::BackendUnavailable(
                        "未配置Redis连接，无法创建共享后端执行器".to_string(),
                    )
                })?;
                match algorithm {
                    Algorithm::SlidingWindowLog => Ok(Arc::new(RedisSlidingWindowLog::new(
                        conn,
                        self.key_prefix.clone(),
                    ))),
                    other => Err(RateLimitError::NotImplemented(other, backend)),
                }
            }
        }
    }

    /// 缓存的执行器数量
    pub fn cached_executors(&self) -> usize {
        self.executors.len()
    }

    /// 清空执行器缓存（动态配置刷新场景）
    pub fn clear_cache(&self) {
        info!("清空执行器缓存");
        self.executors.clear();
    }
}

impl Default for ExecutorFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_sliding_window_log_available() {
        let factory = ExecutorFactory::new();
        let executor = factory
            .get(Algorithm::SlidingWindowLog, Backend::Local)
            .unwrap();
        assert_eq!(factory.cached_executors(), 1);
        drop(executor);
    }

    #[test]
    fn test_executor_is_cached() {
        let factory = ExecutorFactory::new();
        let a = factory
            .get(Algorithm::SlidingWindowLog, Backend::Local)
            .unwrap();
        let b = factory
            .get(Algorithm::SlidingWindowLog, Backend::Local)
            .unwrap();
        // 同一组合返回同一个实例
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.cached_executors(), 1);
    }

    #[test]
    fn test_unimplemented_algorithms() {
        let factory = ExecutorFactory::new();
        for algorithm in [
            Algorithm::SlidingWindowCounter,
            Algorithm::TokenBucket,
            Algorithm::LeakyBucket,
        ] {
            let result = factory.get(algorithm, Backend::Local);
            assert!(matches!(result, Err(RateLimitError::NotImplemented(_, _))));
        }
        // 失败的组合不进入缓存
        assert_eq!(factory.cached_executors(), 0);
    }

    #[test]
    fn test_redis_backend_requires_connection() {
        let factory = ExecutorFactory::new();
        let result = factory.get(Algorithm::SlidingWindowLog, Backend::Redis);
        assert!(matches!(
            result,
            Err(RateLimitError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_clear_cache() {
        let factory = ExecutorFactory::new();
        factory
            .get(Algorithm::SlidingWindowLog, Backend::Local)
            .unwrap();
        factory.clear_cache();
        assert_eq!(factory.cached_executors(), 0);
    }
}
