//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 本地滑动窗口日志存储
//!
//! 进程内后端：每个 key 对应一个 [`WindowLog`] 环形缓冲区，
//! 外层用 DashMap 做并发索引，内层用 parking_lot 互斥锁保证
//! 同一 key 的决策严格串行。不同 key 的锁互不相关，永不竞争。
//!
//! 时间复杂度 O(log capacity)，空间复杂度 O(capacity) / key。

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use async_trait::async_trait;

use crate::config::RateLimitConfig;
use crate::error::RateLimitError;
use crate::store::AdmissionStore;
use crate::window::WindowLog;

/// 本地滑动窗口日志执行器
///
/// 首次访问某 key 时原子地创建其缓冲区（不会重复构造）；
/// 缓冲区仅在 `reset` 或上层注册中心淘汰时被回收。
pub struct LocalSlidingWindowLog {
    /// key -> 环形缓冲区
    buffers: DashMap<String, Arc<Mutex<WindowLog>>>,
}

impl LocalSlidingWindowLog {
    /// 创建本地执行器
    pub fn new() -> Self {
        Self {
            buffers: DashMap::new(),
        }
    }

    /// 获取或原子创建 key 对应的缓冲区
    ///
    /// 参数已在调用前校验，构造不会失败。并发首次访问时
    /// `or_insert` 保证所有调用者拿到同一个缓冲区。
    fn buffer_for(
        &self,
        key: &str,
        capacity: u32,
        freq: u32,
        interval_ms: u64,
    ) -> Result<Arc<Mutex<WindowLog>>, RateLimitError> {
        if let Some(buffer) = self.buffers.get(key) {
            return Ok(buffer.clone());
        }

        let log = WindowLog::new(capacity, freq, interval_ms)?;
        debug!(key, capacity, "创建滑动窗口缓冲区");
        Ok(self
            .buffers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(log)))
            .clone())
    }

    /// 当前缓存的 key 数量
    pub fn tracked_keys(&self) -> usize {
        self.buffers.len()
    }
}

impl Default for LocalSlidingWindowLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdmissionStore for LocalSlidingWindowLog {
    async fn try_admit_at(
        &self,
        key: &str,
        freq: u32,
        interval_ms: u64,
        capacity: u32,
        now_ms: u64,
    ) -> Result<bool, RateLimitError> {
        RateLimitConfig::validate(freq, interval_ms, capacity)?;

        let buffer = self.buffer_for(key, capacity, freq, interval_ms)?;

        // key 级临界区：整个决策（回拨修正、窗口统计、记录写入）在锁内完成，
        // parking_lot 的 guard 在所有退出路径上自动释放
        let mut log = buffer.lock();
        Ok(log.admit_at(now_ms, freq, interval_ms))
    }

    async fn current_count(&self, key: &str) -> Result<u64, RateLimitError> {
        match self.buffers.get(key) {
            Some(buffer) => Ok(buffer.lock().len() as u64),
            None => Ok(0),
        }
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        self.buffers.remove(key);
        Ok(())
    }

    fn invalidate(&self, key: &str) {
        self.buffers.remove(key);
    }
}
