//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Redis 滑动窗口日志存储
//!
//! 共享后端：用 Redis ZSet 表示某 key 的请求历史，score 为毫秒时间戳，
//! member 为 `"<时间戳>:<消歧后缀>"`。整个决策由单个 Lua 脚本在服务端
//! 原子完成（清理、计数、条件写入、续期），一次网络往返。
//!
//! 原子性是正确性的关键：没有它，并发调用者可能同时观察到 count < freq
//! 并同时写入，突破 freq 限制。消歧后缀保证同一毫秒内的两次放行
//! 不会在 ZSet 中塌缩成一条记录。
//!
//! 键通过 EXPIRE 自过期，闲置 key 不会泄漏共享存储。

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::clock;
use crate::config::DEFAULT_KEY_PREFIX;
use crate::error::{RateLimitError, StorageError};
use crate::store::AdmissionStore;

/// 滑动窗口日志 Lua 脚本
///
/// KEYS[1] - 完整Redis键
/// ARGV[1] - 窗口起始时间戳（毫秒）
/// ARGV[2] - freq（窗口内最大请求次数）
/// ARGV[3] - 当前时间戳（毫秒，作为 score）
/// ARGV[4] - 过期秒数
/// ARGV[5] - 消歧后缀（per-call 唯一）
///
/// 返回: 1 放行 / 0 拒绝
pub const SLIDING_WINDOW_LOG_SCRIPT: &str = r#"
local key = KEYS[1]
local freq = tonumber(ARGV[2])

-- 清理窗口外的记录（score < window_start，与本地后端的 >= 语义一致）
redis.call('ZREMRANGEBYSCORE', key, '-inf', '(' .. ARGV[1])

-- 统计窗口内的请求数
local count = redis.call('ZCARD', key)

if count >= freq then
    return 0
end

-- 放行：写入当前请求并刷新过期时间
redis.call('ZADD', key, ARGV[3], ARGV[3] .. ':' .. ARGV[5])
redis.call('EXPIRE', key, ARGV[4])
return 1
"#;

/// Redis连接配置
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 连接超时
    pub connection_timeout: std::time::Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout: std::time::Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// 建立连接，返回可克隆的连接管理器
    ///
    /// 连接管理器内部处理断线重连；调用方在装配阶段完成连接，
    /// 之后注入工厂以创建共享后端执行器。
    pub async fn connect(&self) -> Result<ConnectionManager, StorageError> {
        info!(url = %self.url, "建立Redis连接");

        let client = Client::open(self.url.as_str()).map_err(StorageError::from)?;

        let conn = tokio::time::timeout(self.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StorageError::TimeoutError("Redis连接超时".to_string()))?
            .map_err(StorageError::from)?;

        info!("Redis连接建立成功");
        Ok(conn)
    }
}

/// Redis 滑动窗口日志执行器
///
/// 键布局：`<prefix>:sliding-window-log:<key>`。
pub struct RedisSlidingWindowLog {
    /// 连接管理器（克隆开销低，每次调用克隆一份）
    conn: ConnectionManager,
    /// 预解析的 Lua 脚本（EVALSHA + 自动重载）
    script: Script,
    /// 键前缀
    key_prefix: String,
}

impl RedisSlidingWindowLog {
    /// 创建Redis执行器
    pub fn new(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        let key_prefix = key_prefix.into();
        let key_prefix = if key_prefix.is_empty() {
            DEFAULT_KEY_PREFIX.to_string()
        } else {
            key_prefix
        };

        Self {
            conn,
            script: Script::new(SLIDING_WINDOW_LOG_SCRIPT),
            key_prefix,
        }
    }

    /// 构建完整Redis键
    fn redis_key(&self, key: &str) -> String {
        build_redis_key(&self.key_prefix, key)
    }
}

/// 键布局：`<prefix>:sliding-window-log:<key>`
fn build_redis_key(prefix: &str, key: &str) -> String {
    format!("{}:sliding-window-log:{}", prefix, key)
}

#[async_trait]
impl AdmissionStore for RedisSlidingWindowLog {
    async fn try_admit_at(
        &self,
        key: &str,
        freq: u32,
        interval_ms: u64,
        capacity: u32,
        now_ms: u64,
    ) -> Result<bool, RateLimitError> {
        // capacity 对ZSet后端没有存储意义，但契约校验保持与本地后端一致
        crate::config::RateLimitConfig::validate(freq, interval_ms, capacity)?;

        let redis_key = self.redis_key(key);
        let window_start = now_ms.saturating_sub(interval_ms);
        let expire_seconds = clock::expire_seconds(interval_ms);
        // 同一毫秒内的并发放行靠该后缀区分
        let disambiguator = Uuid::new_v4().simple().to_string();

        let mut conn = self.conn.clone();
        let result: i64 = self
            .script
            .key(&redis_key)
            .arg(window_start)
            .arg(freq)
            .arg(now_ms)
            .arg(expire_seconds)
            .arg(&disambiguator)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!(key, error = %e, "滑动窗口脚本执行失败");
                StorageError::from(e)
            })?;

        let allowed = result == 1;
        if !allowed {
            debug!(key, freq, interval_ms, "Redis后端触发限流");
        }
        Ok(allowed)
    }

    async fn current_count(&self, key: &str) -> Result<u64, RateLimitError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn.clone();

        let count: u64 = redis::cmd("ZCARD")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn.clone();

        redis::cmd("DEL")
            .arg(&redis_key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
