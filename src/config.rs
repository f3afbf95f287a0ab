//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 限流配置
//!
//! 定义算法/存储选择器、单个限流器的不可变配置以及注册中心级别的默认配置。
//! 配置文件绑定属于上层职责，本模块只负责类型定义与合法性校验。

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::RateLimitError;

/// 默认时间窗口内最大请求次数
pub const DEFAULT_FREQ: u32 = 100;

/// 默认时间窗口长度（毫秒）
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// 默认环形数组容量（freq + freq/2）
pub const DEFAULT_CAPACITY: u32 = 150;

/// 默认注册中心最大条目数
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// 默认空闲淘汰时长（10分钟）
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(600);

/// 默认Redis键前缀
pub const DEFAULT_KEY_PREFIX: &str = "qlimiter";

/// 限流算法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// 滑动窗口日志（唯一完整实现的算法）
    SlidingWindowLog,
    /// 滑动窗口计数（已声明，未实现）
    SlidingWindowCounter,
    /// 令牌桶（已声明，未实现）
    TokenBucket,
    /// 漏桶（已声明，未实现）
    LeakyBucket,
}

impl Algorithm {
    /// 算法选择器字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::SlidingWindowLog => "sliding-window-log",
            Algorithm::SlidingWindowCounter => "sliding-window-counter",
            Algorithm::TokenBucket => "token-bucket",
            Algorithm::LeakyBucket => "leaky-bucket",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sliding-window-log" => Ok(Algorithm::SlidingWindowLog),
            "sliding-window-counter" => Ok(Algorithm::SlidingWindowCounter),
            "token-bucket" => Ok(Algorithm::TokenBucket),
            "leaky-bucket" => Ok(Algorithm::LeakyBucket),
            other => Err(RateLimitError::UnsupportedCombination {
                algorithm: other.to_string(),
                backend: "*".to_string(),
            }),
        }
    }
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// 进程内存储
    Local,
    /// 共享Redis存储（多进程可见）
    Redis,
}

impl Backend {
    /// 存储选择器字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Redis => "redis",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Backend::Local),
            "redis" => Ok(Backend::Redis),
            other => Err(RateLimitError::UnsupportedCombination {
                algorithm: "*".to_string(),
                backend: other.to_string(),
            }),
        }
    }
}

/// 单个限流器的不可变配置
///
/// 通过 [`RateLimitConfig::builder`] 构建，`build` 阶段完成全部参数校验，
/// 之后不再变更。不变式：`freq > 0`、`interval_ms > 0`、`capacity >= freq`。
/// `capacity < freq` 时环形数组无法保留足够的历史记录，窗口内计数会偏小，
/// 导致限流被放宽，因此在构建期直接拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 算法类型
    pub algorithm: Algorithm,
    /// 存储类型
    pub backend: Backend,
    /// 时间窗口内最大请求次数
    pub freq: u32,
    /// 时间窗口长度（毫秒）
    pub interval_ms: u64,
    /// 环形数组容量（必须 >= freq）
    pub capacity: u32,
}

impl RateLimitConfig {
    /// 创建构建器
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::default()
    }

    /// 校验一组限流参数
    ///
    /// 供存储实现与注册中心在接受调用方参数前复用。
    pub fn validate(freq: u32, interval_ms: u64, capacity: u32) -> Result<(), RateLimitError> {
        if freq == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "freq 必须大于 0".to_string(),
            ));
        }
        if interval_ms == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "interval 必须大于 0".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "capacity 必须大于 0".to_string(),
            ));
        }
        if capacity < freq {
            return Err(RateLimitError::InvalidConfiguration(format!(
                "capacity 不能小于 freq: capacity={}, freq={}",
                capacity, freq
            )));
        }
        Ok(())
    }

    /// 由 freq 自动推导容量：freq + freq/2
    pub fn auto_capacity(freq: u32) -> u32 {
        freq + (freq >> 1)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SlidingWindowLog,
            backend: Backend::Local,
            freq: DEFAULT_FREQ,
            interval_ms: DEFAULT_INTERVAL_MS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// [`RateLimitConfig`] 构建器
#[derive(Debug, Default)]
pub struct RateLimitConfigBuilder {
    algorithm: Option<Algorithm>,
    backend: Option<Backend>,
    freq: Option<u32>,
    interval_ms: Option<u64>,
    capacity: Option<u32>,
}

impl RateLimitConfigBuilder {
    /// 设置算法类型
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// 设置存储类型
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 设置窗口内最大请求次数
    pub fn freq(mut self, freq: u32) -> Self {
        self.freq = Some(freq);
        self
    }

    /// 设置时间窗口长度（毫秒）
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// 设置环形数组容量
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// 构建配置对象
    ///
    /// 未指定 capacity 时自动推导为 `freq + freq/2`。
    ///
    /// # 错误
    /// 参数不合法时返回 [`RateLimitError::InvalidConfiguration`]。
    pub fn build(self) -> Result<RateLimitConfig, RateLimitError> {
        let defaults = RateLimitConfig::default();
        let freq = self.freq.unwrap_or(defaults.freq);
        let interval_ms = self.interval_ms.unwrap_or(defaults.interval_ms);
        let capacity = self
            .capacity
            .unwrap_or_else(|| RateLimitConfig::auto_capacity(freq));

        RateLimitConfig::validate(freq, interval_ms, capacity)?;

        Ok(RateLimitConfig {
            algorithm: self.algorithm.unwrap_or(defaults.algorithm),
            backend: self.backend.unwrap_or(defaults.backend),
            freq,
            interval_ms,
            capacity,
        })
    }
}

/// 注册中心级别的默认配置
///
/// 对应配置层暴露的表面：算法/存储选择器、默认限流参数、淘汰策略与键前缀。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// 默认算法类型
    pub algorithm: Algorithm,
    /// 默认存储类型
    pub backend: Backend,
    /// 默认窗口内最大请求次数
    pub freq: u32,
    /// 默认时间窗口长度（毫秒）
    pub interval_ms: u64,
    /// 默认环形数组容量
    pub capacity: u32,
    /// 空闲淘汰时长：超过该时长未访问的限流器被回收
    pub idle_ttl: Duration,
    /// 最大条目数：超出后按最久未访问淘汰
    pub max_entries: usize,
    /// Redis键前缀
    pub key_prefix: String,
}

impl RegistrySettings {
    /// 校验注册中心配置
    pub fn validate(&self) -> Result<(), RateLimitError> {
        RateLimitConfig::validate(self.freq, self.interval_ms, self.capacity)?;
        if self.max_entries == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "max_entries 必须大于 0".to_string(),
            ));
        }
        if self.idle_ttl.is_zero() {
            return Err(RateLimitError::InvalidConfiguration(
                "idle_ttl 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 默认配置对应的 [`RateLimitConfig`]
    pub fn default_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            algorithm: self.algorithm,
            backend: self.backend,
            freq: self.freq,
            interval_ms: self.interval_ms,
            capacity: self.capacity,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SlidingWindowLog,
            backend: Backend::Local,
            freq: DEFAULT_FREQ,
            interval_ms: DEFAULT_INTERVAL_MS,
            capacity: DEFAULT_CAPACITY,
            idle_ttl: DEFAULT_IDLE_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}
