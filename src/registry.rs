//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 限流器注册中心
//!
//! 管理 key -> 限流器句柄的映射，保证并发首次访问下每个 key 只构造
//! 一次句柄，并通过空闲淘汰与最大条目数双重软限制约束内存占用。
//!
//! 淘汰是机会性的：在未命中路径之后顺带执行，也可显式调用
//! [`LimiterRegistry::evict_idle`] / [`LimiterRegistry::enforce_max_entries`]。
//! 被淘汰 key 的旧句柄对已持有它的调用方仍然有效，只是不再能从
//! 注册中心获取到。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{RateLimitConfig, RegistrySettings};
use crate::error::RateLimitError;
use crate::factory::ExecutorFactory;
use crate::limiter::RateLimiter;

/// 注册中心条目
struct RegistryEntry {
    /// 限流器句柄
    limiter: Arc<RateLimiter>,
    /// 最后访问时间（每次命中刷新）
    last_access: Instant,
}

/// 注册中心统计信息
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryStats {
    /// 已创建的句柄总数
    pub created: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 累计淘汰次数
    pub evictions: u64,
    /// 当前条目数
    pub size: usize,
}

impl RegistryStats {
    /// 缓存命中率（无访问时为 0）
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 限流器注册中心
pub struct LimiterRegistry {
    /// key -> 条目
    entries: DashMap<String, RegistryEntry>,
    /// 默认配置与淘汰策略
    settings: RegistrySettings,
    /// 执行器工厂
    factory: Arc<ExecutorFactory>,
    /// 统计：已创建句柄数
    created: AtomicU64,
    /// 统计：命中次数
    hits: AtomicU64,
    /// 统计：未命中次数
    misses: AtomicU64,
    /// 统计：淘汰次数
    evictions: AtomicU64,
}

impl LimiterRegistry {
    /// 创建注册中心
    ///
    /// # 错误
    /// 配置不合法时返回 [`RateLimitError::InvalidConfiguration`]。
    pub fn new(
        settings: RegistrySettings,
        factory: Arc<ExecutorFactory>,
    ) -> Result<Self, RateLimitError> {
        settings.validate()?;

        info!(
            freq = settings.freq,
            interval_ms = settings.interval_ms,
            capacity = settings.capacity,
            max_entries = settings.max_entries,
            idle_ttl_secs = settings.idle_ttl.as_secs(),
            "初始化限流器注册中心"
        );

        Ok(Self {
            entries: DashMap::new(),
            settings,
            factory,
            created: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// 获取或创建指定 key 的限流器（使用注册中心默认配置）
    pub fn get_or_create(&self, key: &str) -> Result<Arc<RateLimiter>, RateLimitError> {
        self.get_or_create_with(key, None, None, None)
    }

    /// 获取或创建指定 key 的限流器（可覆盖默认限流参数）
    ///
    /// - 省略的参数取注册中心默认值
    /// - 指定了 freq 但省略 capacity 时，容量自动推导为 `freq + freq/2`
    /// - 参数校验在写入注册中心之前完成，校验失败不产生任何状态
    pub fn get_or_create_with(
        &self,
        key: &str,
        freq: Option<u32>,
        interval_ms: Option<u64>,
        capacity: Option<u32>,
    ) -> Result<Arc<RateLimiter>, RateLimitError> {
        if key.trim().is_empty() {
            return Err(RateLimitError::InvalidConfiguration(
                "限流 key 不能为空".to_string(),
            ));
        }

        let resolved_freq = freq.unwrap_or(self.settings.freq);
        let resolved_interval = interval_ms.unwrap_or(self.settings.interval_ms);
        let resolved_capacity = capacity.unwrap_or_else(|| match freq {
            Some(f) => RateLimitConfig::auto_capacity(f),
            None => self.settings.capacity,
        });

        // 先校验后写入：非法参数绝不触碰注册中心状态
        RateLimitConfig::validate(resolved_freq, resolved_interval, resolved_capacity)?;

        let limiter = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                occupied.get_mut().last_access = Instant::now();
                occupied.get().limiter.clone()
            }
            Entry::Vacant(vacant) => {
                self.misses.fetch_add(1, Ordering::Relaxed);

                let config = RateLimitConfig {
                    algorithm: self.settings.algorithm,
                    backend: self.settings.backend,
                    freq: resolved_freq,
                    interval_ms: resolved_interval,
                    capacity: resolved_capacity,
                };

                // 工厂失败时 entry 守卫随 `?` 释放，注册中心保持不变
                let executor = self.factory.get(config.algorithm, config.backend)?;
                let limiter = Arc::new(RateLimiter::new(executor, key, config));
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!(key, freq = resolved_freq, interval_ms = resolved_interval, "创建限流器");

                vacant.insert(RegistryEntry {
                    limiter: limiter.clone(),
                    last_access: Instant::now(),
                });
                limiter
            }
        };

        // entry 守卫已释放，机会性淘汰不会与上面的写路径死锁
        if self.entries.len() > self.settings.max_entries {
            self.enforce_max_entries();
        }

        Ok(limiter)
    }

    /// 判断指定 key 是否已有限流器（不创建新实例）
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 手动移除指定 key 的限流器
    pub fn remove(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            entry.limiter.invalidate();
            debug!(key, "手动移除限流器");
        }
    }

    /// 清空所有限流器
    pub fn clear(&self) {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let size = keys.len();
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                entry.limiter.invalidate();
            }
        }
        info!(previous_size = size, "清空限流器注册中心");
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 淘汰空闲超过 `idle_ttl` 的条目，返回淘汰数量
    pub fn evict_idle(&self) -> usize {
        let idle_ttl = self.settings.idle_ttl;

        // 先快照再按条件移除：移除瞬间重新检查空闲时长，
        // 避免误杀快照之后刚被访问过的条目
        let idle_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().last_access.elapsed() >= idle_ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0usize;
        for key in idle_keys {
            let removed = self
                .entries
                .remove_if(&key, |_, entry| entry.last_access.elapsed() >= idle_ttl);
            if let Some((_, entry)) = removed {
                entry.limiter.invalidate();
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "空闲淘汰");
        }
        evicted
    }

    /// 按最久未访问淘汰，直到条目数不超过 `max_entries`，返回淘汰数量
    ///
    /// 软限制：扫描期间的并发写入可能让条目数短暂越界，下一次
    /// 机会性淘汰会再次收敛。
    pub fn enforce_max_entries(&self) -> usize {
        let max_entries = self.settings.max_entries;
        let size = self.entries.len();
        if size <= max_entries {
            return 0;
        }

        // 快照 (key, last_access) 后按最旧排序，再逐个移除
        let mut snapshot: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_access))
            .collect();
        snapshot.sort_by_key(|(_, last_access)| *last_access);

        let overflow = snapshot.len().saturating_sub(max_entries);
        let mut evicted = 0usize;
        for (key, _) in snapshot.into_iter().take(overflow) {
            if let Some((_, entry)) = self.entries.remove(&key) {
                entry.limiter.invalidate();
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, max_entries, "容量淘汰");
        }
        evicted
    }

    /// 注册中心统计信息
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            created: self.created.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }

    /// 注册中心配置
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            settings: RegistrySettings::default(),
            factory: Arc::new(ExecutorFactory::new()),
            created: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }
}
