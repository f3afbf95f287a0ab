//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! qlimiter - Embeddable Sliding-Window-Log Rate Limiter
//!
//! Decides in bounded time whether to admit or reject a request for a given
//! key, frequency bound, and time window — correctly under concurrency and
//! across two interchangeable backends (in-process memory and shared Redis).
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use qlimiter::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`LimiterRegistry`] - key -> limiter handle cache with bounded footprint
//! - [`RateLimiter`] - per-key admission handle
//! - [`ExecutorFactory`] - (algorithm, backend) -> executor bridge
//! - [`AdmissionStore`] - the admission contract both backends satisfy
//! - [`RateLimitError`] - error types
//!
//! # Examples
//!
//! ```rust
//! use qlimiter::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RateLimitError> {
//!     let registry = LimiterRegistry::new(
//!         RegistrySettings::default(),
//!         Arc::new(ExecutorFactory::new()),
//!     )?;
//!
//!     // 每分钟最多 100 次（默认配置）
//!     let limiter = registry.get_or_create("user:42")?;
//!     let allowed = limiter.try_admit().await?;
//!     assert!(allowed);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Exact sliding window**: timestamp log with binary-search counting,
//!   O(log capacity) per decision
//! - **Two backends, one contract**: per-key-locked local buffers and an
//!   atomic Redis Lua script produce identical admit/reject sequences
//! - **Bounded registry**: exactly-once handle construction per key, idle
//!   and LRU eviction
//! - **Clock-rollback safety**: backward clock movement never reopens an
//!   exhausted window

pub mod clock;
pub mod config;
pub mod error;
pub mod factory;
pub mod interceptor;
pub mod limiter;
pub mod local_store;
pub mod prelude;
pub mod redis_store;
pub mod registry;
pub mod store;
pub mod window;

// 重新导出常用类型
pub use config::{Algorithm, Backend, RateLimitConfig, RateLimitConfigBuilder, RegistrySettings};
pub use error::{RateLimitError, StorageError};
pub use factory::ExecutorFactory;
pub use interceptor::RateLimitGuard;
pub use limiter::RateLimiter;
pub use local_store::LocalSlidingWindowLog;
pub use redis_store::{RedisConfig, RedisSlidingWindowLog};
pub use registry::{LimiterRegistry, RegistryStats};
pub use store::AdmissionStore;
pub use window::WindowLog;
