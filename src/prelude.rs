//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 常用类型一站式导入
//!
//! `use qlimiter::prelude::*;`

pub use crate::config::{Algorithm, Backend, RateLimitConfig, RegistrySettings};
pub use crate::error::{RateLimitError, StorageError};
pub use crate::factory::ExecutorFactory;
pub use crate::interceptor::RateLimitGuard;
pub use crate::limiter::RateLimiter;
pub use crate::registry::{LimiterRegistry, RegistryStats};
pub use crate::store::AdmissionStore;
