//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。
//!
//! 注意：`try_admit` 返回 `Ok(false)` 表示请求被限流，这是正常的业务结果，
//! 不属于错误；只有存储故障、配置非法等情况才会返回 `Err`。

use thiserror::Error;

use crate::config::{Algorithm, Backend};

/// 限流器错误类型
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// 无效配置（freq/interval/capacity 非正数，或 capacity < freq）
    #[error("无效配置: {0}")]
    InvalidConfiguration(String),

    /// 不支持的算法/存储组合
    #[error("不支持的组合: algorithm={algorithm}, backend={backend}")]
    UnsupportedCombination {
        /// 算法选择器（原始字符串）
        algorithm: String,
        /// 存储选择器（原始字符串）
        backend: String,
    },

    /// 算法槽位已声明但尚未实现
    #[error("未实现的组合: algorithm={0}, backend={1}")]
    NotImplemented(Algorithm, Backend),

    /// 后端不可用（如未配置 Redis 连接）
    #[error("后端不可用: {0}")]
    BackendUnavailable(String),

    /// 请求被限流（仅由拦截层产生，核心 `try_admit` 以 `Ok(false)` 表达拒绝）
    #[error("触发限流: key={0}")]
    RateLimitExceeded(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
}

/// 存储错误
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// 连接错误
    #[error("连接错误: {0}")]
    ConnectionError(String),

    /// 查询错误
    #[error("查询错误: {0}")]
    QueryError(String),

    /// 超时错误
    #[error("超时错误: {0}")]
    TimeoutError(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            StorageError::ConnectionError(err.to_string())
        } else if err.is_timeout() {
            StorageError::TimeoutError(err.to_string())
        } else {
            StorageError::QueryError(err.to_string())
        }
    }
}
