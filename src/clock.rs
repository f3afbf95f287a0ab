//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 时间工具
//!
//! 限流窗口统一使用毫秒级 Unix 时间戳。算法入口同时提供显式时间戳的
//! `*_at` 变体，便于行为测试与多进程场景下的时间注入。

use std::time::{SystemTime, UNIX_EPOCH};

/// 获取当前毫秒级 Unix 时间戳
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        // 系统时钟早于 1970 年时按 0 处理，后续的回拨修正逻辑会兜底
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 毫秒窗口对应的Redis过期秒数：ceil(interval_ms / 1000) + 60
///
/// 额外的 60 秒余量保证窗口外数据在键过期前一定已被脚本清理。
pub fn expire_seconds(interval_ms: u64) -> u64 {
    (interval_ms + 999) / 1000 + 60
}
