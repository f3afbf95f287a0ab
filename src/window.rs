//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 滑动窗口日志核心
//!
//! 基于环形数组的高性能滑动窗口计数器，使用二分查找在 O(log capacity)
//! 时间内统计窗口内的记录数。纯数据结构，不含任何锁与 I/O；
//! 并发控制由上层（本地存储的 per-key 互斥锁）负责。
//!
//! # 不变式
//!
//! - 时间戳按非递减顺序存储（时钟回拨在入口处被修正）
//! - 任意时刻有效元素不超过 `capacity`
//! - `size` 个元素对应该 key 最近 `size` 次被放行的请求

use crate::config::RateLimitConfig;
use crate::error::RateLimitError;

/// 滑动窗口时间戳日志（环形缓冲区）
#[derive(Debug)]
pub struct WindowLog {
    /// 时间戳数组（环形缓冲区）
    timestamps: Box<[u64]>,
    /// 时间窗口内最大请求次数（默认值，`try_admit` 使用）
    freq: u32,
    /// 时间窗口长度（毫秒，默认值，`try_admit` 使用）
    interval_ms: u64,
    /// 当前有效元素数量
    size: usize,
    /// 指向最旧的元素（逻辑索引0）
    head: usize,
    /// 指向下一个写入位置
    tail: usize,
}

impl WindowLog {
    /// 创建滑动窗口日志
    ///
    /// # 参数
    /// - `capacity`: 环形数组容量（必须 >= freq）
    /// - `freq`: 时间窗口内最大请求次数
    /// - `interval_ms`: 时间窗口长度（毫秒）
    ///
    /// # 错误
    /// 参数非正数或 `capacity < freq` 时返回
    /// [`RateLimitError::InvalidConfiguration`]，构建期失败而非调用期。
    pub fn new(capacity: u32, freq: u32, interval_ms: u64) -> Result<Self, RateLimitError> {
        RateLimitConfig::validate(freq, interval_ms, capacity)?;

        Ok(Self {
            timestamps: vec![0u64; capacity as usize].into_boxed_slice(),
            freq,
            interval_ms,
            size: 0,
            head: 0,
            tail: 0,
        })
    }

    /// 判断是否放行并记录当前请求（使用构建时的 freq/interval）
    ///
    /// # 返回
    /// `true` 表示放行（时间戳已记录），`false` 表示被限流（状态不变）。
    pub fn try_admit(&mut self, now_ms: u64) -> bool {
        self.admit_at(now_ms, self.freq, self.interval_ms)
    }

    /// 判断是否放行并记录当前请求（逐调用指定 freq/interval）
    ///
    /// 供本地存储使用：缓冲区按 key 复用，限流参数来自每次调用。
    /// 调用方必须保证参数已通过校验且 `freq <= capacity`。
    pub fn admit_at(&mut self, now_ms: u64, freq: u32, interval_ms: u64) -> bool {
        let mut now = now_ms;

        // 时钟回拨检测与修正：回拨或乱序时钳制到最后一条记录的时间，
        // 保证窗口计算不为负，也不会让已耗尽的窗口被重新打开
        if self.size > 0 {
            let last = self.logical(self.size - 1);
            if now < last {
                now = last;
            }
        }

        let window_start = now.saturating_sub(interval_ms);
        let count = self.count_in_window(window_start);

        if count >= freq as usize {
            return false;
        }

        self.push(now);
        true
    }

    /// 统计时间戳 >= `window_start` 的记录数量
    ///
    /// lower_bound 的返回范围是 [0, size]：所有记录都在窗口外时返回 size，
    /// 结果恰为 0，调用方无需哨兵分支。
    pub fn count_in_window(&self, window_start: u64) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.size - self.lower_bound(window_start)
    }

    /// 二分查找：逻辑索引中第一个时间戳 >= `target` 的位置
    ///
    /// 时间戳按非递减顺序插入，因此该单调谓词查找成立。
    /// 返回范围 [0, size]；全部 < target 时返回 size，全部 >= target 时返回 0。
    fn lower_bound(&self, target: u64) -> usize {
        let mut l: usize = 0;
        let mut r: isize = self.size as isize - 1;

        while l as isize <= r {
            // 防溢出的中点计算
            let mid = l + ((r as usize - l) >> 1);
            if self.logical(mid) < target {
                l = mid + 1;
            } else {
                r = mid as isize - 1;
            }
        }

        l
    }

    /// 在环形尾部记录时间戳
    ///
    /// 数组已满时最旧的元素被静默覆盖（隐式淘汰，不是错误），逻辑头前移一位。
    fn push(&mut self, timestamp: u64) {
        self.timestamps[self.tail] = timestamp;

        if self.size < self.capacity() {
            self.size += 1;
        } else {
            self.head = (self.head + 1) % self.capacity();
        }

        self.tail = (self.tail + 1) % self.capacity();
    }

    /// 逻辑索引转物理索引后取时间戳（0=最旧，size-1=最新）
    fn logical(&self, logical_index: usize) -> u64 {
        debug_assert!(logical_index < self.size);
        let physical = (self.head + logical_index) % self.capacity();
        self.timestamps[physical]
    }

    /// 环形数组容量
    pub fn capacity(&self) -> usize {
        self.timestamps.len()
    }

    /// 当前有效元素数量
    pub fn len(&self) -> usize {
        self.size
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// 是否已满
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    /// 最旧记录的时间戳（空时返回 None）
    pub fn oldest(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.logical(0))
        }
    }

    /// 最新记录的时间戳（空时返回 None）
    pub fn latest(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.logical(self.size - 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(
            WindowLog::new(0, 1, 1000),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            WindowLog::new(5, 0, 1000),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            WindowLog::new(5, 3, 0),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
        // capacity < freq：数组无法保留足够历史
        assert!(matches!(
            WindowLog::new(2, 3, 1000),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_basic_scenario() {
        // freq=3, interval=1000ms, capacity=5
        let mut log = WindowLog::new(5, 3, 1000).unwrap();

        assert!(log.try_admit(0));
        assert!(log.try_admit(100));
        assert!(log.try_admit(200));
        // 窗口内已有3条记录
        assert!(!log.try_admit(300));
        // 最旧记录已滑出窗口
        assert!(log.try_admit(1500));
        assert!(log.try_admit(1600));
        assert!(log.try_admit(1700));
        assert!(!log.try_admit(1800));
    }

    #[test]
    fn test_sliding_not_fixed_window() {
        let mut log = WindowLog::new(3, 2, 1000).unwrap();

        assert!(log.try_admit(0));
        assert!(log.try_admit(500));
        assert!(!log.try_admit(900));
        // 1001 时刻只有 ts=0 滑出，恰好空出一个名额
        assert!(log.try_admit(1001));
        assert!(!log.try_admit(1100));
        // 1501 时刻 ts=500 滑出
        assert!(log.try_admit(1501));
    }

    #[test]
    fn test_clock_rollback_clamped() {
        let mut log = WindowLog::new(5, 2, 1000).unwrap();

        assert!(log.try_admit(1000));
        assert!(log.try_admit(2000));
        // 时钟回拨：按最后一条记录 2000 计算，窗口仍然满
        assert!(!log.try_admit(1500));
        assert!(!log.try_admit(100));
        // 回拨期间记录不会增加
        assert_eq!(log.len(), 2);
        // 时间正常前进后窗口重新打开
        assert!(log.try_admit(3001));
    }

    #[test]
    fn test_rollback_never_exceeds_freq() {
        let mut log = WindowLog::new(10, 3, 1000).unwrap();

        assert!(log.try_admit(5000));
        assert!(log.try_admit(5100));
        assert!(log.try_admit(5200));

        // 活跃窗口内的回拨请求全部被拒绝，放行数不超过 freq
        for ts in [4000u64, 4500, 5000, 5199] {
            assert!(!log.try_admit(ts));
        }
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_ring_overwrite_when_full() {
        // capacity == freq：满载后最旧元素被覆盖
        let mut log = WindowLog::new(3, 3, 100).unwrap();

        assert!(log.try_admit(0));
        assert!(log.try_admit(1000));
        assert!(log.try_admit(2000));
        assert!(log.is_full());
        assert_eq!(log.oldest(), Some(0));

        // 窗口外的旧记录不阻止放行，环形覆盖最旧的元素
        assert!(log.try_admit(3000));
        assert!(log.is_full());
        assert_eq!(log.len(), 3);
        assert_eq!(log.oldest(), Some(1000));
        assert_eq!(log.latest(), Some(3000));
    }

    #[test]
    fn test_lower_bound_edges() {
        let mut log = WindowLog::new(4, 4, 10_000).unwrap();
        for ts in [100u64, 200, 300, 400] {
            assert!(log.try_admit(ts));
        }

        // 全部 >= target
        assert_eq!(log.count_in_window(0), 4);
        assert_eq!(log.count_in_window(100), 4);
        // 全部 < target：lower_bound 返回 size，计数为 0
        assert_eq!(log.count_in_window(401), 0);
        // 中间位置
        assert_eq!(log.count_in_window(200), 3);
        assert_eq!(log.count_in_window(201), 2);
    }

    #[test]
    fn test_lower_bound_after_wrap() {
        // 覆盖环形回绕后的逻辑顺序
        let mut log = WindowLog::new(3, 3, 100_000).unwrap();
        for ts in [100u64, 200, 300, 400, 500] {
            log.push(ts);
        }
        // 逻辑上剩下 [300, 400, 500]
        assert_eq!(log.oldest(), Some(300));
        assert_eq!(log.count_in_window(400), 2);
        assert_eq!(log.count_in_window(300), 3);
    }

    #[test]
    fn test_empty_log() {
        let log = WindowLog::new(5, 3, 1000).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.count_in_window(0), 0);
        assert_eq!(log.oldest(), None);
        assert_eq!(log.latest(), None);
    }

    #[test]
    fn test_per_call_limits() {
        let mut log = WindowLog::new(10, 10, 1000).unwrap();

        // admit_at 使用调用方传入的限流参数
        assert!(log.admit_at(0, 2, 1000));
        assert!(log.admit_at(100, 2, 1000));
        assert!(!log.admit_at(200, 2, 1000));
        // 更宽松的参数立即生效
        assert!(log.admit_at(200, 3, 1000));
    }

    #[test]
    fn test_same_millisecond_admissions() {
        let mut log = WindowLog::new(5, 3, 1000).unwrap();
        assert!(log.try_admit(500));
        assert!(log.try_admit(500));
        assert!(log.try_admit(500));
        assert!(!log.try_admit(500));
    }
}
