// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 内存压力检查
//!
//! 检测循环每隔 5 秒读取一次本进程常驻内存; 超过 2 GiB 时清空缓冲区池并告警。

use std::time::{Duration, Instant};

use sysinfo::{Pid, System};
use tracing::{debug, warn};

use super::pool::BufferPool;

pub const CHECK_INTERVAL: Duration = Duration::from_secs(5);
pub const RSS_THRESHOLD: u64 = 2 * 1024 * 1024 * 1024;

/// 常驻内存读取
pub trait MemoryProbe: Send {
    /// 本进程常驻内存 (字节); 读取失败返回 None
    fn resident_bytes(&mut self) -> Option<u64>;
}

pub struct SysinfoProbe {
    sys: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            warn!("⚠️  无法获取当前进程ID, 内存检查已禁用");
        }
        Self {
            sys: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        if !self.sys.refresh_process(pid) {
            return None;
        }
        self.sys.process(pid).map(|p| p.memory())
    }
}

pub struct MemoryMonitor {
    probe: Box<dyn MemoryProbe>,
    pool: BufferPool<f32>,
    interval: Duration,
    threshold: u64,
    last_check: Instant,
}

impl MemoryMonitor {
    pub fn new(probe: Box<dyn MemoryProbe>, pool: BufferPool<f32>) -> Self {
        Self {
            probe,
            pool,
            interval: CHECK_INTERVAL,
            threshold: RSS_THRESHOLD,
            last_check: Instant::now(),
        }
    }

    pub fn with_limits(mut self, interval: Duration, threshold: u64) -> Self {
        self.interval = interval;
        self.threshold = threshold;
        self
    }

    /// 到期则检查一次; 发生清理时返回当时的常驻内存
    pub fn check(&mut self, now: Instant) -> Option<u64> {
        if now.saturating_duration_since(self.last_check) < self.interval {
            return None;
        }
        self.last_check = now;

        let rss = self.probe.resident_bytes()?;
        debug!("resident memory {} MiB", rss / 1024 / 1024);
        if rss <= self.threshold {
            return None;
        }

        let freed = self.pool.clear_all();
        warn!(
            "⚠️  内存占用过高 ({} MiB), 已清空缓冲池 (释放 {} KiB)",
            rss / 1024 / 1024,
            freed / 1024
        );
        Some(rss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct Fake(Arc<AtomicU64>);

    impl MemoryProbe for Fake {
        fn resident_bytes(&mut self) -> Option<u64> {
            Some(self.0.load(Ordering::Relaxed))
        }
    }

    #[test]
    fn test_clears_pool_over_threshold() {
        let rss = Arc::new(AtomicU64::new(100));
        let pool = BufferPool::<f32>::new();
        drop(pool.rent(1024));
        assert_eq!(pool.cached(), 1);

        let mut monitor = MemoryMonitor::new(Box::new(Fake(Arc::clone(&rss))), pool.clone())
            .with_limits(Duration::from_secs(5), 1000);
        let t0 = Instant::now();

        // 未到间隔
        rss.store(5000, Ordering::Relaxed);
        assert_eq!(monitor.check(t0), None);
        assert_eq!(pool.cached(), 1);

        assert_eq!(monitor.check(t0 + Duration::from_secs(6)), Some(5000));
        assert_eq!(pool.cached(), 0);

        // 低于阈值不清理
        rss.store(10, Ordering::Relaxed);
        drop(pool.rent(1024));
        assert_eq!(monitor.check(t0 + Duration::from_secs(12)), None);
        assert_eq!(pool.cached(), 1);
    }

    #[test]
    fn test_sysinfo_probe_reads_self() {
        let mut probe = SysinfoProbe::new();
        if let Some(bytes) = probe.resident_bytes() {
            assert!(bytes > 0);
        }
    }
}
