// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 性能统计 (Benchmark / Telemetry Sink)
//!
//! 每个阶段记录 调用次数 / 最小 / 最大 / 总耗时, 一把锁保护全部数据。
//! 只做记录, 不影响控制流。
//!
//! ```ignore
//! let bench = Benchmark::new();
//! {
//!     let _t = bench.scope("ModelInference");
//!     engine.infer(&input)?;
//! }
//! println!("{}", bench.report());
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 整个检测循环迭代的阶段名, 用于计算整体 FPS
pub const ITERATION_STAGE: &str = "LoopIteration";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    pub count: u64,
    pub min: Duration,
    pub max: Duration,
    pub total: Duration,
}

impl Default for StageStats {
    fn default() -> Self {
        Self {
            count: 0,
            min: Duration::MAX,
            max: Duration::ZERO,
            total: Duration::ZERO,
        }
    }
}

impl StageStats {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// 可在线程间共享 (clone 共享同一份数据)
#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    stages: Arc<Mutex<BTreeMap<String, StageStats>>>,
}

impl Benchmark {
    pub fn new() -> Self {
        Self::default()
    }

    /// RAII 计时: guard 析构时记录耗时 (guard 持有共享句柄, 不借用 self)
    pub fn scope(&self, name: &'static str) -> BenchmarkScope {
        BenchmarkScope {
            bench: self.clone(),
            name,
            start: Instant::now(),
        }
    }

    pub fn record(&self, name: &str, elapsed: Duration) {
        let mut stages = self.stages.lock();
        match stages.get_mut(name) {
            Some(stats) => stats.record(elapsed),
            None => {
                let mut stats = StageStats::default();
                stats.record(elapsed);
                stages.insert(name.to_string(), stats);
            }
        }
    }

    pub fn stats(&self, name: &str) -> Option<StageStats> {
        self.stages.lock().get(name).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, StageStats> {
        self.stages.lock().clone()
    }

    pub fn clear(&self) {
        self.stages.lock().clear();
    }

    /// 文本报告 (按阶段名排序)
    pub fn report(&self) -> String {
        let stages = self.stages.lock();
        let mut out = String::from("=== Pipeline Performance Benchmarks ===\n");
        for (name, s) in stages.iter() {
            let _ = writeln!(
                out,
                "{}: Avg={:.2}ms, Min={:.2}ms, Max={:.2}ms, Count={}",
                name,
                ms(s.average()),
                ms(s.min),
                ms(s.max),
                s.count
            );
        }
        let fps = stages
            .get(ITERATION_STAGE)
            .map(|s| s.average())
            .filter(|avg| !avg.is_zero())
            .map_or(0.0, |avg| 1.0 / avg.as_secs_f64());
        let _ = write!(out, "Overall FPS: {:.2}", fps);
        out
    }
}

pub struct BenchmarkScope {
    bench: Benchmark,
    name: &'static str,
    start: Instant,
}

impl Drop for BenchmarkScope {
    fn drop(&mut self) {
        self.bench.record(self.name, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_min_max_total() {
        let bench = Benchmark::new();
        bench.record("Inference", Duration::from_millis(4));
        bench.record("Inference", Duration::from_millis(2));
        bench.record("Inference", Duration::from_millis(6));
        let s = bench.stats("Inference").unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.min, Duration::from_millis(2));
        assert_eq!(s.max, Duration::from_millis(6));
        assert_eq!(s.total, Duration::from_millis(12));
        assert_eq!(s.average(), Duration::from_millis(4));
    }

    #[test]
    fn test_scope_records_on_drop() {
        let bench = Benchmark::new();
        {
            let _t = bench.scope("Capture");
            std::thread::sleep(Duration::from_millis(2));
        }
        let s = bench.stats("Capture").unwrap();
        assert_eq!(s.count, 1);
        assert!(s.total >= Duration::from_millis(2));
    }

    #[test]
    fn test_report_contains_stages_and_fps() {
        let bench = Benchmark::new();
        bench.record(ITERATION_STAGE, Duration::from_millis(5));
        bench.record("Extract", Duration::from_micros(300));
        let report = bench.report();
        assert!(report.contains("Extract: Avg=0.30ms"));
        assert!(report.contains("LoopIteration: Avg=5.00ms"));
        assert!(report.ends_with("Overall FPS: 200.00"));
    }

    #[test]
    fn test_shared_across_threads() {
        let bench = Benchmark::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = bench.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        b.record("Stage", Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(bench.stats("Stage").unwrap().count, 400);
    }
}
