// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 速度历史预测: 最近几帧位移取平均, 乘以倍率外推
//!
//! 每个流水线持有自己的实例, 不同调用方互不影响。

use std::collections::VecDeque;
use std::time::Instant;

use super::{MotionFilter, DEFAULT_HISTORY_MULTIPLIER};
use crate::detection::Point2;

const HISTORY_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct VelocityHistoryFilter {
    /// 每帧位移 (px/帧)
    deltas: VecDeque<Point2>,
    previous: Option<Point2>,
    multiplier: f32,
}

impl Default for VelocityHistoryFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MULTIPLIER)
    }
}

impl VelocityHistoryFilter {
    pub fn new(multiplier: f32) -> Self {
        Self {
            deltas: VecDeque::with_capacity(HISTORY_SIZE),
            previous: None,
            multiplier,
        }
    }

    pub fn set_multiplier(&mut self, multiplier: f32) {
        self.multiplier = multiplier;
    }

    pub fn history_len(&self) -> usize {
        self.deltas.len()
    }

    fn mean_delta(&self) -> Point2 {
        if self.deltas.is_empty() {
            return Point2::default();
        }
        let n = self.deltas.len() as f32;
        let (sx, sy) = self
            .deltas
            .iter()
            .fold((0., 0.), |(sx, sy), d| (sx + d.x, sy + d.y));
        Point2::new(sx / n, sy / n)
    }
}

impl MotionFilter for VelocityHistoryFilter {
    /// 基于帧间位移, 不使用时间戳
    fn update(&mut self, observed: Point2, _at: Instant) {
        if let Some(prev) = self.previous {
            if self.deltas.len() == HISTORY_SIZE {
                self.deltas.pop_front();
            }
            self.deltas.push_back(Point2::new(observed.x - prev.x, observed.y - prev.y));
        }
        self.previous = Some(observed);
    }

    fn estimate(&self) -> Option<Point2> {
        let current = self.previous?;
        let mean = self.mean_delta();
        Some(current.offset(mean.x * self.multiplier, mean.y * self.multiplier))
    }

    fn reset(&mut self) {
        self.deltas.clear();
        self.previous = None;
    }

    fn is_initialized(&self) -> bool {
        self.previous.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_last_five() {
        let mut f = VelocityHistoryFilter::new(3.);
        let now = Instant::now();
        // 前几帧大位移, 之后稳定在 +5px/帧
        let xs = [0., 100., 200., 205., 210., 215., 220., 225.];
        for x in xs {
            f.update(Point2::new(x, 10.), now);
        }
        assert_eq!(f.history_len(), 5);
        assert_eq!(f.estimate(), Some(Point2::new(225. + 5. * 3., 10.)));
    }

    #[test]
    fn test_single_observation_returns_raw() {
        let mut f = VelocityHistoryFilter::default();
        f.update(Point2::new(7., 8.), Instant::now());
        assert_eq!(f.estimate(), Some(Point2::new(7., 8.)));
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = VelocityHistoryFilter::default();
        let b = VelocityHistoryFilter::default();
        let now = Instant::now();
        a.update(Point2::new(0., 0.), now);
        a.update(Point2::new(10., 0.), now);
        assert_eq!(a.history_len(), 1);
        assert_eq!(b.history_len(), 0);
        assert!(b.estimate().is_none());
    }
}
