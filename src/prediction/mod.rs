// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 运动预测 (Motion Predictors)
//!
//! 三种可互换的滤波器, 把锁定目标的屏幕位置向前外推一个提前量:
//! - [`KalmanFilter`]: 简化状态空间滤波, 自适应过程噪声
//! - [`EmaFilter`]: 位置/速度双重指数平滑
//! - [`VelocityHistoryFilter`]: 最近 5 帧位移的平均值 × 倍率
//!
//! 三者同时存在于 [`PredictorBank`] 中, 只驱动当前选中的那一个。

pub mod ema;
pub mod kalman;
pub mod velocity_history;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detection::Point2;

pub use ema::EmaFilter;
pub use kalman::KalmanFilter;
pub use velocity_history::VelocityHistoryFilter;

/// 两次观测的时间间隔下限 (秒)
pub const MIN_DT: f32 = 0.001;
/// 两次观测的时间间隔上限 (秒)
pub const MAX_DT: f32 = 0.1;

pub const DEFAULT_KALMAN_LEAD: f32 = 0.10;
pub const DEFAULT_EMA_LEAD: f32 = 0.15;
pub const DEFAULT_HISTORY_MULTIPLIER: f32 = 3.0;

/// 运动滤波器的公共接口
pub trait MotionFilter: Send {
    /// 输入一次观测; 第一次调用只做初始化
    fn update(&mut self, observed: Point2, at: Instant);

    /// 外推后的位置; 未初始化时为 None
    fn estimate(&self) -> Option<Point2>;

    /// 清空为未初始化状态
    fn reset(&mut self);

    fn is_initialized(&self) -> bool;
}

pub(crate) fn clamp_dt(prev: Instant, now: Instant) -> f32 {
    now.saturating_duration_since(prev)
        .as_secs_f32()
        .clamp(MIN_DT, MAX_DT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    #[default]
    Kalman,
    Ema,
    VelocityHistory,
}

impl std::fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionMethod::Kalman => write!(f, "Kalman Filter"),
            PredictionMethod::Ema => write!(f, "EMA"),
            PredictionMethod::VelocityHistory => write!(f, "Velocity History"),
        }
    }
}

/// 每帧预测参数 (来自配置快照)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionSettings {
    pub method: PredictionMethod,
    /// Kalman 提前量 (秒)
    pub kalman_lead: f32,
    /// EMA 提前量 (秒)
    pub ema_lead: f32,
    /// 速度历史倍率 (帧)
    pub history_multiplier: f32,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            method: PredictionMethod::Kalman,
            kalman_lead: DEFAULT_KALMAN_LEAD,
            ema_lead: DEFAULT_EMA_LEAD,
            history_multiplier: DEFAULT_HISTORY_MULTIPLIER,
        }
    }
}

/// 预测器集合
///
/// 切换方法时, 被替换下来的滤波器会被重置, 再切回来时从头开始。
#[derive(Debug, Default)]
pub struct PredictorBank {
    kalman: KalmanFilter,
    ema: EmaFilter,
    history: VelocityHistoryFilter,
    active: PredictionMethod,
}

impl PredictorBank {
    pub fn new(settings: &PredictionSettings) -> Self {
        let mut bank = Self::default();
        bank.configure(settings);
        bank
    }

    pub fn active(&self) -> PredictionMethod {
        self.active
    }

    /// 应用配置快照 (每帧调用)
    pub fn configure(&mut self, settings: &PredictionSettings) {
        if settings.method != self.active {
            self.active_mut().reset();
            self.active = settings.method;
        }
        self.kalman.set_lead_time(settings.kalman_lead);
        self.ema.set_lead_time(settings.ema_lead);
        self.history.set_multiplier(settings.history_multiplier);
    }

    pub fn active_mut(&mut self) -> &mut dyn MotionFilter {
        match self.active {
            PredictionMethod::Kalman => &mut self.kalman,
            PredictionMethod::Ema => &mut self.ema,
            PredictionMethod::VelocityHistory => &mut self.history,
        }
    }

    /// 输入观测并返回外推位置 (滤波器尚无输出时返回观测本身)
    pub fn update_and_estimate(&mut self, observed: Point2, at: Instant) -> Point2 {
        let filter = self.active_mut();
        filter.update(observed, at);
        filter.estimate().unwrap_or(observed)
    }

    pub fn reset_active(&mut self) {
        self.active_mut().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clamp_dt() {
        let t0 = Instant::now();
        assert_eq!(clamp_dt(t0, t0), MIN_DT);
        assert_eq!(clamp_dt(t0, t0 + Duration::from_secs(2)), MAX_DT);
        assert!((clamp_dt(t0, t0 + Duration::from_millis(16)) - 0.016).abs() < 1e-6);
        // 时钟倒退按 0 处理
        assert_eq!(clamp_dt(t0 + Duration::from_millis(5), t0), MIN_DT);
    }

    #[test]
    fn test_bank_switch_resets_previous() {
        let mut bank = PredictorBank::new(&PredictionSettings::default());
        let t0 = Instant::now();
        bank.update_and_estimate(Point2::new(10., 10.), t0);
        assert!(bank.active_mut().is_initialized());

        let ema = PredictionSettings {
            method: PredictionMethod::Ema,
            ..Default::default()
        };
        bank.configure(&ema);
        assert_eq!(bank.active(), PredictionMethod::Ema);
        assert!(!bank.active_mut().is_initialized());
        assert!(!bank.kalman.is_initialized());

        // 首次观测直接返回观测值
        let p = bank.update_and_estimate(Point2::new(50., 60.), t0);
        assert_eq!(p, Point2::new(50., 60.));
    }

    #[test]
    fn test_bank_reset_active() {
        let mut bank = PredictorBank::new(&PredictionSettings {
            method: PredictionMethod::VelocityHistory,
            ..Default::default()
        });
        let t0 = Instant::now();
        bank.update_and_estimate(Point2::new(0., 0.), t0);
        bank.update_and_estimate(Point2::new(5., 0.), t0 + Duration::from_millis(10));
        bank.reset_active();
        assert!(!bank.active_mut().is_initialized());
        assert!(bank.active_mut().estimate().is_none());
    }
}
