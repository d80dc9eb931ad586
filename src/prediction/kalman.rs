// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 简化 Kalman 滤波
//!
//! 状态 [x, y, vx, vy], 协方差只保留对角线。
//! 过程噪声随目标"一致性"自适应: 最近 10 次残差的方差越小, 一致性越高, 噪声越小, 跟得越紧。

use std::collections::VecDeque;
use std::time::Instant;

use super::{clamp_dt, MotionFilter, DEFAULT_KALMAN_LEAD};
use crate::detection::Point2;

const PROCESS_NOISE: f32 = 0.1;
const MEASUREMENT_NOISE: f32 = 0.5;
/// 速度上限 (px/s, 每个轴)
const MAX_VELOCITY: f32 = 5000.;
const RESIDUAL_WINDOW: usize = 10;
/// 速度项过程噪声放大倍数
const VELOCITY_NOISE_SCALE: f32 = 10.;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    position: Point2,
    velocity: Point2,
    // 对角协方差 P00, P11 (位置), P22, P33 (速度)
    p: [f32; 4],
    residuals: VecDeque<f32>,
    consistency: f32,
    last_update: Option<Instant>,
    lead_time: f32,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KALMAN_LEAD)
    }
}

impl KalmanFilter {
    pub fn new(lead_time: f32) -> Self {
        Self {
            position: Point2::default(),
            velocity: Point2::default(),
            p: [1.; 4],
            residuals: VecDeque::with_capacity(RESIDUAL_WINDOW + 1),
            consistency: 1.,
            last_update: None,
            lead_time,
        }
    }

    pub fn set_lead_time(&mut self, lead_time: f32) {
        self.lead_time = lead_time;
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    /// 速度 (px/s)
    pub fn velocity(&self) -> Point2 {
        self.velocity
    }

    /// 目标一致性 ∈ [0.1, 1]
    pub fn consistency(&self) -> f32 {
        self.consistency
    }

    fn record_residual(&mut self, residual: f32) {
        self.residuals.push_back(residual);
        if self.residuals.len() > RESIDUAL_WINDOW {
            self.residuals.pop_front();
        }
        let n = self.residuals.len() as f32;
        let mean = self.residuals.iter().sum::<f32>() / n;
        let variance = self.residuals.iter().map(|e| (e - mean).powi(2)).sum::<f32>() / n;
        self.consistency = (1. - variance / 1000.).clamp(0.1, 1.);
    }
}

impl MotionFilter for KalmanFilter {
    fn update(&mut self, observed: Point2, at: Instant) {
        let Some(last) = self.last_update else {
            self.position = observed;
            self.velocity = Point2::default();
            self.last_update = Some(at);
            return;
        };

        let dt = clamp_dt(last, at);

        // 预测
        let predicted = self.position.offset(self.velocity.x * dt, self.velocity.y * dt);
        self.record_residual(predicted.distance_sq(&observed).sqrt());

        let q = PROCESS_NOISE / self.consistency;
        self.p[0] += q;
        self.p[1] += q;
        self.p[2] += q * VELOCITY_NOISE_SCALE;
        self.p[3] += q * VELOCITY_NOISE_SCALE;

        // 更新
        let innovation = Point2::new(observed.x - predicted.x, observed.y - predicted.y);
        let k = self.p[0] / (self.p[0] + MEASUREMENT_NOISE);

        self.position = predicted.offset(k * innovation.x, k * innovation.y);
        self.velocity = Point2::new(
            (self.velocity.x + k * innovation.x / dt).clamp(-MAX_VELOCITY, MAX_VELOCITY),
            (self.velocity.y + k * innovation.y / dt).clamp(-MAX_VELOCITY, MAX_VELOCITY),
        );

        self.p[0] *= 1. - k;
        self.p[1] *= 1. - k;
        self.last_update = Some(at);
    }

    fn estimate(&self) -> Option<Point2> {
        self.last_update?;
        Some(self.position.offset(
            self.velocity.x * self.lead_time,
            self.velocity.y * self.lead_time,
        ))
    }

    fn reset(&mut self) {
        *self = Self::new(self.lead_time);
    }

    fn is_initialized(&self) -> bool {
        self.last_update.is_some()
    }
}
