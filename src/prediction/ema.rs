// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 指数滑动平均预测: 位置和速度都做 EMA 平滑

use std::time::Instant;

use super::{clamp_dt, MotionFilter, DEFAULT_EMA_LEAD};
use crate::detection::Point2;

const ALPHA: f32 = 0.5;

fn ema(new: f32, old: f32) -> f32 {
    ALPHA * new + (1. - ALPHA) * old
}

#[derive(Debug, Clone)]
pub struct EmaFilter {
    smoothed: Point2,
    previous: Point2,
    /// px/s
    velocity: Point2,
    last_update: Option<Instant>,
    lead_time: f32,
}

impl Default for EmaFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EMA_LEAD)
    }
}

impl EmaFilter {
    pub fn new(lead_time: f32) -> Self {
        Self {
            smoothed: Point2::default(),
            previous: Point2::default(),
            velocity: Point2::default(),
            last_update: None,
            lead_time,
        }
    }

    pub fn set_lead_time(&mut self, lead_time: f32) {
        self.lead_time = lead_time;
    }

    pub fn velocity(&self) -> Point2 {
        self.velocity
    }
}

impl MotionFilter for EmaFilter {
    fn update(&mut self, observed: Point2, at: Instant) {
        let Some(last) = self.last_update else {
            self.smoothed = observed;
            self.previous = observed;
            self.velocity = Point2::default();
            self.last_update = Some(at);
            return;
        };

        let dt = clamp_dt(last, at);
        self.smoothed = Point2::new(ema(observed.x, self.smoothed.x), ema(observed.y, self.smoothed.y));
        let raw_velocity = Point2::new(
            (self.smoothed.x - self.previous.x) / dt,
            (self.smoothed.y - self.previous.y) / dt,
        );
        self.velocity = Point2::new(
            ema(raw_velocity.x, self.velocity.x),
            ema(raw_velocity.y, self.velocity.y),
        );
        self.previous = self.smoothed;
        self.last_update = Some(at);
    }

    fn estimate(&self) -> Option<Point2> {
        self.last_update?;
        Some(self.smoothed.offset(
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
