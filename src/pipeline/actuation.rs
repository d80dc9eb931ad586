// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 移动线程 (Actuation)
//!
//! 检测线程把 (目标点, 起点, 移动参数) 放进无界队列;
//! 本线程以最高优先级取出, 换算成相对位移后注入指针设备。

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, info, warn};

use super::CancelToken;
use crate::detection::Point2;
use crate::input::{raise_thread_priority, PointerDevice};

/// 单轴每次最大移动量 (px)
pub const MAX_STEP: f32 = 150.;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementProfile {
    /// 0..1, 越大每次移动越少
    pub sensitivity: f32,
    /// Some(f): 对位移做 EMA 平滑 f·当前 + (1-f)·上一次
    pub ema_factor: Option<f32>,
    /// 宽/高, 纵向位移除以该值; 1.0 表示不修正
    pub aspect_ratio: f32,
    pub max_step: f32,
}

impl Default for MovementProfile {
    fn default() -> Self {
        Self {
            sensitivity: 0.80,
            ema_factor: None,
            aspect_ratio: 1.,
            max_step: MAX_STEP,
        }
    }
}

/// 一条移动指令 (屏幕坐标)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCommand {
    pub target: Point2,
    /// 屏幕中心, 或 "离鼠标最近" 模式下的光标位置
    pub origin: Point2,
    pub profile: MovementProfile,
}

/// 目标点 → 相对位移
#[derive(Debug, Default)]
pub struct MovementShaper {
    previous: Option<Point2>,
}

impl MovementShaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&mut self, cmd: &MoveCommand) -> (i32, i32) {
        let p = &cmd.profile;
        let t = (1. - p.sensitivity).clamp(0., 1.);
        let mut dx = (cmd.target.x - cmd.origin.x) * t;
        let mut dy = (cmd.target.y - cmd.origin.y) * t;

        if let Some(f) = p.ema_factor {
            if let Some(prev) = self.previous {
                dx = f * dx + (1. - f) * prev.x;
                dy = f * dy + (1. - f) * prev.y;
            }
        }
        self.previous = Some(Point2::new(dx, dy));

        dx = dx.clamp(-p.max_step, p.max_step);
        dy = dy.clamp(-p.max_step, p.max_step);
        if p.aspect_ratio > 0. {
            dy /= p.aspect_ratio;
        }

        (dx.round() as i32, dy.round() as i32)
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// 移动线程主循环
pub fn run_actuation(
    rx: Receiver<MoveCommand>,
    mut pointer: Box<dyn PointerDevice>,
    cancel: CancelToken,
) {
    if raise_thread_priority() {
        info!("⚡ 移动线程已提升为最高优先级");
    } else {
        debug!("thread priority unchanged");
    }

    let mut shaper = MovementShaper::new();
    while !cancel.is_cancelled() {
        match rx.try_recv() {
            Ok(cmd) => {
                let (dx, dy) = shaper.shape(&cmd);
                if dx == 0 && dy == 0 {
                    continue;
                }
                if let Err(e) = pointer.move_relative(dx, dy) {
                    warn!("⚠️  指针移动失败: {}", e);
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(1)),
            Err(TryRecvError::Disconnected) => break,
        }
    }
    info!("🛑 移动线程退出");
}
