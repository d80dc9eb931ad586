//! 瞄准辅助配置 - 通过JSON文件调整参数
//!
//! - [`AimConfig`]: 可持久化的全部参数
//! - [`ConfigStore`]: 运行时可修改, 检测循环每次迭代取一份不可变快照
//! - [`Toggles`]: 开关 (瞄准辅助 / 显示检测 / 持续跟踪 / 瞄准键)
//! - [`Args`]: 命令行参数

pub mod args;
pub mod store;
pub mod toggles;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detection::{ExtractorSettings, ScreenRect, StickySettings, TargetClass};
use crate::error::Result;
use crate::pipeline::actuation::MovementProfile;
use crate::pipeline::aim::{Alignment, AimPointSettings};
use crate::prediction::{PredictionMethod, PredictionSettings};

pub use args::Args;
pub use store::{ConfigStore, FrameConfig};
pub use toggles::{ToggleState, Toggles};

/// 截图区域中心的选取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionArea {
    /// 屏幕中心
    #[default]
    ClosestToCenter,
    /// 光标位置 (光标不在当前屏幕时退回屏幕中心)
    ClosestToMouse,
}

/// 瞄准辅助参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimConfig {
    // === 模型 / 截图 ===
    pub image_size: u32, // 模型输入尺寸 (动态模型使用)
    pub screen: ScreenRect, // 当前显示器区域
    pub detection_area: DetectionArea,

    // === 检测 ===
    pub min_confidence: f32, // 最小置信度 (%)
    pub fov_size: f32,       // FOV 窗口边长 (px)
    pub target_class: TargetClass,

    // === 粘性瞄准 ===
    pub sticky_aim: bool,
    pub sticky_threshold: f32, // 快速切换阈值 (px)

    // === 预测 ===
    pub predictions: bool,
    pub prediction_method: PredictionMethod,
    pub kalman_lead_time: f32,   // 秒
    pub ema_lead_time: f32,      // 秒
    pub history_multiplier: f32, // 帧

    // === 瞄准点 ===
    pub alignment: Alignment,
    pub x_offset: f32, // px
    pub y_offset: f32, // px
    pub x_percentage: bool,
    pub y_percentage: bool,
    pub x_offset_pct: f32, // %
    pub y_offset_pct: f32, // %

    // === 移动 ===
    pub sensitivity: f32,
    pub movement_ema: bool,
    pub movement_ema_factor: f32,
    pub aspect_correction: bool,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            image_size: 640,
            screen: ScreenRect::new(0, 0, 1920, 1080),
            detection_area: DetectionArea::ClosestToCenter,

            min_confidence: 45.0,
            fov_size: 640.0,
            target_class: TargetClass::BestConfidence,

            sticky_aim: false,
            sticky_threshold: 50.0,

            predictions: false,
            prediction_method: PredictionMethod::Kalman,
            kalman_lead_time: 0.10,
            ema_lead_time: 0.15,
            history_multiplier: 3.0,

            alignment: Alignment::Center,
            x_offset: 0.0,
            y_offset: 0.0,
            x_percentage: false,
            y_percentage: false,
            x_offset_pct: 50.0,
            y_offset_pct: 50.0,

            sensitivity: 0.80,
            movement_ema: false,
            movement_ema_factor: 0.5,
            aspect_correction: true,
        }
    }
}

impl AimConfig {
    /// 从JSON文件加载配置; 文件不存在时写出默认配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            target_class: self.target_class.clone(),
            min_confidence: self.min_confidence,
            fov_size: self.fov_size,
        }
    }

    pub fn sticky_settings(&self) -> StickySettings {
        StickySettings {
            enabled: self.sticky_aim,
            threshold: self.sticky_threshold,
        }
    }

    pub fn prediction_settings(&self) -> PredictionSettings {
        PredictionSettings {
            method: self.prediction_method,
            kalman_lead: self.kalman_lead_time,
            ema_lead: self.ema_lead_time,
            history_multiplier: self.history_multiplier,
        }
    }

    pub fn aim_point_settings(&self) -> AimPointSettings {
        AimPointSettings {
            alignment: self.alignment,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
            x_percentage: self.x_percentage.then_some(self.x_offset_pct),
            y_percentage: self.y_percentage.then_some(self.y_offset_pct),
        }
    }

    pub fn movement_profile(&self) -> MovementProfile {
        let aspect_ratio = if self.aspect_correction && self.screen.height > 0 {
            self.screen.width as f32 / self.screen.height as f32
        } else {
            1.0
        };
        MovementProfile {
            sensitivity: self.sensitivity,
            ema_factor: self.movement_ema.then_some(self.movement_ema_factor),
            aspect_ratio,
            ..Default::default()
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前配置:");
        info!("  输入尺寸: {} (FOV {})", self.image_size, self.fov_size);
        info!("  最小置信度: {:.0}%", self.min_confidence);
        info!(
            "  粘性瞄准: {} (阈值 {}px)",
            self.sticky_aim, self.sticky_threshold
        );
        info!(
            "  预测: {} ({})",
            self.predictions, self.prediction_method
        );
        info!("  灵敏度: {:.2}", self.sensitivity);
    }
}
