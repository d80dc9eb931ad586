// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 瞄准点计算: 检测框 → 屏幕上的目标点

use serde::{Deserialize, Serialize};

use crate::detection::{Point2, Prediction};

/// 纵向对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AimPointSettings {
    pub alignment: Alignment,
    /// 像素偏移 (百分比模式下 x_offset 不生效)
    pub x_offset: f32,
    pub y_offset: f32,
    /// Some(p): 横向取框左边 + 宽度 × p%
    pub x_percentage: Option<f32>,
    /// Some(p): 纵向取框底边 - 高度 × p%
    pub y_percentage: Option<f32>,
}

/// 计算屏幕坐标的瞄准点
pub fn aim_point(target: &Prediction, settings: &AimPointSettings) -> Point2 {
    let rect = target.rect();

    let x = match settings.x_percentage {
        Some(pct) => rect.x + rect.width * pct / 100.,
        None => rect.x + rect.width / 2. + settings.x_offset,
    };

    let y = match settings.y_percentage {
        Some(pct) => rect.bottom() - rect.height * pct / 100. + settings.y_offset,
        None => {
            let align = match settings.alignment {
                Alignment::Top => 0.,
                Alignment::Center => rect.height / 2.,
                Alignment::Bottom => rect.height,
            };
            rect.y + align + settings.y_offset
        }
    };

    target.screen_origin().offset(x, y)
}
