// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 目标选择器: 离参考点 (截图中心) 最近的候选

use super::types::{Point2, Prediction};

#[derive(Debug, Clone, Copy)]
pub struct TargetSelector {
    image_size: f32,
    reference: Point2,
}

impl TargetSelector {
    pub fn new(image_size: u32) -> Self {
        let s = image_size as f32;
        Self {
            image_size: s,
            reference: Point2::new(s / 2., s / 2.),
        }
    }

    pub fn reference(&self) -> Point2 {
        self.reference
    }

    /// 候选中心 (模型像素) 到参考点的平方距离
    pub fn distance_sq(&self, p: &Prediction) -> f32 {
        let c = p.center_translated();
        Point2::new(c.x * self.image_size, c.y * self.image_size).distance_sq(&self.reference)
    }

    /// 线性扫描; 距离相等时列表中靠前者胜出 (严格小于)
    pub fn select<'a>(&self, candidates: &'a [Prediction]) -> Option<(&'a Prediction, f32)> {
        let mut best: Option<(&Prediction, f32)> = None;
        for p in candidates {
            let d2 = self.distance_sq(p);
            match best {
                Some((_, best_d2)) if d2 >= best_d2 => {}
                _ => best = Some((p, d2)),
            }
        }
        best
    }
}
