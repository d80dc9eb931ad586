// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 候选提取器 (Candidate Extractor)
//! 职责: YOLOv8 输出张量 [1, 4+C, N] → 候选目标列表
//!
//! 每个检测槽位: 读取 cx/cy/w/h → 按类别取置信度 → 置信度下限过滤 → FOV 窗口过滤

use std::sync::Arc;

use ndarray::{ArrayViewD, Axis, Ix3};
use serde::{Deserialize, Serialize};

use super::types::{ClassMap, Prediction, Rect, ScreenRect};
use crate::error::{Error, Result};

/// YOLO 输出中 cx, cy, w, h 之后才是类别置信度
const CXYWH_OFFSET: usize = 4;

/// 置信度下限的夹取范围
pub const MIN_CONFIDENCE_FLOOR: f32 = 0.01;
pub const MAX_CONFIDENCE_FLOOR: f32 = 0.99;

/// 目标类别选择
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClass {
    /// 扫描所有类别取最大置信度
    #[default]
    BestConfidence,
    /// 只读取指定类别 (按名称匹配 class_map)
    Class(String),
}

/// 每帧提取参数 (来自配置快照)
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorSettings {
    pub target_class: TargetClass,
    /// 最小置信度 (百分比, 0-100)
    pub min_confidence: f32,
    /// FOV 窗口边长 (模型输入像素)
    pub fov_size: f32,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            target_class: TargetClass::BestConfidence,
            min_confidence: 45.0,
            fov_size: 640.0,
        }
    }
}

pub struct CandidateExtractor {
    image_size: u32,
    class_map: ClassMap,
    labels: Vec<Arc<str>>,
}

impl CandidateExtractor {
    pub fn new(image_size: u32, class_map: &ClassMap) -> Self {
        let count = class_map.keys().next_back().map_or(1, |&id| id + 1);
        let labels = (0..count)
            .map(|id| match class_map.get(&id) {
                Some(name) => Arc::from(name.as_str()),
                None => Arc::from(format!("Class_{}", id)),
            })
            .collect();

        Self {
            image_size,
            class_map: class_map.clone(),
            labels,
        }
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// 置信度下限: 配置百分比 → [0.01, 0.99]
    pub fn confidence_floor(min_confidence_pct: f32) -> f32 {
        (min_confidence_pct / 100.0).clamp(MIN_CONFIDENCE_FLOOR, MAX_CONFIDENCE_FLOOR)
    }

    /// 居中 FOV 窗口的 [min, max] (x/y 相同)
    pub fn fov_bounds(&self, fov_size: f32) -> (f32, f32) {
        let s = self.image_size as f32;
        ((s - fov_size) / 2.0, (s + fov_size) / 2.0)
    }

    fn label(&self, class_id: usize) -> Arc<str> {
        match self.labels.get(class_id) {
            Some(label) => Arc::clone(label),
            None => Arc::from(format!("Class_{}", class_id)),
        }
    }

    /// 指定类别 → 类别ID; 名称不存在时退回类别 0
    fn resolve_class(&self, target: &TargetClass, num_classes: usize) -> Option<usize> {
        match target {
            TargetClass::BestConfidence => None,
            TargetClass::Class(name) => {
                let id = self
                    .class_map
                    .iter()
                    .find(|(_, n)| *n == name)
                    .map_or(0, |(&id, _)| id);
                (id < num_classes).then_some(id)
            }
        }
    }

    /// 解码到调用方持有的缓冲区 (每帧复用, 避免分配)
    pub fn extract_into(
        &self,
        output: ArrayViewD<'_, f32>,
        origin: ScreenRect,
        settings: &ExtractorSettings,
        out: &mut Vec<Prediction>,
    ) -> Result<()> {
        out.clear();

        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= CXYWH_OFFSET {
            return Err(Error::OutputShape {
                expected: "[1, 4+C, N]".to_string(),
                actual: shape,
            });
        }
        let output = output.into_dimensionality::<Ix3>()?;
        let rows = output.index_axis(Axis(0), 0);

        let num_classes = shape[1] - CXYWH_OFFSET;
        let num_detections = shape[2];
        let floor = Self::confidence_floor(settings.min_confidence);
        let (fov_min, fov_max) = self.fov_bounds(settings.fov_size);

        // 单类别模型直接读第 4 行
        let selected = if num_classes == 1 {
            Some(0)
        } else {
            self.resolve_class(&settings.target_class, num_classes)
        };

        for i in 0..num_detections {
            let (class_id, confidence) = match selected {
                Some(id) => (id, rows[[CXYWH_OFFSET + id, i]]),
                None => {
                    let mut best = (0usize, 0.0f32);
                    for c in 0..num_classes {
                        let conf = rows[[CXYWH_OFFSET + c, i]];
                        if conf > best.1 {
                            best = (c, conf);
                        }
                    }
                    best
                }
            };

            if confidence < floor {
                continue;
            }

            let rect = Rect::from_cxcywh(rows[[0, i]], rows[[1, i]], rows[[2, i]], rows[[3, i]]);
            if rect.x < fov_min || rect.right() > fov_max || rect.y < fov_min || rect.bottom() > fov_max
            {
                continue;
            }

            out.push(Prediction::new(
                rect,
                confidence,
                class_id,
                self.label(class_id),
                self.image_size,
                origin,
            ));
        }

        Ok(())
    }

    pub fn extract(
        &self,
        output: ArrayViewD<'_, f32>,
        origin: ScreenRect,
        settings: &ExtractorSettings,
    ) -> Result<Vec<Prediction>> {
        let mut out = Vec::new();
        self.extract_into(output, origin, settings, &mut out)?;
        Ok(out)
    }
}
