// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统数据结构定义
/// Data structures for the detection → tracking pipeline
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 类别ID → 类别名称
pub type ClassMap = BTreeMap<usize, String>;

// ========== 几何类型 ==========

/// 二维点 (屏幕坐标或模型坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// 浮点矩形 (模型输入空间, 左上角 + 宽高)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// YOLO 输出格式 (cx, cy, w, h) → 矩形
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2., cy - h / 2., w, h)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x + self.width / 2., self.y + self.height / 2.)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// 屏幕整数矩形 (截图区域 / 检测框)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// 以 (cx, cy) 为中心的 size×size 正方形
    pub fn centered_at(center: Point2, size: u32) -> Self {
        let half = (size / 2) as i32;
        Self::new(
            center.x as i32 - half,
            center.y as i32 - half,
            size,
            size,
        )
    }

    pub fn center(&self) -> Point2 {
        Point2::new(
            self.left as f32 + self.width as f32 / 2.,
            self.top as f32 + self.height as f32 / 2.,
        )
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.left as f32
            && p.y >= self.top as f32
            && p.x < (self.left + self.width as i32) as f32
            && p.y < (self.top + self.height as i32) as f32
    }
}

// ========== 检测候选 ==========

/// 检测候选 (一个解码后的检测框)
///
/// 构造后不可变; 每帧由 CandidateExtractor 重新生成,
/// 除了被提升为"当前目标"的那一个, 其余在帧结束时丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    rect: Rect,
    confidence: f32,
    class_id: usize,
    class_name: Arc<str>,
    center_translated: Point2,
    screen_center: Point2,
}

impl Prediction {
    /// 从模型空间的检测框构造候选
    ///
    /// - `image_size`: 模型输入尺寸, 用于归一化中心
    /// - `origin`: 本帧截图区域 (屏幕偏移)
    pub fn new(
        rect: Rect,
        confidence: f32,
        class_id: usize,
        class_name: Arc<str>,
        image_size: u32,
        origin: ScreenRect,
    ) -> Self {
        let c = rect.center();
        let size = image_size.max(1) as f32;
        Self {
            rect,
            confidence,
            class_id,
            class_name,
            center_translated: Point2::new(c.x / size, c.y / size),
            screen_center: Point2::new(origin.left as f32 + c.x, origin.top as f32 + c.y),
        }
    }

    /// 目标丢失期间的外推候选: 屏幕位置平移、置信度替换, 其余字段保留
    pub(crate) fn coasted(&self, offset: Point2, confidence: f32) -> Self {
        Self {
            confidence,
            screen_center: self.screen_center.offset(offset.x, offset.y),
            class_name: Arc::clone(&self.class_name),
            ..*self
        }
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn center_translated(&self) -> Point2 {
        self.center_translated
    }

    pub fn screen_center(&self) -> Point2 {
        self.screen_center
    }

    pub fn area(&self) -> f32 {
        self.rect.area()
    }

    /// 截图区域左上角在屏幕上的位置 (由屏幕中心与模型中心反推)
    pub fn screen_origin(&self) -> Point2 {
        let c = self.rect.center();
        Point2::new(self.screen_center.x - c.x, self.screen_center.y - c.y)
    }
}
