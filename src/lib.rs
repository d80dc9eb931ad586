#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod benchmark; // 性能统计
pub mod config; // 配置 / 开关 / 命令行
pub mod detection; // 候选提取 / 目标选择 / 粘性跟踪
pub mod error; // 错误类型
pub mod events; // 事件总线
pub mod input; // 截图 / 指针 / 光标
pub mod models; // 推理引擎与模型加载
pub mod pipeline; // 三线程流水线
pub mod prediction; // 运动预测

pub use crate::benchmark::Benchmark;
pub use crate::config::{AimConfig, Args, ConfigStore, ToggleState, Toggles};
pub use crate::detection::{Point2, Prediction, Rect, ScreenRect};
pub use crate::error::{Error, Result};
pub use crate::events::{EventBus, PipelineEvent};
pub use crate::models::{InferenceEngine, ModelInfo, ModelSlot, OrtEP};
pub use crate::pipeline::{Pipeline, PipelineParts};
pub use crate::prediction::{PredictionMethod, PredictorBank};
