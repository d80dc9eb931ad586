// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 错误类型
//! Error taxonomy shared by the detection pipeline

/// 流水线错误
///
/// 单帧错误 (形状不匹配、推理失败) 在帧边界被吞掉并降级为"本帧无目标";
/// 启动错误 (模型尺寸/后端) 会记录日志, 流水线保持禁用状态而不是崩溃。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("output tensor shape mismatch: expected {expected}, got {actual:?}")]
    OutputShape { expected: String, actual: Vec<usize> },

    #[error("model requires unsupported input size {0}x{0} (supported: 640, 512, 416, 320, 256, 160)")]
    UnsupportedInputSize(u32),

    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    FrameBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("model is not loaded yet")]
    ModelNotReady,

    #[error("all inference backends failed, aim assist unavailable")]
    NoBackend,

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model metadata: {0}")]
    Metadata(String),

    #[error("pointer device: {0}")]
    Pointer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
