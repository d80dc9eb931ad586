/// 推理引擎接口与模型加载
///
/// # 架构说明
///
/// - **InferenceEngine**: 输入 [1, 3, S, S] 归一化张量, 输出 [1, 4+C, N] 原始检测张量
/// - **ModelInfo**: 输入尺寸 / 检测数 / 类别表 / 是否动态尺寸
/// - **ModelSlot**: 后台线程加载完成后放入引擎, 检测线程据 `is_ready()` 决定是否处理
/// - **OrtEP**: 执行后端, 固定回退顺序 TensorRT → CUDA → DirectML → CPU
///
/// ## 使用示例
/// ```ignore
/// let slot = Arc::new(ModelSlot::new());
/// let handle = loader::spawn(Arc::clone(&slot), store, bus, move || {
///     OrtEngine::build(&model_path, 640, 0).map(|e| Box::new(e) as Box<dyn InferenceEngine>)
/// });
/// ```
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::{ArrayD, ArrayViewD};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::detection::ClassMap;
use crate::error::{Error, Result};

pub mod loader;
pub mod metadata;
#[cfg(feature = "onnx")]
pub mod ort_engine;

pub use loader::negotiate_backend;
pub use metadata::{num_detections, parse_class_names, resolve_model_info, SUPPORTED_SIZES};
#[cfg(feature = "onnx")]
pub use ort_engine::OrtEngine;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub image_size: u32,
    pub num_detections: usize,
    pub num_classes: usize,
    pub class_map: ClassMap,
    /// 输入尺寸是否动态 (-1)
    pub dynamic: bool,
}

pub trait InferenceEngine: Send {
    fn info(&self) -> &ModelInfo;

    /// 输入 [1, 3, S, S] (RGB, 0..1), 输出 [1, 4+C, N]
    fn infer(&mut self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>>;
}

/// 执行后端 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    TensorRT(i32),
    Cuda(i32),
    DirectML(i32),
    Cpu,
}

impl OrtEP {
    /// 回退顺序: TensorRT → CUDA → DirectML → CPU
    pub fn default_order(device_id: i32) -> [OrtEP; 4] {
        [
            OrtEP::TensorRT(device_id),
            OrtEP::Cuda(device_id),
            OrtEP::DirectML(device_id),
            OrtEP::Cpu,
        ]
    }
}

impl std::fmt::Display for OrtEP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrtEP::TensorRT(id) => write!(f, "TensorRT:{}", id),
            OrtEP::Cuda(id) => write!(f, "CUDA:{}", id),
            OrtEP::DirectML(id) => write!(f, "DirectML:{}", id),
            OrtEP::Cpu => write!(f, "CPU"),
        }
    }
}

/// 已加载模型的存放处
///
/// 只装载一次; 之后 `info()` 不再变化。
#[derive(Default)]
pub struct ModelSlot {
    engine: Mutex<Option<Box<dyn InferenceEngine>>>,
    info: OnceCell<ModelInfo>,
    ready: AtomicBool,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入引擎并标记就绪; 已有模型时返回 false
    pub fn install(&self, engine: Box<dyn InferenceEngine>) -> bool {
        if self.info.set(engine.info().clone()).is_err() {
            return false;
        }
        *self.engine.lock() = Some(engine);
        self.ready.store(true, Ordering::Release);
        true
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        self.info.get()
    }

    pub fn infer(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
        match self.engine.lock().as_mut() {
            Some(engine) => engine.infer(input),
            None => Err(Error::ModelNotReady),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    struct Fixed(ModelInfo);

    impl InferenceEngine for Fixed {
        fn info(&self) -> &ModelInfo {
            &self.0
        }

        fn infer(&mut self, _input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
            Ok(ArrayD::zeros(IxDyn(&[1, 5, self.0.num_detections])))
        }
    }

    fn info() -> ModelInfo {
        ModelInfo {
            image_size: 160,
            num_detections: num_detections(160),
            num_classes: 1,
            class_map: metadata::default_class_map(),
            dynamic: false,
        }
    }

    #[test]
    fn test_slot_install_once() {
        let slot = ModelSlot::new();
        assert!(!slot.is_ready());
        let input = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 160, 160]));
        assert!(matches!(slot.infer(input.view()), Err(Error::ModelNotReady)));

        assert!(slot.install(Box::new(Fixed(info()))));
        assert!(slot.is_ready());
        assert_eq!(slot.info().unwrap().image_size, 160);
        assert_eq!(slot.infer(input.view()).unwrap().shape(), &[1, 5, 525]);

        assert!(!slot.install(Box::new(Fixed(info()))));
    }

    #[test]
    fn test_default_ep_order() {
        let order = OrtEP::default_order(0);
        assert_eq!(order[0], OrtEP::TensorRT(0));
        assert_eq!(order[3], OrtEP::Cpu);
        assert_eq!(order[2].to_string(), "DirectML:0");
    }
}
