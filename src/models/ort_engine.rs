// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎 (feature = "onnx")
// 包含: 后端协商、元数据读取、推理

use std::path::Path;

use anyhow::Context;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, DirectMLExecutionProvider,
    ExecutionProviderDispatch, TensorRTExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};
use tracing::{debug, info};

use super::{loader::negotiate_backend, metadata, InferenceEngine, ModelInfo, OrtEP};
use crate::error::{Error, Result};

pub struct OrtEngine {
    session: Session,
    input_name: String,
    info: ModelInfo,
    ep: OrtEP,
}

fn dispatch(ep: OrtEP) -> ExecutionProviderDispatch {
    match ep {
        OrtEP::TensorRT(id) => TensorRTExecutionProvider::default()
            .with_device_id(id)
            .build()
            .error_on_failure(),
        OrtEP::Cuda(id) => CUDAExecutionProvider::default()
            .with_device_id(id)
            .build()
            .error_on_failure(),
        OrtEP::DirectML(id) => DirectMLExecutionProvider::default()
            .with_device_id(id)
            .build()
            .error_on_failure(),
        OrtEP::Cpu => CPUExecutionProvider::default().build(),
    }
}

fn build_session(path: &Path, ep: OrtEP) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers([dispatch(ep)])?
        .commit_from_file(path)?;
    Ok(session)
}

fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

impl OrtEngine {
    /// 加载模型: 按 TensorRT → CUDA → DirectML → CPU 顺序协商后端
    pub fn build(path: impl AsRef<Path>, configured_size: u32, device_id: i32) -> anyhow::Result<Self> {
        let path = path.as_ref();
        info!("📂 加载模型 {}", path.display());

        let (ep, session) =
            negotiate_backend(&OrtEP::default_order(device_id), |ep| build_session(path, ep))?;

        let input = session.inputs.first().context("model has no inputs")?;
        let input_name = input.name.clone();
        let input_dims = tensor_dims(&input.input_type).context("model input is not a tensor")?;
        let output = session.outputs.first().context("model has no outputs")?;
        let output_dims =
            tensor_dims(&output.output_type).context("model output is not a tensor")?;

        let names = session.metadata()?.custom("names")?;
        debug!("input {:?}, output {:?}, names {:?}", input_dims, output_dims, names);

        let info = metadata::resolve_model_info(
            &input_dims,
            &output_dims,
            names.as_deref(),
            configured_size,
        )?;

        Ok(Self {
            session,
            input_name,
            info,
            ep,
        })
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }
}

impl InferenceEngine for OrtEngine {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn infer(&mut self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
        let to_err = |e: ort::Error| Error::Inference(e.to_string());

        let tensor = Tensor::from_array(input.as_standard_layout().into_owned()).map_err(to_err)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(to_err)?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(to_err)?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())?)
    }
}
