//! 模型加载: 后端协商 + 后台加载线程
//!
//! 加载成功后放入 [`ModelSlot`] 并发布事件; 失败只记录日志,
//! 流水线保持"模型未就绪"状态继续空转。

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{error, info, warn};

use super::{InferenceEngine, ModelSlot, OrtEP};
use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::events::{EventBus, PipelineEvent};

/// 按顺序尝试每个后端, 返回第一个成功的
///
/// 每次尝试相互独立, 前一个失败不影响后一个。
pub fn negotiate_backend<T, F>(order: &[OrtEP], mut build: F) -> Result<(OrtEP, T)>
where
    F: FnMut(OrtEP) -> anyhow::Result<T>,
{
    for &ep in order {
        match build(ep) {
            Ok(value) => {
                info!("✅ 推理后端: {}", ep);
                return Ok((ep, value));
            }
            Err(e) => warn!("⚠️  后端 {} 不可用: {:#}", ep, e),
        }
    }
    warn!("❌ 所有推理后端均失败, 瞄准辅助不可用");
    Err(Error::NoBackend)
}

/// 安装模型并发布事件
///
/// 固定尺寸模型会覆盖配置中的输入尺寸。
pub fn install_model(
    slot: &ModelSlot,
    engine: Box<dyn InferenceEngine>,
    store: &ConfigStore,
    bus: &EventBus,
) -> bool {
    let info = engine.info().clone();
    if !slot.install(engine) {
        warn!("⚠️  模型已加载, 忽略重复安装");
        return false;
    }

    info!(
        "📦 模型就绪: {}x{}, {} 类, {} 检测槽位{}",
        info.image_size,
        info.image_size,
        info.num_classes,
        info.num_detections,
        if info.dynamic { " (动态尺寸)" } else { "" }
    );

    bus.post(PipelineEvent::ClassesUpdated(info.class_map.clone()));
    bus.post(PipelineEvent::DynamicModelChanged(info.dynamic));
    if !info.dynamic && store.image_size() != info.image_size {
        store.set_image_size(info.image_size);
        bus.post(PipelineEvent::ImageSizeChanged(info.image_size));
    }
    true
}

/// 在后台线程加载模型
pub fn spawn<F>(
    slot: Arc<ModelSlot>,
    store: Arc<ConfigStore>,
    bus: EventBus,
    build: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() -> anyhow::Result<Box<dyn InferenceEngine>> + Send + 'static,
{
    std::thread::Builder::new()
        .name("model-loader".into())
        .spawn(move || {
            let t = Instant::now();
            match build() {
                Ok(engine) => {
                    if install_model(&slot, engine, &store, &bus) {
                        info!("⏱️  模型加载耗时 {:?}", t.elapsed());
                    }
                }
                Err(e) => error!("❌ 模型加载失败: {:#}", e),
            }
        })
}
