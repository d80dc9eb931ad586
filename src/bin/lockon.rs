/// 实时目标跟踪 (Lock-On)
///
/// 系统架构:
/// 1. 加载线程: 模型加载与后端协商 (一次性)
/// 2. 检测线程: 截图 → 推理 → 选择 → 跟踪 → 预测
/// 3. 移动线程: 相对指针移动 (最高优先级)
/// 4. 回收线程: 截图帧释放
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::{error, info, warn};

use lockon::config::{AimConfig, Args, ConfigStore, Toggles};
use lockon::events::{EventBus, PipelineEvent};
use lockon::input::{system_cursor, system_pointer, ImageDirCapture, NullPointer, PointerDevice};
use lockon::models::ModelSlot;
use lockon::pipeline::{Pipeline, PipelineParts};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[cfg(feature = "onnx")]
fn spawn_loader(args: &Args, slot: Arc<ModelSlot>, store: Arc<ConfigStore>, bus: EventBus) {
    use lockon::models::{loader, InferenceEngine, OrtEngine};

    let path = args.model.clone();
    let device_id = args.device_id;
    let size = store.image_size();
    let spawned = loader::spawn(slot, store, bus, move || {
        let engine = OrtEngine::build(&path, size, device_id)?;
        Ok(Box::new(engine) as Box<dyn InferenceEngine>)
    });
    if let Err(e) = spawned {
        error!("❌ 无法启动模型加载线程: {}", e);
    }
}

#[cfg(not(feature = "onnx"))]
fn spawn_loader(args: &Args, _slot: Arc<ModelSlot>, _store: Arc<ConfigStore>, _bus: EventBus) {
    error!(
        "❌ 未启用 onnx 特性, 无法加载 {} (使用 --features onnx 重新编译)",
        args.model.display()
    );
}

fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lockon=info,ort=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    info!("🚀 Lock-On 启动");

    let config = AimConfig::load(&args.config);
    config.print_summary();
    let store = Arc::new(ConfigStore::new(config));
    let toggles = Arc::new(Toggles::new(args.toggles()));

    let bus = EventBus::new();
    let _events = bus.subscribe(|event| match event {
        PipelineEvent::ClassesUpdated(classes) => info!("🏷️  类别: {:?}", classes),
        PipelineEvent::ImageSizeChanged(size) => info!("📐 输入尺寸: {}x{}", size, size),
        PipelineEvent::DynamicModelChanged(dynamic) => info!("🔄 动态模型: {}", dynamic),
    });

    let slot = Arc::new(ModelSlot::new());
    spawn_loader(&args, Arc::clone(&slot), Arc::clone(&store), bus.clone());

    let dir = args
        .replay
        .as_ref()
        .context("no screen capture backend in this build, pass --replay <dir>")?;
    let capture = ImageDirCapture::open(dir)?;
    info!("📹 回放目录: {} ({} 帧)", dir.display(), capture.len());

    let pointer: Box<dyn PointerDevice> = if args.dry_run {
        info!("🧪 演练模式: 不注入指针事件");
        Box::new(NullPointer::default())
    } else {
        system_pointer()
    };

    let parts = PipelineParts::new(
        Box::new(capture),
        pointer,
        slot,
        Arc::clone(&store),
        toggles,
    )
    .with_cursor(system_cursor())
    .with_bus(bus);
    let mut pipeline = Pipeline::spawn(parts)?;

    if args.duration > 0 {
        std::thread::sleep(Duration::from_secs(args.duration));
    } else {
        info!("⏎  按回车键退出");
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            warn!("⚠️  读取标准输入失败: {}", e);
        }
    }

    pipeline.shutdown();
    println!("{}", pipeline.benchmark().report());
    let stats = pipeline.pool_stats();
    info!(
        "♻️  缓冲池: 租借 {}, 复用 {}, 新分配 {}",
        stats.rentals, stats.reused, stats.allocated
    );
    Ok(())
}
