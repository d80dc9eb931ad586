//! 命令行参数

use std::path::PathBuf;

use clap::Parser;

use super::ToggleState;

/// 实时检测-跟踪-预测参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "实时目标跟踪与预测指针流水线", long_about = None)]
pub struct Args {
    /// ONNX 检测模型路径
    #[arg(short, long, default_value = "models/yolov8n-det.onnx")]
    pub model: PathBuf,

    /// JSON 配置文件 (不存在时写出默认配置)
    #[arg(short, long, default_value = "lockon.json")]
    pub config: PathBuf,

    /// 图片目录回放 (替代屏幕截图)
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// GPU 设备ID
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 运行时长 (秒, 0 表示一直运行直到回车)
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// 启用瞄准辅助
    #[arg(long, default_value_t = false)]
    pub aim_assist: bool,

    /// 持续跟踪 (不需要按住瞄准键)
    #[arg(long, default_value_t = false)]
    pub constant_tracking: bool,

    /// 显示检测结果 (供界面协作方使用)
    #[arg(long, default_value_t = false)]
    pub show_detected: bool,

    /// 只打印移动, 不注入指针事件
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl Args {
    pub fn toggles(&self) -> ToggleState {
        ToggleState {
            aim_assist: self.aim_assist,
            show_detected: self.show_detected,
            constant_tracking: self.constant_tracking,
            aim_key_held: false,
        }
    }
}
