/// 输入/输出协作方 (Capture & Pointer)
///
/// 流水线只通过这里的 trait 与外部交互
/// - CaptureSource: 截取屏幕区域, 产出 RGBA 帧
/// - FrameHandle:   帧的所有权句柄, 由回收线程负责释放
/// - CursorSource:  光标位置 ("离鼠标最近" 模式)
/// - PointerDevice: 相对移动指针
pub mod pointer;
pub mod replay;

use crate::detection::{Point2, ScreenRect};
use crate::error::Result;

pub use pointer::{raise_thread_priority, system_cursor, system_pointer, NullPointer};
pub use replay::{ImageDirCapture, OwnedFrame};

/// 截图帧 (RGBA8, 行优先, 无行填充)
pub trait FrameHandle: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn rgba(&self) -> &[u8];

    /// 归还底层资源; 每帧恰好调用一次
    fn release(self: Box<Self>);
}

pub trait CaptureSource: Send {
    /// 截取屏幕区域; 失败/暂不可用时返回 None
    fn capture(&mut self, region: ScreenRect) -> Option<Box<dyn FrameHandle>>;
}

pub trait CursorSource: Send + Sync {
    fn cursor_position(&self) -> Option<Point2>;
}

pub trait PointerDevice: Send {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()>;
}
