//! 指针设备 / 光标 / 线程优先级
//!
//! Windows 下走 Win32 (`SendInput`, `GetCursorPos`, `SetThreadPriority`),
//! 其他平台只提供空实现。

use tracing::{debug, warn};

use super::{CursorSource, PointerDevice};
use crate::error::Result;

/// 不移动任何东西, 只累计位移 (无 Win32 环境 / 演练模式)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPointer {
    total: (i64, i64),
    moves: u64,
}

impl NullPointer {
    pub fn total(&self) -> (i64, i64) {
        self.total
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }
}

impl PointerDevice for NullPointer {
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.total.0 += dx as i64;
        self.total.1 += dy as i64;
        self.moves += 1;
        debug!("🖱️  move ({}, {})", dx, dy);
        Ok(())
    }
}

#[cfg(windows)]
mod win32 {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::System::Threading::{
        GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
    };
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_MOVE, MOUSEINPUT,
    };
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    use crate::detection::Point2;
    use crate::error::{Error, Result};
    use crate::input::{CursorSource, PointerDevice};

    #[derive(Debug, Default)]
    pub struct SendInputPointer;

    impl PointerDevice for SendInputPointer {
        fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
            let input = INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx,
                        dy,
                        mouseData: 0,
                        dwFlags: MOUSEEVENTF_MOVE,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            };
            let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
            if sent == 1 {
                Ok(())
            } else {
                Err(Error::Pointer(format!(
                    "SendInput failed: {}",
                    windows::core::Error::from_win32()
                )))
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct Win32Cursor;

    impl CursorSource for Win32Cursor {
        fn cursor_position(&self) -> Option<Point2> {
            let mut p = POINT::default();
            unsafe { GetCursorPos(&mut p) }.ok()?;
            Some(Point2::new(p.x as f32, p.y as f32))
        }
    }

    pub fn raise_thread_priority() -> bool {
        unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) }.is_ok()
    }
}

#[cfg(windows)]
pub use win32::{SendInputPointer, Win32Cursor};

/// 当前平台的指针设备
pub fn system_pointer() -> Box<dyn PointerDevice> {
    #[cfg(windows)]
    {
        Box::new(SendInputPointer)
    }
    #[cfg(not(windows))]
    {
        warn!("⚠️  当前平台没有指针注入实现, 使用 NullPointer");
        Box::new(NullPointer::default())
    }
}

/// 当前平台的光标位置来源
pub fn system_cursor() -> Option<std::sync::Arc<dyn CursorSource>> {
    #[cfg(windows)]
    {
        Some(std::sync::Arc::new(Win32Cursor))
    }
    #[cfg(not(windows))]
    {
        None
    }
}

/// 把当前线程提到最高优先级; 失败或不支持时返回 false
pub fn raise_thread_priority() -> bool {
    #[cfg(windows)]
    {
        let ok = win32::raise_thread_priority();
        if !ok {
            warn!("⚠️  无法提升线程优先级");
        }
        ok
    }
    #[cfg(not(windows))]
    {
        debug!("线程优先级保持默认 (非 Windows)");
        false
    }
}
