//! 图片目录回放捕获
//!
//! 把目录中的图片当作"整块屏幕"循环播放, 按请求区域裁剪;
//! 区域超出图片的部分填 0。用于离线调试和集成测试。

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, info, warn};

use super::{CaptureSource, FrameHandle};
use crate::detection::ScreenRect;
use crate::error::Result;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// 自有内存的帧
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl OwnedFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// 从整幅图像裁剪 (越界部分为 0)
    pub fn crop(screen: &RgbaImage, region: ScreenRect) -> Self {
        let (w, h) = (region.width, region.height);
        let mut data = vec![0u8; (w * h * 4) as usize];
        let (sw, sh) = (screen.width() as i64, screen.height() as i64);

        for row in 0..h as i64 {
            let sy = region.top as i64 + row;
            if sy < 0 || sy >= sh {
                continue;
            }
            let x0 = (region.left as i64).max(0);
            let x1 = (region.left as i64 + w as i64).min(sw);
            if x0 >= x1 {
                continue;
            }
            let src_start = ((sy * sw + x0) * 4) as usize;
            let src_end = ((sy * sw + x1) * 4) as usize;
            let dst_start = ((row * w as i64 + (x0 - region.left as i64)) * 4) as usize;
            data[dst_start..dst_start + (src_end - src_start)]
                .copy_from_slice(&screen.as_raw()[src_start..src_end]);
        }

        Self::new(w, h, data)
    }
}

impl FrameHandle for OwnedFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rgba(&self) -> &[u8] {
        &self.data
    }

    fn release(self: Box<Self>) {}
}

pub struct ImageDirCapture {
    frames: Vec<RgbaImage>,
    cursor: usize,
}

impl ImageDirCapture {
    /// 加载目录下所有图片 (按文件名排序)
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            match image::open(path) {
                Ok(img) => frames.push(img.to_rgba8()),
                Err(e) => warn!("⚠️  跳过无法解码的图片 {}: {}", path.display(), e),
            }
        }
        info!(
            "🖼️  回放源已加载 {} 帧 ({})",
            frames.len(),
            dir.as_ref().display()
        );
        Ok(Self::from_images(frames))
    }

    pub fn from_images(frames: Vec<RgbaImage>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl CaptureSource for ImageDirCapture {
    fn capture(&mut self, region: ScreenRect) -> Option<Box<dyn FrameHandle>> {
        if self.frames.is_empty() {
            debug!("回放源为空");
            return None;
        }
        let screen = &self.frames[self.cursor % self.frames.len()];
        self.cursor = self.cursor.wrapping_add(1);
        Some(Box::new(OwnedFrame::crop(screen, region)))
    }
}
