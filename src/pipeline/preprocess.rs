// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 预处理: RGBA 帧 → [1, 3, S, S] 归一化张量 (RGB / 255)

use std::borrow::Cow;

use image::{imageops, ImageBuffer, Rgba};
use ndarray::{ArrayViewD, IxDyn};

use super::pool::{BufferPool, PooledBuffer};
use crate::error::{Error, Result};
use crate::input::FrameHandle;

/// 帧写入池中租来的缓冲区 (CHW 排列)
///
/// 帧尺寸与模型尺寸不一致时先缩放 (Triangle)。
pub fn frame_to_tensor(
    frame: &dyn FrameHandle,
    size: u32,
    pool: &BufferPool<f32>,
) -> Result<PooledBuffer<f32>> {
    let (w, h) = (frame.width(), frame.height());
    let expected = w as usize * h as usize * 4;
    let raw = frame.rgba();
    if raw.len() != expected {
        return Err(Error::FrameBuffer {
            width: w,
            height: h,
            expected,
            actual: raw.len(),
        });
    }

    let pixels: Cow<'_, [u8]> = if w == size && h == size {
        Cow::Borrowed(raw)
    } else {
        let view = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(w, h, raw).ok_or(Error::FrameBuffer {
            width: w,
            height: h,
            expected,
            actual: raw.len(),
        })?;
        Cow::Owned(imageops::resize(&view, size, size, imageops::FilterType::Triangle).into_raw())
    };

    let plane = size as usize * size as usize;
    let mut buf = pool.rent(3 * plane);
    let (r, rest) = buf.split_at_mut(plane);
    let (g, b) = rest.split_at_mut(plane);
    for (i, px) in pixels.chunks_exact(4).enumerate() {
        r[i] = px[0] as f32 / 255.0;
        g[i] = px[1] as f32 / 255.0;
        b[i] = px[2] as f32 / 255.0;
    }
    Ok(buf)
}

/// 把缓冲区看作 [1, 3, S, S]
pub fn tensor_view(buf: &[f32], size: u32) -> Result<ArrayViewD<'_, f32>> {
    let s = size as usize;
    Ok(ArrayViewD::from_shape(IxDyn(&[1, 3, s, s]), buf)?)
}
