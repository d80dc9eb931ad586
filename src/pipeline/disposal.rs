// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 截图帧回收 (Frame Disposal)
//!
//! 检测线程用完的帧放进容量为 3 的有界队列, 由回收线程释放。
//! 队列满时丢弃最旧的一帧并立即释放, 生产者永不阻塞;
//! 每一帧恰好释放一次。

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info};

use super::CancelToken;
use crate::detection::ScreenRect;
use crate::input::FrameHandle;

pub const DISPOSAL_CAPACITY: usize = 3;

/// 一帧及其截图区域
pub struct FrameWork {
    pub frame: Box<dyn FrameHandle>,
    pub rect: ScreenRect,
    pub captured_at: Instant,
}

impl FrameWork {
    pub fn new(frame: Box<dyn FrameHandle>, rect: ScreenRect) -> Self {
        Self {
            frame,
            rect,
            captured_at: Instant::now(),
        }
    }

    pub fn release(self) {
        self.frame.release();
    }
}

/// 生产者端
pub struct FrameDisposal {
    tx: Sender<FrameWork>,
    // 用来从队首"偷"出最旧的帧
    steal: Receiver<FrameWork>,
    displaced: u64,
}

impl FrameDisposal {
    pub fn new(capacity: usize) -> (Self, Receiver<FrameWork>) {
        let (tx, rx) = bounded(capacity.max(1));
        let disposal = Self {
            tx,
            steal: rx.clone(),
            displaced: 0,
        };
        (disposal, rx)
    }

    /// 提交一帧; 队列满时释放最旧的帧后再放入
    pub fn submit(&mut self, work: FrameWork) {
        let mut work = work;
        loop {
            match self.tx.try_send(work) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    work = back;
                    if let Ok(oldest) = self.steal.try_recv() {
                        self.displaced += 1;
                        oldest.release();
                    }
                }
                Err(TrySendError::Disconnected(back)) => {
                    back.release();
                    return;
                }
            }
        }
    }

    /// 因队列满而被提前释放的帧数
    pub fn displaced(&self) -> u64 {
        self.displaced
    }
}

impl Drop for FrameDisposal {
    fn drop(&mut self) {
        let mut n = 0;
        while let Ok(work) = self.steal.try_recv() {
            work.release();
            n += 1;
        }
        if n > 0 {
            debug!("released {} queued frames on drop", n);
        }
    }
}

/// 回收线程主循环
pub fn run_disposal(rx: Receiver<FrameWork>, cancel: CancelToken) {
    let mut released = 0u64;
    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(work) => {
                work.release();
                released += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    while let Ok(work) = rx.try_recv() {
        work.release();
        released += 1;
    }
    info!("🗑️  回收线程退出, 共释放 {} 帧", released);
}
