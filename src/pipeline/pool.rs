// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 缓冲区池 (Buffer Pool)
//!
//! 按 2 的幂分桶复用 `Vec<T>`, 避免每帧分配输入张量。
//! - 每桶最多保留 10 个缓冲区
//! - 单个缓冲区超过 50 MiB 时不回收
//! - 任意线程都可租借/归还
//!
//! 租到的缓冲区内容未清零, 调用方负责写满。

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub const MAX_BUFFERS_PER_BUCKET: usize = 10;
pub const MAX_BUFFER_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub rentals: u64,
    pub returns: u64,
    /// 从池中复用的次数
    pub reused: u64,
    /// 新分配的次数
    pub allocated: u64,
    /// 归还时因桶满/过大而丢弃的次数
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    rentals: AtomicU64,
    returns: AtomicU64,
    reused: AtomicU64,
    allocated: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug)]
struct Inner<T> {
    buckets: Mutex<HashMap<usize, Vec<Vec<T>>>>,
    counters: Counters,
}

/// 线程安全的分桶池 (clone 共享同一个池)
#[derive(Debug)]
pub struct BufferPool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default + Send> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn bucket_len(len: usize) -> usize {
    len.max(1).next_power_of_two()
}

impl<T: Copy + Default + Send> BufferPool<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                buckets: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// 租借长度为 `len` 的缓冲区, 析构时自动归还
    pub fn rent(&self, len: usize) -> PooledBuffer<T> {
        let c = &self.inner.counters;
        c.rentals.fetch_add(1, Ordering::Relaxed);

        let bucket = bucket_len(len);
        let reused = self
            .inner
            .buckets
            .lock()
            .get_mut(&bucket)
            .and_then(|b| b.pop());

        let data = match reused {
            Some(v) => {
                c.reused.fetch_add(1, Ordering::Relaxed);
                v
            }
            None => {
                c.allocated.fetch_add(1, Ordering::Relaxed);
                vec![T::default(); bucket]
            }
        };

        PooledBuffer {
            data: Some(data),
            len,
            pool: self.clone(),
        }
    }

    fn give_back(&self, data: Vec<T>) {
        let c = &self.inner.counters;
        c.returns.fetch_add(1, Ordering::Relaxed);

        let bytes = data.len() * std::mem::size_of::<T>();
        if bytes > MAX_BUFFER_BYTES {
            c.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut buckets = self.inner.buckets.lock();
        let bucket = buckets.entry(data.len()).or_default();
        if bucket.len() < MAX_BUFFERS_PER_BUCKET {
            bucket.push(data);
        } else {
            c.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 清空全部缓存的缓冲区, 返回释放的字节数
    pub fn clear_all(&self) -> usize {
        let mut buckets = self.inner.buckets.lock();
        let bytes = buckets
            .values()
            .flatten()
            .map(|v| v.len() * std::mem::size_of::<T>())
            .sum();
        buckets.clear();
        bytes
    }

    /// 当前缓存的缓冲区个数
    pub fn cached(&self) -> usize {
        self.inner.buckets.lock().values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.inner.counters;
        PoolStats {
            rentals: c.rentals.load(Ordering::Relaxed),
            returns: c.returns.load(Ordering::Relaxed),
            reused: c.reused.load(Ordering::Relaxed),
            allocated: c.allocated.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
        }
    }
}

/// 租借中的缓冲区 (RAII)
pub struct PooledBuffer<T: Copy + Default + Send> {
    data: Option<Vec<T>>,
    len: usize,
    pool: BufferPool<T>,
}

impl<T: Copy + Default + Send> PooledBuffer<T> {
    /// 实际容量 (桶大小)
    pub fn capacity(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

impl<T: Copy + Default + Send> Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.data {
            Some(v) => &v[..self.len],
            None => &[],
        }
    }
}

impl<T: Copy + Default + Send> DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match &mut self.data {
            Some(v) => &mut v[..self.len],
            None => &mut [],
        }
    }
}

impl<T: Copy + Default + Send> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.give_back(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_same_bucket() {
        let pool = BufferPool::<f32>::new();
        {
            let mut a = pool.rent(1000);
            assert_eq!(a.len(), 1000);
            assert_eq!(a.capacity(), 1024);
            a[999] = 1.0;
        }
        let b = pool.rent(600);
        assert_eq!(b.capacity(), 1024);
        assert_eq!(b.len(), 600);

        let s = pool.stats();
        assert_eq!(s.rentals, 2);
        assert_eq!(s.returns, 1);
        assert_eq!(s.reused, 1);
        assert_eq!(s.allocated, 1);
    }

    #[test]
    fn test_bucket_limit() {
        let pool = BufferPool::<u8>::new();
        let held: Vec<_> = (0..12).map(|_| pool.rent(64)).collect();
        drop(held);
        assert_eq!(pool.cached(), MAX_BUFFERS_PER_BUCKET);
        assert_eq!(pool.stats().discarded, 2);
    }

    #[test]
    fn test_oversized_not_retained() {
        let pool = BufferPool::<f32>::new();
        drop(pool.rent(MAX_BUFFER_BYTES / 4 + 1));
        assert_eq!(pool.cached(), 0);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn test_clear_all() {
        let pool = BufferPool::<f32>::new();
        drop(pool.rent(256));
        drop(pool.rent(16));
        assert_eq!(pool.clear_all(), (256 + 16) * 4);
        assert_eq!(pool.cached(), 0);
    }

    #[test]
    fn test_concurrent_rent_return() {
        let pool = BufferPool::<f32>::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let mut b = pool.rent(100 + (i % 50));
                        b.fill(t as f32);
                        assert!(b.iter().all(|&v| v == t as f32));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = pool.stats();
        assert_eq!(s.rentals, 1600);
        assert_eq!(s.returns, 1600);
        assert_eq!(s.reused + s.allocated, 1600);
        assert!(pool.cached() <= MAX_BUFFERS_PER_BUCKET);
    }
}
