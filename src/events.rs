// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 事件总线 (Event Bus)
//!
//! 流水线向外部协作方 (界面/配置面板) 发布的通知, 发出即忘:
//! 订阅回调在发布线程上同步执行, 没有订阅者时直接丢弃。
//!
//! ```ignore
//! let bus = EventBus::new();
//! let _sub = bus.subscribe(|event| println!("{:?}", event));
//! bus.post(PipelineEvent::ImageSizeChanged(320));
//! ```
//!
//! `Subscription` 析构时自动退订。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::detection::ClassMap;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// 模型加载完成, 类别表更新
    ClassesUpdated(ClassMap),
    /// 固定尺寸模型覆盖了配置中的输入尺寸
    ImageSizeChanged(u32),
    /// 模型是否为动态输入尺寸
    DynamicModelChanged(bool),
}

type Handler = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler)>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Subscribers>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.write().push((id, Arc::new(handler)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// 转发到 channel, 适合在别的线程里消费
    pub fn subscribe_channel(&self) -> (Subscription, crossbeam_channel::Receiver<PipelineEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sub = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (sub, rx)
    }

    pub fn post(&self, event: PipelineEvent) {
        // 先复制一份句柄再调用, 回调里可以再订阅/退订
        let handlers: Vec<Handler> = self
            .inner
            .handlers
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().len()
    }
}

pub struct Subscription {
    id: u64,
    bus: Weak<Subscribers>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.handlers.write().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_post_reaches_subscribers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = bus.subscribe(move |event| {
            if let PipelineEvent::ImageSizeChanged(320) = event {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        bus.post(PipelineEvent::ImageSizeChanged(320));
        bus.post(PipelineEvent::DynamicModelChanged(false));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let sub = bus.subscribe(|_| {});
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        // 无订阅者时发布不报错
        bus.post(PipelineEvent::DynamicModelChanged(true));
    }

    #[test]
    fn test_channel_subscription() {
        let bus = EventBus::new();
        let (_sub, rx) = bus.subscribe_channel();
        let mut classes = ClassMap::new();
        classes.insert(0, "enemy".to_string());
        bus.post(PipelineEvent::ClassesUpdated(classes.clone()));
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::ClassesUpdated(classes));
    }
}
