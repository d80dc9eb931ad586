//! 运行时配置存储
//!
//! 界面线程通过 `update` 修改; 检测循环每次迭代调用 `snapshot`,
//! 拿到一份不可变的 [`FrameConfig`], 本帧内不会被改动。

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{AimConfig, DetectionArea};
use crate::detection::{ExtractorSettings, ScreenRect, StickySettings};
use crate::error::Result;
use crate::pipeline::actuation::MovementProfile;
use crate::pipeline::aim::AimPointSettings;
use crate::prediction::PredictionSettings;

/// 单帧使用的配置快照
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub image_size: u32,
    pub screen: ScreenRect,
    pub detection_area: DetectionArea,
    pub extractor: ExtractorSettings,
    pub sticky: StickySettings,
    pub predictions_enabled: bool,
    pub prediction: PredictionSettings,
    pub aim: AimPointSettings,
    pub movement: MovementProfile,
}

impl From<&AimConfig> for FrameConfig {
    fn from(c: &AimConfig) -> Self {
        Self {
            image_size: c.image_size,
            screen: c.screen,
            detection_area: c.detection_area,
            extractor: c.extractor_settings(),
            sticky: c.sticky_settings(),
            predictions_enabled: c.predictions,
            prediction: c.prediction_settings(),
            aim: c.aim_point_settings(),
            movement: c.movement_profile(),
        }
    }
}

#[derive(Debug)]
pub struct ConfigStore {
    config: RwLock<AimConfig>,
    frame: RwLock<Arc<FrameConfig>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(AimConfig::default())
    }
}

impl ConfigStore {
    pub fn new(config: AimConfig) -> Self {
        let frame = Arc::new(FrameConfig::from(&config));
        Self {
            config: RwLock::new(config),
            frame: RwLock::new(frame),
        }
    }

    /// 当前完整配置 (拷贝)
    pub fn get(&self) -> AimConfig {
        self.config.read().clone()
    }

    /// 修改配置并刷新快照
    pub fn update<F: FnOnce(&mut AimConfig)>(&self, f: F) {
        let mut config = self.config.write();
        f(&mut config);
        *self.frame.write() = Arc::new(FrameConfig::from(&*config));
    }

    pub fn snapshot(&self) -> Arc<FrameConfig> {
        Arc::clone(&self.frame.read())
    }

    pub fn image_size(&self) -> u32 {
        self.config.read().image_size
    }

    pub fn set_image_size(&self, size: u32) {
        self.update(|c| c.image_size = size);
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.config.read().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_immutable() {
        let store = ConfigStore::default();
        let before = store.snapshot();
        store.update(|c| {
            c.min_confidence = 70.0;
            c.sticky_aim = true;
        });
        let after = store.snapshot();

        assert_eq!(before.extractor.min_confidence, 45.0);
        assert!(!before.sticky.enabled);
        assert_eq!(after.extractor.min_confidence, 70.0);
        assert!(after.sticky.enabled);
    }

    #[test]
    fn test_set_image_size() {
        let store = ConfigStore::default();
        store.set_image_size(320);
        assert_eq!(store.image_size(), 320);
        assert_eq!(store.snapshot().image_size, 320);
    }

    #[test]
    fn test_concurrent_update_and_snapshot() {
        let store = Arc::new(ConfigStore::default());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.update(|c| c.fov_size = i as f32);
                }
            })
        };
        for _ in 0..200 {
            let snap = store.snapshot();
            assert!(snap.extractor.fov_size <= 640.0);
        }
        writer.join().unwrap();
        assert_eq!(store.snapshot().extractor.fov_size, 199.0);
    }
}
