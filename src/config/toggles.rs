//! 运行时开关 (原子变量, 任意线程可读写)

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct Toggles {
    aim_assist: AtomicBool,
    show_detected: AtomicBool,
    constant_tracking: AtomicBool,
    aim_key_held: AtomicBool,
}

/// 某一时刻的开关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToggleState {
    pub aim_assist: bool,
    pub show_detected: bool,
    pub constant_tracking: bool,
    pub aim_key_held: bool,
}

impl ToggleState {
    /// 是否需要运行检测
    pub fn should_process(&self) -> bool {
        self.aim_assist || self.show_detected
    }

    /// 是否需要计算目标
    pub fn should_predict(&self) -> bool {
        self.show_detected || self.constant_tracking || self.aim_key_held
    }

    /// 是否要移动指针
    pub fn aim_active(&self) -> bool {
        self.aim_assist && (self.constant_tracking || self.aim_key_held)
    }
}

impl Toggles {
    pub fn new(state: ToggleState) -> Self {
        let t = Self::default();
        t.set_aim_assist(state.aim_assist);
        t.set_show_detected(state.show_detected);
        t.set_constant_tracking(state.constant_tracking);
        t.set_aim_key_held(state.aim_key_held);
        t
    }

    pub fn snapshot(&self) -> ToggleState {
        ToggleState {
            aim_assist: self.aim_assist.load(Ordering::Relaxed),
            show_detected: self.show_detected.load(Ordering::Relaxed),
            constant_tracking: self.constant_tracking.load(Ordering::Relaxed),
            aim_key_held: self.aim_key_held.load(Ordering::Relaxed),
        }
    }

    pub fn set_aim_assist(&self, on: bool) {
        self.aim_assist.store(on, Ordering::Relaxed);
    }

    pub fn set_show_detected(&self, on: bool) {
        self.show_detected.store(on, Ordering::Relaxed);
    }

    pub fn set_constant_tracking(&self, on: bool) {
        self.constant_tracking.store(on, Ordering::Relaxed);
    }

    /// 由按键绑定协作方调用
    pub fn set_aim_key_held(&self, held: bool) {
        self.aim_key_held.store(held, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gating() {
        let idle = ToggleState::default();
        assert!(!idle.should_process());

        let overlay_only = ToggleState {
            show_detected: true,
            ..Default::default()
        };
        assert!(overlay_only.should_process());
        assert!(overlay_only.should_predict());
        assert!(!overlay_only.aim_active());

        let armed = ToggleState {
            aim_assist: true,
            ..Default::default()
        };
        assert!(armed.should_process());
        assert!(!armed.should_predict());

        let held = ToggleState {
            aim_assist: true,
            aim_key_held: true,
            ..Default::default()
        };
        assert!(held.should_predict());
        assert!(held.aim_active());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let state = ToggleState {
            aim_assist: true,
            constant_tracking: true,
            ..Default::default()
        };
        let t = Toggles::new(state);
        assert_eq!(t.snapshot(), state);
        t.set_aim_key_held(true);
        assert!(t.snapshot().aim_key_held);
    }
}
