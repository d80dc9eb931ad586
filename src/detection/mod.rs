/// 检测系统 (Detection System)
///
/// 检测线程内的逐帧处理链
/// - Extractor: 输出张量 → 候选
/// - Selector:  候选 → 离中心最近的一个
/// - Sticky:    跨帧锁定 / 外推 / 防抖
pub mod extractor;
pub mod selector;
pub mod sticky;
pub mod types;

pub use extractor::{CandidateExtractor, ExtractorSettings, TargetClass};
pub use selector::TargetSelector;
pub use sticky::{StickyAimTracker, StickySettings, TrackOutcome, TrackState};
pub use types::{ClassMap, Point2, Prediction, Rect, ScreenRect};
