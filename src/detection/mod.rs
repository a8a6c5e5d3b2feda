/// 检测系统 (Detection System)
///
/// 在处理线程中执行, 每次只处理一帧
/// - Detector:  外部检测模型接口 + 置信度过滤/坐标映射
/// - Replay:    JSON脚本检测器
/// - Tracker:   单帧有效的目标跟踪表
pub mod detector;
pub mod replay;
pub mod tracker;
pub mod types;

pub use detector::{filter_and_map, Detector};
pub use replay::ScriptedDetector;
pub use tracker::{AnalysisRequest, TrackEntry, TrackTable};
pub use types::{RawDetection, Recognition, RectF, TrackId};
