// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod analysis; // 二次识别 (文字)
pub mod config; // 流水线配置参数
pub mod detection; // 检测结果过滤与跟踪
pub mod error;
pub mod input; // 帧输入与裁剪
pub mod pipeline; // 单任务处理流水线
pub mod renderer; // 叠加层渲染
pub mod utils;

pub use crate::analysis::{NullRecognizer, RecognizedText, SecondaryAnalyzer, TextRecognizer};
pub use crate::config::PipelineConfig;
pub use crate::detection::{Detector, Recognition, RectF, ScriptedDetector};
pub use crate::error::{Error, Result};
pub use crate::input::{Frame, ImageSequence};
pub use crate::pipeline::{FrameCompletion, Pipeline, Snapshot, Submission};
pub use crate::utils::affine_transform::{AffineMatrix, InterpolationMethod};

/// 生成时间字符串 (北京时间), 用于输出文件命名
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = match chrono::FixedOffset::east_opt(8 * 60 * 60) {
        Some(offset) => chrono::Utc::now().with_timezone(&offset),
        None => chrono::Utc::now().fixed_offset(),
    };
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
