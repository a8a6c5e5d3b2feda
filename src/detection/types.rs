/// 识别流水线数据结构定义
/// Data structures for the recognition pipeline
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 检测模型输入尺寸
pub const INF_SIZE: u32 = 300;

/// 检测器分配的目标ID (同一目标在相邻帧中由检测器复用)
pub type TrackId = u32;

// ========== 数据结构 ==========

/// 浮点矩形 (左上角 + 右下角)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// 四个角点 (左上, 右上, 右下, 左下)
    pub fn corners(&self) -> [(f32, f32); 4] {
        [
            (self.left, self.top),
            (self.right, self.top),
            (self.right, self.bottom),
            (self.left, self.bottom),
        ]
    }

    /// 点集的轴对齐包围盒
    pub fn bounding(points: &[(f32, f32)]) -> Self {
        let mut rect = Self::new(f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for &(x, y) in points {
            rect.left = rect.left.min(x);
            rect.top = rect.top.min(y);
            rect.right = rect.right.max(x);
            rect.bottom = rect.bottom.max(y);
        }
        rect
    }
}

/// 检测器原始输出 (裁剪图坐标系, 位置可能缺失)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub id: TrackId,
    #[serde(default)]
    pub title: String,
    pub confidence: f32,
    #[serde(default)]
    pub location: Option<RectF>,
}

/// 识别结果 (经过置信度过滤, location 随坐标系转换被原地改写)
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub id: TrackId,
    pub title: String,
    pub confidence: f32,
    pub location: RectF,
}

impl std::fmt::Display for Recognition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({:.1}%) [{:.1}, {:.1}, {:.1}, {:.1}]",
            self.id,
            self.title,
            self.confidence * 100.0,
            self.location.left,
            self.location.top,
            self.location.right,
            self.location.bottom
        )
    }
}
