//! 检测器 (Detector)
//! 职责: 裁剪图 → 外部检测模型 → 置信度过滤 → 映射回帧坐标系

use anyhow::Result;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::types::{RawDetection, Recognition, RectF};
use crate::utils::affine_transform::AffineMatrix;

/// 统一的目标检测接口
///
/// 输入固定尺寸的模型裁剪图, 输出无序的原始检测结果 (裁剪图坐标系)。
/// 任何满足此约定的推理引擎都可以替换使用。
pub trait Detector: Send {
    /// 执行一次检测 (可能耗时数十到数百毫秒)
    fn recognize_image(&mut self, image: &RgbaImage) -> Result<Vec<RawDetection>>;

    /// 统计信息 (多行, 用于调试叠加层)
    fn stat_string(&self) -> String {
        String::new()
    }

    /// 开关调试统计日志
    fn enable_stat_logging(&mut self, _enabled: bool) {}
}

/// 置信度过滤 + 坐标映射
///
/// 丢弃无位置或置信度低于阈值的检测, 其余检测框经 `crop_to_frame` 映射到帧坐标系。
/// 输出顺序与输入一致。
pub fn filter_and_map(
    raw: Vec<RawDetection>,
    crop_to_frame: &AffineMatrix,
    confidence_threshold: f32,
) -> Vec<Recognition> {
    raw.into_iter()
        .filter(|det| det.confidence >= confidence_threshold)
        .filter_map(|det| {
            let location = det.location?;
            Some(Recognition {
                id: det.id,
                title: det.title,
                confidence: det.confidence,
                location: crop_to_frame.map_rect(&location),
            })
        })
        .collect()
}

/// 在裁剪图副本上描出通过阈值的原始检测框 (调试叠加层使用)
pub fn outline_accepted(
    crop: &RgbaImage,
    raw: &[RawDetection],
    confidence_threshold: f32,
    stroke_width: f32,
) -> RgbaImage {
    let mut copy = crop.clone();
    let red = Rgba([255, 0, 0, 255]);
    let stroke = stroke_width.round().max(1.0) as i32;

    for det in raw.iter().filter(|d| d.confidence >= confidence_threshold) {
        let Some(location) = det.location else {
            continue;
        };
        for inset in 0..stroke {
            if let Some(rect) = outline_rect(&location, inset) {
                draw_hollow_rect_mut(&mut copy, rect, red);
            }
        }
    }
    copy
}

fn outline_rect(location: &RectF, inset: i32) -> Option<Rect> {
    let left = location.left as i32 + inset;
    let top = location.top as i32 + inset;
    let width = location.width() as i32 - 2 * inset;
    let height = location.height() as i32 - 2 * inset;
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(Rect::at(left, top).of_size(width as u32, height as u32))
}
