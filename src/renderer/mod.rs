//! 叠加层渲染 (Overlay Renderer)
//!
//! 只计算"画什么": 把识别结果映射到显示画布坐标系并生成绘制指令,
//! 实际光栅化由 [`canvas::Canvas`] 或外部绘制层完成。

pub mod canvas;

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::detection::types::{Recognition, RectF};
use crate::error::Result;
use crate::utils::affine_transform::{build_transform, AffineMatrix};

/// 检测框调色板 (按列表位置循环取色, 与目标ID无关)
pub const PALETTE: [Rgba<u8>; 15] = [
    Rgba([0, 0, 255, 255]),     // 蓝
    Rgba([255, 0, 0, 255]),     // 红
    Rgba([0, 255, 0, 255]),     // 绿
    Rgba([255, 255, 0, 255]),   // 黄
    Rgba([0, 255, 255, 255]),   // 青
    Rgba([255, 0, 255, 255]),   // 品红
    Rgba([255, 255, 255, 255]), // 白
    Rgba([0x55, 0xFF, 0x55, 255]),
    Rgba([0xFF, 0xA5, 0x00, 255]),
    Rgba([0xFF, 0x88, 0x88, 255]),
    Rgba([0xAA, 0xAA, 0xFF, 255]),
    Rgba([0xFF, 0xFF, 0xAA, 255]),
    Rgba([0x55, 0xAA, 0xAA, 255]),
    Rgba([0xAA, 0x33, 0xAA, 255]),
    Rgba([0x0D, 0x00, 0x68, 255]),
];

pub const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 调试叠加层背景 (半透明黑)
pub const DEBUG_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 100]);

/// 绘制指令 (显示画布坐标系)
#[derive(Clone, Debug)]
pub enum DrawCommand {
    /// 圆角矩形描边
    RoundRect {
        rect: RectF,
        corner_radius: f32,
        color: Rgba<u8>,
        stroke_width: f32,
    },
    /// 带描边的文字, `y` 为基线位置
    Text {
        x: f32,
        y: f32,
        text: String,
        color: Rgba<u8>,
    },
    /// 整个画布叠加一层颜色 (按alpha混合)
    Fill { color: Rgba<u8> },
    /// 按变换矩阵绘制图像
    Image {
        image: Arc<RgbaImage>,
        transform: AffineMatrix,
    },
}

/// 帧 → 显示画布 变换
///
/// 旋转后的帧以统一缩放比例放入画布 (取两轴比例较小值), 贴靠画布左上角
pub fn display_transform(
    frame_width: u32,
    frame_height: u32,
    canvas_width: u32,
    canvas_height: u32,
    rotation: i32,
) -> Result<AffineMatrix> {
    let transpose = (rotation.unsigned_abs() + 90) % 180 == 0;
    let (rotated_w, rotated_h) = if transpose {
        (frame_height, frame_width)
    } else {
        (frame_width, frame_height)
    };

    let multiplier = (canvas_width as f32 / rotated_w.max(1) as f32)
        .min(canvas_height as f32 / rotated_h.max(1) as f32);

    build_transform(
        frame_width,
        frame_height,
        (multiplier * rotated_w as f32) as u32,
        (multiplier * rotated_h as f32) as u32,
        rotation,
        false,
    )
}

/// 生成识别结果的绘制指令
///
/// 每个识别结果: 一个圆角矩形 (圆角 = 短边的1/8) + 一个标签
pub fn render_overlay(
    recognitions: &[Recognition],
    frame_to_display: &AffineMatrix,
    stroke_width: f32,
) -> Vec<DrawCommand> {
    let mut commands = Vec::with_capacity(recognitions.len() * 2);

    for (i, recognition) in recognitions.iter().enumerate() {
        let location = frame_to_display.map_rect(&recognition.location);
        let color = PALETTE[i % PALETTE.len()];
        let corner_radius = location.width().min(location.height()) / 8.0;

        commands.push(DrawCommand::RoundRect {
            rect: location,
            corner_radius,
            color,
            stroke_width,
        });
        commands.push(DrawCommand::Text {
            x: location.left + corner_radius,
            y: location.bottom,
            text: label(recognition),
            color: LABEL_COLOR,
        });
    }

    commands
}

/// 标签文本: "标题 置信度", 无标题时只显示置信度
pub fn label(recognition: &Recognition) -> String {
    if recognition.title.is_empty() {
        format!("{:.2}", recognition.confidence)
    } else {
        format!("{} {:.2}", recognition.title, recognition.confidence)
    }
}

/// 调试叠加层所需的信息
#[derive(Clone, Debug, Default)]
pub struct DebugInfo {
    /// 检测器统计信息 (多行)
    pub stat_string: String,
    pub frame_size: (u32, u32),
    /// 带检测框的模型输入图副本
    pub crop: Option<Arc<RgbaImage>>,
    pub rotation: i32,
    pub last_processing_ms: u64,
}

/// 生成调试叠加层绘制指令
///
/// 背景压暗, 右下角放大2倍显示模型输入图, 左下角逐行显示统计信息
pub fn render_debug(
    info: &DebugInfo,
    canvas_width: u32,
    canvas_height: u32,
    line_height: f32,
) -> Vec<DrawCommand> {
    let Some(crop) = info.crop.as_ref() else {
        return Vec::new();
    };

    let mut commands = vec![DrawCommand::Fill {
        color: DEBUG_BACKGROUND,
    }];

    let scale = 2.0;
    let transform = AffineMatrix::translation(
        canvas_width as f32 - crop.width() as f32 * scale,
        canvas_height as f32 - crop.height() as f32 * scale,
    )
    .compose(&AffineMatrix::scale(scale, scale));
    commands.push(DrawCommand::Image {
        image: Arc::clone(crop),
        transform,
    });

    // 保留中间的空行, 只去掉末尾的空行
    let mut lines: Vec<String> = info.stat_string.split('\n').map(str::to_string).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.push(String::new());
    lines.push(format!("Frame: {}x{}", info.frame_size.0, info.frame_size.1));
    lines.push(format!("Crop: {}x{}", crop.width(), crop.height()));
    lines.push(format!("View: {}x{}", canvas_width, canvas_height));
    lines.push(format!("Rotation: {}", info.rotation));
    lines.push(format!("Inference time: {}ms", info.last_processing_ms));

    // 最后一行基线位于 (10, canvas_height - 10), 其余各行依次向上
    let base_y = canvas_height as f32 - 10.0;
    let count = lines.len();
    for (i, line) in lines.into_iter().enumerate() {
        commands.push(DrawCommand::Text {
            x: 10.0,
            y: base_y - line_height * (count - i - 1) as f32,
            text: line,
            color: LABEL_COLOR,
        });
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rec(title: &str, confidence: f32, rect: RectF) -> Recognition {
        Recognition {
            id: 1,
            title: title.to_string(),
            confidence,
            location: rect,
        }
    }

    #[test]
    fn test_label_format() {
        let rect = RectF::default();
        assert_eq!(label(&rec("plate", 0.9234, rect)), "plate 0.92");
        assert_eq!(label(&rec("", 0.9, rect)), "0.90");
    }

    #[test]
    fn test_overlay_commands_and_corner_radius() {
        let recs = vec![rec("plate", 0.9, RectF::new(10.0, 20.0, 90.0, 60.0))];
        let commands = render_overlay(&recs, &AffineMatrix::identity(), 8.0);
        assert_eq!(commands.len(), 2);

        match &commands[0] {
            DrawCommand::RoundRect {
                rect,
                corner_radius,
                color,
                stroke_width,
            } => {
                assert_eq!(*rect, RectF::new(10.0, 20.0, 90.0, 60.0));
                assert_eq!(*corner_radius, 5.0);
                assert_eq!(*color, PALETTE[0]);
                assert_eq!(*stroke_width, 8.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
        match &commands[1] {
            DrawCommand::Text { x, y, text, .. } => {
                assert_eq!(*x, 15.0);
                assert_eq!(*y, 60.0);
                assert_eq!(text, "plate 0.90");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_palette_cycles_by_position() {
        let recs: Vec<Recognition> = (0..17)
            .map(|i| rec("", 0.9, RectF::new(i as f32, 0.0, i as f32 + 8.0, 8.0)))
            .collect();
        let colors: Vec<Rgba<u8>> = render_overlay(&recs, &AffineMatrix::identity(), 1.0)
            .into_iter()
            .filter_map(|c| match c {
                DrawCommand::RoundRect { color, .. } => Some(color),
                _ => None,
            })
            .collect();
        assert_eq!(colors.len(), 17);
        assert_eq!(colors[15], PALETTE[0]);
        assert_eq!(colors[16], PALETTE[1]);
        assert_eq!(colors[14], PALETTE[14]);
    }

    #[test]
    fn test_display_transform_portrait_canvas() {
        // 640x480 传感器旋转90度显示在 1080x1920 竖屏上
        let m = display_transform(640, 480, 1080, 1920, 90).unwrap();
        let mapped = m.map_rect(&RectF::new(0.0, 0.0, 640.0, 480.0));
        assert_abs_diff_eq!(mapped.left, 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(mapped.top, 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(mapped.width(), 1080.0, epsilon = 1e-2);
        assert_abs_diff_eq!(mapped.height(), 1440.0, epsilon = 1e-2);
    }

    #[test]
    fn test_display_transform_without_rotation() {
        let m = display_transform(640, 480, 1280, 1280, 0).unwrap();
        let mapped = m.map_rect(&RectF::new(0.0, 0.0, 640.0, 480.0));
        assert_abs_diff_eq!(mapped.width(), 1280.0, epsilon = 1e-2);
        assert_abs_diff_eq!(mapped.height(), 960.0, epsilon = 1e-2);
    }

    #[test]
    fn test_debug_keeps_blank_stat_lines() {
        let info = DebugInfo {
            stat_string: "Detector\n\nCalls: 3\n\n".to_string(),
            frame_size: (640, 480),
            crop: Some(Arc::new(RgbaImage::new(30, 30))),
            rotation: 0,
            last_processing_ms: 5,
        };
        let texts: Vec<String> = render_debug(&info, 200, 100, 10.0)
            .into_iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 9);
        assert_eq!(texts[0], "Detector");
        assert_eq!(texts[1], "");
        assert_eq!(texts[2], "Calls: 3");
        assert_eq!(texts[3], "");
        assert_eq!(texts[4], "Frame: 640x480");
    }

    #[test]
    fn test_debug_requires_crop() {
        assert!(render_debug(&DebugInfo::default(), 100, 100, 10.0).is_empty());
    }

    #[test]
    fn test_debug_lines_stack_upwards() {
        let info = DebugInfo {
            stat_string: "Calls: 3\nLast: 1ms".to_string(),
            frame_size: (640, 480),
            crop: Some(Arc::new(RgbaImage::new(30, 30))),
            rotation: 90,
            last_processing_ms: 42,
        };
        let commands = render_debug(&info, 200, 100, 10.0);

        assert!(matches!(commands[0], DrawCommand::Fill { .. }));
        match &commands[1] {
            DrawCommand::Image { transform, .. } => {
                let (x, y) = transform.transform_point(0.0, 0.0);
                assert_eq!((x, y), (140.0, 40.0));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let texts: Vec<(f32, String)> = commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { y, text, .. } => Some((*y, text.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 8);
        assert_eq!(texts[0].1, "Calls: 3");
        assert_eq!(texts[7], (90.0, "Inference time: 42ms".to_string()));
        assert_eq!(texts[6], (80.0, "Rotation: 90".to_string()));
        assert_eq!(texts[3].1, "Frame: 640x480");
    }
}
