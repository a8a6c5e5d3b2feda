//! 画布 - 将绘制指令光栅化到 RGBA 图像上 (imageproc + ab_glyph)

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};

use super::DrawCommand;
use crate::detection::types::RectF;
use crate::utils::affine_transform::{warp_affine_rgba, AffineMatrix, InterpolationMethod};

/// 文字描边颜色
const TEXT_BORDER: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Clone)]
pub struct Canvas {
    image: RgbaImage,
    font: Option<FontArc>,
    text_size: f32,
}

impl Canvas {
    /// 创建不透明黑色画布
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            font: None,
            text_size: 18.0,
        }
    }

    /// 设置字体 (未设置字体时跳过文字指令)
    pub fn with_font(mut self, font: FontArc, text_size: f32) -> Self {
        self.font = Some(font);
        self.text_size = text_size;
        self
    }

    /// 加载 TTF/OTF 字体文件
    pub fn load_font(path: &Path) -> Result<FontArc> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("无法读取字体文件 {}", path.display()))?;
        FontArc::try_from_vec(bytes).with_context(|| format!("字体解析失败 {}", path.display()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// 按变换矩阵把图像合成到画布上
    pub fn draw_image(
        &mut self,
        image: &RgbaImage,
        transform: &AffineMatrix,
        interpolation: InterpolationMethod,
    ) -> crate::error::Result<()> {
        let warped = warp_affine_rgba(image, transform, self.image.dimensions(), interpolation)?;
        for (dst, src) in self.image.pixels_mut().zip(warped.pixels()) {
            blend(dst, *src);
        }
        Ok(())
    }

    /// 执行绘制指令
    pub fn execute(&mut self, commands: &[DrawCommand]) -> crate::error::Result<()> {
        for command in commands {
            match command {
                DrawCommand::RoundRect {
                    rect,
                    corner_radius,
                    color,
                    stroke_width,
                } => self.stroke_round_rect(rect, *corner_radius, *color, *stroke_width),
                DrawCommand::Text { x, y, text, color } => {
                    self.draw_bordered_text(*x, *y, text, *color)
                }
                DrawCommand::Fill { color } => {
                    for pixel in self.image.pixels_mut() {
                        blend(pixel, *color);
                    }
                }
                DrawCommand::Image { image, transform } => {
                    self.draw_image(image, transform, InterpolationMethod::Nearest)?
                }
            }
        }
        Ok(())
    }

    /// 圆角矩形描边: 沿路径每隔约1像素盖一个直径为线宽的圆点
    ///
    /// 路径点只在画布 (外扩线宽) 范围内生成, 画布外的巨大或非有限矩形不会产生大量点
    fn stroke_round_rect(
        &mut self,
        rect: &RectF,
        corner_radius: f32,
        color: Rgba<u8>,
        stroke_width: f32,
    ) {
        let values = [rect.left, rect.top, rect.right, rect.bottom, corner_radius];
        if values.iter().any(|v| !v.is_finite()) {
            return;
        }

        let half = (stroke_width / 2.0).round() as i32;
        let margin = half as f32 + 1.0;
        let bounds = Bounds {
            min_x: -margin,
            min_y: -margin,
            max_x: self.image.width() as f32 + margin,
            max_y: self.image.height() as f32 + margin,
        };
        if rect.right < bounds.min_x
            || rect.left > bounds.max_x
            || rect.bottom < bounds.min_y
            || rect.top > bounds.max_y
        {
            return;
        }

        let r = corner_radius
            .min(rect.width() / 2.0)
            .min(rect.height() / 2.0)
            .max(0.0);

        let mut points = Vec::new();
        push_segment(&mut points, &bounds, (rect.left + r, rect.top), (rect.right - r, rect.top));
        push_segment(&mut points, &bounds, (rect.right, rect.top + r), (rect.right, rect.bottom - r));
        push_segment(&mut points, &bounds, (rect.right - r, rect.bottom), (rect.left + r, rect.bottom));
        push_segment(&mut points, &bounds, (rect.left, rect.bottom - r), (rect.left, rect.top + r));

        if r > 0.0 {
            push_arc(&mut points, &bounds, (rect.right - r, rect.top + r), r, (1.0, -1.0));
            push_arc(&mut points, &bounds, (rect.right - r, rect.bottom - r), r, (1.0, 1.0));
            push_arc(&mut points, &bounds, (rect.left + r, rect.bottom - r), r, (-1.0, 1.0));
            push_arc(&mut points, &bounds, (rect.left + r, rect.top + r), r, (-1.0, -1.0));
        }

        for (x, y) in points {
            let center = (x.round() as i32, y.round() as i32);
            if half > 0 {
                draw_filled_circle_mut(&mut self.image, center, half, color);
            } else if center.0 >= 0
                && center.1 >= 0
                && (center.0 as u32) < self.image.width()
                && (center.1 as u32) < self.image.height()
            {
                self.image.put_pixel(center.0 as u32, center.1 as u32, color);
            }
        }
    }

    fn draw_bordered_text(&mut self, x: f32, baseline: f32, text: &str, color: Rgba<u8>) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let scale = PxScale::from(self.text_size);
        let x = x.round() as i32;
        let y = (baseline - self.text_size).round() as i32;

        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            draw_text_mut(&mut self.image, TEXT_BORDER, x + dx, y + dy, scale, font, text);
        }
        draw_text_mut(&mut self.image, color, x, y, scale, font, text);
    }
}

/// 描边路径点的生成范围 (画布外扩线宽)
struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    fn clamp(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x.clamp(self.min_x, self.max_x), y.clamp(self.min_y, self.max_y))
    }

    fn contains(&self, (x, y): (f32, f32)) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// 水平或竖直线段, 先裁剪到范围内再按1像素步长取点
fn push_segment(points: &mut Vec<(f32, f32)>, bounds: &Bounds, from: (f32, f32), to: (f32, f32)) {
    let horizontal_outside = from.1 == to.1 && (from.1 < bounds.min_y || from.1 > bounds.max_y);
    let vertical_outside = from.0 == to.0 && (from.0 < bounds.min_x || from.0 > bounds.max_x);
    if horizontal_outside || vertical_outside {
        return;
    }

    let (from, to) = (bounds.clamp(from), bounds.clamp(to));
    let length = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
    let steps = length.ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        points.push((from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t));
    }
}

/// 四分之一圆弧, `quadrant` 为圆弧所在象限的方向 (±1, ±1)
///
/// 分别沿 x 和 y 逐像素求圆上的点, 取值区间先与范围求交,
/// 点数只与画布尺寸有关, 与半径无关
fn push_arc(
    points: &mut Vec<(f32, f32)>,
    bounds: &Bounds,
    center: (f32, f32),
    radius: f32,
    quadrant: (f32, f32),
) {
    let (cx, cy, r) = (center.0 as f64, center.1 as f64, radius as f64);
    let (sx, sy) = (quadrant.0 as f64, quadrant.1 as f64);

    let mut sample = |lo: f64, hi: f64, min: f32, max: f32, along_x: bool| {
        let lo = lo.max(min as f64);
        let hi = hi.min(max as f64);
        if hi < lo {
            return;
        }
        let steps = (hi - lo).ceil() as usize;
        for i in 0..=steps {
            let v = (lo + i as f64).min(hi);
            let point = if along_x {
                let dx = v - cx;
                (v, cy + sy * (r * r - dx * dx).max(0.0).sqrt())
            } else {
                let dy = v - cy;
                (cx + sx * (r * r - dy * dy).max(0.0).sqrt(), v)
            };
            let point = (point.0 as f32, point.1 as f32);
            if bounds.contains(point) {
                points.push(point);
            }
        }
    };

    let (x_lo, x_hi) = (cx.min(cx + sx * r), cx.max(cx + sx * r));
    let (y_lo, y_hi) = (cy.min(cy + sy * r), cy.max(cy + sy * r));
    sample(x_lo, x_hi, bounds.min_x, bounds.max_x, true);
    sample(y_lo, y_hi, bounds.min_y, bounds.max_y, false);
}

/// Alpha 混合 (src over dst)
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let alpha = src[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    for c in 0..3 {
        dst[c] = (src[c] as f32 * alpha + dst[c] as f32 * (1.0 - alpha)).round() as u8;
    }
    dst[3] = dst[3].max(src[3]);
}
