/// 仿射变换工具模块
/// 负责 传感器帧 / 模型输入裁剪图 / 显示画布 三个坐标系之间的映射,
/// 以及类似 cv2::warpAffine 的图像重采样
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::detection::types::RectF;
use crate::error::{Error, Result};

/// 仿射变换矩阵 (2x3)
/// | a11 a12 b1 |
/// | a21 a22 b2 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a11: f32,
    pub a12: f32,
    pub b1: f32,
    pub a21: f32,
    pub a22: f32,
    pub b2: f32,
}

impl AffineMatrix {
    /// 创建单位仿射矩阵
    pub fn identity() -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: 1.0,
            b2: 0.0,
        }
    }

    /// 应用仿射变换到点 (x, y)
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let new_x = self.a11 * x + self.a12 * y + self.b1;
        let new_y = self.a21 * x + self.a22 * y + self.b2;
        (new_x, new_y)
    }

    /// 计算逆矩阵 (用于反向映射)
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a11 * self.a22 - self.a12 * self.a21;
        if det.abs() < 1e-10 || !det.is_finite() {
            return None; // 矩阵不可逆
        }

        let inv_det = 1.0 / det;
        Some(Self {
            a11: self.a22 * inv_det,
            a12: -self.a12 * inv_det,
            b1: (self.a12 * self.b2 - self.a22 * self.b1) * inv_det,
            a21: -self.a21 * inv_det,
            a22: self.a11 * inv_det,
            b2: (self.a21 * self.b1 - self.a11 * self.b2) * inv_det,
        })
    }

    /// 逆矩阵, 不可逆时返回 DegenerateTransform 错误
    pub fn try_inverse(&self) -> Result<Self> {
        self.inverse()
            .ok_or_else(|| Error::DegenerateTransform(format!("矩阵不可逆: {:?}", self)))
    }

    /// 创建平移矩阵
    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            b1: dx,
            a21: 0.0,
            a22: 1.0,
            b2: dy,
        }
    }

    /// 创建缩放矩阵
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a11: sx,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: sy,
            b2: 0.0,
        }
    }

    /// 创建旋转矩阵 (角度制, 图像坐标系y轴向下, 正角度为顺时针)
    ///
    /// 90的整数倍使用精确的 sin/cos, 避免 cos(90°) ≈ -4e-8 这类误差
    pub fn rotation(angle_degrees: f32) -> Self {
        let quarter = angle_degrees / 90.0;
        let (sin_a, cos_a) = if quarter.fract() == 0.0 {
            match (quarter as i64).rem_euclid(4) {
                0 => (0.0, 1.0),
                1 => (1.0, 0.0),
                2 => (0.0, -1.0),
                _ => (-1.0, 0.0),
            }
        } else {
            angle_degrees.to_radians().sin_cos()
        };
        Self {
            a11: cos_a,
            a12: -sin_a,
            b1: 0.0,
            a21: sin_a,
            a22: cos_a,
            b2: 0.0,
        }
    }

    /// 矩阵组合 (self * other), 先应用 other 再应用 self
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            a11: self.a11 * other.a11 + self.a12 * other.a21,
            a12: self.a11 * other.a12 + self.a12 * other.a22,
            b1: self.a11 * other.b1 + self.a12 * other.b2 + self.b1,
            a21: self.a21 * other.a11 + self.a22 * other.a21,
            a22: self.a21 * other.a12 + self.a22 * other.a22,
            b2: self.a21 * other.b1 + self.a22 * other.b2 + self.b2,
        }
    }

    /// 映射矩形: 变换四个角点后取轴对齐包围盒 (旋转时宽高会交换)
    pub fn map_rect(&self, rect: &RectF) -> RectF {
        let corners = rect.corners().map(|(x, y)| self.transform_point(x, y));
        RectF::bounding(&corners)
    }
}

/// 构建两个坐标系之间的变换矩阵
///
/// 组合顺序: 源图中心平移到原点 → 旋转 → 缩放到目标尺寸 → 平移到目标中心。
/// 旋转为 90/270 度时, 源图宽高互换后再计算缩放比例。
/// `maintain_aspect` 为 true 时 X/Y 使用相同比例 (取两轴较小值, 居中)。
///
/// # 参数
/// - `src_w`, `src_h`: 源坐标系尺寸
/// - `dst_w`, `dst_h`: 目标坐标系尺寸
/// - `rotation_degrees`: 旋转角度 (实际只使用 0/90/180/270)
/// - `maintain_aspect`: 是否保持宽高比
pub fn build_transform(
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    rotation_degrees: i32,
    maintain_aspect: bool,
) -> Result<AffineMatrix> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return Err(Error::DegenerateTransform(format!(
            "尺寸必须为正: {}x{} → {}x{}",
            src_w, src_h, dst_w, dst_h
        )));
    }

    let (src_w, src_h, dst_w, dst_h) = (src_w as f32, src_h as f32, dst_w as f32, dst_h as f32);

    let to_origin = AffineMatrix::translation(-src_w / 2.0, -src_h / 2.0);
    let rotate = AffineMatrix::rotation(rotation_degrees as f32);

    // 旋转奇数个90度时宽高互换
    let transpose = (rotation_degrees.unsigned_abs() + 90) % 180 == 0;
    let (in_w, in_h) = if transpose {
        (src_h, src_w)
    } else {
        (src_w, src_h)
    };

    let scale_x = dst_w / in_w;
    let scale_y = dst_h / in_h;
    let (scale_x, scale_y) = if maintain_aspect {
        let s = scale_x.min(scale_y);
        (s, s)
    } else {
        (scale_x, scale_y)
    };

    let to_dst = AffineMatrix::translation(dst_w / 2.0, dst_h / 2.0);

    Ok(to_dst.compose(
        &AffineMatrix::scale(scale_x, scale_y).compose(&rotate.compose(&to_origin)),
    ))
}

/// 插值方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    #[default]
    Nearest, // 最近邻插值
    Bilinear, // 双线性插值
}

/// 仿射变换函数 (RGBA图像)
///
/// 对目标图像每个像素中心做逆映射, 在源图像中采样。
/// 映射到源图像之外的像素填充为全透明黑色。
///
/// # 参数
/// - `src`: 源图像
/// - `matrix`: 源 → 目标 的仿射变换矩阵
/// - `dst_size`: 目标图像尺寸 (width, height)
/// - `interpolation`: 插值方法
pub fn warp_affine_rgba(
    src: &RgbaImage,
    matrix: &AffineMatrix,
    dst_size: (u32, u32),
    interpolation: InterpolationMethod,
) -> Result<RgbaImage> {
    let (dst_width, dst_height) = dst_size;
    let mut dst = RgbaImage::new(dst_width, dst_height);

    // 使用逆变换进行反向映射
    let inv_matrix = matrix.try_inverse()?;

    for dst_y in 0..dst_height {
        for dst_x in 0..dst_width {
            let (src_x, src_y) =
                inv_matrix.transform_point(dst_x as f32 + 0.5, dst_y as f32 + 0.5);

            let pixel = match interpolation {
                InterpolationMethod::Nearest => get_pixel_nearest(src, src_x, src_y),
                InterpolationMethod::Bilinear => get_pixel_bilinear(src, src_x - 0.5, src_y - 0.5),
            };

            dst.put_pixel(dst_x, dst_y, pixel);
        }
    }

    Ok(dst)
}

/// 最近邻插值 (x, y 为连续坐标, 像素 i 覆盖 [i, i+1))
fn get_pixel_nearest(src: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    get_border_pixel(src, x.floor() as i64, y.floor() as i64)
}

/// 双线性插值 (x, y 为像素中心坐标)
fn get_pixel_bilinear(src: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_border_pixel(src, x0, y0);
    let p01 = get_border_pixel(src, x0, y1);
    let p10 = get_border_pixel(src, x1, y0);
    let p11 = get_border_pixel(src, x1, y1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        let result = v0 * (1.0 - fy) + v1 * fy;
        out[c] = result.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// 边界处理: 越界返回透明黑色
fn get_border_pixel(src: &RgbaImage, x: i64, y: i64) -> Rgba<u8> {
    if x >= 0 && y >= 0 && x < src.width() as i64 && y < src.height() as i64 {
        *src.get_pixel(x as u32, y as u32)
    } else {
        Rgba([0, 0, 0, 0])
    }
}
