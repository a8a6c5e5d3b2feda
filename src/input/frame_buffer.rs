//! 帧缓冲区 - 接收传感器原始帧并生成模型输入裁剪图

use std::sync::Arc;

use image::RgbaImage;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::utils::affine_transform::{
    build_transform, warp_affine_rgba, AffineMatrix, InterpolationMethod,
};

/// 帧源提供的一帧数据 (RGBA8, 行优先)
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 传感器相对显示方向的旋转角度 (0/90/180/270)
    pub rotation: i32,
}

/// 持久帧缓冲区
///
/// 首帧确定尺寸, 之后每帧原地覆盖, 不保留历史帧。
/// 图像以 `Arc` 共享给处理线程; 处理线程仍持有上一帧时写入会先复制一份。
#[derive(Default)]
pub struct FrameBuffer {
    image: Option<Arc<RgbaImage>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一帧像素
    pub fn ingest(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<()> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::InvalidBuffer {
                expected,
                actual: pixels.len(),
            });
        }

        match self.image.as_mut() {
            Some(image) => {
                if image.dimensions() != (width, height) {
                    return Err(Error::FrameSizeMismatch {
                        expected: image.dimensions(),
                        actual: (width, height),
                    });
                }
                Arc::make_mut(image).copy_from_slice(pixels);
            }
            None => {
                info!("📐 初始化帧缓冲区: {}x{}", width, height);
                let image = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or(
                    Error::InvalidBuffer {
                        expected,
                        actual: pixels.len(),
                    },
                )?;
                self.image = Some(Arc::new(image));
            }
        }
        Ok(())
    }

    /// 帧尺寸 (未接收帧时为 None)
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }

    /// 当前帧的共享引用
    pub fn snapshot(&self) -> Result<Arc<RgbaImage>> {
        self.image.clone().ok_or(Error::NoFrame)
    }

    /// 通过 帧→裁剪图 变换生成模型输入图像
    pub fn crop_to_model_input(
        &self,
        frame_to_crop: &AffineMatrix,
        size: u32,
        interpolation: InterpolationMethod,
    ) -> Result<RgbaImage> {
        let image = self.image.as_ref().ok_or(Error::NoFrame)?;
        warp_affine_rgba(image, frame_to_crop, (size, size), interpolation)
    }
}

/// 帧坐标系与裁剪图坐标系之间的变换对, 旋转角度变化时重建
#[derive(Debug, Clone)]
pub struct FrameGeometry {
    pub frame_width: u32,
    pub frame_height: u32,
    pub crop_size: u32,
    pub rotation: i32,
    pub maintain_aspect: bool,
    pub frame_to_crop: AffineMatrix,
    pub crop_to_frame: AffineMatrix,
}

impl FrameGeometry {
    pub fn new(
        frame_width: u32,
        frame_height: u32,
        crop_size: u32,
        rotation: i32,
        maintain_aspect: bool,
    ) -> Result<Self> {
        let frame_to_crop = build_transform(
            frame_width,
            frame_height,
            crop_size,
            crop_size,
            rotation,
            maintain_aspect,
        )?;
        let crop_to_frame = frame_to_crop.try_inverse()?;
        Ok(Self {
            frame_width,
            frame_height,
            crop_size,
            rotation,
            maintain_aspect,
            frame_to_crop,
            crop_to_frame,
        })
    }

    /// 帧尺寸或旋转角度变化时重建变换, 返回是否发生了重建
    pub fn update(&mut self, frame_width: u32, frame_height: u32, rotation: i32) -> Result<bool> {
        if (frame_width, frame_height, rotation)
            == (self.frame_width, self.frame_height, self.rotation)
        {
            return Ok(false);
        }
        debug!(
            "🔄 重建坐标变换: {}x{} 旋转 {}° → {}x{}",
            frame_width, frame_height, rotation, self.crop_size, self.crop_size
        );
        *self = Self::new(
            frame_width,
            frame_height,
            self.crop_size,
            rotation,
            self.maintain_aspect,
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, value: u8) -> Vec<u8> {
        vec![value; (width * height * 4) as usize]
    }

    #[test]
    fn test_ingest_allocates_then_overwrites() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.dimensions().is_none());

        buffer.ingest(&solid(4, 2, 10), 4, 2).unwrap();
        assert_eq!(buffer.dimensions(), Some((4, 2)));

        buffer.ingest(&solid(4, 2, 20), 4, 2).unwrap();
        let frame = buffer.snapshot().unwrap();
        assert_eq!(*frame.get_pixel(3, 1), Rgba([20, 20, 20, 20]));
    }

    #[test]
    fn test_ingest_rejects_size_change() {
        let mut buffer = FrameBuffer::new();
        buffer.ingest(&solid(4, 2, 0), 4, 2).unwrap();
        let err = buffer.ingest(&solid(2, 4, 0), 2, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameSizeMismatch {
                expected: (4, 2),
                actual: (2, 4)
            }
        ));
    }

    #[test]
    fn test_ingest_rejects_short_buffer() {
        let mut buffer = FrameBuffer::new();
        let err = buffer.ingest(&[0u8; 10], 4, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidBuffer {
                expected: 32,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_ingest_does_not_disturb_held_snapshot() {
        let mut buffer = FrameBuffer::new();
        buffer.ingest(&solid(2, 2, 1), 2, 2).unwrap();
        let held = buffer.snapshot().unwrap();
        buffer.ingest(&solid(2, 2, 2), 2, 2).unwrap();
        assert_eq!(held.get_pixel(0, 0)[0], 1);
        assert_eq!(buffer.snapshot().unwrap().get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_crop_requires_frame() {
        let buffer = FrameBuffer::new();
        let m = AffineMatrix::identity();
        assert!(matches!(
            buffer.crop_to_model_input(&m, 3, InterpolationMethod::Nearest),
            Err(Error::NoFrame)
        ));
    }

    #[test]
    fn test_crop_to_model_input_downscales() {
        // 左半红, 右半蓝
        let mut pixels = Vec::new();
        for _y in 0..4 {
            for x in 0..8 {
                if x < 4 {
                    pixels.extend_from_slice(&[255, 0, 0, 255]);
                } else {
                    pixels.extend_from_slice(&[0, 0, 255, 255]);
                }
            }
        }
        let mut buffer = FrameBuffer::new();
        buffer.ingest(&pixels, 8, 4).unwrap();

        let geometry = FrameGeometry::new(8, 4, 2, 0, false).unwrap();
        let crop = buffer
            .crop_to_model_input(&geometry.frame_to_crop, 2, InterpolationMethod::Nearest)
            .unwrap();
        assert_eq!(crop.dimensions(), (2, 2));
        assert_eq!(*crop.get_pixel(0, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*crop.get_pixel(1, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_geometry_rebuilds_on_rotation_change() {
        let mut geometry = FrameGeometry::new(640, 480, 300, 0, false).unwrap();
        assert!(!geometry.update(640, 480, 0).unwrap());
        assert!(geometry.update(640, 480, 90).unwrap());
        assert_eq!(geometry.rotation, 90);
        let inv = geometry.frame_to_crop.inverse().unwrap();
        assert_eq!(inv, geometry.crop_to_frame);
    }
}
