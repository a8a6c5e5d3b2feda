//! 图片序列帧源 - 按文件名顺序回放目录中的图片
//!
//! 所有图片必须与首帧尺寸一致 (与摄像头会话的约束相同)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use super::frame_buffer::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    rotation: i32,
}

impl ImageSequence {
    /// 扫描目录中的图片文件 (按文件名排序)
    pub fn open(dir: &Path, rotation: i32) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("无法读取帧目录 {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            warn!("⚠️  目录 {} 中没有图片", dir.display());
        } else {
            info!("🎞️  图片序列: {} 帧 ({})", paths.len(), dir.display());
        }

        Ok(Self {
            paths,
            next: 0,
            rotation,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Iterator for ImageSequence {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.next)?;
        self.next += 1;

        let frame = image::open(path)
            .with_context(|| format!("图片解码失败: {}", path.display()))
            .map(|img| {
                let rgba = img.to_rgba8();
                let (width, height) = rgba.dimensions();
                Frame {
                    rgba_data: rgba.into_raw(),
                    width,
                    height,
                    rotation: self.rotation,
                }
            });
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_sequence_reads_images_in_name_order() {
        let dir = std::env::temp_dir().join(format!("plate-sentinel-seq-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        RgbaImage::from_pixel(3, 2, Rgba([2, 2, 2, 255]))
            .save(dir.join("b.png"))
            .unwrap();
        RgbaImage::from_pixel(3, 2, Rgba([1, 1, 1, 255]))
            .save(dir.join("a.png"))
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "skip").unwrap();

        let seq = ImageSequence::open(&dir, 90).unwrap();
        assert_eq!(seq.len(), 2);
        let frames: Vec<Frame> = seq.map(|f| f.unwrap()).collect();
        assert_eq!(frames[0].rgba_data[0], 1);
        assert_eq!(frames[1].rgba_data[0], 2);
        assert_eq!((frames[0].width, frames[0].height, frames[0].rotation), (3, 2, 90));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
