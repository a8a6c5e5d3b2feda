//! 流水线配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::detection::types::INF_SIZE;
use crate::error::{Error, Result};
use crate::utils::affine_transform::InterpolationMethod;

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 检测参数 ===
    pub model_input_size: u32,         // 模型输入尺寸 (正方形)
    pub min_detection_confidence: f32, // 检测置信度阈值
    pub maintain_aspect: bool,         // 裁剪时是否保持宽高比
    pub interpolation: InterpolationMethod,

    // === 二次识别参数 ===
    pub min_analysis_confidence: f32, // 触发文字识别的置信度阈值

    // === 渲染参数 ===
    pub box_stroke_width: f32,      // 叠加层检测框线宽
    pub crop_box_stroke_width: f32, // 调试裁剪图检测框线宽
    pub text_size: f32,             // 标签字号 (像素)
    pub debug: bool,                // 调试叠加层
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_input_size: INF_SIZE,
            min_detection_confidence: 0.85,
            maintain_aspect: false,
            interpolation: InterpolationMethod::Nearest,

            min_analysis_confidence: 0.999,

            box_stroke_width: 8.0,
            crop_box_stroke_width: 2.0,
            text_size: 18.0,
            debug: false,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写出默认配置; 解析失败时使用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存默认配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 校验阈值与尺寸
    pub fn validate(&self) -> Result<()> {
        if self.model_input_size == 0 {
            return Err(Error::InvalidConfig("model_input_size 必须大于0".into()));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_analysis_confidence", self.min_analysis_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} 必须在 [0, 1] 范围内, 实际为 {}",
                    name, value
                )));
            }
        }
        if self.box_stroke_width <= 0.0 || self.crop_box_stroke_width <= 0.0 {
            return Err(Error::InvalidConfig("线宽必须大于0".into()));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️  当前流水线配置:");
        info!(
            "  模型输入: {0}x{0} ({1:?}, 保持宽高比: {2})",
            self.model_input_size, self.interpolation, self.maintain_aspect
        );
        info!("  检测置信度: {:.2}", self.min_detection_confidence);
        info!("  文字识别置信度: {:.3}", self.min_analysis_confidence);
        info!("  调试叠加层: {}", self.debug);
    }
}
