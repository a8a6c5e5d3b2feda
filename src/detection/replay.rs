//! 脚本检测器 - 从JSON文件回放预先录制的检测结果
//!
//! 第 N 次调用返回脚本中第 N 组检测结果, 超出脚本长度后返回空列表。
//! 用于在没有推理引擎的环境下驱动整条流水线。

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbaImage;
use log::{debug, info};

use super::detector::Detector;
use super::types::RawDetection;

pub struct ScriptedDetector {
    script: Vec<Vec<RawDetection>>,
    calls: usize,
    delay: Duration,
    stat_logging: bool,
    last_ms: f64,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script,
            calls: 0,
            delay: Duration::ZERO,
            stat_logging: false,
            last_ms: 0.0,
        }
    }

    /// 从JSON文件加载脚本 (格式: 每帧一个检测数组)
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取检测脚本 {}", path.display()))?;
        let script: Vec<Vec<RawDetection>> = serde_json::from_str(&json)
            .with_context(|| format!("检测脚本解析失败 {}", path.display()))?;
        info!("✅ 检测脚本加载成功: {} 帧", script.len());
        Ok(Self::new(script))
    }

    /// 模拟推理耗时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Detector for ScriptedDetector {
    fn recognize_image(&mut self, image: &RgbaImage) -> Result<Vec<RawDetection>> {
        let start = Instant::now();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let results = self.script.get(self.calls).cloned().unwrap_or_default();
        self.calls += 1;
        self.last_ms = start.elapsed().as_secs_f64() * 1000.0;

        if self.stat_logging {
            debug!(
                "🔍 [调用{}] 输入 {}x{} → {} 个检测",
                self.calls,
                image.width(),
                image.height(),
                results.len()
            );
        }
        Ok(results)
    }

    fn stat_string(&self) -> String {
        format!(
            "Scripted detector\nCalls: {}/{}\nLast call: {:.1}ms",
            self.calls,
            self.script.len(),
            self.last_ms
        )
    }

    fn enable_stat_logging(&mut self, enabled: bool) {
        self.stat_logging = enabled;
    }
}
