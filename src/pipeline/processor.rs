//! 处理核心 (在处理线程中执行)
//! 职责: 检测 → 置信度过滤/坐标映射 → 跟踪表合并 → 二次识别 → 生成快照

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;
use log::{debug, error, info};

use crate::analysis::{RecognizedText, SecondaryAnalyzer};
use crate::config::PipelineConfig;
use crate::detection::detector::{filter_and_map, outline_accepted, Detector};
use crate::detection::tracker::{TrackEntry, TrackTable};
use crate::detection::types::Recognition;
use crate::error::Result;
use crate::renderer::{self, DebugInfo, DrawCommand};
use crate::utils::affine_transform::AffineMatrix;

/// 检测任务 (采集上下文 → 处理线程)
#[derive(Clone)]
pub struct DetectionJob {
    pub frame_index: u64,
    /// 当前帧 (与帧缓冲区共享)
    pub frame: Arc<RgbaImage>,
    /// 模型输入裁剪图
    pub crop: RgbaImage,
    pub crop_to_frame: AffineMatrix,
    pub rotation: i32,
}

/// 一次处理完成后发布的完整结果 (显示上下文只读)
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub frame_index: u64,
    /// 帧坐标系下的识别结果
    pub recognitions: Vec<Recognition>,
    /// 当前帧可见目标
    pub tracks: Vec<TrackEntry>,
    /// 最近一次成功识别的文字
    pub last_text: Option<String>,
    /// 检测耗时
    pub last_processing_ms: u64,
    pub stat_string: String,
    pub crop_preview: Option<Arc<RgbaImage>>,
    /// 本次处理的帧
    pub frame: Option<Arc<RgbaImage>>,
    pub frame_size: (u32, u32),
    pub rotation: i32,
}

impl Snapshot {
    /// 帧 → 显示画布 变换
    pub fn frame_to_display(&self, canvas_width: u32, canvas_height: u32) -> Result<AffineMatrix> {
        renderer::display_transform(
            self.frame_size.0,
            self.frame_size.1,
            canvas_width,
            canvas_height,
            self.rotation,
        )
    }

    /// 识别结果的叠加层绘制指令
    pub fn overlay(
        &self,
        canvas_width: u32,
        canvas_height: u32,
        stroke_width: f32,
    ) -> Result<Vec<DrawCommand>> {
        if self.recognitions.is_empty() {
            return Ok(Vec::new());
        }
        let transform = self.frame_to_display(canvas_width, canvas_height)?;
        Ok(renderer::render_overlay(
            &self.recognitions,
            &transform,
            stroke_width,
        ))
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            stat_string: self.stat_string.clone(),
            frame_size: self.frame_size,
            crop: self.crop_preview.clone(),
            rotation: self.rotation,
            last_processing_ms: self.last_processing_ms,
        }
    }
}

pub struct Processor {
    detector: Box<dyn Detector>,
    analyzer: SecondaryAnalyzer,
    tracks: TrackTable,
    last_text: Option<String>,
    config: PipelineConfig,
}

impl Processor {
    pub fn new(
        mut detector: Box<dyn Detector>,
        analyzer: SecondaryAnalyzer,
        config: PipelineConfig,
    ) -> Self {
        detector.enable_stat_logging(config.debug);
        Self {
            detector,
            analyzer,
            tracks: TrackTable::new(),
            last_text: None,
            config,
        }
    }

    pub fn tracks(&self) -> &TrackTable {
        &self.tracks
    }

    /// 处理单帧检测任务
    pub fn process(&mut self, job: DetectionJob) -> Snapshot {
        // 1. 检测 (单次失败按空结果处理)
        let start = Instant::now();
        let raw = match self.detector.recognize_image(&job.crop) {
            Ok(raw) => raw,
            Err(e) => {
                error!("❌ [帧{}] 检测失败: {:#}", job.frame_index, e);
                Vec::new()
            }
        };
        let last_processing_ms = start.elapsed().as_millis() as u64;
        debug!(
            "🔍 [帧{}] 原始检测 {} 个, 耗时 {}ms",
            job.frame_index,
            raw.len(),
            last_processing_ms
        );

        let crop_preview = outline_accepted(
            &job.crop,
            &raw,
            self.config.min_detection_confidence,
            self.config.crop_box_stroke_width,
        );

        // 2. 过滤 + 映射到帧坐标系
        let recognitions = filter_and_map(
            raw,
            &job.crop_to_frame,
            self.config.min_detection_confidence,
        );
        for recognition in &recognitions {
            debug!("🎯 [帧{}] {}", job.frame_index, recognition);
        }

        // 3. 跟踪表合并
        let requests = self.tracks.merge_frame(
            &recognitions,
            &job.frame,
            job.frame_index,
            self.config.min_analysis_confidence,
        );

        // 4. 二次识别
        for request in requests {
            match self.analyzer.analyze(&request.sub_image) {
                RecognizedText::Text(text) => {
                    info!(
                        "🔤 目标 {} (置信度 {:.4}) 识别结果: {:?}",
                        request.id, request.confidence, text
                    );
                    self.last_text = Some(text);
                }
                RecognizedText::Unavailable => {
                    debug!("⚠️  目标 {} 文字识别不可用", request.id);
                }
            }
        }

        Snapshot {
            frame_index: job.frame_index,
            recognitions,
            tracks: self.tracks.entries().to_vec(),
            last_text: self.last_text.clone(),
            last_processing_ms,
            stat_string: self.detector.stat_string(),
            crop_preview: Some(Arc::new(crop_preview)),
            frame_size: job.frame.dimensions(),
            frame: Some(job.frame),
            rotation: job.rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{NullRecognizer, TextBlock, TextRecognizer};
    use crate::detection::types::{RawDetection, RectF};
    use crate::detection::ScriptedDetector;
    use crate::input::FrameGeometry;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRecognizer {
        calls: Arc<AtomicUsize>,
    }

    impl TextRecognizer for CountingRecognizer {
        fn is_operational(&self) -> bool {
            true
        }

        fn detect(&mut self, _image: &RgbaImage) -> anyhow::Result<Vec<TextBlock>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![TextBlock {
                value: format!("plate-{}", n),
            }])
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn recognize_image(&mut self, _image: &RgbaImage) -> anyhow::Result<Vec<RawDetection>> {
            anyhow::bail!("model crashed")
        }
    }

    fn job(frame_index: u64) -> DetectionJob {
        let geometry = FrameGeometry::new(640, 480, 300, 0, false).unwrap();
        DetectionJob {
            frame_index,
            frame: Arc::new(RgbaImage::from_pixel(640, 480, Rgba([50, 60, 70, 255]))),
            crop: RgbaImage::new(300, 300),
            crop_to_frame: geometry.crop_to_frame,
            rotation: 0,
        }
    }

    fn raw(id: u32, confidence: f32) -> RawDetection {
        RawDetection {
            id,
            title: "plate".into(),
            confidence,
            location: Some(RectF::new(100.0, 100.0, 200.0, 200.0)),
        }
    }

    #[test]
    fn test_process_publishes_frame_space_results() {
        let detector = ScriptedDetector::new(vec![vec![raw(1, 0.95), raw(2, 0.5)]]);
        let mut processor = Processor::new(
            Box::new(detector),
            SecondaryAnalyzer::new(Box::new(NullRecognizer)),
            PipelineConfig::default(),
        );

        let snapshot = processor.process(job(1));
        assert_eq!(snapshot.recognitions.len(), 1);
        let loc = snapshot.recognitions[0].location;
        assert!((loc.left - 213.333).abs() < 1e-2);
        assert!((loc.bottom - 320.0).abs() < 1e-2);
        assert_eq!(snapshot.tracks.len(), 1);
        assert_eq!(snapshot.frame_size, (640, 480));
        assert!(snapshot.last_text.is_none());
        assert!(snapshot.stat_string.contains("Calls: 1/1"));
        assert!(snapshot.crop_preview.is_some());
    }

    #[test]
    fn test_analysis_runs_once_per_new_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector::new(vec![
            vec![raw(7, 0.9995)],
            vec![raw(7, 0.9995)],
            vec![raw(7, 0.9995), raw(8, 0.9999)],
        ]);
        let mut processor = Processor::new(
            Box::new(detector),
            SecondaryAnalyzer::new(Box::new(CountingRecognizer {
                calls: Arc::clone(&calls),
            })),
            PipelineConfig::default(),
        );

        let first = processor.process(job(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.last_text.as_deref(), Some("plate-1\n"));

        processor.process(job(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let third = processor.process(job(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third.last_text.as_deref(), Some("plate-2\n"));
    }

    #[test]
    fn test_detector_failure_yields_empty_frame() {
        let mut processor = Processor::new(
            Box::new(FailingDetector),
            SecondaryAnalyzer::new(Box::new(NullRecognizer)),
            PipelineConfig::default(),
        );
        let snapshot = processor.process(job(1));
        assert!(snapshot.recognitions.is_empty());
        assert!(processor.tracks().is_empty());
    }

    #[test]
    fn test_snapshot_overlay_in_display_space() {
        let detector = ScriptedDetector::new(vec![vec![raw(1, 0.95)]]);
        let mut processor = Processor::new(
            Box::new(detector),
            SecondaryAnalyzer::new(Box::new(NullRecognizer)),
            PipelineConfig::default(),
        );
        let snapshot = processor.process(job(1));

        // 640x480 → 1280x960, 放大2倍
        let commands = snapshot.overlay(1280, 960, 8.0).unwrap();
        match &commands[0] {
            DrawCommand::RoundRect { rect, .. } => {
                assert!((rect.left - 426.667).abs() < 1e-2);
                assert!((rect.bottom - 640.0).abs() < 1e-2);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Snapshot::default().overlay(100, 100, 8.0).unwrap().is_empty());
    }
}
