/// 识别流水线 (Recognition Pipeline)
///
/// 双上下文架构:
/// - 采集/显示上下文 (调用方线程): 帧写入 + 裁剪, 读取结果快照
/// - 处理线程: 检测 + 跟踪 + 二次识别, 同一时间最多一个任务
///
/// 处理线程忙时到达的新帧直接丢弃 (不排队), 结果以 `Arc<Snapshot>` 整体替换发布。
pub mod processor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};

use crate::analysis::{SecondaryAnalyzer, TextRecognizer};
use crate::config::PipelineConfig;
use crate::detection::Detector;
use crate::error::{Error, Result};
use crate::input::{Frame, FrameBuffer, FrameGeometry};

pub use processor::{DetectionJob, Processor, Snapshot};

/// 提交帧的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// 已交给处理线程
    Accepted { frame_index: u64 },
    /// 处理线程忙, 帧被丢弃
    Dropped,
}

/// 处理完成通知 (处理线程 → 显示上下文)
#[derive(Debug, Clone)]
pub struct FrameCompletion {
    pub frame_index: u64,
    pub processing_ms: u64,
    /// 本帧的处理结果 (与 `Pipeline::snapshot` 不同, 不会被后续帧覆盖)
    pub snapshot: Arc<Snapshot>,
}

pub struct Pipeline {
    frame_buffer: FrameBuffer,
    geometry: Option<FrameGeometry>,
    config: PipelineConfig,

    computing: Arc<AtomicBool>,
    job_tx: Option<Sender<DetectionJob>>,
    completion_rx: Receiver<FrameCompletion>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    worker: Option<JoinHandle<()>>,

    // 统计
    frame_count: u64,
    dropped_count: u64,
}

impl Pipeline {
    /// 创建流水线并启动处理线程
    pub fn new(
        detector: Box<dyn Detector>,
        recognizer: Box<dyn TextRecognizer>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (job_tx, job_rx) = crossbeam_channel::bounded::<DetectionJob>(1);
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        let computing = Arc::new(AtomicBool::new(false));
        let snapshot = Arc::new(RwLock::new(Arc::new(Snapshot::default())));

        let processor = Processor::new(detector, SecondaryAnalyzer::new(recognizer), config.clone());
        let worker = std::thread::Builder::new()
            .name("detection".into())
            .spawn({
                let computing = Arc::clone(&computing);
                let snapshot = Arc::clone(&snapshot);
                move || worker_loop(processor, job_rx, completion_tx, computing, snapshot)
            })
            .map_err(|_| Error::WorkerStopped)?;

        Ok(Self {
            frame_buffer: FrameBuffer::new(),
            geometry: None,
            config,
            computing,
            job_tx: Some(job_tx),
            completion_rx,
            snapshot,
            worker: Some(worker),
            frame_count: 0,
            dropped_count: 0,
        })
    }

    /// 提交一帧 (采集上下文调用, 不阻塞)
    ///
    /// 处理线程忙时直接丢弃该帧; 否则写入帧缓冲区、生成裁剪图并交给处理线程。
    /// 帧尺寸变化返回 `FrameSizeMismatch`, 调用方应结束会话。
    pub fn submit(&mut self, frame: Frame) -> Result<Submission> {
        if self.computing.load(Ordering::Acquire) {
            self.dropped_count += 1;
            return Ok(Submission::Dropped);
        }

        // 1. 写入帧缓冲区
        self.frame_buffer
            .ingest(&frame.rgba_data, frame.width, frame.height)?;

        // 2. 坐标变换 (旋转变化时重建)
        match self.geometry.as_mut() {
            Some(geometry) => {
                if geometry.update(frame.width, frame.height, frame.rotation)? {
                    info!("🔄 旋转角度变化为 {}°, 已重建坐标变换", frame.rotation);
                }
            }
            None => {
                info!(
                    "📐 帧 {}x{} → 模型输入 {2}x{2}, 旋转 {3}°",
                    frame.width, frame.height, self.config.model_input_size, frame.rotation
                );
                self.geometry = Some(FrameGeometry::new(
                    frame.width,
                    frame.height,
                    self.config.model_input_size,
                    frame.rotation,
                    self.config.maintain_aspect,
                )?);
            }
        }
        let geometry = self.geometry.as_ref().ok_or(Error::NoFrame)?;

        // 3. 裁剪到模型输入
        let crop = self.frame_buffer.crop_to_model_input(
            &geometry.frame_to_crop,
            self.config.model_input_size,
            self.config.interpolation,
        )?;

        self.frame_count += 1;
        let job = DetectionJob {
            frame_index: self.frame_count,
            frame: self.frame_buffer.snapshot()?,
            crop,
            crop_to_frame: geometry.crop_to_frame,
            rotation: geometry.rotation,
        };

        // 4. 交给处理线程
        let tx = self.job_tx.as_ref().ok_or(Error::WorkerStopped)?;
        self.computing.store(true, Ordering::Release);
        if tx.send(job).is_err() {
            self.computing.store(false, Ordering::Release);
            return Err(Error::WorkerStopped);
        }

        Ok(Submission::Accepted {
            frame_index: self.frame_count,
        })
    }

    /// 最新结果快照 (整体替换, 不会读到中间状态)
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// 处理完成通知通道 (用于触发重绘)
    pub fn completions(&self) -> &Receiver<FrameCompletion> {
        &self.completion_rx
    }

    /// 是否有任务正在处理
    pub fn is_busy(&self) -> bool {
        self.computing.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 已提交到处理线程的帧数
    pub fn accepted_frames(&self) -> u64 {
        self.frame_count
    }

    /// 因处理线程忙而丢弃的帧数
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_count
    }

    /// 关闭任务通道并等待处理线程结束 (正在处理的任务会执行完)
    ///
    /// 返回尚未被取走的完成通知
    pub fn shutdown(mut self) -> Vec<FrameCompletion> {
        self.stop();
        self.completion_rx.try_iter().collect()
    }

    fn stop(&mut self) {
        self.job_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("❌ 处理线程异常退出");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 处理线程: 接收任务 → 处理 → 发布快照 → 清除忙标志 → 通知显示上下文
fn worker_loop(
    mut processor: Processor,
    job_rx: Receiver<DetectionJob>,
    completion_tx: Sender<FrameCompletion>,
    computing: Arc<AtomicBool>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
) {
    info!("✅ 处理线程启动");

    while let Ok(job) = job_rx.recv() {
        let frame_index = job.frame_index;
        let result = Arc::new(processor.process(job));
        let processing_ms = result.last_processing_ms;

        {
            let mut guard = snapshot.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::clone(&result);
        }
        computing.store(false, Ordering::Release);

        debug!("📊 [帧{}] 处理完成, 检测耗时 {}ms", frame_index, processing_ms);
        let _ = completion_tx.send(FrameCompletion {
            frame_index,
            processing_ms,
            snapshot: result,
        });
    }

    info!("✅ 处理线程退出");
}
