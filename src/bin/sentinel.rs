/// 车牌哨兵 (Plate Sentinel)
///
/// 图片序列回放工具
///
/// 系统架构:
/// 1. 主线程:   读取帧 → 写入帧缓冲区 → 裁剪 → 提交 (处理线程忙时丢帧)
/// 2. 处理线程: 检测 → 跟踪 → 文字识别 → 发布快照
/// 3. 主线程:   收到完成通知后渲染画布并保存PNG
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use plate_sentinel::input::ImageSequence;
use plate_sentinel::renderer::{self, canvas::Canvas};
use plate_sentinel::{
    gen_time_string, FrameCompletion, NullRecognizer, Pipeline, PipelineConfig, ScriptedDetector,
    Snapshot, Submission,
};

/// 车牌哨兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "车牌哨兵 - 检测/跟踪/文字识别流水线回放", long_about = None)]
struct Args {
    /// 帧图片目录 (按文件名排序)
    #[arg(short, long)]
    frames: PathBuf,

    /// 检测脚本 (JSON, 每帧一个检测数组)
    #[arg(short, long)]
    detections: PathBuf,

    /// 流水线配置文件
    #[arg(short, long, default_value = "sentinel_config.json")]
    config: PathBuf,

    /// 渲染结果输出目录
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// 传感器相对显示的旋转角度 (90的倍数)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    rotation: i32,

    /// 显示画布尺寸 (WxH)
    #[arg(long, default_value = "1280x720", value_parser = parse_canvas)]
    canvas: (u32, u32),

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    font: Option<PathBuf>,

    /// 开启调试叠加层
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 模拟推理耗时 (毫秒)
    #[arg(long, default_value_t = 0)]
    detector_delay_ms: u64,
}

fn parse_canvas(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("画布尺寸格式应为 WxH, 实际为 {}", s))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("宽度无效: {}", e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("高度无效: {}", e))?;
    if w == 0 || h == 0 {
        return Err("画布尺寸必须大于0".into());
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.rotation % 90 != 0 {
        bail!("旋转角度必须是90的倍数: {}", args.rotation);
    }

    let mut config = PipelineConfig::load(&args.config);
    config.debug |= args.debug;
    config.log_summary();

    info!("🚀 车牌哨兵启动");
    info!("📁 帧目录: {}", args.frames.display());
    info!("📦 检测脚本: {}", args.detections.display());

    // ========== 检测器 (初始化失败直接退出) ==========
    let detector = ScriptedDetector::load(&args.detections)
        .context("检测器初始化失败")?
        .with_delay(Duration::from_millis(args.detector_delay_ms));

    let frames = ImageSequence::open(&args.frames, args.rotation)?;
    if frames.is_empty() {
        warn!("⚠️  帧目录中没有图片");
        return Ok(());
    }
    info!("🎞️  共 {} 帧", frames.len());

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("无法创建输出目录 {}", args.output.display()))?;

    let mut canvas_template = Canvas::new(args.canvas.0, args.canvas.1);
    if let Some(font_path) = &args.font {
        canvas_template = canvas_template.with_font(Canvas::load_font(font_path)?, config.text_size);
    } else {
        warn!("⚠️  未指定字体, 标签与调试文字不会绘制");
    }

    let mut pipeline =
        Pipeline::new(Box::new(detector), Box::new(NullRecognizer), config.clone())?;
    let mut last_text: Option<String> = None;

    // ========== 主循环 ==========
    for frame in frames {
        let frame = frame?;
        match pipeline.submit(frame)? {
            Submission::Accepted { frame_index } => debug!("📤 [帧{}] 已提交", frame_index),
            Submission::Dropped => debug!("⏭️  处理线程忙, 丢弃一帧"),
        }

        for done in pipeline.completions().try_iter() {
            handle_completion(&done, &canvas_template, &config, &args.output, &mut last_text)?;
        }
    }

    // ========== 等待最后一个任务, 取走剩余的完成通知 ==========
    let (accepted, dropped) = (pipeline.accepted_frames(), pipeline.dropped_frames());
    for done in pipeline.shutdown() {
        handle_completion(&done, &canvas_template, &config, &args.output, &mut last_text)?;
    }

    info!("✅ 回放完成: 处理 {} 帧, 丢弃 {} 帧", accepted, dropped);
    if let Some(text) = &last_text {
        info!("🔤 最后识别文字: {:?}", text);
    }
    Ok(())
}

fn handle_completion(
    done: &FrameCompletion,
    template: &Canvas,
    config: &PipelineConfig,
    output: &Path,
    last_text: &mut Option<String>,
) -> Result<()> {
    render_and_save(&done.snapshot, template, config, output, done.frame_index)?;
    report_text(&done.snapshot, last_text);
    Ok(())
}

/// 渲染当前快照: 帧 → 叠加层 → 调试层, 保存为PNG
fn render_and_save(
    snapshot: &Snapshot,
    template: &Canvas,
    config: &PipelineConfig,
    output: &Path,
    frame_index: u64,
) -> Result<()> {
    let Some(frame) = snapshot.frame.as_ref() else {
        return Ok(());
    };
    let mut canvas = template.clone();
    let (width, height) = (canvas.width(), canvas.height());

    let frame_to_display = snapshot.frame_to_display(width, height)?;
    canvas.draw_image(frame, &frame_to_display, config.interpolation)?;
    canvas.execute(&snapshot.overlay(width, height, config.box_stroke_width)?)?;

    if config.debug {
        let debug_commands =
            renderer::render_debug(&snapshot.debug_info(), width, height, config.text_size * 1.25);
        canvas.execute(&debug_commands)?;
    }

    let path = output.join(format!("frame_{:05}_{}.png", frame_index, gen_time_string("")));
    canvas
        .into_image()
        .save(&path)
        .with_context(|| format!("无法保存 {}", path.display()))?;
    info!(
        "🖼️  [帧{}] {} 个目标 → {}",
        frame_index,
        snapshot.recognitions.len(),
        path.display()
    );
    Ok(())
}

fn report_text(snapshot: &Snapshot, last_text: &mut Option<String>) {
    if snapshot.last_text != *last_text {
        if let Some(text) = &snapshot.last_text {
            info!("🔤 识别文字: {:?}", text);
        }
        last_text.clone_from(&snapshot.last_text);
    }
}
