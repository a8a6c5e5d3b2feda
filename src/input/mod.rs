/// 帧输入系统 (Frame Ingest)
///
/// 在采集上下文中同步执行, 不得阻塞采集
/// - FrameBuffer:   持久帧缓冲区 + 模型输入裁剪
/// - FrameGeometry: 帧 ↔ 裁剪图 变换对
/// - ImageSequence: 图片目录回放帧源
pub mod frame_buffer;
pub mod image_sequence;

pub use frame_buffer::{Frame, FrameBuffer, FrameGeometry};
pub use image_sequence::ImageSequence;
