//! 错误类型
//! Error types for the recognition pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// 尺寸非正或矩阵不可逆
    #[error("退化的仿射变换: {0}")]
    DegenerateTransform(String),

    /// 会话中途帧尺寸发生变化 (不可恢复)
    #[error("帧尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
    FrameSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// 像素缓冲区长度与 width*height*4 不符
    #[error("像素缓冲区长度错误: 期望 {expected} 字节, 实际 {actual} 字节")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("帧缓冲区为空, 尚未接收任何帧")]
    NoFrame,

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    /// 处理线程已退出
    #[error("处理线程已停止")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
