/// 工具模块
pub mod affine_transform;
