//! 目标跟踪表 (单帧有效)
//! Per-frame track table keyed by detector-assigned id
//!
//! 每次合并先清空整张表再用本帧检测结果重建: 表中只保留当前帧可见的目标,
//! 某个ID本帧未被检测到时, 其条目不会延续到下一帧。

use std::collections::{HashMap, HashSet};

use image::{imageops, RgbaImage};
use log::debug;

use super::types::{Recognition, RectF, TrackId};

// ========== 公共数据结构 ==========

/// 跟踪条目 (子图像由跟踪表独占)
#[derive(Clone, Debug)]
pub struct TrackEntry {
    pub id: TrackId,

    /// 目标区域截图 (已顺时针旋转90度)
    pub sub_image: RgbaImage,

    /// 最后一次出现的帧序号
    pub last_seen_frame: u64,
}

/// 二次识别请求 (新出现的高置信度目标)
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub id: TrackId,
    pub confidence: f32,
    pub sub_image: RgbaImage,
}

/// 跟踪表: 按插入顺序保存, 按ID直接索引
#[derive(Default)]
pub struct TrackTable {
    entries: Vec<TrackEntry>,
    index: HashMap<TrackId, usize>,
}

impl TrackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一帧检测结果
    ///
    /// # 参数
    /// - `recognitions`: 已过滤并映射到帧坐标系的识别结果
    /// - `frame`: 当前帧 (用于截取子图像)
    /// - `frame_index`: 当前帧序号
    /// - `analysis_threshold`: 触发二次识别的最低置信度
    ///
    /// # 返回
    /// 需要二次识别的目标: 合并开始前表中没有该ID、本轮首次出现且置信度达标
    pub fn merge_frame(
        &mut self,
        recognitions: &[Recognition],
        frame: &RgbaImage,
        frame_index: u64,
        analysis_threshold: f32,
    ) -> Vec<AnalysisRequest> {
        // 1. 记录合并前已存在的ID, 然后清空
        let previous: HashSet<TrackId> = self.index.drain().map(|(id, _)| id).collect();
        self.entries.clear();

        let mut requests = Vec::new();

        for recognition in recognitions {
            // 2. 截取子图像 (越界裁剪, 空区域跳过)
            let Some(sub_image) = extract_sub_image(frame, &recognition.location) else {
                debug!(
                    "✂️  目标 {} 截图区域为空, 跳过: {:?}",
                    recognition.id, recognition.location
                );
                continue;
            };

            let is_new =
                !previous.contains(&recognition.id) && !self.index.contains_key(&recognition.id);

            // 4. 新目标 + 高置信度 → 二次识别
            if is_new && recognition.confidence >= analysis_threshold {
                requests.push(AnalysisRequest {
                    id: recognition.id,
                    confidence: recognition.confidence,
                    sub_image: sub_image.clone(),
                });
            }

            // 3. 插入或替换 (同一轮中重复的ID只保留最后一次的截图)
            let entry = TrackEntry {
                id: recognition.id,
                sub_image,
                last_seen_frame: frame_index,
            };
            match self.index.get(&recognition.id) {
                Some(&pos) => self.entries[pos] = entry,
                None => {
                    self.index.insert(recognition.id, self.entries.len());
                    self.entries.push(entry);
                }
            }
        }

        requests
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackEntry> {
        self.index.get(&id).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ========== 工具函数 ==========

/// 从帧中截取目标区域并顺时针旋转90度
///
/// 坐标取整后裁剪到帧范围内, 裁剪后为空返回 None
pub fn extract_sub_image(frame: &RgbaImage, location: &RectF) -> Option<RgbaImage> {
    let (width, height) = (frame.width() as i64, frame.height() as i64);

    let left = (location.left as i64).clamp(0, width);
    let top = (location.top as i64).clamp(0, height);
    let right = (location.right as i64).clamp(0, width);
    let bottom = (location.bottom as i64).clamp(0, height);

    if right <= left || bottom <= top {
        return None;
    }

    let region = imageops::crop_imm(
        frame,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();
    Some(imageops::rotate90(&region))
}
