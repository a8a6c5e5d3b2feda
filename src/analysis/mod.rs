/// 二次识别 (Secondary Analysis)
///
/// 对新出现的高置信度目标截图调用外部文字识别引擎 (OCR)。
/// 引擎不可用或单次调用失败都只记录日志并返回哨兵值, 不影响后续帧。
use anyhow::Result;
use image::RgbaImage;
use log::{debug, warn};

/// 引擎不可用时的哨兵文本
pub const TEXT_UNAVAILABLE: &str = "not operational";

/// 识别出的文本块
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub value: String,
}

/// 外部文字识别引擎接口
pub trait TextRecognizer: Send {
    /// 引擎是否可用 (例如模型尚未下载完成时返回 false)
    fn is_operational(&self) -> bool;

    /// 识别图像中的文本块
    fn detect(&mut self, image: &RgbaImage) -> Result<Vec<TextBlock>>;
}

/// 始终不可用的识别引擎 (未接入OCR时使用)
pub struct NullRecognizer;

impl TextRecognizer for NullRecognizer {
    fn is_operational(&self) -> bool {
        false
    }

    fn detect(&mut self, _image: &RgbaImage) -> Result<Vec<TextBlock>> {
        Ok(Vec::new())
    }
}

/// 识别结果
#[derive(Clone, Debug, PartialEq)]
pub enum RecognizedText {
    Text(String),
    Unavailable,
}

impl RecognizedText {
    /// 文本内容, 不可用时为哨兵文本
    pub fn as_str(&self) -> &str {
        match self {
            RecognizedText::Text(text) => text,
            RecognizedText::Unavailable => TEXT_UNAVAILABLE,
        }
    }
}

/// 二次识别调度器
pub struct SecondaryAnalyzer {
    recognizer: Box<dyn TextRecognizer>,
}

impl SecondaryAnalyzer {
    pub fn new(recognizer: Box<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    /// 识别子图像中的文字, 各文本块之后追加换行
    pub fn analyze(&mut self, sub_image: &RgbaImage) -> RecognizedText {
        if !self.recognizer.is_operational() {
            warn!("⚠️  文字识别引擎不可用");
            return RecognizedText::Unavailable;
        }

        match self.recognizer.detect(sub_image) {
            Ok(blocks) => {
                let text: String = blocks
                    .iter()
                    .map(|block| format!("{}\n", block.value))
                    .collect();
                debug!("🔤 识别到 {} 个文本块: {:?}", blocks.len(), text);
                RecognizedText::Text(text)
            }
            Err(e) => {
                warn!("⚠️  文字识别失败: {:#}", e);
                RecognizedText::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRecognizer {
        blocks: Vec<&'static str>,
        fail: bool,
    }

    impl TextRecognizer for FixedRecognizer {
        fn is_operational(&self) -> bool {
            true
        }

        fn detect(&mut self, _image: &RgbaImage) -> Result<Vec<TextBlock>> {
            if self.fail {
                anyhow::bail!("engine crashed");
            }
            Ok(self
                .blocks
                .iter()
                .map(|b| TextBlock {
                    value: b.to_string(),
                })
                .collect())
        }
    }

    #[test]
    fn test_blocks_joined_with_newlines() {
        let mut analyzer = SecondaryAnalyzer::new(Box::new(FixedRecognizer {
            blocks: vec!["29-X1", "123.45"],
            fail: false,
        }));
        let text = analyzer.analyze(&RgbaImage::new(8, 4));
        assert_eq!(text, RecognizedText::Text("29-X1\n123.45\n".to_string()));
    }

    #[test]
    fn test_non_operational_returns_sentinel() {
        let mut analyzer = SecondaryAnalyzer::new(Box::new(NullRecognizer));
        let text = analyzer.analyze(&RgbaImage::new(8, 4));
        assert_eq!(text, RecognizedText::Unavailable);
        assert_eq!(text.as_str(), TEXT_UNAVAILABLE);
    }

    #[test]
    fn test_engine_error_is_recovered() {
        let mut analyzer = SecondaryAnalyzer::new(Box::new(FixedRecognizer {
            blocks: vec![],
            fail: true,
        }));
        assert_eq!(
            analyzer.analyze(&RgbaImage::new(8, 4)),
            RecognizedText::Unavailable
        );
    }
}
