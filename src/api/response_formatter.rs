use super::data_models::{ReplySet, REPLY_PLACEHOLDER};

pub struct ResponseFormatter;

impl ResponseFormatter {
    /// 把模型返回的原始文本整理成恰好三条回复：
    /// 按换行切分、丢弃空白行、取前三条，不足时用占位文案补齐。
    /// 不做序号或标记的清理。
    pub fn format_replies(raw: &str) -> ReplySet {
        let mut lines = raw
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.to_string());
        let mut next = || lines.next().unwrap_or_else(|| REPLY_PLACEHOLDER.to_string());
        ReplySet::new([next(), next(), next()])
    }
}
