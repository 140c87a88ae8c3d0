use super::data_models::{ChatMessage, Gender, IntimacyLevel};

/// 各关系阶段的展示名称，下标 = 等级 - 1
const LEVEL_LABELS: [&str; 10] = [
    "刚认识",
    "初步了解",
    "朋友阶段",
    "好朋友",
    "暧昧期",
    "互有好感",
    "热恋期",
    "深度恋爱",
    "亲密爱人",
    "灵魂伴侣",
];

/// 各阶段对回复语气的要求，下标 = 等级 - 1
const LEVEL_TONES: [&str; 10] = [
    "回复要非常礼貌、保守，保持适当距离，避免过于亲密的表达。",
    "回复要友好但谨慎，可以表现出一些兴趣，但要保持分寸。",
    "回复要自然友好，可以开一些轻松的玩笑，表现出关心。",
    "回复要热情友好，可以有更多的关怀和温暖的表达。",
    "回复要有一些小暧昧，可以适度调情，但不要太直接。",
    "回复要甜蜜一些，可以有明显的好感表达和轻微的撩拨。",
    "回复要充满爱意，可以有甜言蜜语和浪漫的表达。",
    "回复要非常甜蜜，充满深情和浓烈的爱意表达。",
    "回复要极其亲密甜蜜，可以有很多爱称和深情的话语。",
    "回复要体现深层的理解和默契，充满深沉的爱意和心灵相通的感觉。",
];

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn label(level: IntimacyLevel) -> &'static str {
        LEVEL_LABELS[level.value() as usize - 1]
    }

    pub fn gender_context(gender: Gender) -> &'static str {
        match gender {
            Gender::Male => "你在帮助一个男生回复女生的消息",
            Gender::Female => "你在帮助一个女生回复男生的消息",
        }
    }

    /// 阶段模板：身份 + 性别语境 + 语气要求
    pub fn level_template(level: IntimacyLevel, gender: Gender) -> String {
        format!(
            "你是{}的聊天助手。{}。{}",
            Self::stage_name(level),
            Self::gender_context(gender),
            LEVEL_TONES[level.value() as usize - 1]
        )
    }

    /// 完整 system prompt：阶段模板 + 固定的"三条回复"指令
    pub fn build_system_prompt(level: IntimacyLevel, gender: Gender) -> String {
        format!(
            "{}\n\n请根据用户输入的\"{}的话\"，生成3条不同风格的回复。要求：\n\
             1. 每条回复都要符合当前的暧昧程度\n\
             2. 回复要自然、有趣、有吸引力\n\
             3. 避免重复，每条回复要有不同的角度和风格\n\
             4. 回复长度适中，不要太长也不要太短\n\
             5. 使用现代年轻人的聊天语言风格\n\
             6. 回复要符合{}的身份和语言习惯\n\n\
             请直接返回3条回复，用换行符分隔，不要添加序号或其他标记。",
            Self::level_template(level, gender),
            gender.partner_noun(),
            gender.self_noun()
        )
    }

    /// 一次请求的完整消息列表，恒为 `[system, user]`
    pub fn build_conversation(input: &str, level: IntimacyLevel, gender: Gender) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(Self::build_system_prompt(level, gender)),
            ChatMessage::user(input),
        ]
    }

    // 模板里的阶段称谓：多数为"X阶段"，暧昧期与热恋期本身带"期"
    fn stage_name(level: IntimacyLevel) -> &'static str {
        match level.value() {
            1 => "刚认识阶段",
            2 => "初步了解阶段",
            3 => "朋友阶段",
            4 => "好朋友阶段",
            5 => "暧昧期",
            6 => "互有好感阶段",
            7 => "热恋期",
            8 => "深度恋爱阶段",
            9 => "亲密爱人阶段",
            _ => "灵魂伴侣阶段",
        }
    }
}
