use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// 每次请求固定生成的回复条数
pub const REPLY_COUNT: usize = 3;

/// 回复不足三条时的补位文案
pub const REPLY_PLACEHOLDER: &str = "正在思考更好的回复...";

/// 生成失败时展示的固定回复
pub const ERROR_FALLBACK_REPLIES: [&str; REPLY_COUNT] = [
    "哎呀，我的小脑瓜有点卡住了 🤔",
    "让我重新组织一下语言...",
    "稍等，正在想更好的回复方式 💭",
];

/// 消息角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// 单条对话消息（OpenAI 兼容格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// 使用者的性别，决定提示词里"帮谁回复谁"
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    /// 对方的称呼
    pub fn partner_noun(self) -> &'static str {
        match self {
            Gender::Male => "女生",
            Gender::Female => "男生",
        }
    }

    /// 自己的称呼
    pub fn self_noun(self) -> &'static str {
        match self {
            Gender::Male => "男生",
            Gender::Female => "女生",
        }
    }

    pub fn input_example(self) -> &'static str {
        match self {
            Gender::Male => "今天天气真不错呢～",
            Gender::Female => "今天加班好累啊",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "男" | "男生" => Ok(Gender::Male),
            "female" | "f" | "女" | "女生" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}', expected male or female", other)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// 关系阶段（亲密度），取值恒在 [1, 10]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct IntimacyLevel(u8);

impl IntimacyLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// 越界值会被夹到 [1, 10]
    pub fn new(level: i64) -> Self {
        Self(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = IntimacyLevel> {
        (Self::MIN..=Self::MAX).map(IntimacyLevel)
    }
}

impl Default for IntimacyLevel {
    fn default() -> Self {
        IntimacyLevel(5)
    }
}

impl From<i64> for IntimacyLevel {
    fn from(level: i64) -> Self {
        IntimacyLevel::new(level)
    }
}

impl From<IntimacyLevel> for i64 {
    fn from(level: IntimacyLevel) -> Self {
        level.0 as i64
    }
}

impl FromStr for IntimacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(IntimacyLevel::new)
            .map_err(|e| format!("invalid intimacy level '{}': {}", s, e))
    }
}

impl fmt::Display for IntimacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一次生成的三条候选回复。条数固定，序列化为长度为 3 的数组。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplySet([String; REPLY_COUNT]);

impl ReplySet {
    pub fn new(replies: [String; REPLY_COUNT]) -> Self {
        Self(replies)
    }

    pub fn error_fallback() -> Self {
        Self(ERROR_FALLBACK_REPLIES.map(|s| s.to_string()))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn into_inner(self) -> [String; REPLY_COUNT] {
        self.0
    }
}

/// 一条历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub input: String,
    pub intimacy_level: IntimacyLevel,
    pub replies: ReplySet,
    /// epoch milliseconds
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(input: impl Into<String>, intimacy_level: IntimacyLevel, replies: ReplySet) -> Self {
        Self {
            input: input.into(),
            intimacy_level,
            replies,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// 本地时间的可读形式，用于列表展示
    pub fn local_time(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// `POST /api/chat` 请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

/// `POST /api/chat` 成功响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

/// `POST /api/chat` 失败响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
