use std::fmt;

/// 面向用户的通用错误提示（上游失败统一折叠为这一条）
pub const GENERIC_FAILURE_MESSAGE: &str = "生成回复时出错，请稍后再试";

/// 凭据缺失时 `/api/chat` 返回的提示
pub const MISSING_CREDENTIAL_MESSAGE: &str = "Deepseek API密钥未配置";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    ConfigError { message: String },
    ApiError { status: u16, message: String },
    NetworkError { message: String },
    StorageError { message: String },
    ValidationError { message: String },
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            ChatError::ApiError { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            ChatError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            ChatError::StorageError { message } => {
                write!(f, "Storage error: {}", message)
            }
            ChatError::ValidationError { message } => {
                write!(f, "Validation error: {}", message)
            }
        }
    }
}

impl std::error::Error for ChatError {}

impl ChatError {
    /// 转换为展示给用户的文案。
    /// 配置错误原样展示；上游/网络错误一律折叠为通用提示，不区分原因。
    pub fn user_message(&self) -> String {
        match self {
            ChatError::ConfigError { message } => message.clone(),
            ChatError::ValidationError { message } => message.clone(),
            ChatError::ApiError { .. } | ChatError::NetworkError { .. } => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            ChatError::StorageError { message } => format!("保存记录失败: {}", message),
        }
    }

    /// Classify a reqwest transport failure. Timeouts and connection errors
    /// are reported the same way; nothing is retried.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("请求超时: {}", err)
        } else if err.is_connect() {
            format!("无法连接到 AI 服务器: {}", err)
        } else {
            format!("网络请求失败: {}", err)
        };
        ChatError::NetworkError { message }
    }

    /// Build an `ApiError` from a non-2xx body, preferring the provider's
    /// `error.message` (OpenAI shape) or a flat `error` string.
    pub fn from_api_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| {
                let error = json.get("error")?;
                error
                    .get("message")
                    .and_then(|v| v.as_str())
                    .or_else(|| error.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| body.chars().take(200).collect());
        ChatError::ApiError { status, message }
    }
}
