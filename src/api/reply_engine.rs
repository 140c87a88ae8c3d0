use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::completion_client::ReplyBackend;
use super::config_manager::ProviderConfig;
use super::data_models::{
    ChatRequest, Gender, HistoryEntry, IntimacyLevel, ReplySet, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use super::error_handler::ChatError;
use super::history_store::HistoryStore;
use super::prompt_builder::PromptBuilder;
use super::response_formatter::ResponseFormatter;
use super::typewriter::{RevealOutcome, RevealSink, Typewriter};

/// 一次生成的结果
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// 实际展示的三条回复（失败时为固定兜底文案）
    pub replies: ReplySet,
    pub reveal: RevealOutcome,
    /// 生成失败的原因；成功时为 None
    pub error: Option<ChatError>,
    /// 是否写入了历史记录
    pub saved: bool,
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 交互层：拼提示词、调用后端、整理回复、打字机展示、写历史。
///
/// `generate` 需要 `&mut self`，同一个引擎上不会有两次生成同时进行。
pub struct ReplyEngine {
    backend: Arc<dyn ReplyBackend>,
    history: HistoryStore,
    typewriter: Typewriter,
    model: String,
    temperature: f32,
}

impl ReplyEngine {
    pub fn new(backend: Arc<dyn ReplyBackend>, history: HistoryStore) -> Self {
        Self {
            backend,
            history,
            typewriter: Typewriter::default(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// 请求模型取自提供商配置（如 `DEEPSEEK_MODEL`）
    pub fn from_config(
        backend: Arc<dyn ReplyBackend>,
        history: HistoryStore,
        provider: &ProviderConfig,
    ) -> Self {
        Self::new(backend, history).with_model(provider.model.clone())
    }

    pub fn with_typewriter(mut self, typewriter: Typewriter) -> Self {
        self.typewriter = typewriter;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    /// 拒绝空白输入
    pub fn validate_input(content: &str) -> Result<(), ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::ValidationError {
                message: "Message cannot be blank".to_string(),
            });
        }
        Ok(())
    }

    pub fn build_request(&self, input: &str, level: IntimacyLevel, gender: Gender) -> ChatRequest {
        ChatRequest {
            messages: PromptBuilder::build_conversation(input, level, gender),
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }

    /// 生成并展示三条回复。
    ///
    /// 后端失败不会作为 `Err` 返回：此时展示兜底回复，错误放在
    /// `GenerationOutcome::error` 里，且不写历史。只有空输入返回 `Err`。
    /// 展示被取消时同样不写历史。
    pub async fn generate<S: RevealSink>(
        &mut self,
        input: &str,
        level: IntimacyLevel,
        gender: Gender,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, ChatError> {
        Self::validate_input(input)?;

        let request = self.build_request(input, level, gender);
        let (replies, error) = match self.backend.complete(&request).await {
            Ok(content) => (ResponseFormatter::format_replies(&content), None),
            Err(err) => {
                warn!("Error generating responses: {}", err);
                (ReplySet::error_fallback(), Some(err))
            }
        };

        let reveal = self.typewriter.reveal(&replies, sink, cancel).await;

        let mut saved = false;
        if error.is_none() && reveal == RevealOutcome::Completed {
            let entry = HistoryEntry::new(input, level, replies.clone());
            match self.history.save(entry) {
                Ok(()) => saved = true,
                Err(e) => warn!("failed to save chat history: {}", e),
            }
        }

        info!(
            "generated replies level={} gender={} success={} saved={}",
            level,
            gender,
            error.is_none(),
            saved
        );

        Ok(GenerationOutcome {
            replies,
            reveal,
            error,
            saved,
        })
    }
}
