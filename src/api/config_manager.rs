use std::fmt;
use std::path::Path;

use log::{debug, error, info, warn};

use super::error_handler::{ChatError, MISSING_CREDENTIAL_MESSAGE};

pub const DEEPSEEK_DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// 支持的 AI 提供商（均为 OpenAI 兼容接口）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    Deepseek,
    Openai,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Deepseek, AiProvider::Openai];

    pub fn as_str(self) -> &'static str {
        match self {
            AiProvider::Deepseek => "deepseek",
            AiProvider::Openai => "openai",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Some(AiProvider::Deepseek),
            "openai" => Some(AiProvider::Openai),
            _ => None,
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个提供商的连接配置
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

// 手写 Debug，避免密钥进入日志
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.trim().is_empty())
    }

    /// 取出密钥；缺失即为配置错误，调用方不应继续发请求
    pub fn require_api_key(&self) -> Result<&str, ChatError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ChatError::ConfigError {
                message: MISSING_CREDENTIAL_MESSAGE.to_string(),
            }),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 进程启动时从环境变量读取一次的配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub deepseek: ProviderConfig,
    pub openai: ProviderConfig,
    pub app_name: String,
    pub app_version: String,
    pub default_provider: AiProvider,
    pub debug_mode: bool,
}

impl AppConfig {
    /// 先加载 `.env.local`，再加载 `.env`（已存在的变量不会被覆盖），然后读取进程环境。
    pub fn from_env() -> Self {
        load_dotenv_files(Path::new("."));
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 以任意键值来源构造配置。空字符串视为未设置。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let default_provider = get("DEFAULT_PROVIDER")
            .and_then(|name| {
                let parsed = AiProvider::parse(&name);
                if parsed.is_none() {
                    warn!("Unknown DEFAULT_PROVIDER '{}', falling back to deepseek", name);
                }
                parsed
            })
            .unwrap_or(AiProvider::Deepseek);

        Self {
            deepseek: ProviderConfig {
                api_key: get("DEEPSEEK_API_KEY"),
                base_url: get_or("DEEPSEEK_BASE_URL", DEEPSEEK_DEFAULT_BASE_URL),
                model: get_or("DEEPSEEK_MODEL", DEEPSEEK_DEFAULT_MODEL),
            },
            openai: ProviderConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url: get_or("OPENAI_BASE_URL", OPENAI_DEFAULT_BASE_URL),
                model: get_or("OPENAI_MODEL", OPENAI_DEFAULT_MODEL),
            },
            app_name: get_or("APP_NAME", "Love Chat AI"),
            app_version: get_or("APP_VERSION", env!("CARGO_PKG_VERSION")),
            default_provider,
            debug_mode: get("DEBUG_MODE").is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }

    pub fn provider(&self, provider: AiProvider) -> &ProviderConfig {
        match provider {
            AiProvider::Deepseek => &self.deepseek,
            AiProvider::Openai => &self.openai,
        }
    }

    pub fn is_provider_configured(&self, provider: AiProvider) -> bool {
        self.provider(provider).is_configured()
    }

    pub fn configured_providers(&self) -> Vec<AiProvider> {
        AiProvider::ALL
            .into_iter()
            .filter(|p| self.is_provider_configured(*p))
            .collect()
    }

    /// 默认提供商未配置时退回第一个已配置的；都没有则仍为 deepseek
    pub fn effective_provider(&self) -> AiProvider {
        if self.is_provider_configured(self.default_provider) {
            return self.default_provider;
        }
        self.configured_providers()
            .into_iter()
            .next()
            .unwrap_or(AiProvider::Deepseek)
    }

    /// 直连上游时使用的提供商配置
    pub fn direct_provider(&self) -> &ProviderConfig {
        self.provider(self.effective_provider())
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut result = ConfigValidation::default();

        if self.configured_providers().is_empty() {
            result.errors.push("没有配置任何AI提供商的API密钥".to_string());
        }
        if !self.is_provider_configured(AiProvider::Deepseek) {
            result
                .warnings
                .push("Deepseek API密钥未配置，这是推荐的主要AI提供商".to_string());
        }
        if !self.is_provider_configured(self.default_provider) {
            result
                .warnings
                .push(format!("默认AI提供商 {} 未配置", self.default_provider));
        }

        result
    }

    /// 调试模式下打印配置概况
    pub fn log_summary(&self) {
        if !self.debug_mode {
            return;
        }
        let validation = self.validate();
        let configured: Vec<&str> = self
            .configured_providers()
            .into_iter()
            .map(AiProvider::as_str)
            .collect();

        info!("{} v{}", self.app_name, self.app_version);
        info!("default provider: {}", self.default_provider);
        info!("configured providers: {}", configured.join(", "));
        debug!("deepseek: {:?}", self.deepseek);
        debug!("openai: {:?}", self.openai);
        for warning in &validation.warnings {
            warn!("config: {}", warning);
        }
        for err in &validation.errors {
            error!("config: {}", err);
        }
    }
}

/// 依次加载目录下的 `.env.local` 与 `.env`，文件不存在时忽略
pub fn load_dotenv_files(dir: &Path) {
    for name in [".env.local", ".env"] {
        let path = dir.join(name);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(()) => debug!("loaded environment from {}", path.display()),
                Err(e) => warn!("failed to load {}: {}", path.display(), e),
            }
        }
    }
}
