use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tokio_util::sync::CancellationToken;

use lovechat::api::chat_server::{router, ServerState};
use lovechat::api::completion_client::{ChatApiClient, CompletionClient, ReplyBackend};
use lovechat::api::config_manager::AppConfig;
use lovechat::api::data_models::{Gender, IntimacyLevel};
use lovechat::api::history_store::HistoryStore;
use lovechat::api::prompt_builder::PromptBuilder;
use lovechat::api::reply_engine::ReplyEngine;
use lovechat::api::typewriter::{RevealOutcome, TerminalSink, Typewriter};

/// 首页"最近记录"默认展示的条数
const RECENT_SHOWN: usize = 3;

#[derive(Parser)]
#[command(name = "lovechat")]
#[command(about = "恋爱聊天神器：让每句话都说到心坎里", version)]
struct Args {
    /// Directory holding the local chat history
    #[arg(long, global = true, env = "LOVECHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the /api/chat HTTP endpoint
    Serve {
        #[arg(long, default_value = "127.0.0.1", env = "HOST")]
        host: String,

        #[arg(long, default_value_t = 3000, env = "PORT")]
        port: u16,
    },
    /// Draft three replies to a message from your partner
    Reply {
        /// The partner's message; read from stdin when omitted
        message: Option<String>,

        /// Relationship stage, 1 (刚认识) to 10 (灵魂伴侣); out-of-range values are clamped
        #[arg(long, short = 'l', default_value = "5", allow_negative_numbers = true)]
        level: IntimacyLevel,

        /// Your own gender: male or female
        #[arg(long, short = 'g', default_value = "male")]
        gender: Gender,

        /// Base URL of a running `lovechat serve`
        #[arg(long, default_value = "http://127.0.0.1:3000", env = "LOVECHAT_SERVER")]
        server: String,

        /// Call the upstream provider directly instead of going through /api/chat
        #[arg(long)]
        direct: bool,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        /// Print replies at once instead of typing them out
        #[arg(long)]
        no_animation: bool,
    },
    /// Show or clear the recent history
    History {
        /// List all stored entries instead of the latest three
        #[arg(long)]
        all: bool,

        /// Show the replies of the entry at this position (1 = most recent)
        #[arg(long)]
        show: Option<usize>,

        /// Delete the stored history
        #[arg(long)]
        clear: bool,
    },
    /// Print the resolved configuration and its validation result
    Config,
    /// List the relationship stages
    Levels,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lovechat")
}

fn init_logging(config: &AppConfig) {
    let default_level = if config.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    init_logging(&config);
    config.log_summary();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    match args.command {
        Commands::Serve { host, port } => serve(&config, &host, port).await,
        Commands::Reply {
            message,
            level,
            gender,
            server,
            direct,
            model,
            temperature,
            no_animation,
        } => {
            // 直连时按生效的提供商；经由服务端时与服务端的 deepseek 配置一致
            let provider = if direct {
                config.direct_provider()
            } else {
                &config.deepseek
            };
            let backend: Arc<dyn ReplyBackend> = if direct {
                Arc::new(CompletionClient::new(provider.clone())?)
            } else {
                Arc::new(ChatApiClient::new(&server)?)
            };
            let mut engine =
                ReplyEngine::from_config(backend, HistoryStore::load(&data_dir), provider);
            if no_animation {
                engine = engine.with_typewriter(Typewriter::instant());
            }
            if let Some(model) = model {
                engine = engine.with_model(model);
            }
            if let Some(temperature) = temperature {
                engine = engine.with_temperature(temperature);
            }

            let message = match message {
                Some(m) => m,
                None => read_stdin()?,
            };
            reply(&mut engine, &message, level, gender).await
        }
        Commands::History { all, show, clear } => history(&data_dir, all, show, clear),
        Commands::Config => {
            print_config(&config);
            Ok(())
        }
        Commands::Levels => {
            for level in IntimacyLevel::all() {
                println!("{:>2}  {}", level, PromptBuilder::label(level));
            }
            Ok(())
        }
    }
}

async fn serve(config: &AppConfig, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;

    if !config.deepseek.is_configured() {
        log::warn!("DEEPSEEK_API_KEY is not set; /api/chat will answer 500 until it is configured");
    }

    let client = CompletionClient::new(config.deepseek.clone())?;
    let app = router(ServerState::new(Arc::new(client)).with_model(config.deepseek.model.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read message from stdin")?;
    Ok(buf)
}

async fn reply(
    engine: &mut ReplyEngine,
    message: &str,
    level: IntimacyLevel,
    gender: Gender,
) -> Result<()> {
    if let Err(e) = ReplyEngine::validate_input(message) {
        bail!("{}（例如：{}）", e.user_message(), gender.input_example());
    }

    println!("关系阶段: {}", PromptBuilder::label(level));
    println!("{}说: {}", if gender == Gender::Male { "她" } else { "他" }, message.trim());
    println!();

    // Ctrl-C 中止展示，相当于界面上的重置
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let mut sink = TerminalSink::new(std::io::stdout());
    let outcome = engine
        .generate(message, level, gender, &mut sink, &cancel)
        .await?;

    if outcome.reveal == RevealOutcome::Cancelled {
        eprintln!("已重置");
        return Ok(());
    }
    if let Some(err) = &outcome.error {
        eprintln!("\n{}", err.user_message());
    }
    Ok(())
}

fn history(data_dir: &std::path::Path, all: bool, show: Option<usize>, clear: bool) -> Result<()> {
    let mut store = HistoryStore::load(data_dir);

    if clear {
        store.clear()?;
        println!("历史记录已清空");
        return Ok(());
    }

    if store.is_empty() {
        println!("暂无记录");
        return Ok(());
    }

    if let Some(position) = show {
        let entry = position
            .checked_sub(1)
            .and_then(|i| store.get(i))
            .with_context(|| format!("no history entry at position {}", position))?;
        println!("关系阶段: {}", PromptBuilder::label(entry.intimacy_level));
        println!("对方: {}", entry.input);
        println!("{}", entry.local_time());
        println!("AI回复:");
        for (i, reply) in entry.replies.iter().enumerate() {
            println!("  {}. {}", i + 1, reply);
        }
        return Ok(());
    }

    let entries = if all {
        store.entries()
    } else {
        store.recent(RECENT_SHOWN)
    };
    println!("最近记录");
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "[{}] {}  关系阶段: {}\n    对方: {}",
            i + 1,
            entry.local_time(),
            PromptBuilder::label(entry.intimacy_level),
            entry.input
        );
    }
    Ok(())
}

fn print_config(config: &AppConfig) {
    let validation = config.validate();
    println!("{} v{}", config.app_name, config.app_version);
    println!("default provider: {}", config.default_provider);
    println!("effective provider: {}", config.effective_provider());
    let configured: Vec<String> = config
        .configured_providers()
        .into_iter()
        .map(|p| p.to_string())
        .collect();
    println!("configured providers: {}", configured.join(", "));
    println!("deepseek: {} ({})", config.deepseek.base_url, config.deepseek.model);
    println!("openai: {} ({})", config.openai.base_url, config.openai.model);
    for warning in &validation.warnings {
        println!("warning: {}", warning);
    }
    for error in &validation.errors {
        println!("error: {}", error);
    }
}
