mod assistant;
mod commands;
mod config;
mod status;
mod telegram_log;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use assistant::{
    Assistant, ConversationStore, GeminiClient, MemoryStore, NewsClient, SqliteStore, TelegramClient, Toolbox,
    WeatherClient,
};
use commands::{Command, command_reply};
use config::Config;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    let _guard = match init_logging(&config, &bot) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging in {}: {e}", config.log_dir().display());
            std::process::exit(1);
        }
    };

    info!("🚀 Starting cristobal...");
    info!("Model: {} (temperature {})", config.gemini_model, config.gemini_temperature);

    let store: Arc<dyn ConversationStore> = match config.history_db_path() {
        Some(path) => match SqliteStore::open(&path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Cannot open history database {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            info!("History kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let assistant = match build_assistant(&config, store.clone()) {
        Ok(assistant) => Arc::new(assistant),
        Err(e) => {
            error!("Cannot build HTTP clients: {}", e);
            std::process::exit(1);
        }
    };
    let telegram = Arc::new(TelegramClient::new(bot.clone()));

    if config.status_port != 0 {
        let port = config.status_port;
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(port, store).await {
                warn!("Status server stopped: {e}");
            }
        });
    }

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register commands: {e}");
    }

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
        .branch(dptree::endpoint(handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![assistant, telegram])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Gemini plus both tool adapters, all sharing the configured timeout.
fn build_assistant(config: &Config, store: Arc<dyn ConversationStore>) -> Result<Assistant, reqwest::Error> {
    let gemini = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_temperature,
        config.http_timeout,
    )?;
    let toolbox = Toolbox::new(
        WeatherClient::new(config.open_weather_api_key.clone(), config.http_timeout)?,
        NewsClient::new(config.news_api_key.clone(), config.news_max_results, config.http_timeout)?,
    );
    Ok(Assistant::new(Arc::new(gemini), Arc::new(toolbox), store))
}

/// stdout + file, plus Telegram alerts when `LOG_CHAT_ID` is set.
fn init_logging(config: &Config, bot: &Bot) -> std::io::Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("cristobal.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let alerts = telegram_log::TelegramAlertLayer::new(bot.clone(), log_chat_id);
        registry.with(alerts).init();
    } else {
        registry.init();
    }

    Ok(guard)
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    assistant: Arc<Assistant>,
    telegram: Arc<TelegramClient>,
) -> ResponseResult<()> {
    info!("⌨️ [{}] {:?}", msg.chat.id, cmd);
    let reply = command_reply(&cmd, msg.chat.id.0, &assistant);
    telegram.send_reply(msg.chat.id.0, &reply, None).await.ok();
    Ok(())
}

/// Everything that is not a known command, including unknown `/commands`.
async fn handle_text(msg: Message, assistant: Arc<Assistant>, telegram: Arc<TelegramClient>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;

    telegram.send_typing(chat_id).await.ok();
    let reply = assistant.respond(chat_id, text).await;
    telegram.send_reply(chat_id, &reply, Some(msg.id.0)).await.ok();
    Ok(())
}
