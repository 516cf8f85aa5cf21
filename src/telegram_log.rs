//! Forwards warnings and errors to a Telegram chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const MAX_ALERT_CHARS: usize = 4000;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Events from these targets are never forwarded: sending an alert goes
/// through them, so a failing send would feed itself.
const IGNORED_TARGETS: &[&str] = &["teloxide", "reqwest", "hyper", "h2", "rustls"];

pub struct TelegramAlertLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl TelegramAlertLayer {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    msg = rx.recv() => {
                        match msg {
                            Some(text) => {
                                buffer.push(text);
                                if buffer.len() >= 20 {
                                    flush_buffer(&bot, chat_id, &mut buffer).await;
                                }
                            }
                            None => {
                                flush_buffer(&bot, chat_id, &mut buffer).await;
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        flush_buffer(&bot, chat_id, &mut buffer).await;
                    }
                }
            }
        });

        Self { tx }
    }
}

/// Join buffered alerts into one message, capped at Telegram's limit.
fn batch(buffer: &[String]) -> String {
    let combined = buffer.join("\n");
    if combined.chars().count() > MAX_ALERT_CHARS {
        let truncated: String = combined.chars().take(MAX_ALERT_CHARS).collect();
        format!("{}...", truncated)
    } else {
        combined
    }
}

async fn flush_buffer(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let text = batch(buffer);
    buffer.clear();
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("Failed to send alert to Telegram: {e}");
    }
}

fn is_forwarded(level: Level, target: &str) -> bool {
    level <= Level::WARN && !IGNORED_TARGETS.iter().any(|t| target.starts_with(t))
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramAlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if !is_forwarded(level, metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor { message: String::new() };
        event.record(&mut visitor);

        let prefix = if level == Level::ERROR { "❌" } else { "⚠️" };
        if self.tx.send(format!("{} {}", prefix, visitor.message)).is_err() {
            eprintln!("Alert channel closed, message dropped");
        }
    }
}
