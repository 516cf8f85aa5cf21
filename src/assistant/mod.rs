//! Assistant module - relays Telegram messages to Gemini, with weather and news tools.

pub mod database;
pub mod engine;
pub mod format;
pub mod gemini;
pub mod llm;
pub mod news;
pub mod store;
pub mod telegram;
pub mod tools;
pub mod turn;
pub mod weather;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use database::SqliteStore;
pub use engine::{Assistant, AssistantError, FALLBACK_REPLY};
pub use gemini::GeminiClient;
pub use news::NewsClient;
pub use store::{ConversationId, ConversationStore, MemoryStore, StoreError};
pub use telegram::TelegramClient;
pub use tools::Toolbox;
pub use weather::WeatherClient;
