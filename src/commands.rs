//! Bot commands: `/start`, `/help`, `/reset`.

use teloxide::utils::command::BotCommands;
use tracing::warn;

use crate::assistant::{Assistant, ConversationId, FALLBACK_REPLY};

pub const GREETING: &str = "¡Hola! Soy Cristóbal, tu asistente. ¿En qué puedo ayudarte hoy?";

pub const HELP_TEXT: &str = "Puedo ayudarte con lo siguiente:\n\
/start - Iniciar la conversación\n\
/reset - Olvidar nuestra conversación anterior\n\
/help - Mostrar esta ayuda\n\n\
También puedo:\n\
• Consultar el tiempo actual en cualquier ciudad\n\
• Buscar las últimas noticias sobre un tema, categoría o país\n\n\
Simplemente escríbeme lo que necesites.";

pub const RESET_DONE: &str = "He olvidado nuestra conversación anterior. ¿En qué puedo ayudarte ahora?";
pub const RESET_EMPTY: &str = "No hay conversación que borrar.";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Comandos disponibles:")]
pub enum Command {
    #[command(description = "iniciar la conversación")]
    Start,
    #[command(description = "mostrar la ayuda")]
    Help,
    #[command(description = "olvidar la conversación")]
    Reset,
}

/// Reply to a command. Only `/reset` touches history.
pub fn command_reply(command: &Command, chat_id: ConversationId, assistant: &Assistant) -> String {
    match command {
        Command::Start => GREETING.to_string(),
        Command::Help => HELP_TEXT.to_string(),
        Command::Reset => match assistant.reset(chat_id) {
            Ok(0) => RESET_EMPTY.to_string(),
            Ok(_) => RESET_DONE.to_string(),
            Err(e) => {
                warn!("Reset failed for {}: {}", chat_id, e);
                FALLBACK_REPLY.to_string()
            }
        },
    }
}
