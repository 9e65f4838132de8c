use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, UserId};
use thiserror::Error;

use crate::commands::OwnerCommand;
use crate::config::Config;
use crate::handlers::HandlerResult;
use crate::handlers::broadcast::broadcast_command;
use crate::handlers::ui::users_text;
use crate::users::UserRegistry;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("caller {caller:?} is not the bot owner")]
pub struct Unauthorized {
    pub caller: Option<UserId>,
}

pub fn authorize(owner: UserId, caller: Option<UserId>) -> Result<UserId, Unauthorized> {
    match caller {
        Some(id) if id == owner => Ok(id),
        _ => Err(Unauthorized { caller }),
    }
}

// Check user ID instead of chat ID
pub fn authorize_message(owner: UserId, msg: &Message) -> Result<UserId, Unauthorized> {
    authorize(owner, msg.from.as_ref().map(|user| user.id))
}

/// Owner commands. Anyone else gets no reply at all.
pub async fn owner_command_handler(
    bot: Bot,
    msg: Message,
    cmd: OwnerCommand,
    config: Arc<Config>,
    registry: UserRegistry,
) -> HandlerResult {
    if let Err(denied) = authorize_message(config.owner_id, &msg) {
        log::debug!("Ignoring {:?}: {}", cmd, denied);
        return Ok(());
    }

    match cmd {
        OwnerCommand::Users => users_command(bot, msg, registry).await,
        OwnerCommand::Broadcast => broadcast_command(bot, msg, registry).await,
    }
}

async fn users_command(bot: Bot, msg: Message, registry: UserRegistry) -> HandlerResult {
    match registry.count().await {
        Ok(total) => {
            bot.send_message(msg.chat.id, users_text(total))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            log::error!("Failed to count users: {}", e);
            bot.send_message(msg.chat.id, "❌ Database error.").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn message_from(user_id: u64, reply_to: Option<serde_json::Value>) -> Message {
        let mut json = serde_json::json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": { "id": user_id, "type": "private", "first_name": "Tester" },
            "from": { "id": user_id, "is_bot": false, "first_name": "Tester" },
            "text": "/broadcast"
        });
        if let Some(reply) = reply_to {
            json["reply_to_message"] = reply;
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_owner_is_authorized() {
        assert_eq!(authorize(UserId(777), Some(UserId(777))), Ok(UserId(777)));
    }

    #[test]
    fn test_other_user_is_unauthorized() {
        assert_eq!(
            authorize(UserId(777), Some(UserId(555))),
            Err(Unauthorized { caller: Some(UserId(555)) })
        );
    }

    #[test]
    fn test_anonymous_sender_is_unauthorized() {
        assert_eq!(authorize(UserId(777), None), Err(Unauthorized { caller: None }));
    }

    #[test]
    fn test_authorize_message_uses_sender() {
        assert!(authorize_message(UserId(777), &message_from(777, None)).is_ok());
        assert!(authorize_message(UserId(777), &message_from(778, None)).is_err());
    }
}
