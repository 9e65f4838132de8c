use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::commands::Command;
use crate::handlers::HandlerResult;
use crate::handlers::ui::StartView;
use crate::users::UserRegistry;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    registry: UserRegistry,
    start_view: Arc<StartView>,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            if let Some(user) = msg.from.as_ref() {
                match registry.upsert(user.id).await {
                    Ok(true) => log::info!("New user {} started the bot", user.id.0),
                    Ok(false) => {}
                    Err(e) => log::error!("Failed to register user {}: {}", user.id.0, e),
                }
            }

            bot.send_message(msg.chat.id, start_view.text())
                .parse_mode(ParseMode::Html)
                .reply_markup(start_view.keyboard())
                .await?;
        }
    };
    Ok(())
}
