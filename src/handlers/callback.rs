use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ParseMode};

use crate::handlers::HandlerResult;
use crate::handlers::ui::{CB_BACK, CB_STATS, StartView, stats_keyboard, stats_text};
use crate::stats::StatsLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Stats,
    Back,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            CB_STATS => Some(Self::Stats),
            CB_BACK => Some(Self::Back),
            _ => None,
        }
    }
}

/// Menu buttons. Both actions edit the message the button belongs to.
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    ledger: StatsLedger,
    start_view: Arc<StartView>,
) -> HandlerResult {
    let action = q.data.as_deref().and_then(CallbackAction::parse);
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(action), Some(message)) = (action, q.message.as_ref()) else {
        log::debug!("Ignoring callback query with data {:?}", q.data);
        return Ok(());
    };
    let (chat_id, message_id) = (message.chat().id, message.id());

    match action {
        CallbackAction::Stats => {
            // Shown as stored; only an approval rolls the counters over.
            let record = match ledger.load().await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    log::error!("Stats record is missing");
                    bot.send_message(chat_id, "❌ Database error.").await?;
                    return Ok(());
                }
                Err(e) => {
                    log::error!("Failed to get stats: {}", e);
                    bot.send_message(chat_id, "❌ Database error.").await?;
                    return Ok(());
                }
            };

            bot.edit_message_text(chat_id, message_id, stats_text(&record))
                .parse_mode(ParseMode::Html)
                .reply_markup(stats_keyboard())
                .await?;
        }
        CallbackAction::Back => {
            bot.edit_message_text(chat_id, message_id, start_view.text())
                .parse_mode(ParseMode::Html)
                .reply_markup(start_view.keyboard())
                .await?;
        }
    }

    Ok(())
}
