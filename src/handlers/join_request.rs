use chrono::Local;
use teloxide::prelude::*;
use teloxide::types::{ChatJoinRequest, ParseMode};

use crate::handlers::HandlerResult;
use crate::handlers::ui::approval_text;
use crate::stats::StatsLedger;

/// Approves every join request, counts it, then tries to greet the user.
pub async fn join_request_handler(bot: Bot, req: ChatJoinRequest, ledger: StatsLedger) -> HandlerResult {
    bot.approve_chat_join_request(req.chat.id, req.from.id).await?;

    let today = Local::now().date_naive();
    match ledger.record_approval(today).await {
        Ok(record) => log::info!(
            "Approved user {} in chat {} (today: {}, month: {}, total: {})",
            req.from.id.0,
            req.chat.id.0,
            record.today,
            record.month,
            record.total
        ),
        Err(e) => log::error!("Failed to record approval in chat {}: {}", req.chat.id.0, e),
    }

    let text = approval_text(&req.from.first_name, req.chat.title().unwrap_or("the chat"));
    // Best effort: a failed greeting is not reported to anyone.
    if let Err(e) = bot
        .send_message(req.user_chat_id, text)
        .parse_mode(ParseMode::Html)
        .await
    {
        log::debug!("Could not notify user {}: {}", req.from.id.0, e);
    }

    Ok(())
}
