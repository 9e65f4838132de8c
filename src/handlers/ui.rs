use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;

use crate::config::ConfigError;
use crate::stats::StatsRecord;

pub const CB_STATS: &str = "stats";
pub const CB_BACK: &str = "back";

pub const BTN_UPDATES: &str = "📢 Bot Updates";
pub const BTN_ADD_TO_GROUP: &str = "➕ Add To Group";
pub const BTN_ADD_TO_CHANNEL: &str = "➕ Add To Channel";
pub const BTN_STATISTICS: &str = "📊 Statistics";
pub const BTN_BACK: &str = "⬅ Back";

const ADMIN_RIGHTS: &str = "invite_users+manage_chat";

/// The welcome message and menu shown by `/start` and the back button.
#[derive(Debug, Clone)]
pub struct StartView {
    bot_username: String,
    updates_url: Url,
    add_to_group_url: Url,
    add_to_channel_url: Url,
}

impl StartView {
    pub fn new(bot_username: &str, updates_channel_url: &str) -> Result<Self, ConfigError> {
        let updates_url = Url::parse(updates_channel_url).map_err(|e| ConfigError::Malformed {
            key: "UPDATES_CHANNEL_URL",
            reason: e.to_string(),
        })?;
        let deep_link = |kind: &str| {
            Url::parse(&format!(
                "https://t.me/{}?{}=true&admin={}",
                bot_username, kind, ADMIN_RIGHTS
            ))
            .map_err(|e| ConfigError::Malformed {
                key: "BOT_TOKEN",
                reason: format!("bot username {:?} does not form a link: {}", bot_username, e),
            })
        };

        Ok(Self {
            bot_username: bot_username.to_string(),
            add_to_group_url: deep_link("startgroup")?,
            add_to_channel_url: deep_link("startchannel")?,
            updates_url,
        })
    }

    pub fn text(&self) -> String {
        format!(
            "Add <b>@{}</b> to your Channel/Group to auto accept join requests 😊",
            html::escape(&self.bot_username)
        )
    }

    pub fn keyboard(&self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(vec![
            vec![InlineKeyboardButton::url(BTN_UPDATES, self.updates_url.clone())],
            vec![
                InlineKeyboardButton::url(BTN_ADD_TO_GROUP, self.add_to_group_url.clone()),
                InlineKeyboardButton::url(BTN_ADD_TO_CHANNEL, self.add_to_channel_url.clone()),
            ],
            vec![InlineKeyboardButton::callback(BTN_STATISTICS, CB_STATS)],
        ])
    }
}

pub fn stats_text(record: &StatsRecord) -> String {
    format!(
        "📊 <b>Statistics</b>\n\n\
         Today Accepted: <code>{}</code>\n\
         Monthly Accepted: <code>{}</code>\n\
         Total Accepted: <code>{}</code>",
        record.today, record.month, record.total
    )
}

pub fn stats_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(BTN_BACK, CB_BACK)]])
}

pub fn approval_text(first_name: &str, chat_title: &str) -> String {
    format!(
        "Hello {},\n\nYour request to join <b>{}</b> has been approved.\n\nSend /start to use the bot.",
        html::escape(first_name),
        html::escape(chat_title)
    )
}

pub fn users_text(total: u64) -> String {
    format!("👥 Total Users (Started Bot): <code>{}</code>", total)
}
