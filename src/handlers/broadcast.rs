use std::future::Future;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode, UserId};

use crate::database::DatabaseError;
use crate::handlers::HandlerResult;
use crate::users::UserRegistry;

pub const NO_REPLY_ERROR: &str = "❌ Reply to a message to broadcast";

/// Handle to the message being broadcast. Recipients receive a copy, so the
/// payload never needs to be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastPayload {
    pub from_chat: ChatId,
    pub message_id: MessageId,
}

impl BroadcastPayload {
    pub fn from_reply(msg: &Message) -> Option<Self> {
        msg.reply_to_message().map(|source| Self {
            from_chat: source.chat.id,
            message_id: source.id,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: u64,
    pub removed: u64,
}

impl BroadcastReport {
    pub fn summary(&self) -> String {
        format!(
            "✅ Broadcast Completed\n\nSent: <code>{}</code>\nRemoved (Blocked): <code>{}</code>",
            self.sent, self.removed
        )
    }
}

/// Delivers a payload to one recipient.
pub trait PayloadSender {
    fn deliver(
        &self,
        recipient: UserId,
        payload: BroadcastPayload,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl PayloadSender for Bot {
    async fn deliver(&self, recipient: UserId, payload: BroadcastPayload) -> Result<(), RequestError> {
        self.copy_message(ChatId::from(recipient), payload.from_chat, payload.message_id)
            .await
            .map(|_| ())
    }
}

/// Sends `payload` to every registered user, one at a time. A failed send
/// means the user is unreachable and drops them from the registry.
pub async fn run_broadcast<S: PayloadSender>(
    sender: &S,
    registry: &UserRegistry,
    payload: BroadcastPayload,
) -> Result<BroadcastReport, DatabaseError> {
    let users = registry.all().await?;
    let mut report = BroadcastReport::default();

    for user_id in users {
        match sender.deliver(user_id, payload).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                log::warn!("Failed to send to {}, removing: {}", user_id.0, e);
                if let Err(db_err) = registry.remove(user_id).await {
                    log::error!("Failed to remove user {}: {}", user_id.0, db_err);
                }
                report.removed += 1;
            }
        }
    }

    Ok(report)
}

pub async fn broadcast_command(bot: Bot, msg: Message, registry: UserRegistry) -> HandlerResult {
    let Some(payload) = BroadcastPayload::from_reply(&msg) else {
        bot.send_message(msg.chat.id, NO_REPLY_ERROR).await?;
        return Ok(());
    };

    log::info!("Starting broadcast of message {} from chat {}", payload.message_id.0, payload.from_chat.0);

    match run_broadcast(&bot, &registry, payload).await {
        Ok(report) => {
            log::info!("Broadcast finished: sent {}, removed {}", report.sent, report.removed);
            bot.send_message(msg.chat.id, report.summary())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            log::error!("DB error: {}", e);
            bot.send_message(msg.chat.id, "❌ Database error.").await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::temp_pool;
    use crate::handlers::admin::tests::message_from;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use teloxide::ApiError;

    struct FakeSender {
        unreachable: HashSet<UserId>,
        delivered: Mutex<Vec<UserId>>,
    }

    impl FakeSender {
        fn failing_for(users: &[UserId]) -> Self {
            Self {
                unreachable: users.iter().copied().collect(),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl PayloadSender for FakeSender {
        async fn deliver(&self, recipient: UserId, _payload: BroadcastPayload) -> Result<(), RequestError> {
            if self.unreachable.contains(&recipient) {
                return Err(RequestError::Api(ApiError::BotBlocked));
            }
            self.delivered.lock().unwrap().push(recipient);
            Ok(())
        }
    }

    fn payload() -> BroadcastPayload {
        BroadcastPayload {
            from_chat: ChatId(777),
            message_id: MessageId(5),
        }
    }

    #[tokio::test]
    async fn test_failed_recipient_is_removed() {
        let (pool, _dir) = temp_pool().await;
        let registry = UserRegistry::new(pool);
        let (a, b, c) = (UserId(1), UserId(2), UserId(3));
        for user in [a, b, c] {
            registry.upsert(user).await.unwrap();
        }

        let sender = FakeSender::failing_for(&[b]);
        let report = run_broadcast(&sender, &registry, payload()).await.unwrap();

        assert_eq!(report, BroadcastReport { sent: 2, removed: 1 });
        assert_eq!(*sender.delivered.lock().unwrap(), vec![a, c]);
        assert_eq!(registry.all().await.unwrap(), vec![a, c]);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let (pool, _dir) = temp_pool().await;
        let registry = UserRegistry::new(pool);
        let sender = FakeSender::failing_for(&[]);

        let report = run_broadcast(&sender, &registry, payload()).await.unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_all_unreachable() {
        let (pool, _dir) = temp_pool().await;
        let registry = UserRegistry::new(pool);
        registry.upsert(UserId(1)).await.unwrap();
        registry.upsert(UserId(2)).await.unwrap();

        let sender = FakeSender::failing_for(&[UserId(1), UserId(2)]);
        let report = run_broadcast(&sender, &registry, payload()).await.unwrap();

        assert_eq!(report, BroadcastReport { sent: 0, removed: 2 });
        assert_eq!(registry.count().await.unwrap(), 0);
    }

    #[test]
    fn test_payload_requires_reply() {
        assert_eq!(BroadcastPayload::from_reply(&message_from(777, None)), None);
    }

    #[test]
    fn test_payload_points_at_replied_message() {
        let reply = serde_json::json!({
            "message_id": 3,
            "date": 1_699_999_000,
            "chat": { "id": 777, "type": "private", "first_name": "Tester" },
            "from": { "id": 777, "is_bot": false, "first_name": "Tester" },
            "text": "Big news"
        });
        let msg = message_from(777, Some(reply));
        assert_eq!(
            BroadcastPayload::from_reply(&msg),
            Some(BroadcastPayload {
                from_chat: ChatId(777),
                message_id: MessageId(3),
            })
        );
    }

    #[test]
    fn test_summary() {
        let text = BroadcastReport { sent: 2, removed: 1 }.summary();
        assert!(text.contains("Sent: <code>2</code>"));
        assert!(text.contains("Removed (Blocked): <code>1</code>"));
    }
}
