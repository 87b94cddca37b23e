use sqlx::{Pool, Sqlite};

use crate::db::{
    ConversationListing, ConversationRepository, MembershipRepository, Message,
    MessageRepository, SummaryRepository,
};
use crate::error::AppError;
use crate::realtime::{Hub, ServerEvent};

/// Orchestrates the messaging core: every send runs the
/// append → summary refresh → fan-out sequence. The three steps are
/// not atomic; a reader can observe the message before the summary
/// catches up, and the reconciliation pass repairs a summary left
/// stale by a failed refresh.
#[derive(Clone)]
pub struct ChatService {
    db: Pool<Sqlite>,
    hub: Hub,
}

impl ChatService {
    pub fn new(db: Pool<Sqlite>, hub: Hub) -> Self {
        Self { db, hub }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Append a message to a conversation, update its summary, and
    /// push it to every subscribed connection.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<Message, AppError> {
        // Reject before any write
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation(
                "Message body must not be empty".to_string(),
            ));
        }
        if sender_id.is_empty() {
            return Err(AppError::Validation("Missing sender id".to_string()));
        }

        ConversationRepository::get(&self.db, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room does not exist".to_string()))?;

        if !MembershipRepository::is_member(&self.db, sender_id, conversation_id).await? {
            return Err(AppError::Permission(format!(
                "{} is not a member of this conversation",
                sender_id
            )));
        }

        let message = MessageRepository::append(&self.db, conversation_id, sender_id, body).await?;

        // The append already succeeded; a refresh failure is surfaced
        // rather than swallowed, and the reconciliation job will
        // repair the projection.
        SummaryRepository::refresh(&self.db, &message).await?;

        self.hub
            .broadcast(conversation_id, ServerEvent::new_group_message(&message))
            .await;

        Ok(message)
    }

    /// Create a group room. Member set is `members` ∪ {creator},
    /// deduplicated; memberships appear all-or-nothing.
    pub async fn create_room(
        &self,
        name: &str,
        creator_id: &str,
        members: &[String],
    ) -> Result<String, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Room name must not be empty".to_string()));
        }
        if creator_id.is_empty() {
            return Err(AppError::Validation("Missing creator id".to_string()));
        }

        ConversationRepository::create_room(&self.db, name.trim(), creator_id, members).await
    }

    /// Idempotent: joining a room the user already belongs to is a
    /// no-op, not an error.
    pub async fn join_room(&self, room_id: &str, user_id: &str) -> Result<(), AppError> {
        ConversationRepository::get(&self.db, room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room does not exist".to_string()))?;

        MembershipRepository::add(&self.db, user_id, room_id).await
    }

    /// Get or create the direct conversation between two users.
    pub async fn ensure_direct_chat(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<String, AppError> {
        if user_a.is_empty() || user_b.is_empty() {
            return Err(AppError::Validation("Missing user id".to_string()));
        }
        if user_a == user_b {
            return Err(AppError::Validation(
                "A direct chat needs two distinct users".to_string(),
            ));
        }

        ConversationRepository::ensure_direct(&self.db, user_a, user_b).await
    }

    pub async fn list_messages(
        &self,
        conversation_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<Message>, AppError> {
        ConversationRepository::get(&self.db, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room does not exist".to_string()))?;

        MessageRepository::list(&self.db, conversation_id, since).await
    }

    /// Mark everything the other party sent as read. Only direct
    /// chats carry delivery status; group rooms are rejected. The
    /// reader must be a member.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<u64, AppError> {
        let conversation = ConversationRepository::get(&self.db, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room does not exist".to_string()))?;

        if !conversation.kind.is_direct() {
            return Err(AppError::Validation(
                "Read status only applies to direct chats".to_string(),
            ));
        }

        if !MembershipRepository::is_member(&self.db, reader_id, conversation_id).await? {
            return Err(AppError::Permission(format!(
                "{} is not a member of this conversation",
                reader_id
            )));
        }

        MessageRepository::mark_read(&self.db, conversation_id, reader_id).await
    }

    pub async fn list_conversations_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationListing>, AppError> {
        MembershipRepository::list_for_user(&self.db, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, ConversationKind, MessageStatus};

    async fn service() -> ChatService {
        ChatService::new(db::test_pool().await, Hub::new(8))
    }

    #[tokio::test]
    async fn test_create_room_membership_cardinality() {
        let svc = service().await;
        let room_id = svc
            .create_room("General", "u1", &["u2".to_string(), "u3".to_string()])
            .await
            .unwrap();

        let conversation = ConversationRepository::get(&svc.db, &room_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.kind, ConversationKind::Group);
        assert_eq!(conversation.created_by.as_deref(), Some("u1"));

        let members = ConversationRepository::members(&svc.db, &room_id)
            .await
            .unwrap();
        assert_eq!(members, vec!["u1", "u2", "u3"]);
        assert_eq!(
            MembershipRepository::count_for_conversation(&svc.db, &room_id)
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_create_room_deduplicates_creator() {
        let svc = service().await;
        let room_id = svc
            .create_room("General", "u1", &["u1".to_string(), "u2".to_string()])
            .await
            .unwrap();

        assert_eq!(
            MembershipRepository::count_for_conversation(&svc.db, &room_id)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_join_room_is_idempotent() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        svc.join_room(&room_id, "u2").await.unwrap();
        svc.join_room(&room_id, "u2").await.unwrap();

        assert_eq!(
            MembershipRepository::count_for_conversation(&svc.db, &room_id)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_join_missing_room_fails() {
        let svc = service().await;
        let err = svc.join_room("nope", "u1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_updates_summary() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        svc.send_message(&room_id, "u1", "first").await.unwrap();
        let message = svc.send_message(&room_id, "u1", "second").await.unwrap();

        let summary = SummaryRepository::get(&svc.db, &room_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.last_body.as_deref(), Some("second"));
        assert_eq!(summary.last_sender.as_deref(), Some("u1"));
        assert_eq!(summary.last_timestamp, Some(message.created_at));
    }

    #[tokio::test]
    async fn test_empty_body_rejected_before_any_write() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        let err = svc.send_message(&room_id, "u1", "   \n\t").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(MessageRepository::count(&svc.db, &room_id).await.unwrap(), 0);
        let summary = SummaryRepository::get(&svc.db, &room_id)
            .await
            .unwrap()
            .unwrap();
        assert!(summary.last_body.is_none());
    }

    #[tokio::test]
    async fn test_non_member_sender_rejected() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        let err = svc.send_message(&room_id, "intruder", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Permission(_)));
        assert_eq!(MessageRepository::count(&svc.db, &room_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_to_missing_conversation_fails() {
        let svc = service().await;
        let err = svc.send_message("nope", "u1", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fanout_delivers_exactly_one_push() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        let mut sub = svc.hub().subscribe(&room_id).await.unwrap();
        svc.send_message(&room_id, "u1", "hello room").await.unwrap();

        match sub.recv().await.unwrap() {
            ServerEvent::NewGroupMessage { content, sender_id, .. } => {
                assert_eq!(content, "hello room");
                assert_eq!(sender_id, "u1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(sub.try_recv().is_none(), "pushed more than once");
        sub.cancel().await;
    }

    #[tokio::test]
    async fn test_direct_chat_get_or_create() {
        let svc = service().await;
        let first = svc.ensure_direct_chat("bob", "alice").await.unwrap();
        let second = svc.ensure_direct_chat("alice", "bob").await.unwrap();
        assert_eq!(first, second);

        let members = ConversationRepository::members(&svc.db, &first)
            .await
            .unwrap();
        assert_eq!(members, vec!["alice", "bob"]);

        let conversation = ConversationRepository::get(&svc.db, &first)
            .await
            .unwrap()
            .unwrap();
        assert!(conversation.kind.is_direct());
    }

    #[tokio::test]
    async fn test_mark_read_transitions_other_partys_messages() {
        let svc = service().await;
        let chat_id = svc.ensure_direct_chat("alice", "bob").await.unwrap();

        svc.send_message(&chat_id, "alice", "hi bob").await.unwrap();
        svc.send_message(&chat_id, "bob", "hi alice").await.unwrap();

        let updated = svc.mark_read(&chat_id, "bob").await.unwrap();
        assert_eq!(updated, 1);

        let messages = svc.list_messages(&chat_id, None).await.unwrap();
        let alice_msg = messages.iter().find(|m| m.sender_id == "alice").unwrap();
        let bob_msg = messages.iter().find(|m| m.sender_id == "bob").unwrap();
        assert_eq!(alice_msg.status, MessageStatus::Read);
        assert_eq!(bob_msg.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn test_mark_read_rejected_for_group_rooms() {
        let svc = service().await;
        let room_id = svc
            .create_room("General", "u1", &["u2".to_string(), "u3".to_string()])
            .await
            .unwrap();

        svc.send_message(&room_id, "u1", "hi all").await.unwrap();

        let err = svc.mark_read(&room_id, "u2").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Group messages keep their status untouched
        let messages = svc.list_messages(&room_id, None).await.unwrap();
        assert!(messages.iter().all(|m| m.status == MessageStatus::Sent));
    }

    #[tokio::test]
    async fn test_mark_read_on_missing_conversation_fails() {
        let svc = service().await;
        let err = svc.mark_read("nope", "u1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_messages_since_cursor() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        svc.send_message(&room_id, "u1", "one").await.unwrap();
        let second = svc.send_message(&room_id, "u1", "two").await.unwrap();
        svc.send_message(&room_id, "u1", "three").await.unwrap();

        let all = svc.list_messages(&room_id, None).await.unwrap();
        assert_eq!(
            all.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
        // Timestamps never decrease along the log
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let tail = svc
            .list_messages(&room_id, Some(second.created_at))
            .await
            .unwrap();
        assert!(tail.iter().all(|m| m.created_at >= second.created_at));
        assert!(tail.iter().any(|m| m.content == "three"));
    }

    #[tokio::test]
    async fn test_listing_orders_by_recent_activity() {
        let svc = service().await;
        let older = svc.create_room("Older", "u1", &[]).await.unwrap();
        let newer = svc.create_room("Newer", "u1", &[]).await.unwrap();

        // Keep the bump strictly after the second room's creation
        // even at millisecond resolution.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        svc.send_message(&older, "u1", "bump").await.unwrap();

        let listings = svc.list_conversations_for("u1").await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].id, older);
        assert_eq!(listings[0].last_body.as_deref(), Some("bump"));
        assert_eq!(listings[1].id, newer);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_stale_summary() {
        let svc = service().await;
        let room_id = svc.create_room("General", "u1", &[]).await.unwrap();

        // Bypass the service to simulate an append whose summary
        // refresh never happened.
        MessageRepository::append(&svc.db, &room_id, "u1", "orphaned")
            .await
            .unwrap();
        let summary = SummaryRepository::get(&svc.db, &room_id)
            .await
            .unwrap()
            .unwrap();
        assert!(summary.last_body.is_none());

        SummaryRepository::reconcile(&svc.db).await.unwrap();

        let summary = SummaryRepository::get(&svc.db, &room_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.last_body.as_deref(), Some("orphaned"));
    }
}
