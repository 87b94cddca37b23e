pub mod models;
pub mod conversations;
pub mod memberships;
pub mod messages;
pub mod summaries;
pub mod users;

pub use models::{
    Conversation, ConversationKind, ConversationListing, ConversationSummary, Message,
    MessageStatus, User,
};
pub use conversations::ConversationRepository;
pub use memberships::MembershipRepository;
pub use messages::MessageRepository;
pub use summaries::SummaryRepository;
pub use users::UserRepository;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::Pool<sqlx::Sqlite> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
