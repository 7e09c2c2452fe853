use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    General,
    Announcement,
    Question,
    EventRelated,
}

/// A post on the community board.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub message_type: MessageType,
    /// Set when the post is about an event; cleared if the event is deleted
    pub event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reply {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub reply_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReplyView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub reply: Reply,
    pub author_name: String,
}

/// A message as the board shows it: author, reply count, and the replies
/// oldest first.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageThread {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub message: Message,
    pub author_name: String,
    pub reply_count: i64,
    #[sqlx(skip)]
    pub replies: Vec<ReplyView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_defaults_to_general() {
        assert_eq!(MessageType::default(), MessageType::General);
    }

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MessageType::EventRelated).unwrap(),
            "\"event_related\""
        );
        let parsed: MessageType = serde_json::from_str("\"announcement\"").unwrap();
        assert_eq!(parsed, MessageType::Announcement);
    }
}
