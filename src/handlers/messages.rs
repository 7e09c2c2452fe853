use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::AbstractMessages;
use crate::models::{Message, MessageType, Reply};
use crate::state::AppState;
use crate::utils::error::{AppError, Result};
use crate::utils::response::{created, success};

/// How many messages the community board shows
pub const FEED_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply_text: String,
}

fn required_text(value: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(message.to_string()));
    }
    Ok(trimmed.to_string())
}

pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response> {
    let now = Utc::now();
    let message = Message {
        id: Uuid::new_v4(),
        user_id: user.id,
        message: required_text(&request.message, "Message cannot be empty")?,
        message_type: request.message_type,
        event_id: request.event_id,
        created_at: now,
        updated_at: now,
    };

    state.db.insert_message(&message).await?;
    tracing::info!(message_id = %message.id, user_id = %user.id, "message posted");

    Ok(created(message, "Message posted"))
}

pub async fn reply(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
    Json(request): Json<ReplyRequest>,
) -> Result<Response> {
    let reply = Reply {
        id: Uuid::new_v4(),
        message_id,
        user_id: user.id,
        reply_text: required_text(&request.reply_text, "Reply cannot be empty")?,
        created_at: Utc::now(),
    };

    state.db.insert_reply(&reply).await?;
    tracing::info!(%message_id, user_id = %user.id, "reply posted");

    Ok(created(reply, "Reply posted"))
}

pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Response> {
    let threads = state.db.fetch_recent_messages(FEED_LIMIT).await?;
    Ok(success(threads, "Community messages"))
}
