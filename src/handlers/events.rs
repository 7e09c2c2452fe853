use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attendance::{JoinOutcome, LeaveOutcome};
use crate::auth::AuthUser;
use crate::database::AbstractEvents;
use crate::models::{Event, EventStatus};
use crate::state::AppState;
use crate::utils::error::{AppError, Result};
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub location: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<Decimal>,
    #[serde(default)]
    pub longitude: Option<Decimal>,
    #[serde(default)]
    pub max_attendees: Option<i32>,
}

impl CreateEventRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Title is required");
        }
        if self.location.trim().is_empty() {
            errors.push("Location is required");
        }
        if matches!(self.end_time, Some(end) if end < self.start_time) {
            errors.push("End time cannot be before the start time");
        }
        if matches!(self.max_attendees, Some(max) if max <= 0) {
            errors.push("Maximum attendees must be a positive number");
        }
        if matches!(self.latitude, Some(lat) if lat.abs() > Decimal::from(90)) {
            errors.push("Latitude must be between -90 and 90");
        }
        if matches!(self.longitude, Some(lng) if lng.abs() > Decimal::from(180)) {
            errors.push("Longitude must be between -180 and 180");
        }
        if self.latitude.is_some() != self.longitude.is_some() {
            errors.push("Latitude and longitude must be given together");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(errors.join(", ")))
        }
    }
}

#[derive(Serialize)]
struct AttendancePayload<O: Serialize> {
    outcome: O,
    attendees: i32,
}

#[derive(Serialize)]
struct AttendanceStatus {
    attendees: i32,
    max_attendees: Option<i32>,
    is_attending: bool,
    is_organizer: bool,
}

fn not_available() -> AppError {
    AppError::NotFound("Event is not available".to_string())
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn load_event(state: &AppState, event_id: Uuid) -> Result<Event> {
    state.db.fetch_event(event_id).await?.ok_or_else(not_available)
}

pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<Response> {
    request.validate()?;

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        user_id: user.id,
        title: request.title.trim().to_string(),
        description: optional_text(&request.description),
        start_time: request.start_time,
        end_time: request.end_time,
        location: request.location.trim().to_string(),
        address: optional_text(&request.address),
        latitude: request.latitude,
        longitude: request.longitude,
        max_attendees: request.max_attendees,
        current_attendees: 0,
        status: EventStatus::Active,
        created_at: now,
        updated_at: now,
    };

    state.db.insert_event(&event).await?;
    tracing::info!(event_id = %event.id, user_id = %user.id, "event created");

    Ok(created(event, "Event created successfully"))
}

pub async fn list_events(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Response> {
    let events = state.db.fetch_upcoming_events(user.id, Utc::now()).await?;
    Ok(success(events, "Upcoming events"))
}

pub async fn get_event(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response> {
    let event = load_event(&state, event_id).await?;
    Ok(success(event, "Event found"))
}

/// Organizer only. Cancelling twice is a no-op.
pub async fn cancel_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response> {
    let mut event = load_event(&state, event_id).await?;

    if !event.is_organizer(user.id) {
        return Err(AppError::Forbidden(
            "Only the organizer can cancel this event".to_string(),
        ));
    }

    match event.status {
        EventStatus::Cancelled => {}
        EventStatus::Completed => {
            return Err(AppError::Conflict(
                "Completed events cannot be cancelled".to_string(),
            ));
        }
        EventStatus::Active => {
            if !state
                .db
                .update_event_status(event_id, EventStatus::Cancelled)
                .await?
            {
                return Err(not_available());
            }
            event.status = EventStatus::Cancelled;
            tracing::info!(%event_id, user_id = %user.id, "event cancelled");
        }
    }

    Ok(success(event, "Event cancelled"))
}

pub async fn join_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response> {
    let outcome = state.ledger.join(event_id, user.id).await?;

    let message = match outcome {
        JoinOutcome::EventNotFound => return Err(not_available()),
        JoinOutcome::Attending => "Successfully joined the event!",
        JoinOutcome::AlreadyAttending => "You are already attending this event",
        JoinOutcome::EventFull => "This event is full",
    };

    let attendees = state.ledger.attendee_count(event_id).await?.unwrap_or(0);
    Ok(success(AttendancePayload { outcome, attendees }, message))
}

pub async fn leave_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response> {
    let outcome = state.ledger.leave(event_id, user.id).await?;

    let message = match outcome {
        LeaveOutcome::Left => "Successfully left the event!",
        LeaveOutcome::WasNotAttending => "You were not attending this event",
    };

    let attendees = state.ledger.attendee_count(event_id).await?.unwrap_or(0);
    Ok(success(AttendancePayload { outcome, attendees }, message))
}

pub async fn attendance(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response> {
    let event = load_event(&state, event_id).await?;
    let status = AttendanceStatus {
        attendees: state
            .ledger
            .attendee_count(event_id)
            .await?
            .unwrap_or(event.current_attendees),
        max_attendees: event.max_attendees,
        is_attending: state.ledger.is_attending(event_id, user.id).await?,
        is_organizer: event.is_organizer(user.id),
    };
    Ok(success(status, "Attendance status"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateEventRequest {
        CreateEventRequest {
            title: "Street clean-up".to_string(),
            description: None,
            start_time: Utc::now(),
            end_time: None,
            location: "Elm Street".to_string(),
            address: None,
            latitude: None,
            longitude: None,
            max_attendees: Some(10),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let mut bad = request();
        bad.title = "  ".to_string();
        bad.location = String::new();
        match bad.validate() {
            Err(AppError::ValidationError(msg)) => {
                assert_eq!(msg, "Title is required, Location is required");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_capacity_must_be_positive() {
        let mut bad = request();
        bad.max_attendees = Some(0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut bad = request();
        bad.end_time = Some(bad.start_time - chrono::Duration::hours(1));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_coordinates_checked() {
        let mut bad = request();
        bad.latitude = Some(Decimal::from(91));
        bad.longitude = Some(Decimal::from(0));
        assert!(bad.validate().is_err());

        let mut half = request();
        half.latitude = Some(Decimal::from(51));
        assert!(half.validate().is_err());

        let mut good = request();
        good.latitude = Some(Decimal::new(515074, 4));
        good.longitude = Some(Decimal::new(-1278, 4));
        assert!(good.validate().is_ok());
    }
}
