//! Contact form intake.
//!
//! Submissions are validated, rate-limited per client, then handed to
//! the configured [`ContactSink`] and [`ContactNotifier`]. Durable
//! storage and email delivery are external collaborators; this module
//! defines the interfaces they present and ships an in-memory sink
//! and a logging notifier so the application runs without either.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/contact` | Submit the contact form |
//! | `GET` | `/api/admin/messages` | List recent submissions (admin) |

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Form, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::limit::client_key;
use crate::state::AppState;

/// An accepted contact-form submission.
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    /// Unique id assigned at acceptance.
    pub id: Uuid,
    /// Sender's name.
    pub name: String,
    /// Sender's email address.
    pub email: String,
    /// Message subject.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// When the submission was accepted.
    pub received_at: DateTime<Utc>,
}

/// The raw form body and its field limits.
#[derive(Debug, Deserialize, Validate)]
pub struct ContactForm {
    /// Sender's name (1-100 characters).
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// Sender's email address.
    #[validate(email, length(max = 254))]
    pub email: String,

    /// Message subject (1-200 characters).
    #[validate(length(min = 1, max = 200))]
    pub subject: String,

    /// Message body (1-2000 characters).
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

/// Errors a contact sink can produce.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink could not accept or return messages.
    #[error("contact sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for accepted contact messages.
///
/// The production deployment points this at a durable store; the
/// bundled [`MemoryContactSink`] keeps a bounded in-memory history.
pub trait ContactSink: Send + Sync {
    /// Store one accepted message.
    fn store(&self, message: ContactMessage) -> Result<(), SinkError>;

    /// Return up to `limit` messages, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<ContactMessage>, SinkError>;
}

/// Side-channel notification for accepted contact messages.
///
/// The production deployment points this at an email transport; the
/// bundled [`LogNotifier`] emits a structured log line instead.
pub trait ContactNotifier: Send + Sync {
    /// Notify about one accepted message. Failures must not reject
    /// the submission.
    fn notify(&self, message: &ContactMessage);
}

/// Bounded in-memory contact sink.
#[derive(Debug)]
pub struct MemoryContactSink {
    capacity: usize,
    messages: Mutex<VecDeque<ContactMessage>>,
}

impl MemoryContactSink {
    /// Create a sink retaining at most `capacity` messages; the
    /// oldest are discarded first.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ContactMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContactSink for MemoryContactSink {
    fn store(&self, message: ContactMessage) -> Result<(), SinkError> {
        let mut messages = self.lock();
        messages.push_back(message);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ContactMessage>, SinkError> {
        let messages = self.lock();
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }
}

/// Notifier that records accepted submissions in the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ContactNotifier for LogNotifier {
    fn notify(&self, message: &ContactMessage) {
        info!(
            id = %message.id,
            name = %message.name,
            subject = %message.subject,
            "contact form submission accepted"
        );
    }
}

// ---------------------------------------------------------------------------
// POST /api/contact -- submit the contact form
// ---------------------------------------------------------------------------

/// Accept a contact-form submission.
///
/// The rate limit is checked before validation, so every request
/// counts against the client's window whether or not it is accepted.
/// Field limits and the email shape are enforced after.
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ContactForm>,
) -> Result<impl IntoResponse, ApiError> {
    let key = client_key(&headers);
    state
        .contact
        .limiter
        .check(&key)
        .map_err(|retry_after_seconds| ApiError::RateLimited {
            retry_after_seconds,
        })?;

    form.validate()?;

    let message = ContactMessage {
        id: Uuid::new_v4(),
        name: form.name,
        email: form.email,
        subject: form.subject,
        body: form.message,
        received_at: state.clock.now(),
    };

    state.contact.notifier.notify(&message);
    state
        .contact
        .sink
        .store(message)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "message": "Thank you! Your message has been received.",
    })))
}

// ---------------------------------------------------------------------------
// GET /api/admin/messages -- list recent submissions
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/admin/messages` endpoint.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Maximum number of messages to return (default 50, cap 500).
    pub limit: Option<usize>,
}

/// Return recent contact messages, newest first. Requires the admin
/// credential.
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.require_admin(&headers)?;

    let limit = params.limit.unwrap_or(50).min(500);
    let messages = state
        .contact
        .sink
        .recent(limit)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn make_message(subject: &str) -> ContactMessage {
        ContactMessage {
            id: Uuid::new_v4(),
            name: String::from("Alice"),
            email: String::from("alice@example.com"),
            subject: subject.to_owned(),
            body: String::from("Hello"),
            received_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn memory_sink_returns_newest_first() {
        let sink = MemoryContactSink::new(10);
        sink.store(make_message("first")).unwrap();
        sink.store(make_message("second")).unwrap();

        let recent = sink.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.first().unwrap().subject, "second");
    }

    #[test]
    fn memory_sink_discards_oldest_beyond_capacity() {
        let sink = MemoryContactSink::new(2);
        sink.store(make_message("first")).unwrap();
        sink.store(make_message("second")).unwrap();
        sink.store(make_message("third")).unwrap();

        let recent = sink.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.first().unwrap().subject, "third");
        assert_eq!(recent.last().unwrap().subject, "second");
    }

    #[test]
    fn form_validation_enforces_field_limits() {
        let valid = ContactForm {
            name: String::from("Alice"),
            email: String::from("alice@example.com"),
            subject: String::from("Hi"),
            message: String::from("Hello"),
        };
        assert!(valid.validate().is_ok());

        let bad_email = ContactForm {
            email: String::from("not-an-email"),
            ..make_form()
        };
        assert!(bad_email.validate().is_err());

        let long_message = ContactForm {
            message: "x".repeat(2001),
            ..make_form()
        };
        assert!(long_message.validate().is_err());

        let empty_name = ContactForm {
            name: String::new(),
            ..make_form()
        };
        assert!(empty_name.validate().is_err());
    }

    fn make_form() -> ContactForm {
        ContactForm {
            name: String::from("Alice"),
            email: String::from("alice@example.com"),
            subject: String::from("Hi"),
            message: String::from("Hello"),
        }
    }
}
