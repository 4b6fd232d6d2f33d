//! Platform-neutral event payloads
//!
//! The host maps its messaging platform's update types into these structs
//! before handing them to the scheduler. Only the fields the filter
//! constructors and command dispatch actually consult are carried.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Platform message id, unique within a chat.
    pub message_id: i64,
    /// Chat (group or private) the message was posted in.
    pub chat_id: i64,
    /// Sending user.
    pub from_id: i64,
    /// Message text; empty for non-text payloads.
    pub text: String,
}

impl MessageEvent {
    pub fn new(message_id: i64, chat_id: i64, from_id: i64, text: impl Into<String>) -> Self {
        Self {
            message_id,
            chat_id,
            from_id,
            text: text.into(),
        }
    }
}

/// An inline-keyboard callback query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Platform query id, used to answer the query.
    pub id: String,
    /// User who pressed the button.
    pub from_id: i64,
    /// Message the inline keyboard was attached to.
    pub message_id: i64,
    /// Opaque payload attached to the pressed button.
    pub data: String,
}

impl CallbackQuery {
    pub fn new(id: impl Into<String>, from_id: i64, message_id: i64, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from_id,
            message_id,
            data: data.into(),
        }
    }
}

/// A synthetic tick emitted by the scheduler's timer driver.
///
/// Carries only the instant it fired; deadline matching happens in
/// [`TimerFilter`](crate::event::TimerFilter), not in the event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub fired_at: Instant,
}

impl TimerEvent {
    pub fn now() -> Self {
        Self {
            fired_at: Instant::now(),
        }
    }
}
