//! WebSocket Message Types
//!
//! Defines the frames pushed from the relay to dashboard clients.
//! Relayed telemetry is opaque: it leaves the relay exactly as it
//! arrived from the broker.

use axum::extract::ws::Message;
use bytes::Bytes;
use serde::Serialize;

/// A single outbound frame for a dashboard connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 payload, sent as a text frame
    Text(String),
    /// Non UTF-8 payload, sent as a binary frame
    Binary(Bytes),
}

impl Frame {
    /// Wrap an upstream payload without re-encoding it.
    ///
    /// Valid UTF-8 becomes a text frame, anything else is passed
    /// through as binary.
    pub fn from_payload(payload: Bytes) -> Self {
        match std::str::from_utf8(&payload) {
            Ok(text) => Frame::Text(text.to_owned()),
            Err(_) => Frame::Binary(payload),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    /// True for a zero-length payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into an axum WebSocket message
    pub fn into_message(self) -> Message {
        match self {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes.to_vec()),
        }
    }
}

/// Default reading shown by a dashboard before any telemetry arrives.
///
/// Sent once to every new connection. The shape matches the records
/// published by the posture sensor so the dashboard can render it with
/// the same code path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeroState {
    pub back_distance: u32,
    pub side_distance: u32,
    pub seat_distance: u32,
    pub posture_status: &'static str,
    pub good_time: u32,
    pub bad_time: u32,
    pub session_time: u32,
    pub posture_score: u32,
}

impl ZeroState {
    pub const fn new() -> Self {
        Self {
            back_distance: 0,
            side_distance: 0,
            seat_distance: 0,
            posture_status: "",
            good_time: 0,
            bad_time: 0,
            session_time: 0,
            posture_score: 0,
        }
    }

    /// Serialize into the text frame sent on connect
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::Text)
    }
}

impl Default for ZeroState {
    fn default() -> Self {
        Self::new()
    }
}
