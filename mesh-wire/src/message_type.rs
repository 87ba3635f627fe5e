use serde::{Deserialize, Serialize};

/// The message kind carried in the signed header. `Unknown` preserves any
/// wire byte decode doesn't recognize, so a minor-version peer can still
/// decode and relay a message type it doesn't itself understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Text,
    Control,
    File,
    Voice,
    StoreShare,
    RequestShare,
    ResponseShare,
    Heartbeat,
    Unknown(u8),
}

impl MessageType {
    pub fn to_byte(self) -> u8 {
        match self {
            MessageType::Text => 0,
            MessageType::Control => 1,
            MessageType::File => 2,
            MessageType::Voice => 3,
            MessageType::StoreShare => 4,
            MessageType::RequestShare => 5,
            MessageType::ResponseShare => 6,
            MessageType::Heartbeat => 7,
            MessageType::Unknown(b) => b,
        }
    }

    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => MessageType::Text,
            1 => MessageType::Control,
            2 => MessageType::File,
            3 => MessageType::Voice,
            4 => MessageType::StoreShare,
            5 => MessageType::RequestShare,
            6 => MessageType::ResponseShare,
            7 => MessageType::Heartbeat,
            other => MessageType::Unknown(other),
        }
    }

    /// Scheduling priority class implied by the message type, under the
    /// strict-priority order CONTROL > VOICE > TEXT > FILE. `StoreShare`,
    /// `RequestShare`, `ResponseShare` and `Heartbeat` ride with `Control`;
    /// unrecognized future types are scheduled as `Text`.
    pub fn priority_hint(self) -> PriorityHint {
        match self {
            MessageType::Control
            | MessageType::StoreShare
            | MessageType::RequestShare
            | MessageType::ResponseShare
            | MessageType::Heartbeat => PriorityHint::Control,
            MessageType::Voice => PriorityHint::Voice,
            MessageType::Text => PriorityHint::Text,
            MessageType::File => PriorityHint::File,
            MessageType::Unknown(_) => PriorityHint::Text,
        }
    }
}

/// Strict scheduling priority class. Not part of the signed header; derived
/// from `MessageType` for the benefit of the egress scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityHint {
    File,
    Text,
    Voice,
    Control,
}
