//! Live channel events
//!
//! Frames are JSON text: `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Server-pushed events the client reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    SkillUpdated,
    TrendAlert,
    QuizCompleted,
    LearningProgress,
}

impl EventName {
    pub const ALL: [Self; 4] = [
        Self::SkillUpdated,
        Self::TrendAlert,
        Self::QuizCompleted,
        Self::LearningProgress,
    ];

    /// Name used on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SkillUpdated => "skill_updated",
            Self::TrendAlert => "trend_alert",
            Self::QuizCompleted => "quiz_completed",
            Self::LearningProgress => "learning_progress",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame on the live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Known event name, if any
    pub fn name(&self) -> Option<EventName> {
        EventName::from_name(&self.event)
    }
}
