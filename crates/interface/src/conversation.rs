use std::collections::HashMap;

/// One attributed utterance in a diarized conversation.
///
/// `position` is a 1-based ordinal that stays stable across incremental
/// merges; analyzed statements anchor to it via `msg_index`. Timestamps
/// are null until assigned (either by the service or synthetically on the
/// client) and are display-only.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Message {
    pub speaker: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
}

impl Message {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            position: None,
            start_ms: None,
            end_ms: None,
        }
    }
}

/// A timed caption segment from an external source (e.g. an imported video
/// transcript), passed alongside the text so the diarization service can
/// anchor real timestamps.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct TimedSegment {
    pub start_ms: i64,
    pub text: String,
}

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub struct DiarizeRequest {
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<TimedSegment>>,
}

/// Diarization service response. A failed pass reports `error` instead of
/// data; callers must treat its presence as "no update this cycle".
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct DiarizeResponse {
    /// Speaker identifier → display name. Names may be empty while the
    /// service has not yet learned a real one.
    #[serde(default)]
    pub speakers: HashMap<String, String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
