use std::collections::HashMap;

use crate::conversation::Message;
use crate::statement::Statement;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SessionHandle {
    pub slug: String,
    pub id: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct TranscriptMeta {
    pub id: i64,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub source_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct TranscriptListItem {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SpeakerInfo {
    pub name: String,
    #[serde(default)]
    pub auto_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// A persisted conversation, as returned when resuming by slug.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct TranscriptDetail {
    pub transcript: TranscriptMeta,
    #[serde(default)]
    pub speakers: HashMap<String, String>,
    #[serde(default)]
    pub speaker_info: HashMap<String, SpeakerInfo>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SpeakerSummary {
    pub id: i64,
    pub name: String,
    pub conversation_count: u32,
    pub claim_count: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SpeakerConversation {
    pub slug: String,
    pub title: String,
    pub created_at: String,
    pub claim_count: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SpeakerDetail {
    pub name: String,
    #[serde(default)]
    pub conversations: Vec<SpeakerConversation>,
}

/// A generated sample conversation used to seed a session without audio.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SampleResponse {
    #[serde(default)]
    pub speakers: HashMap<String, String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub struct TranscriptSpeakersUpdate {
    pub speakers: HashMap<String, String>,
    pub speaker_auto_gen: HashMap<String, bool>,
}

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub struct SourceImportRequest {
    pub url: String,
    pub title_only: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct SourceImportResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
