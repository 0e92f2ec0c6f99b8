//! The aggregate session state, owned by one controller and passed by
//! reference to the merge components. No ambient globals.

use std::collections::HashMap;

use argmap_interface::{Message, Statement};

use crate::id::{IdGenerator, UuidIdGen};
use crate::speakers::SpeakerRegistry;

/// Accumulated diarization output: the client-side mirror of everything the
/// diarization service has produced so far this session. Messages are
/// append-only across incremental merges within a session.
#[derive(Debug, Clone, Default)]
pub struct DiarizedTranscript {
    pub speakers: HashMap<String, String>,
    pub messages: Vec<Message>,
}

impl DiarizedTranscript {
    /// Look up a message by its stable position. A dangling reference (the
    /// anchored message was dropped by a later full pass) yields `None`,
    /// which renderers treat as "no timestamp available", not an error.
    pub fn message_at(&self, position: u32) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.position == Some(position))
    }
}

/// Everything a renderer needs to draw the session, cloned out from under
/// the controller's lock.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub slug: Option<String>,
    pub source_url: Option<String>,
    pub source_title: Option<String>,
    pub transcript: String,
    pub diarization: Option<DiarizedTranscript>,
    pub statements: Vec<Statement>,
    pub speaker_names: HashMap<String, String>,
    pub finalized: bool,
}

pub struct SessionState {
    pub slug: Option<String>,
    pub source_url: Option<String>,
    pub source_title: Option<String>,

    /// Latest full transcription text.
    pub transcript: String,
    pub diarization: Option<DiarizedTranscript>,
    pub statements: Vec<Statement>,

    /// Cursor: text already folded into `diarization`.
    pub last_diarized_text: String,
    /// Cursor: numbered transcript already folded into `statements`.
    pub last_analyzed_transcript: String,

    pub diarize_calls: u64,
    /// Consecutive incremental analysis calls since the last full pass.
    pub analyze_calls: u64,

    pub speakers: SpeakerRegistry,
    pub ids: Box<dyn IdGenerator>,

    pub finalized: bool,
    /// Bumped on reset. Responses planned under an older epoch are stale
    /// and must be discarded instead of applied.
    pub epoch: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::with_ids(Box::new(UuidIdGen))
    }

    pub fn with_ids(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            slug: None,
            source_url: None,
            source_title: None,
            transcript: String::new(),
            diarization: None,
            statements: Vec::new(),
            last_diarized_text: String::new(),
            last_analyzed_transcript: String::new(),
            diarize_calls: 0,
            analyze_calls: 0,
            speakers: SpeakerRegistry::new(),
            ids,
            finalized: false,
            epoch: 0,
        }
    }

    /// Clear everything session-scoped and advance the epoch so in-flight
    /// responses for the old session are recognized as stale. The id
    /// generator survives: identifiers are never reused.
    pub fn reset(&mut self) {
        self.slug = None;
        self.source_url = None;
        self.source_title = None;
        self.transcript.clear();
        self.diarization = None;
        self.statements.clear();
        self.last_diarized_text.clear();
        self.last_analyzed_transcript.clear();
        self.diarize_calls = 0;
        self.analyze_calls = 0;
        self.speakers.reset();
        self.finalized = false;
        self.epoch += 1;
    }

    /// Reconstruct the numbered transcript fed to statement analysis, one
    /// `[pos] (speaker_id) DisplayName: text` line per message. Falls back
    /// to the raw transcript before any diarization has happened.
    pub fn numbered_transcript(&self) -> String {
        let Some(diarization) = &self.diarization else {
            return self.transcript.clone();
        };
        diarization
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let pos = m.position.unwrap_or(i as u32 + 1);
                let name = self.speakers.resolve(&m.speaker);
                format!("[{pos}] ({}) {}: {}", m.speaker, name, m.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain `DisplayName: text` rendering of the diarized messages, used
    /// as the visible transcript when seeding from persisted data.
    pub fn labeled_transcript(&self) -> String {
        let Some(diarization) = &self.diarization else {
            return self.transcript.clone();
        };
        diarization
            .messages
            .iter()
            .map(|m| format!("{}: {}", self.speakers.resolve(&m.speaker), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            slug: self.slug.clone(),
            source_url: self.source_url.clone(),
            source_title: self.source_title.clone(),
            transcript: self.transcript.clone(),
            diarization: self.diarization.clone(),
            statements: self.statements.clone(),
            speaker_names: self.speakers.names(),
            finalized: self.finalized,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn positioned(speaker: &str, text: &str, pos: u32) -> Message {
        let mut m = Message::new(speaker, text);
        m.position = Some(pos);
        m
    }

    #[test]
    fn numbered_transcript_renders_positions_ids_and_names() {
        let mut state = SessionState::new();
        let speakers: HashMap<String, String> =
            [("s1".to_string(), "Alice".to_string())].into();
        state.speakers.absorb(&speakers);
        state.diarization = Some(DiarizedTranscript {
            speakers,
            messages: vec![positioned("s1", "Hi", 1), positioned("s2", "No", 2)],
        });

        let text = state.numbered_transcript();
        assert_eq!(text, "[1] (s1) Alice: Hi\n[2] (s2) s2: No");
    }

    #[test]
    fn numbered_transcript_falls_back_to_ordinal_positions() {
        let mut state = SessionState::new();
        state.diarization = Some(DiarizedTranscript {
            speakers: HashMap::new(),
            messages: vec![Message::new("s1", "a"), Message::new("s1", "b")],
        });
        assert!(state.numbered_transcript().starts_with("[1]"));
        assert!(state.numbered_transcript().contains("[2]"));
    }

    #[test]
    fn without_diarization_the_raw_transcript_is_used() {
        let mut state = SessionState::new();
        state.transcript = "raw text".into();
        assert_eq!(state.numbered_transcript(), "raw text");
        assert_eq!(state.labeled_transcript(), "raw text");
    }

    #[test]
    fn dangling_position_lookup_is_none() {
        let diarization = DiarizedTranscript {
            speakers: HashMap::new(),
            messages: vec![positioned("s1", "hi", 1)],
        };
        assert!(diarization.message_at(1).is_some());
        assert!(diarization.message_at(9).is_none());
    }

    #[test]
    fn reset_bumps_epoch_and_clears_state() {
        let mut state = SessionState::new();
        state.transcript = "something".into();
        state.diarize_calls = 7;
        state.finalized = true;
        let epoch = state.epoch;

        state.reset();
        assert_eq!(state.epoch, epoch + 1);
        assert!(state.transcript.is_empty());
        assert_eq!(state.diarize_calls, 0);
        assert!(!state.finalized);
    }
}
