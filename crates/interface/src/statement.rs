use std::collections::HashMap;

use crate::conversation::Message;

/// The closed set of statement categories the analysis service emits.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    specta::Type,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatementKind {
    Claim,
    Response,
    Question,
    Agreement,
    Rebuttal,
    Tangent,
    Clarification,
    Evidence,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct FactCheck {
    pub verdict: String,
    pub correction: String,
    pub search_query: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Fallacy {
    pub name: String,
    pub explanation: String,
}

/// A node in the argument forest.
///
/// `id` is assigned client-side the first time a statement is observed and
/// persists across merges so renderers can diff by identity; the analysis
/// service never supplies it. `parent_text` only exists in flight: it is
/// the text-match join key used to attach a new node to its parent, and is
/// cleared once attachment has happened.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct Statement {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub speaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: StatementKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Statement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact_check: Option<FactCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallacy: Option<Fallacy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_text: Option<String>,
}

impl Statement {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            id: None,
            speaker: speaker.into(),
            speaker_id: None,
            text: text.into(),
            kind,
            msg_index: None,
            children: Vec::new(),
            fact_check: None,
            fallacy: None,
            parent_text: None,
        }
    }
}

/// Targeted field patch for an already-delivered statement, keyed by the
/// message position it is anchored to. Everything not listed here is left
/// untouched by the merge.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct StatementUpdate {
    pub msg_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<StatementKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_text: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, specta::Type)]
pub struct AnalyzeRequest {
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speakers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_auto_gen: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Incremental analysis input: the new transcript suffix (already carrying
/// `[N]` position markers, hence `msg_offset` is normally 0), a context
/// window of recently analyzed lines, and the flattened existing forest.
#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub struct IncrementalAnalyzeRequest {
    pub new_text: String,
    pub context_text: String,
    pub existing: Vec<Statement>,
    pub msg_offset: u32,
    pub full_review: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct IncrementalAnalyzeResponse {
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub updates: Vec<StatementUpdate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&StatementKind::Rebuttal).unwrap(),
            r#""rebuttal""#
        );
        assert_eq!(StatementKind::Clarification.to_string(), "clarification");
    }

    #[test]
    fn statement_round_trips_with_nested_children() {
        let json = r#"{
            "speaker": "Alice",
            "text": "The earth is round",
            "type": "claim",
            "msg_index": 1,
            "children": [
                {"speaker": "Bob", "text": "Source?", "type": "question"}
            ],
            "fact_check": {"verdict": "true", "correction": "", "search_query": "earth shape"}
        }"#;
        let s: Statement = serde_json::from_str(json).unwrap();
        assert_eq!(s.kind, StatementKind::Claim);
        assert_eq!(s.children.len(), 1);
        assert_eq!(s.children[0].kind, StatementKind::Question);
        assert!(s.id.is_none());
        assert!(s.fact_check.is_some());
    }

    #[test]
    fn client_assigned_id_serializes_as_underscore_id() {
        let mut s = Statement::new("Alice", "x", StatementKind::Claim);
        s.id = Some("7".into());
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["_id"], "7");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{"speaker": "a", "text": "b", "type": "interjection"}"#;
        assert!(serde_json::from_str::<Statement>(json).is_err());
    }
}
