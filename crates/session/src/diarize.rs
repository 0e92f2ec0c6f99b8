//! Full-vs-incremental diarization planning and result merging.
//!
//! Incremental calls send only the new transcript suffix, prefixed with a
//! small window of already-diarized messages so the service has continuity
//! cues without re-processing the whole history. Every Nth call is forced
//! back through a full pass to bound drift from repeated context-windowed
//! partials.

use std::collections::HashMap;

use argmap_interface::{DiarizeResponse, Message, Statement};

use crate::state::{DiarizedTranscript, SessionState};
use crate::textmerge;
use crate::timestamps;

/// Every Nth diarization call is a forced full pass (drift correction).
pub const FULL_PASS_EVERY: u64 = 5;
/// Accumulated messages prepended to an incremental chunk as context.
pub const CONTEXT_MESSAGES: usize = 4;
/// Minimum growth of the reconstructed transcript, in bytes, before a
/// successful merge triggers statement analysis.
pub const ANALYSIS_TRIGGER_GROWTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiarizePlan {
    /// Nothing new to process this cycle; cursor stays put.
    Skip,
    Full {
        transcript: String,
    },
    /// `context_len` leading messages of the response re-cover the context
    /// window and must be discarded before appending.
    Incremental {
        chunk: String,
        context_len: usize,
    },
}

/// Decide how to diarize `transcript` given the accumulated state.
/// `call_no` is the 1-based sequence number of this call in the session.
pub fn plan(state: &SessionState, transcript: &str, call_no: u64) -> DiarizePlan {
    let has_messages = state
        .diarization
        .as_ref()
        .is_some_and(|d| !d.messages.is_empty());

    let incremental = has_messages
        && textmerge::is_continuation(&state.last_diarized_text, transcript)
        && call_no % FULL_PASS_EVERY != 0;

    if !incremental {
        return DiarizePlan::Full {
            transcript: transcript.to_string(),
        };
    }

    let suffix = textmerge::new_suffix(&state.last_diarized_text, transcript);
    if suffix.is_empty() {
        return DiarizePlan::Skip;
    }

    let Some(diarization) = &state.diarization else {
        return DiarizePlan::Full {
            transcript: transcript.to_string(),
        };
    };

    let context_start = diarization.messages.len().saturating_sub(CONTEXT_MESSAGES);
    let context_lines: Vec<String> = diarization.messages[context_start..]
        .iter()
        .map(|m| format!("{}: {}", state.speakers.resolve(&m.speaker), m.text))
        .collect();
    let context_len = context_lines.len();
    let chunk = format!("{}\n{}", context_lines.join("\n"), suffix);

    DiarizePlan::Incremental { chunk, context_len }
}

/// Whether a merge changed the accumulated state (and advanced the cursor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    Skipped,
}

/// Replace the accumulated diarization wholesale with a full-pass response.
///
/// Before replacing, speaker reassignments are detected against the old
/// message list and propagated into the statement forest so previously
/// rendered attributions stay correct.
pub fn apply_full(
    state: &mut SessionState,
    transcript: &str,
    mut response: DiarizeResponse,
) -> MergeOutcome {
    number_messages(&mut response.messages);
    timestamps::assign_word_timestamps(&mut response.messages);

    let changes = match &state.diarization {
        Some(old) => detect_reassignments(&old.messages, &response.messages),
        None => HashMap::new(),
    };
    if !changes.is_empty() {
        let names = merged_names(state, &response.speakers);
        patch_statement_speakers(&mut state.statements, &changes, &names);
    }

    state.diarization = Some(DiarizedTranscript {
        speakers: response.speakers.clone(),
        messages: response.messages,
    });
    state.speakers.absorb(&response.speakers);
    state.last_diarized_text = transcript.to_string();
    MergeOutcome::Applied
}

/// Fold an incremental response into the accumulated message list.
///
/// The first `context_len` returned messages re-cover the context window and
/// are dropped; only the genuinely new remainder is appended. Speaker name
/// hints merge first-writer-wins; quality upgrades are the registry's job.
/// An empty remainder leaves the cursor unchanged so the next cycle retries
/// from the same baseline.
pub fn apply_incremental(
    state: &mut SessionState,
    transcript: &str,
    context_len: usize,
    response: DiarizeResponse,
) -> MergeOutcome {
    let Some(mut diarization) = state.diarization.take() else {
        // Incremental plan without accumulated state; treat as spurious.
        return MergeOutcome::Skipped;
    };

    let skip = context_len.min(response.messages.len());
    let mut new_messages: Vec<Message> = response.messages.into_iter().skip(skip).collect();
    if new_messages.is_empty() {
        state.diarization = Some(diarization);
        return MergeOutcome::Skipped;
    }

    for (id, name) in &response.speakers {
        diarization
            .speakers
            .entry(id.clone())
            .or_insert_with(|| name.clone());
    }

    // The service numbers messages relative to the chunk it saw; appended
    // messages must extend the global ordinal space instead.
    let mut next = diarization
        .messages
        .iter()
        .filter_map(|m| m.position)
        .max()
        .unwrap_or(diarization.messages.len() as u32);
    for message in &mut new_messages {
        next = match message.position {
            Some(p) if p > next => p,
            _ => next + 1,
        };
        message.position = Some(next);
    }

    diarization.messages.append(&mut new_messages);
    timestamps::assign_word_timestamps(&mut diarization.messages);

    let speakers_snapshot = diarization.speakers.clone();
    state.diarization = Some(diarization);
    state.speakers.absorb(&speakers_snapshot);
    state.last_diarized_text = transcript.to_string();
    MergeOutcome::Applied
}

/// Fill in missing 1-based positions on a full-pass response. Positions the
/// service did supply are trusted.
fn number_messages(messages: &mut [Message]) {
    for (i, message) in messages.iter_mut().enumerate() {
        if message.position.is_none() {
            message.position = Some(i as u32 + 1);
        }
    }
}

/// Positions whose speaker changed between two diarization passes, compared
/// over the common prefix of the message lists.
fn detect_reassignments(old: &[Message], new: &[Message]) -> HashMap<u32, String> {
    let mut changes = HashMap::new();
    for (i, (o, n)) in old.iter().zip(new.iter()).enumerate() {
        if o.speaker != n.speaker {
            let pos = n.position.unwrap_or(i as u32 + 1);
            changes.insert(pos, n.speaker.clone());
        }
    }
    changes
}

/// Update every statement anchored to a reassigned message position, at any
/// depth: the raw identifier and the resolved display name.
fn patch_statement_speakers(
    statements: &mut [Statement],
    changes: &HashMap<u32, String>,
    names: &HashMap<String, String>,
) {
    for statement in statements {
        if let Some(idx) = statement.msg_index {
            if let Some(new_id) = changes.get(&idx) {
                statement.speaker_id = Some(new_id.clone());
                statement.speaker = names
                    .get(new_id)
                    .filter(|n| !n.is_empty())
                    .cloned()
                    .unwrap_or_else(|| new_id.clone());
            }
        }
        patch_statement_speakers(&mut statement.children, changes, names);
    }
}

/// Registry names overlaid with the incoming (non-empty) speaker hints, for
/// resolving reassigned attributions.
fn merged_names(state: &SessionState, incoming: &HashMap<String, String>) -> HashMap<String, String> {
    let mut names = state.speakers.names();
    for (id, name) in incoming {
        if !name.is_empty() {
            names.insert(id.clone(), name.clone());
        }
    }
    names
}
