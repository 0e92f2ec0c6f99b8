//! Full-vs-incremental statement analysis planning and argument-tree
//! merging.
//!
//! Incremental responses arrive in two parts: `updates`, targeted field
//! patches for statements already in the forest, and `statements`, newly
//! introduced nodes that attach to their parents by text match. Updates are
//! applied before attachments within one merge, so a new child can name a
//! parent by its just-revised text.

use argmap_interface::{AnalyzeResponse, IncrementalAnalyzeResponse, Statement, StatementUpdate};

use crate::id::IdGenerator;
use crate::state::SessionState;
use crate::textmerge::{self, MIN_ANALYSIS_SUFFIX_CHARS};

/// Every Nth incremental call asks the service to re-examine recent
/// structure instead of only appending. A request hint, not a local
/// merge-mode change.
pub const FULL_REVIEW_EVERY: u64 = 5;
/// Trailing lines of the previously analyzed transcript sent as context.
pub const CONTEXT_LINES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzePlan {
    /// Delta below threshold; cursor and counter stay put so the same
    /// suffix is reconsidered next trigger.
    Skip,
    Full {
        transcript: String,
    },
    Incremental {
        new_text: String,
        context_text: String,
        full_review: bool,
    },
}

/// Decide how to analyze `transcript`. Pure: counters are advanced by the
/// caller when the planned call is actually dispatched.
pub fn plan(state: &SessionState, transcript: &str, force_full: bool) -> AnalyzePlan {
    let incremental = !force_full
        && !state.statements.is_empty()
        && textmerge::is_continuation(&state.last_analyzed_transcript, transcript);

    if !incremental {
        return AnalyzePlan::Full {
            transcript: transcript.to_string(),
        };
    }

    let suffix = textmerge::new_suffix(&state.last_analyzed_transcript, transcript);
    if suffix.chars().count() < MIN_ANALYSIS_SUFFIX_CHARS {
        return AnalyzePlan::Skip;
    }

    let lines: Vec<&str> = state
        .last_analyzed_transcript
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let context_start = lines.len().saturating_sub(CONTEXT_LINES);
    let context_text = lines[context_start..].join("\n");

    let call_no = state.analyze_calls + 1;
    AnalyzePlan::Incremental {
        new_text: suffix.to_string(),
        context_text,
        full_review: call_no % FULL_REVIEW_EVERY == 0,
    }
}

/// Replace the forest wholesale with a full-analysis response.
pub fn apply_full(state: &mut SessionState, transcript: &str, response: AnalyzeResponse) {
    let mut statements = response.statements;
    assign_ids(&mut statements, state.ids.as_mut());
    state.statements = statements;
    state.analyze_calls = 0;
    state.last_analyzed_transcript = transcript.to_string();
    if let Some(title) = response.title.filter(|t| !t.is_empty()) {
        state.source_title = Some(title);
    }
}

/// Fold an incremental response into the forest: updates first, then new
/// statements, then advance the cursor.
pub fn apply_incremental(
    state: &mut SessionState,
    transcript: &str,
    response: IncrementalAnalyzeResponse,
) {
    let SessionState {
        statements, ids, ..
    } = state;

    if !response.updates.is_empty() {
        apply_updates(statements, &response.updates);
    }
    if !response.statements.is_empty() {
        attach_statements(statements, response.statements, ids.as_mut());
    }
    state.last_analyzed_transcript = transcript.to_string();
}

/// Patch `text`/`kind` on every statement, at any depth, whose `msg_index`
/// matches an update. Children, fact-check, and fallacy are untouched, so
/// pinned references to the node stay valid.
pub fn apply_updates(statements: &mut [Statement], updates: &[StatementUpdate]) {
    for statement in statements {
        if let Some(idx) = statement.msg_index {
            if let Some(update) = updates.iter().find(|u| u.msg_index == idx) {
                if let Some(text) = &update.text {
                    statement.text = text.clone();
                }
                if let Some(kind) = update.kind {
                    statement.kind = kind;
                }
            }
        }
        apply_updates(&mut statement.children, updates);
    }
}

/// Attach newly introduced statements to the forest.
///
/// A node carrying `parent_text` becomes the last child of the matching
/// statement; without a match (or without the key) it becomes a new root.
/// Every new node receives a stable identifier before it can be rendered.
pub fn attach_statements(
    roots: &mut Vec<Statement>,
    new_statements: Vec<Statement>,
    ids: &mut dyn IdGenerator,
) {
    for mut statement in new_statements {
        assign_statement_ids(&mut statement, ids);
        let parent_text = statement.parent_text.take();
        if let Some(parent_text) = parent_text {
            if let Some(parent) = find_by_text(roots, &parent_text) {
                parent.children.push(statement);
                continue;
            }
        }
        roots.push(statement);
    }
}

/// Locate a statement by display text: trimmed, case-insensitive, depth
/// first. When two statements share identical text the first depth-first
/// match wins; that ambiguity is inherent to the text join key and is kept
/// behind this one function so a server-supplied stable identifier could
/// replace it without touching the merge orchestration.
pub fn find_by_text<'a>(
    statements: &'a mut [Statement],
    text: &str,
) -> Option<&'a mut Statement> {
    let needle = text.trim().to_lowercase();
    find_by_needle(statements, &needle)
}

fn find_by_needle<'a>(statements: &'a mut [Statement], needle: &str) -> Option<&'a mut Statement> {
    for statement in statements {
        if statement.text.trim().to_lowercase() == needle {
            return Some(statement);
        }
        if let Some(found) = find_by_needle(&mut statement.children, needle) {
            return Some(found);
        }
    }
    None
}

/// Assign identifiers to every statement in the slice (recursively) that
/// does not have one yet. Existing identifiers are kept: they were assigned
/// the first time the client observed the node.
pub fn assign_ids(statements: &mut [Statement], ids: &mut dyn IdGenerator) {
    for statement in statements {
        assign_statement_ids(statement, ids);
    }
}

fn assign_statement_ids(statement: &mut Statement, ids: &mut dyn IdGenerator) {
    if statement.id.is_none() {
        statement.id = Some(ids.next_id());
    }
    assign_ids(&mut statement.children, ids);
}
