//! Pure string utilities for deciding whether a new transcription pass can
//! be processed incrementally on top of text that was already handled.

/// How many leading characters of the previously processed text must
/// reappear at the start of the new text for it to count as a continuation.
pub const CONTINUATION_PROBE_CHARS: usize = 50;

/// Minimum suffix length worth sending to statement analysis. Shorter
/// deltas are deferred, not dropped: the caller leaves its cursor in place
/// so the same suffix is reconsidered on the next trigger with more text.
pub const MIN_ANALYSIS_SUFFIX_CHARS: usize = 20;

/// Whether `current` extends `previous`.
///
/// Only the first [`CONTINUATION_PROBE_CHARS`] characters of `previous` are
/// compared, because upstream transcription may rewrite the trailing words
/// of earlier chunks. A heuristic, not a strict prefix law.
pub fn is_continuation(previous: &str, current: &str) -> bool {
    if previous.is_empty() {
        return false;
    }
    let probe_end = previous
        .char_indices()
        .nth(CONTINUATION_PROBE_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(previous.len());
    current.starts_with(&previous[..probe_end])
}

/// The trimmed portion of `current` past the end of `previous`.
///
/// Empty when `current` is shorter than `previous`, or when the byte offset
/// lands inside a multi-byte character (possible because the continuation
/// check is fuzzy).
pub fn new_suffix<'a>(previous: &str, current: &'a str) -> &'a str {
    current.get(previous.len()..).unwrap_or("").trim()
}
