//! Synthetic message timestamps from a word-count heuristic.

use argmap_interface::Message;

const WORDS_PER_SECOND: f64 = 2.5;
const MIN_DURATION_MS: i64 = 2000;
const INTER_SPEAKER_GAP_MS: i64 = 500;

/// Assign start/end times to a list of messages that lacks them.
///
/// No-op on an empty list or when any message already carries `start_ms`,
/// which makes repeated application safe after incremental merges. The
/// produced timestamps are monotonically non-decreasing and non-overlapping;
/// they exist for display ordering and seeking, not as a claim of accuracy.
pub fn assign_word_timestamps(messages: &mut [Message]) {
    if messages.is_empty() || messages.iter().any(|m| m.start_ms.is_some()) {
        return;
    }

    let mut clock: i64 = 0;
    for msg in messages {
        let words = msg.text.split_whitespace().count();
        let duration = ((words as f64 / WORDS_PER_SECOND) * 1000.0).round() as i64;
        let duration = duration.max(MIN_DURATION_MS);
        msg.start_ms = Some(clock);
        msg.end_ms = Some(clock + duration);
        clock += duration + INTER_SPEAKER_GAP_MS;
    }
}
