//! Periodic chunk capture loop driving a live recording session.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::error::Error;
use crate::session::Session;

/// Cadence of the periodic transcription pass.
pub const CHUNK_INTERVAL: Duration = Duration::from_secs(10);

/// Source of the audio captured since recording start.
///
/// Container formats require a contiguous stream from the first byte, so
/// `snapshot` returns everything captured so far; each periodic pass
/// re-sends the full recording, not just the newest chunk.
pub trait AudioSource: Send + Sync {
    fn snapshot(&self) -> Vec<u8>;
}

/// In-memory audio source, for tests and file replay.
#[derive(Default)]
pub struct BufferedAudioSource {
    buffer: Mutex<Vec<u8>>,
}

impl BufferedAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: &[u8]) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend_from_slice(chunk);
        }
    }
}

impl AudioSource for BufferedAudioSource {
    fn snapshot(&self) -> Vec<u8> {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Drives the session on a fixed cadence while recording: every
/// [`CHUNK_INTERVAL`], snapshot the accumulated audio and submit it for
/// transcription (the session's pending guard skips the tick outright if
/// the previous call is still in flight). `stop` tears the timer down and
/// runs one final transcribe, diarize, analyze pass. Dropping the pipeline
/// also tears the timer down, so no periodic work leaks against a dead
/// session.
pub struct RecordingPipeline {
    session: Session,
    source: Arc<dyn AudioSource>,
    ticker: Option<JoinHandle<()>>,
    started: Instant,
}

impl RecordingPipeline {
    pub fn start(session: Session, source: Arc<dyn AudioSource>) -> Self {
        Self::start_with_interval(session, source, CHUNK_INTERVAL)
    }

    /// Same loop with a custom cadence; used by file replay, where waiting
    /// real chunk intervals would be pointless.
    pub fn start_with_interval(
        session: Session,
        source: Arc<dyn AudioSource>,
        interval: Duration,
    ) -> Self {
        let ticker = tokio::spawn({
            let session = session.clone();
            let source = Arc::clone(&source);
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // the first tick fires immediately; recording starts empty
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let audio = source.snapshot();
                    if audio.is_empty() {
                        continue;
                    }
                    // fire and forget: the session's pending guard is the
                    // backpressure, the timer must never queue behind a
                    // slow call
                    let session = session.clone();
                    tokio::spawn(async move {
                        if let Err(error) = session.process_audio_chunk(audio).await {
                            tracing::warn!(%error, "chunk transcription failed");
                        }
                    });
                }
            }
        });

        Self {
            session,
            source,
            ticker: Some(ticker),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Stop the periodic loop and run the final full pass over the complete
    /// recording.
    pub async fn stop(mut self) -> Result<(), Error> {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let audio = self.source.snapshot();
        self.session.finalize_recording(audio).await
    }
}

impl Drop for RecordingPipeline {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
