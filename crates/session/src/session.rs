//! The session controller: owns the state, orchestrates the remote
//! services, and applies merges.
//!
//! Execution is cooperative: multiple calls can be logically in flight, but
//! every state mutation happens synchronously under the state lock within
//! the handler of one completed response, and the lock is never held across
//! an await. One pending guard per call kind bounds concurrency to a single
//! outstanding call of each kind; a new call is skipped, not queued, while
//! one is pending, so the periodic timer can never outrun network latency
//! into a request storm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use argmap_interface::{AnalyzeRequest, DiarizeRequest, IncrementalAnalyzeRequest, TranscriptSpeakersUpdate};

use crate::backend::ConversationService;
use crate::diarize::{self, DiarizePlan, ANALYSIS_TRIGGER_GROWTH};
use crate::error::Error;
use crate::id::IdGenerator;
use crate::state::{DiarizedTranscript, SessionSnapshot, SessionState};
use crate::statements::{self, AnalyzePlan};
use crate::timestamps;

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    service: Arc<dyn ConversationService>,
    state: Mutex<SessionState>,
    pending_transcribe: AtomicBool,
    pending_diarize: AtomicBool,
    pending_analyze: AtomicBool,
}

/// Releases a pending flag when the call completes, however it completes.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn claim(flag: &AtomicBool) -> Option<PendingGuard<'_>> {
    if flag.swap(true, Ordering::SeqCst) {
        None
    } else {
        Some(PendingGuard(flag))
    }
}

impl Session {
    pub fn new(service: Arc<dyn ConversationService>) -> Self {
        Self::from_state(service, SessionState::new())
    }

    /// Session with an injected identifier generator, for deterministic ids
    /// in tests and tooling.
    pub fn with_ids(service: Arc<dyn ConversationService>, ids: Box<dyn IdGenerator>) -> Self {
        Self::from_state(service, SessionState::with_ids(ids))
    }

    fn from_state(service: Arc<dyn ConversationService>, state: SessionState) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                service,
                state: Mutex::new(state),
                pending_transcribe: AtomicBool::new(false),
                pending_diarize: AtomicBool::new(false),
                pending_analyze: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn speaker_color(&self, reference: &str) -> &'static str {
        self.lock().speakers.color_for(reference)
    }

    /// Clear the session. In-flight responses keep their old epoch and are
    /// discarded when they land.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.reset();
        tracing::info!(epoch = state.epoch, "session reset");
    }

    pub async fn create_session(&self) -> Result<String, Error> {
        let epoch = self.lock().epoch;
        let handle = self
            .inner
            .service
            .create_session()
            .await
            .map_err(Error::Service)?;
        let mut state = self.lock();
        if state.epoch == epoch {
            state.slug = Some(handle.slug.clone());
        }
        Ok(handle.slug)
    }

    // ── Diarization ──────────────────────────────────────────────────────

    /// One diarization pass over `transcript`, skipped entirely if a pass
    /// is already in flight.
    pub async fn diarize_guarded(&self, transcript: String) -> Result<(), Error> {
        let Some(_guard) = claim(&self.inner.pending_diarize) else {
            tracing::debug!("diarization already in flight, skipping");
            return Ok(());
        };
        self.diarize(transcript).await
    }

    /// One diarization pass, unguarded. Used by the final pass on stop,
    /// which must not be skipped.
    pub async fn diarize(&self, transcript: String) -> Result<(), Error> {
        let (plan, epoch) = {
            let mut state = self.lock();
            state.diarize_calls += 1;
            let plan = diarize::plan(&state, &transcript, state.diarize_calls);
            (plan, state.epoch)
        };

        match plan {
            DiarizePlan::Skip => return Ok(()),
            DiarizePlan::Full { transcript: full } => {
                let response = self
                    .inner
                    .service
                    .diarize(DiarizeRequest {
                        transcript: full,
                        segments: None,
                    })
                    .await
                    .map_err(Error::Service)?;
                if let Some(error) = response.error {
                    return Err(Error::Diarization(error));
                }
                let mut state = self.lock();
                if state.epoch != epoch {
                    tracing::debug!("stale diarization response discarded");
                    return Ok(());
                }
                diarize::apply_full(&mut state, &transcript, response);
            }
            DiarizePlan::Incremental { chunk, context_len } => {
                let response = self
                    .inner
                    .service
                    .diarize(DiarizeRequest {
                        transcript: chunk,
                        segments: None,
                    })
                    .await
                    .map_err(Error::Service)?;
                if let Some(error) = response.error {
                    return Err(Error::Diarization(error));
                }
                let mut state = self.lock();
                if state.epoch != epoch {
                    tracing::debug!("stale diarization response discarded");
                    return Ok(());
                }
                let outcome =
                    diarize::apply_incremental(&mut state, &transcript, context_len, response);
                if outcome == diarize::MergeOutcome::Skipped {
                    return Ok(());
                }
            }
        }

        self.maybe_trigger_analysis();
        Ok(())
    }

    /// After a successful diarization merge: if the reconstructed transcript
    /// has grown enough since the last analysis pass and none is in flight,
    /// kick one off in the background.
    fn maybe_trigger_analysis(&self) {
        let transcript = {
            let state = self.lock();
            if state.diarization.is_none() {
                return;
            }
            let transcript = state.numbered_transcript();
            if transcript.len() <= state.last_analyzed_transcript.len() + ANALYSIS_TRIGGER_GROWTH {
                return;
            }
            transcript
        };
        if self.inner.pending_analyze.load(Ordering::SeqCst) {
            return;
        }
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(error) = session.analyze_guarded(transcript, false).await {
                tracing::warn!(%error, "statement analysis failed");
            }
        });
    }

    // ── Statement analysis ───────────────────────────────────────────────

    pub async fn analyze_guarded(&self, transcript: String, force_full: bool) -> Result<(), Error> {
        let Some(_guard) = claim(&self.inner.pending_analyze) else {
            tracing::debug!("analysis already in flight, skipping");
            return Ok(());
        };
        self.analyze(transcript, force_full).await
    }

    pub async fn analyze(&self, transcript: String, force_full: bool) -> Result<(), Error> {
        enum Prepared {
            Full(AnalyzeRequest),
            Incremental(IncrementalAnalyzeRequest),
        }

        let (prepared, epoch) = {
            let mut state = self.lock();
            let epoch = state.epoch;
            match statements::plan(&state, &transcript, force_full) {
                AnalyzePlan::Skip => return Ok(()),
                AnalyzePlan::Full { transcript: full } => {
                    let speakers = if state.speakers.is_empty() {
                        state.diarization.as_ref().map(|d| d.speakers.clone())
                    } else {
                        Some(state.speakers.names())
                    };
                    let auto_gen = state.speakers.auto_gen_map();
                    let request = AnalyzeRequest {
                        transcript: full,
                        slug: state.slug.clone(),
                        source_url: state.source_url.clone(),
                        speakers,
                        messages: state.diarization.as_ref().map(|d| d.messages.clone()),
                        speaker_auto_gen: (!auto_gen.is_empty()).then_some(auto_gen),
                    };
                    (Prepared::Full(request), epoch)
                }
                AnalyzePlan::Incremental {
                    new_text,
                    context_text,
                    full_review,
                } => {
                    state.analyze_calls += 1;
                    let request = IncrementalAnalyzeRequest {
                        new_text,
                        context_text,
                        existing: state.statements.clone(),
                        // new text already carries [N] position markers
                        msg_offset: 0,
                        full_review,
                    };
                    (Prepared::Incremental(request), epoch)
                }
            }
        };

        match prepared {
            Prepared::Full(request) => {
                let response = self
                    .inner
                    .service
                    .analyze(request)
                    .await
                    .map_err(Error::Service)?;
                let mut state = self.lock();
                if state.epoch != epoch {
                    tracing::debug!("stale analysis response discarded");
                    return Ok(());
                }
                statements::apply_full(&mut state, &transcript, response);
            }
            Prepared::Incremental(request) => {
                let response = self
                    .inner
                    .service
                    .analyze_incremental(request)
                    .await
                    .map_err(Error::Service)?;
                let mut state = self.lock();
                if state.epoch != epoch {
                    tracing::debug!("stale analysis response discarded");
                    return Ok(());
                }
                statements::apply_incremental(&mut state, &transcript, response);
            }
        }
        Ok(())
    }

    /// Force a full re-analysis of the current conversation.
    pub async fn reanalyze(&self) -> Result<(), Error> {
        let transcript = self.lock().numbered_transcript();
        self.analyze_guarded(transcript, true).await
    }

    // ── Recording ────────────────────────────────────────────────────────

    /// One periodic chunk: transcribe everything captured so far and, when
    /// the text changed, fold it in and kick diarization in the background.
    /// Returns whether the transcript changed. Skipped outright while a
    /// transcription is already pending.
    pub async fn process_audio_chunk(&self, audio: Vec<u8>) -> Result<bool, Error> {
        let Some(_guard) = claim(&self.inner.pending_transcribe) else {
            tracing::debug!("transcription already in flight, skipping chunk");
            return Ok(false);
        };

        let epoch = self.lock().epoch;
        let text = self
            .inner
            .service
            .transcribe(audio)
            .await
            .map_err(Error::Service)?;
        let text = text.trim().to_string();
        if text.is_empty() {
            tracing::debug!("empty transcription, nothing to merge");
            return Ok(false);
        }

        let changed = {
            let mut state = self.lock();
            if state.epoch != epoch {
                tracing::debug!("stale transcription discarded");
                return Ok(false);
            }
            if state.transcript == text {
                false
            } else {
                state.transcript = text.clone();
                true
            }
        };

        if changed {
            let session = self.clone();
            tokio::spawn(async move {
                if let Err(error) = session.diarize_guarded(text).await {
                    tracing::warn!(%error, "diarization failed");
                }
            });
        }
        Ok(changed)
    }

    /// Final pass when a recording stops: transcribe the complete audio,
    /// diarize, analyze whatever is not yet analyzed, and mark the session
    /// finalized. All steps awaited.
    pub async fn finalize_recording(&self, audio: Vec<u8>) -> Result<(), Error> {
        if !audio.is_empty() {
            let _guard = claim(&self.inner.pending_transcribe);
            let epoch = self.lock().epoch;
            match self.inner.service.transcribe(audio).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    let text = if text.is_empty() {
                        self.lock().transcript.clone()
                    } else {
                        text
                    };
                    if !text.is_empty() {
                        {
                            let mut state = self.lock();
                            if state.epoch == epoch {
                                state.transcript = text.clone();
                            }
                        }
                        if let Err(error) = self.diarize(text).await {
                            tracing::warn!(%error, "final diarization failed");
                        }
                    }
                }
                Err(error) => tracing::warn!(%error, "final transcription failed"),
            }
        }

        let (transcript, needs_analysis) = {
            let state = self.lock();
            let transcript = state.numbered_transcript();
            let needs = transcript != state.last_analyzed_transcript;
            (transcript, needs)
        };
        if needs_analysis {
            self.analyze_guarded(transcript, false).await?;
        }
        self.lock().finalized = true;
        Ok(())
    }

    // ── Session seeding flows ────────────────────────────────────────────

    /// Paste flow: start a fresh session from a raw transcript, diarize it
    /// fully, and leave the session finalized.
    pub async fn ingest_transcript(&self, text: String) -> Result<(), Error> {
        self.reset();
        self.lock().transcript = text.clone();
        if let Err(error) = self.create_session().await {
            tracing::warn!(%error, "session creation failed, continuing without slug");
        }
        self.diarize_guarded(text).await?;
        self.lock().finalized = true;
        Ok(())
    }

    /// Seed a fresh session from a generated sample conversation and run a
    /// full analysis over it. Failures propagate: this is a user-initiated
    /// one-shot action whose error is shown inline.
    pub async fn load_sample(&self) -> Result<(), Error> {
        let sample = self
            .inner
            .service
            .fetch_sample()
            .await
            .map_err(Error::Service)?;

        self.reset();
        let transcript = {
            let mut state = self.lock();
            let mut messages = sample.messages;
            timestamps::assign_word_timestamps(&mut messages);
            state.source_url = Some(sample.url).filter(|u| !u.is_empty());
            state.source_title = Some(sample.title).filter(|t| !t.is_empty());
            state.transcript = sample.text;
            state.speakers.absorb(&sample.speakers);
            state.diarization = Some(DiarizedTranscript {
                speakers: sample.speakers,
                messages,
            });
            state.finalized = true;
            state.numbered_transcript()
        };

        if let Err(error) = self.create_session().await {
            tracing::warn!(%error, "session creation failed, continuing without slug");
        }
        self.analyze_guarded(transcript, false).await
    }

    /// Resume a persisted conversation by slug.
    pub async fn load_transcript(&self, slug: String) -> Result<(), Error> {
        let detail = self
            .inner
            .service
            .fetch_transcript(slug)
            .await
            .map_err(Error::Service)?;

        self.reset();
        let mut state = self.lock();
        state.slug = Some(detail.transcript.slug);
        state.source_url = Some(detail.transcript.source_url).filter(|u| !u.is_empty());
        state.source_title = Some(detail.transcript.title).filter(|t| !t.is_empty());

        let mut speaker_ids: Vec<&String> = detail.speakers.keys().collect();
        speaker_ids.sort();
        for id in speaker_ids {
            let name = &detail.speakers[id];
            let display = if name.is_empty() {
                prettify_speaker_id(id)
            } else {
                name.clone()
            };
            state.speakers.seed(id.as_str(), display, false, None);
        }
        for (id, info) in &detail.speaker_info {
            let display = if info.name.is_empty() {
                prettify_speaker_id(id)
            } else {
                info.name.clone()
            };
            state
                .speakers
                .seed(id.as_str(), display, info.auto_generated, info.id);
        }

        let mut messages = detail.messages;
        timestamps::assign_word_timestamps(&mut messages);
        state.diarization = Some(DiarizedTranscript {
            speakers: detail.speakers,
            messages,
        });

        let mut statements = detail.statements;
        statements::assign_ids(&mut statements, state.ids.as_mut());
        state.statements = statements;

        state.transcript = state.labeled_transcript();
        if !state.statements.is_empty() {
            state.last_analyzed_transcript = state.numbered_transcript();
        }
        state.finalized = true;
        Ok(())
    }

    /// Attach a source URL and fetch its title, best-effort.
    pub async fn import_source_title(&self, url: String) -> Result<(), Error> {
        self.lock().source_url = Some(url.clone());
        let response = self
            .inner
            .service
            .import_source_title(url)
            .await
            .map_err(Error::Service)?;
        if let Some(title) = response.title.filter(|t| !t.is_empty()) {
            self.lock().source_title = Some(title);
        }
        Ok(())
    }

    // ── Speakers ─────────────────────────────────────────────────────────

    /// Rename a speaker. The registry change is immediate; persistence to
    /// the backend speaker store (and to the session's speaker map, when a
    /// slug exists) is fire-and-forget with failures logged and swallowed.
    pub fn rename_speaker(&self, id: &str, new_name: &str) {
        let (old_name, slug, names, auto_gen) = {
            let mut state = self.lock();
            let old = state.speakers.rename(id, new_name);
            (
                old,
                state.slug.clone(),
                state.speakers.names(),
                state.speakers.auto_gen_map(),
            )
        };

        if let Some(old_name) = old_name.filter(|o| o != new_name) {
            let service = Arc::clone(&self.inner.service);
            let new_name = new_name.to_string();
            tokio::spawn(async move {
                if let Err(error) = service.rename_speaker(old_name, new_name).await {
                    tracing::warn!(%error, "speaker rename persistence failed");
                }
            });
        }
        if let Some(slug) = slug {
            let service = Arc::clone(&self.inner.service);
            let update = TranscriptSpeakersUpdate {
                speakers: names,
                speaker_auto_gen: auto_gen,
            };
            tokio::spawn(async move {
                if let Err(error) = service.update_transcript_speakers(slug, update).await {
                    tracing::warn!(%error, "transcript speaker-map persistence failed");
                }
            });
        }
    }
}

fn prettify_speaker_id(id: &str) -> String {
    id.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use argmap_interface::{
        AnalyzeResponse, DiarizeResponse, IncrementalAnalyzeResponse, Message, SampleResponse,
        SessionHandle, SourceImportResponse, Statement, StatementKind, TranscriptDetail,
    };

    use crate::backend::{BoxFuture, ServiceError};
    use crate::id::SequentialIdGen;

    #[derive(Default)]
    struct ScriptedService {
        transcribe: Mutex<VecDeque<String>>,
        diarize: Mutex<VecDeque<DiarizeResponse>>,
        analyze: Mutex<VecDeque<AnalyzeResponse>>,
        analyze_incremental: Mutex<VecDeque<IncrementalAnalyzeResponse>>,
        diarize_requests: Mutex<Vec<String>>,
        analyze_requests: Mutex<Vec<String>>,
        diarize_gate: Mutex<Option<Arc<tokio::sync::Notify>>>,
    }

    impl ScriptedService {
        fn push_diarize(&self, response: DiarizeResponse) {
            self.diarize.lock().unwrap().push_back(response);
        }

        fn diarize_requests(&self) -> Vec<String> {
            self.diarize_requests.lock().unwrap().clone()
        }
    }

    impl ConversationService for ScriptedService {
        fn transcribe(&self, _audio: Vec<u8>) -> BoxFuture<'_, Result<String, ServiceError>> {
            Box::pin(async move {
                Ok(self
                    .transcribe
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_default())
            })
        }

        fn diarize(
            &self,
            request: argmap_interface::DiarizeRequest,
        ) -> BoxFuture<'_, Result<DiarizeResponse, ServiceError>> {
            Box::pin(async move {
                self.diarize_requests
                    .lock()
                    .unwrap()
                    .push(request.transcript);
                let gate = self.diarize_gate.lock().unwrap().clone();
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(self.diarize.lock().unwrap().pop_front().unwrap_or_default())
            })
        }

        fn analyze(
            &self,
            request: AnalyzeRequest,
        ) -> BoxFuture<'_, Result<AnalyzeResponse, ServiceError>> {
            Box::pin(async move {
                self.analyze_requests
                    .lock()
                    .unwrap()
                    .push(format!("full:{}", request.transcript));
                Ok(self.analyze.lock().unwrap().pop_front().unwrap_or_default())
            })
        }

        fn analyze_incremental(
            &self,
            request: IncrementalAnalyzeRequest,
        ) -> BoxFuture<'_, Result<IncrementalAnalyzeResponse, ServiceError>> {
            Box::pin(async move {
                self.analyze_requests
                    .lock()
                    .unwrap()
                    .push(format!("incremental:{}", request.new_text));
                Ok(self
                    .analyze_incremental
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_default())
            })
        }

        fn create_session(&self) -> BoxFuture<'_, Result<SessionHandle, ServiceError>> {
            Box::pin(async {
                Ok(SessionHandle {
                    slug: "test-slug".into(),
                    id: 1,
                })
            })
        }

        fn fetch_transcript(
            &self,
            _slug: String,
        ) -> BoxFuture<'_, Result<TranscriptDetail, ServiceError>> {
            Box::pin(async { Err("not scripted".into()) })
        }

        fn fetch_sample(&self) -> BoxFuture<'_, Result<SampleResponse, ServiceError>> {
            Box::pin(async { Err("not scripted".into()) })
        }

        fn import_source_title(
            &self,
            _url: String,
        ) -> BoxFuture<'_, Result<SourceImportResponse, ServiceError>> {
            Box::pin(async { Ok(SourceImportResponse::default()) })
        }

        fn rename_speaker(
            &self,
            _old_name: String,
            _new_name: String,
        ) -> BoxFuture<'_, Result<(), ServiceError>> {
            Box::pin(async { Ok(()) })
        }

        fn update_transcript_speakers(
            &self,
            _slug: String,
            _update: TranscriptSpeakersUpdate,
        ) -> BoxFuture<'_, Result<(), ServiceError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn msg(speaker: &str, text: &str, position: u32) -> Message {
        let mut m = Message::new(speaker, text);
        m.position = Some(position);
        m
    }

    fn diarize_response(entries: &[(&str, &str)], messages: Vec<Message>) -> DiarizeResponse {
        DiarizeResponse {
            speakers: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            messages,
            error: None,
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn session_with(service: &Arc<ScriptedService>) -> Session {
        Session::with_ids(
            Arc::clone(service) as Arc<dyn ConversationService>,
            Box::new(SequentialIdGen::new()),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn paste_flow_diarizes_and_triggers_analysis() {
        let service = Arc::new(ScriptedService::default());
        service.push_diarize(diarize_response(
            &[("s1", "Alice"), ("s2", "")],
            vec![
                msg("s1", "the moon landing was staged in a studio", 1),
                msg("s2", "that has been debunked many times over", 2),
            ],
        ));
        service.analyze.lock().unwrap().push_back(AnalyzeResponse {
            statements: vec![Statement::new(
                "Alice",
                "the moon landing was staged",
                StatementKind::Claim,
            )],
            ..Default::default()
        });

        let session = session_with(&service);
        session
            .ingest_transcript("Alice: the moon landing was staged in a studio\nBob: that has been debunked many times over".into())
            .await
            .unwrap();

        // diarization applied synchronously
        let snapshot = session.snapshot();
        assert_eq!(snapshot.slug.as_deref(), Some("test-slug"));
        assert_eq!(snapshot.diarization.as_ref().unwrap().messages.len(), 2);
        assert_eq!(snapshot.speaker_names["s1"], "Alice");
        assert!(!snapshot.speaker_names["s2"].is_empty());
        assert!(snapshot.finalized);

        // analysis fires in the background once the transcript grows enough
        wait_until(|| !session.snapshot().statements.is_empty()).await;
        let statements = session.snapshot().statements;
        assert_eq!(statements[0].id.as_deref(), Some("st-1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn incremental_diarization_sends_context_window() {
        let service = Arc::new(ScriptedService::default());
        // raw transcription text carries no speaker labels
        let first = "the first chunk of this conversation is long enough";
        let second = format!("{first}\nand here is the second chunk arriving");

        service.push_diarize(diarize_response(
            &[("s1", "Alice")],
            vec![msg("s1", "the first chunk of this conversation is long enough", 1)],
        ));
        service.push_diarize(diarize_response(
            &[("s1", "Alice"), ("s2", "")],
            vec![
                msg("s1", "the first chunk of this conversation is long enough", 1),
                msg("s2", "and here is the second chunk arriving", 2),
            ],
        ));

        let session = session_with(&service);
        session.diarize(first.to_string()).await.unwrap();
        session.diarize(second.clone()).await.unwrap();

        let requests = service.diarize_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], first);
        // incremental request = rendered context lines + new suffix, not the
        // full raw text
        assert!(requests[1].starts_with("Alice: the first chunk"));
        assert!(requests[1].ends_with("and here is the second chunk arriving"));
        assert_ne!(requests[1], second);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.diarization.unwrap().messages.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fifth_call_is_a_forced_full_pass() {
        let service = Arc::new(ScriptedService::default());
        let base = "a conversation opener that is comfortably past fifty characters".to_string();

        service.push_diarize(diarize_response(
            &[("s1", "Alice")],
            vec![msg("s1", "opener", 1)],
        ));
        for i in 0..4u32 {
            service.push_diarize(diarize_response(
                &[],
                vec![
                    msg("s1", "context echo", 1),
                    msg("s2", &format!("new message {}", i + 2), i + 2),
                ],
            ));
        }

        let session = session_with(&service);
        let mut text = base.clone();
        session.diarize(text.clone()).await.unwrap();
        for i in 2..=5 {
            text = format!("{text}\nfollow-up number {i} with enough words");
            session.diarize(text.clone()).await.unwrap();
        }

        let requests = service.diarize_requests();
        assert_eq!(requests.len(), 5);
        for request in &requests[1..4] {
            assert!(
                request.starts_with("Alice: opener"),
                "calls 2-4 must be incremental chunks, got: {request}"
            );
            assert_ne!(request, &text);
        }
        // drift correction: the 5th call re-sends the full transcript
        assert_eq!(requests[4], text);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn diarization_error_leaves_cursor_unchanged() {
        let service = Arc::new(ScriptedService::default());
        let first = "Alice: the first chunk of this conversation is long enough";
        let second = format!("{first}\nBob: more words that will fail to diarize");

        service.push_diarize(diarize_response(
            &[("s1", "Alice")],
            vec![msg("s1", "the first chunk of this conversation is long enough", 1)],
        ));
        service.push_diarize(DiarizeResponse {
            error: Some("model overloaded".into()),
            ..Default::default()
        });

        let session = session_with(&service);
        session.diarize(first.to_string()).await.unwrap();
        let result = session.diarize(second).await;
        assert!(matches!(result, Err(Error::Diarization(_))));

        // cursor untouched: the next trigger retries from the same baseline
        let snapshot = session.snapshot();
        assert_eq!(snapshot.diarization.unwrap().messages.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_response_after_reset_is_discarded() {
        let service = Arc::new(ScriptedService::default());
        let gate = Arc::new(tokio::sync::Notify::new());
        *service.diarize_gate.lock().unwrap() = Some(Arc::clone(&gate));
        service.push_diarize(diarize_response(
            &[("s1", "Alice")],
            vec![msg("s1", "hello there", 1)],
        ));

        let session = session_with(&service);
        let in_flight = tokio::spawn({
            let session = session.clone();
            async move { session.diarize("Alice: hello there".into()).await }
        });

        wait_until(|| !service.diarize_requests().is_empty()).await;
        session.reset();
        gate.notify_one();
        in_flight.await.unwrap().unwrap();

        // the response landed after reset and must not repopulate state
        let snapshot = session.snapshot();
        assert!(snapshot.diarization.is_none());
        assert!(snapshot.transcript.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_is_sticky_against_later_diarization() {
        let service = Arc::new(ScriptedService::default());
        service.push_diarize(diarize_response(
            &[("s1", "")],
            vec![msg("s1", "some opening words that reach the probe length fine", 1)],
        ));
        service.push_diarize(diarize_response(
            &[("s1", "Alfred")],
            vec![msg("s1", "a rewritten take on the whole conversation text", 1)],
        ));

        let session = session_with(&service);
        session
            .diarize("some opening words that reach the probe length fine".into())
            .await
            .unwrap();
        session.rename_speaker("s1", "Dr. Chen");

        // diverged text forces a full pass whose name hint must NOT win
        session
            .diarize("a rewritten take on the whole conversation text".into())
            .await
            .unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.speaker_names["s1"], "Dr. Chen");
    }
}
