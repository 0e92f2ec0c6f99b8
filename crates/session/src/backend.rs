//! The remote conversation services, seen from the session's side.

use std::future::Future;
use std::pin::Pin;

use argmap_interface::{
    AnalyzeRequest, AnalyzeResponse, DiarizeRequest, DiarizeResponse, IncrementalAnalyzeRequest,
    IncrementalAnalyzeResponse, SampleResponse, SessionHandle, SourceImportResponse,
    TranscriptDetail, TranscriptSpeakersUpdate,
};

pub type ServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote transcription, diarization, and analysis, plus the small
/// persistence surface the session touches. All calls are plain
/// request/response; a failure means "no update this cycle", never a
/// crashed session.
///
/// The trait is object-safe via the explicit `BoxFuture` return type; the
/// session holds a `dyn ConversationService` so an HTTP client and a
/// scripted test double are interchangeable.
pub trait ConversationService: Send + Sync {
    fn transcribe(&self, audio: Vec<u8>) -> BoxFuture<'_, Result<String, ServiceError>>;

    fn diarize(
        &self,
        request: DiarizeRequest,
    ) -> BoxFuture<'_, Result<DiarizeResponse, ServiceError>>;

    fn analyze(
        &self,
        request: AnalyzeRequest,
    ) -> BoxFuture<'_, Result<AnalyzeResponse, ServiceError>>;

    fn analyze_incremental(
        &self,
        request: IncrementalAnalyzeRequest,
    ) -> BoxFuture<'_, Result<IncrementalAnalyzeResponse, ServiceError>>;

    fn create_session(&self) -> BoxFuture<'_, Result<SessionHandle, ServiceError>>;

    fn fetch_transcript(
        &self,
        slug: String,
    ) -> BoxFuture<'_, Result<TranscriptDetail, ServiceError>>;

    fn fetch_sample(&self) -> BoxFuture<'_, Result<SampleResponse, ServiceError>>;

    fn import_source_title(
        &self,
        url: String,
    ) -> BoxFuture<'_, Result<SourceImportResponse, ServiceError>>;

    /// Best-effort: callers swallow failures and log them.
    fn rename_speaker(
        &self,
        old_name: String,
        new_name: String,
    ) -> BoxFuture<'_, Result<(), ServiceError>>;

    /// Best-effort: callers swallow failures and log them.
    fn update_transcript_speakers(
        &self,
        slug: String,
        update: TranscriptSpeakersUpdate,
    ) -> BoxFuture<'_, Result<(), ServiceError>>;
}
