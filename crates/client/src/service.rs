//! [`ConversationService`] implementation over the HTTP client, so a
//! session can run against the live services.

use argmap_interface::{
    AnalyzeRequest, AnalyzeResponse, DiarizeRequest, DiarizeResponse, IncrementalAnalyzeRequest,
    IncrementalAnalyzeResponse, SampleResponse, SessionHandle, SourceImportResponse,
    TranscriptDetail, TranscriptSpeakersUpdate,
};
use argmap_session::{BoxFuture, ConversationService, ServiceError};

use crate::client::ApiClient;

impl ConversationService for ApiClient {
    fn transcribe(&self, audio: Vec<u8>) -> BoxFuture<'_, Result<String, ServiceError>> {
        Box::pin(async move {
            self.transcribe_audio(audio, "chunk.webm")
                .await
                .map_err(Into::into)
        })
    }

    fn diarize(
        &self,
        request: DiarizeRequest,
    ) -> BoxFuture<'_, Result<DiarizeResponse, ServiceError>> {
        Box::pin(async move { ApiClient::diarize(self, &request).await.map_err(Into::into) })
    }

    fn analyze(
        &self,
        request: AnalyzeRequest,
    ) -> BoxFuture<'_, Result<AnalyzeResponse, ServiceError>> {
        Box::pin(async move { ApiClient::analyze(self, &request).await.map_err(Into::into) })
    }

    fn analyze_incremental(
        &self,
        request: IncrementalAnalyzeRequest,
    ) -> BoxFuture<'_, Result<IncrementalAnalyzeResponse, ServiceError>> {
        Box::pin(async move {
            ApiClient::analyze_incremental(self, &request)
                .await
                .map_err(Into::into)
        })
    }

    fn create_session(&self) -> BoxFuture<'_, Result<SessionHandle, ServiceError>> {
        Box::pin(async move { ApiClient::create_session(self).await.map_err(Into::into) })
    }

    fn fetch_transcript(
        &self,
        slug: String,
    ) -> BoxFuture<'_, Result<TranscriptDetail, ServiceError>> {
        Box::pin(async move { self.get_transcript(&slug).await.map_err(Into::into) })
    }

    fn fetch_sample(&self) -> BoxFuture<'_, Result<SampleResponse, ServiceError>> {
        Box::pin(async move { ApiClient::fetch_sample(self).await.map_err(Into::into) })
    }

    fn import_source_title(
        &self,
        url: String,
    ) -> BoxFuture<'_, Result<SourceImportResponse, ServiceError>> {
        Box::pin(async move {
            ApiClient::import_source_title(self, &url)
                .await
                .map_err(Into::into)
        })
    }

    fn rename_speaker(
        &self,
        old_name: String,
        new_name: String,
    ) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            ApiClient::rename_speaker(self, &old_name, &new_name)
                .await
                .map_err(Into::into)
        })
    }

    fn update_transcript_speakers(
        &self,
        slug: String,
        update: TranscriptSpeakersUpdate,
    ) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            ApiClient::update_transcript_speakers(self, &slug, &update)
                .await
                .map_err(Into::into)
        })
    }
}
