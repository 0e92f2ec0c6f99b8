use serde::de::DeserializeOwned;

use argmap_interface::{
    AnalyzeRequest, AnalyzeResponse, DiarizeRequest, DiarizeResponse, IncrementalAnalyzeRequest,
    IncrementalAnalyzeResponse, SampleResponse, SessionHandle, SourceImportRequest,
    SourceImportResponse, SpeakerDetail, SpeakerSummary, TranscriptDetail, TranscriptListItem,
    TranscriptSpeakersUpdate,
};

use crate::error::Error;

/// HTTP client for the conversation services: transcription, diarization,
/// statement analysis, and the persistence/browse surface behind them.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
}

pub struct ApiClientBuilder {
    api_base: Option<String>,
    http: Option<reqwest::Client>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            api_base: None,
            http: None,
        }
    }
}

impl ApiClientBuilder {
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Use a preconfigured `reqwest::Client` (timeouts, proxies, headers).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> ApiClient {
        let api_base = self
            .api_base
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        ApiClient {
            http: self.http.unwrap_or_default(),
            api_base,
        }
    }
}

#[derive(serde::Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            tracing::debug!(%status, %message, "API call failed");
            return Err(Error::Api(message));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn expect_success(response: reqwest::Response) -> Result<(), Error> {
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::Api(message));
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    pub async fn create_session(&self) -> Result<SessionHandle, Error> {
        let response = self.http.post(self.url("/api/session/new")).send().await?;
        Self::decode(response).await
    }

    /// Submit an audio blob for transcription. The blob must be a
    /// contiguous stream from recording start.
    pub async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<String, Error> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/webm")?;
        let form = reqwest::multipart::Form::new().part("audio", part);
        let response = self
            .http
            .post(self.url("/api/transcribe"))
            .multipart(form)
            .send()
            .await?;
        let body: TranscribeResponse = Self::decode(response).await?;
        Ok(body.text)
    }

    pub async fn diarize(&self, request: &DiarizeRequest) -> Result<DiarizeResponse, Error> {
        self.post_json("/api/diarize", request).await
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, Error> {
        self.post_json("/api/analyze", request).await
    }

    pub async fn analyze_incremental(
        &self,
        request: &IncrementalAnalyzeRequest,
    ) -> Result<IncrementalAnalyzeResponse, Error> {
        self.post_json("/api/analyze-incremental", request).await
    }

    pub async fn list_transcripts(&self) -> Result<Vec<TranscriptListItem>, Error> {
        self.get_json("/api/transcripts").await
    }

    pub async fn get_transcript(&self, slug: &str) -> Result<TranscriptDetail, Error> {
        self.get_json(&format!("/api/transcripts/{}", urlencoding::encode(slug)))
            .await
    }

    pub async fn update_transcript_speakers(
        &self,
        slug: &str,
        update: &TranscriptSpeakersUpdate,
    ) -> Result<(), Error> {
        let path = format!("/api/transcripts/{}/speakers", urlencoding::encode(slug));
        let response = self.http.put(self.url(&path)).json(update).send().await?;
        Self::expect_success(response).await
    }

    pub async fn list_speakers(&self) -> Result<Vec<SpeakerSummary>, Error> {
        self.get_json("/api/speakers").await
    }

    pub async fn get_speaker(&self, name: &str) -> Result<SpeakerDetail, Error> {
        self.get_json(&format!("/api/speakers/{}", urlencoding::encode(name)))
            .await
    }

    pub async fn rename_speaker(&self, old_name: &str, new_name: &str) -> Result<(), Error> {
        let path = format!("/api/speakers/{}", urlencoding::encode(old_name));
        let body = serde_json::json!({ "name": new_name });
        let response = self.http.put(self.url(&path)).json(&body).send().await?;
        Self::expect_success(response).await
    }

    pub async fn fetch_sample(&self) -> Result<SampleResponse, Error> {
        let response = self.http.post(self.url("/api/sample")).send().await?;
        Self::decode(response).await
    }

    /// Fetch only the title of an external source (YouTube import endpoint
    /// with `title_only`).
    pub async fn import_source_title(&self, url: &str) -> Result<SourceImportResponse, Error> {
        let request = SourceImportRequest {
            url: url.to_string(),
            title_only: true,
        };
        self.post_json("/api/import/youtube", &request).await
    }
}
