//! HTTP bindings for the video analysis backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{
    AiAnswer, AiInsightsResponse, AiTextInsight, AnalysisOutcome, AnalysisRequest,
    BatchAnalysisResult, DwellTimeAnalysis, FilterRequest, HeatmapInsightRequest, MetricsSnapshot,
    QaRequest, ResultPatch,
};
use crate::upload::VideoSource;

pub const ANALYZE_PATH: &str = "/analyze";
pub const ANALYZE_BATCH_PATH: &str = "/analyze-batch";
pub const APPLY_FILTERS_PATH: &str = "/apply-filters";
pub const STREAM_PATH: &str = "/stream";
pub const AI_INSIGHTS_PATH: &str = "/ai/insights";
pub const AI_QA_PATH: &str = "/ai/qa";
pub const AI_QA_STREAM_PATH: &str = "/ai/qa/stream";
pub const AI_DWELL_INSIGHT_PATH: &str = "/ai/dwell-time-insight";
pub const AI_HEATMAP_INSIGHT_PATH: &str = "/ai/heatmap-insight";

const VIDEO_FIELD: &str = "video";
const VIDEOS_FIELD: &str = "videos";
const MAX_DURATION_FIELD: &str = "max_duration";
const FRAME_SKIP_FIELD: &str = "frame_skip_multiplier";
const SAVE_TO_BLOB_FIELD: &str = "save_to_blob";
const GENERATE_VIDEO_FIELD: &str = "generate_video";

/// Byte-level transfer observer: `(sent, total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Thin typed client over the backend's HTTP surface. Holds no session
/// state; every call is independent.
#[derive(Debug, Clone)]
pub struct AnalysisApi {
    http: reqwest::Client,
    base_url: String,
}

impl AnalysisApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ClientError::from_transport)?;
        Ok(Self {
            http,
            base_url: config.normalized_base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit one video for analysis. `observer` is invoked with the byte
    /// counts as the request body streams out.
    pub async fn analyze(
        &self,
        source: &VideoSource,
        request: &AnalysisRequest,
        observer: ProgressFn,
    ) -> Result<AnalysisOutcome> {
        request.validate()?;
        let sent = Arc::new(AtomicU64::new(0));
        let part = video_part(source, sent, source.size_bytes, observer).await?;
        let form = scalar_form(request).part(VIDEO_FIELD, part);

        log::debug!("POST {} ({} bytes)", ANALYZE_PATH, source.size_bytes);
        let resp = self
            .http
            .post(self.endpoint(ANALYZE_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await.map_err(ClientError::from_transport)?;
        AnalysisOutcome::decode(&body)
    }

    /// Submit several videos in one request. The backend must answer with a
    /// batch-tagged body. Transfer progress is reported over the summed
    /// byte count of all files.
    pub async fn analyze_batch(
        &self,
        sources: &[VideoSource],
        request: &AnalysisRequest,
        observer: ProgressFn,
    ) -> Result<BatchAnalysisResult> {
        request.validate()?;
        if sources.is_empty() {
            return Err(ClientError::InvalidRequest(
                "a batch submission needs at least one video".to_string(),
            ));
        }

        let sent = Arc::new(AtomicU64::new(0));
        let total: u64 = sources.iter().map(|s| s.size_bytes).sum();
        let mut form = scalar_form(request);
        for source in sources {
            let part =
                video_part(source, Arc::clone(&sent), total, Arc::clone(&observer)).await?;
            form = form.part(VIDEOS_FIELD, part);
        }

        log::debug!(
            "POST {} ({} files, {} bytes)",
            ANALYZE_BATCH_PATH,
            sources.len(),
            total
        );
        let resp = self
            .http
            .post(self.endpoint(ANALYZE_BATCH_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await.map_err(ClientError::from_transport)?;
        AnalysisOutcome::decode(&body)?.require_batch()
    }

    /// Recompute a finished analysis with tracks excluded. Answers with a
    /// partial result meant for [`AnalysisResult::merge_patch`].
    ///
    /// [`AnalysisResult::merge_patch`]: crate::models::AnalysisResult::merge_patch
    pub async fn apply_filters(&self, request: &FilterRequest) -> Result<ResultPatch> {
        self.post_json(APPLY_FILTERS_PATH, request, "filter").await
    }

    pub async fn insights(&self, metrics: &MetricsSnapshot) -> Result<AiInsightsResponse> {
        #[derive(Serialize)]
        struct Payload<'a> {
            metrics: &'a MetricsSnapshot,
        }
        self.post_json(AI_INSIGHTS_PATH, &Payload { metrics }, "insights")
            .await
    }

    pub async fn ask(&self, request: &QaRequest) -> Result<AiAnswer> {
        self.post_json(AI_QA_PATH, request, "answer").await
    }

    /// Streaming variant of [`ask`](Self::ask). Text chunks are handed to
    /// `on_chunk` as they arrive; the full answer is also returned.
    pub async fn ask_stream<F>(&self, request: &QaRequest, mut on_chunk: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let resp = self
            .http
            .post(self.endpoint(AI_QA_STREAM_PATH))
            .json(request)
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        let resp = check_status(resp).await?;

        let mut answer = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ClientError::from_transport)?;
            pending.extend_from_slice(&chunk);
            // Emit only the valid UTF-8 prefix; a multi-byte character cut
            // by the chunk boundary waits for the rest.
            let valid_up_to = match std::str::from_utf8(&pending) {
                Ok(_) => pending.len(),
                Err(e) => e.valid_up_to(),
            };
            if valid_up_to > 0 {
                let text = String::from_utf8_lossy(&pending[..valid_up_to]).into_owned();
                on_chunk(&text);
                answer.push_str(&text);
                pending.drain(..valid_up_to);
            }
        }
        if !pending.is_empty() {
            let text = String::from_utf8_lossy(&pending).into_owned();
            on_chunk(&text);
            answer.push_str(&text);
        }
        Ok(answer)
    }

    pub async fn dwell_insight(&self, dwell: &DwellTimeAnalysis) -> Result<AiTextInsight> {
        self.post_json(AI_DWELL_INSIGHT_PATH, dwell, "dwell insight")
            .await
    }

    pub async fn heatmap_insight(&self, request: &HeatmapInsightRequest) -> Result<AiTextInsight> {
        self.post_json(AI_HEATMAP_INSIGHT_PATH, request, "heatmap insight")
            .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, what: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(ClientError::from_transport)?;
        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await.map_err(ClientError::from_transport)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Decode(format!("invalid {} response: {}", what, e)))
    }

    /// Playback URL for a blob-stored artifact, with the blob path carried
    /// as a query parameter.
    pub fn stream_url(&self, blob_path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint(STREAM_PATH))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        url.query_pairs_mut().append_pair("blob", blob_path);
        Ok(url)
    }

    /// Server links arrive relative (`/files/...`); anchor them on the
    /// configured base URL. Absolute links pass through untouched.
    pub fn absolute_link(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with('/') {
            format!("{}{}", self.base_url, link)
        } else {
            format!("{}/{}", self.base_url, link)
        }
    }
}

fn scalar_form(request: &AnalysisRequest) -> Form {
    Form::new()
        .text(MAX_DURATION_FIELD, request.max_duration.to_string())
        .text(FRAME_SKIP_FIELD, request.frame_skip.as_field())
        .text(SAVE_TO_BLOB_FIELD, request.save_to_blob.to_string())
        .text(GENERATE_VIDEO_FIELD, request.generate_video.to_string())
}

/// Build a streamed multipart part for one video file. The byte counter is
/// shared across parts so batch uploads report one combined fraction.
async fn video_part(
    source: &VideoSource,
    sent: Arc<AtomicU64>,
    total_bytes: u64,
    observer: ProgressFn,
) -> Result<Part> {
    let file = File::open(&source.path).await?;
    let stream = ReaderStream::new(file).inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            observer(done, total_bytes);
        }
    });
    Part::stream_with_length(Body::wrap_stream(stream), source.size_bytes)
        .file_name(source.file_name.clone())
        .mime_str(source.content_type)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid content type: {}", e)))
}

/// Map a non-success response to the error taxonomy. Oversize and server
/// faults take precedence over whatever the body says; other rejections
/// surface the backend's own `detail` when it sent one.
fn classify_rejection(status: StatusCode, body: &[u8]) -> ClientError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return ClientError::FileTooLarge;
    }
    if status.is_server_error() {
        return ClientError::ServerError;
    }
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(detail) = value.get("detail").and_then(Value::as_str) {
            return ClientError::Rejected {
                status: status.as_u16(),
                detail: detail.to_string(),
            };
        }
    }
    ClientError::Status(status.as_u16())
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    Err(classify_rejection(status, &body))
}
