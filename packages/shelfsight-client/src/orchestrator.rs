//! Session orchestration: staging, submission, progress, results.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{AnalysisApi, ProgressFn};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{
    AiAnswer, AiInsightsResponse, AiTextInsight, AnalysisOutcome, AnalysisRequest, AnalysisResult,
    FilterRequest, HeatmapInsightRequest, MetricsSnapshot, QaRequest,
};
use crate::session::{reduce, SessionEvent, SessionPhase, SessionSnapshot};
use crate::store::{ResultStore, StoredResult, ViewMode};
use crate::upload::{UploadManager, VideoSource};

/// Owns one analysis session end to end: the staged files, the phase
/// machine, the in-flight request and its cancellation, and the stored
/// result. All state lives behind locks so the manager can be shared.
pub struct SessionManager {
    api: Arc<AnalysisApi>,
    uploads: RwLock<UploadManager>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    store: RwLock<ResultStore>,
    /// Active submission, keyed by attempt so a stale cleanup can never
    /// clobber a newer run's token.
    cancel: RwLock<Option<(u64, CancellationToken)>>,
}

fn dispatch(snapshot: &RwLock<SessionSnapshot>, event: SessionEvent) {
    let mut guard = snapshot.write();
    let next = reduce(&guard, &event);
    *guard = next;
}

impl SessionManager {
    pub fn new(config: &ClientConfig, preview_dir: impl Into<PathBuf>) -> Result<Self> {
        let api = Arc::new(AnalysisApi::new(config)?);
        let uploads = UploadManager::new(preview_dir)?;
        Ok(Self {
            api,
            uploads: RwLock::new(uploads),
            snapshot: Arc::new(RwLock::new(SessionSnapshot::new())),
            store: RwLock::new(ResultStore::new()),
            cancel: RwLock::new(None),
        })
    }

    pub fn api(&self) -> &AnalysisApi {
        &self.api
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }

    /// Stage local files for the next submission, replacing anything staged
    /// before. Only legal while the session is accepting uploads.
    pub fn stage_videos(&self, paths: &[PathBuf]) -> Result<Vec<Uuid>> {
        let snapshot = self.snapshot.read();
        match snapshot.phase {
            SessionPhase::Processing => Err(ClientError::AnalysisInProgress),
            SessionPhase::Completed | SessionPhase::Error => Err(ClientError::SessionNotReset),
            SessionPhase::Upload => self.uploads.write().stage(paths),
        }
    }

    pub fn staged_sources(&self) -> Vec<VideoSource> {
        self.uploads.read().sources()
    }

    pub fn staged_count(&self) -> usize {
        self.uploads.read().len()
    }

    /// Submit the staged files and drive the session to a terminal phase.
    /// One file goes to the single endpoint, several to the batch endpoint.
    /// Resolves once the backend answered, the run failed, or the session
    /// was reset out from under it.
    pub async fn run_analysis(&self, request: &AnalysisRequest) -> Result<()> {
        request.validate()?;

        // Guard and attempt bump under one write lock: two concurrent
        // submissions cannot both observe the upload phase.
        let (attempt, sources) = {
            let mut snapshot = self.snapshot.write();
            match snapshot.phase {
                SessionPhase::Processing => return Err(ClientError::AnalysisInProgress),
                SessionPhase::Completed | SessionPhase::Error => {
                    return Err(ClientError::SessionNotReset)
                }
                SessionPhase::Upload => {}
            }
            let sources = self.uploads.read().sources();
            if sources.is_empty() {
                return Err(ClientError::InvalidRequest(
                    "no videos staged for analysis".to_string(),
                ));
            }
            let attempt = snapshot.attempt + 1;
            let next = reduce(
                &snapshot,
                &SessionEvent::SubmissionAccepted {
                    attempt,
                    at: Utc::now(),
                },
            );
            *snapshot = next;
            (attempt, sources)
        };

        self.store.write().begin_new_run();

        let token = CancellationToken::new();
        *self.cancel.write() = Some((attempt, token.clone()));

        let started = Instant::now();
        let ticker = {
            let snapshot = Arc::clone(&self.snapshot);
            let token = token.clone();
            tokio::spawn(async move {
                let mut ticks = interval(Duration::from_secs(1));
                ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticks.tick() => {
                            dispatch(&snapshot, SessionEvent::ClockTick {
                                attempt,
                                elapsed_secs: started.elapsed().as_secs(),
                            });
                        }
                    }
                }
            })
        };

        let observer: ProgressFn = {
            let snapshot = Arc::clone(&self.snapshot);
            Arc::new(move |sent_bytes, total_bytes| {
                dispatch(
                    &snapshot,
                    SessionEvent::TransferAdvanced {
                        attempt,
                        sent_bytes,
                        total_bytes,
                    },
                );
            })
        };

        log::info!(
            "📤 Submitting {} file(s) for analysis (max_duration={}s, frame_skip={})",
            sources.len(),
            request.max_duration,
            request.frame_skip
        );

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(ClientError::Cancelled),
            res = async {
                if sources.len() > 1 {
                    self.api
                        .analyze_batch(&sources, request, observer)
                        .await
                        .map(AnalysisOutcome::Batch)
                } else {
                    self.api.analyze(&sources[0], request, observer).await
                }
            } => res,
        };

        token.cancel();
        let _ = ticker.await;
        {
            let mut cancel = self.cancel.write();
            if cancel.as_ref().map(|(a, _)| *a) == Some(attempt) {
                *cancel = None;
            }
        }

        match outcome {
            Ok(outcome) => {
                let files = match &outcome {
                    AnalysisOutcome::Single(_) => 1,
                    AnalysisOutcome::Batch(batch) => batch.results.len(),
                };
                // Store the result before flipping the phase so an observer
                // who sees Completed always finds it; skip both if the
                // session was reset while the response was in flight.
                let mut snapshot = self.snapshot.write();
                if snapshot.phase != SessionPhase::Processing || snapshot.attempt != attempt {
                    return Err(ClientError::Cancelled);
                }
                self.store.write().accept(outcome);
                let next = reduce(
                    &snapshot,
                    &SessionEvent::AnalysisSucceeded {
                        attempt,
                        at: Utc::now(),
                    },
                );
                *snapshot = next;
                drop(snapshot);
                log::info!("✅ Analysis complete ({} result(s))", files);
                Ok(())
            }
            Err(err) if err.is_cancelled() => {
                log::info!("Analysis cancelled");
                Err(err)
            }
            Err(err) => {
                let message = err.user_message();
                dispatch(
                    &self.snapshot,
                    SessionEvent::AnalysisFailed {
                        attempt,
                        message: message.clone(),
                        at: Utc::now(),
                    },
                );
                log::error!("❌ Analysis failed: {}", message);
                Err(err)
            }
        }
    }

    /// Flip one track in or out of the excluded set, then ask the backend
    /// for a filtered recompute when the loaded result supports it. The
    /// recompute is best-effort: a failure keeps the toggle and the current
    /// numbers, and never moves the session phase. Returns whether the
    /// track is now excluded.
    pub async fn toggle_track_exclusion(&self, track_id: u64) -> Result<bool> {
        let (excluded, filter) = {
            let mut store = self.store.write();
            if !store.has_result() {
                return Err(ClientError::NoActiveResult);
            }
            let excluded = store.toggle_exclusion(track_id);
            let filter = match store.active_result() {
                Some(result) => match (result.analysis_id(), result.processing.clone()) {
                    (Some(id), Some(processing)) => Some(FilterRequest {
                        analysis_id: id.to_string(),
                        excluded_track_ids: store.excluded_as_wire(),
                        processing,
                    }),
                    _ => None,
                },
                None => None,
            };
            (excluded, filter)
        };

        if let Some(filter) = filter {
            match self.api.apply_filters(&filter).await {
                Ok(patch) => {
                    let mut store = self.store.write();
                    match store.merge_active(patch) {
                        Ok(()) => log::info!(
                            "Filtered view updated ({} track(s) excluded)",
                            filter.excluded_track_ids.len()
                        ),
                        Err(err) => log::warn!("Filtered result arrived too late: {}", err),
                    }
                }
                Err(err) => {
                    log::warn!(
                        "Filtered recompute failed, exclusions kept: {}",
                        err.user_message()
                    );
                }
            }
        }
        Ok(excluded)
    }

    /// Abandon the session: cancel any in-flight submission, drop the
    /// stored result and exclusions, release staged files and previews,
    /// and return to the upload phase.
    pub fn reset(&self) -> SessionSnapshot {
        if let Some((_, token)) = self.cancel.write().take() {
            token.cancel();
        }
        self.store.write().clear();
        self.uploads.write().clear();
        dispatch(&self.snapshot, SessionEvent::SessionReset);
        log::info!("Session reset");
        self.snapshot()
    }

    // ------------------------------------------------------------------
    // Result access
    // ------------------------------------------------------------------

    pub fn has_result(&self) -> bool {
        self.store.read().has_result()
    }

    pub fn result(&self) -> Option<StoredResult> {
        self.store.read().stored().cloned()
    }

    /// The result currently displayed: the single result, or the selected
    /// file of a batch.
    pub fn active_result(&self) -> Option<AnalysisResult> {
        self.store.read().active_result().cloned()
    }

    pub fn select_file(&self, index: usize) -> Result<()> {
        self.store.write().select_file(index)
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.store.write().set_view_mode(mode);
    }

    pub fn is_excluded(&self, track_id: u64) -> bool {
        self.store.read().is_excluded(track_id)
    }

    pub fn excluded_tracks(&self) -> Vec<u64> {
        self.store.read().excluded_tracks().iter().copied().collect()
    }

    /// Playback URL for the annotated video: blob-stored artifacts go
    /// through the stream endpoint, direct links are anchored on the base
    /// URL.
    pub fn video_playback_url(&self) -> Result<String> {
        let store = self.store.read();
        let result = store.active_result().ok_or(ClientError::NoActiveResult)?;
        let links = &result.download_links;
        if let Some(blob) = &links.annotated_video_blob_path {
            return Ok(self.api.stream_url(blob)?.to_string());
        }
        if let Some(stream) = &links.annotated_video_stream {
            return Ok(self.api.absolute_link(stream));
        }
        Err(ClientError::InvalidRequest(
            "no annotated video available for this analysis".to_string(),
        ))
    }

    /// Download links of the displayed result as (name, absolute URL). The
    /// blob path is playback routing, not a download, so it is left out.
    pub fn download_entries(&self) -> Vec<(String, String)> {
        let store = self.store.read();
        match store.active_result() {
            Some(result) => result
                .download_links
                .entries()
                .into_iter()
                .filter(|(name, _)| name != "annotated_video_blob_path")
                .map(|(name, link)| (name, self.api.absolute_link(&link)))
                .collect(),
            None => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // AI assistant
    // ------------------------------------------------------------------

    fn active_metrics(&self) -> Result<MetricsSnapshot> {
        self.store
            .read()
            .active_result()
            .map(MetricsSnapshot::from_result)
            .ok_or(ClientError::NoActiveResult)
    }

    pub async fn generate_insights(&self) -> Result<AiInsightsResponse> {
        let metrics = self.active_metrics()?;
        self.api.insights(&metrics).await
    }

    pub async fn ask(&self, question: &str) -> Result<AiAnswer> {
        let request = QaRequest {
            question: question.to_string(),
            metrics: self.active_metrics()?,
        };
        self.api.ask(&request).await
    }

    /// Streaming question answering; chunks go to `on_chunk` as they
    /// arrive and the assembled answer is returned.
    pub async fn ask_streaming<F>(&self, question: &str, on_chunk: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let request = QaRequest {
            question: question.to_string(),
            metrics: self.active_metrics()?,
        };
        self.api.ask_stream(&request, on_chunk).await
    }

    pub async fn dwell_insight(&self) -> Result<AiTextInsight> {
        let dwell = self
            .store
            .read()
            .active_result()
            .map(|r| r.dwell_time_analysis.clone())
            .ok_or(ClientError::NoActiveResult)?;
        self.api.dwell_insight(&dwell).await
    }

    pub async fn heatmap_insight(&self) -> Result<AiTextInsight> {
        let request = {
            let store = self.store.read();
            let result = store.active_result().ok_or(ClientError::NoActiveResult)?;
            HeatmapInsightRequest {
                metrics: MetricsSnapshot::from_result(result),
                heatmap_image_url: result
                    .download_links
                    .heatmap_image
                    .as_deref()
                    .map(|link| self.api.absolute_link(link)),
            }
        };
        self.api.heatmap_insight(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(previews: &TempDir) -> SessionManager {
        SessionManager::new(&ClientConfig::default(), previews.path()).unwrap()
    }

    #[test]
    fn test_fresh_session_is_idle() {
        let previews = TempDir::new().unwrap();
        let mgr = manager(&previews);
        let snapshot = mgr.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Upload);
        assert_eq!(snapshot.attempt, 0);
        assert_eq!(snapshot.progress.percent(), 0.0);
        assert!(!mgr.has_result());
    }

    #[tokio::test]
    async fn test_run_without_staged_files_is_rejected() {
        let previews = TempDir::new().unwrap();
        let mgr = manager(&previews);
        let err = mgr
            .run_analysis(&AnalysisRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        // The guard fires before any state moves.
        assert_eq!(mgr.snapshot().phase, SessionPhase::Upload);
        assert_eq!(mgr.snapshot().attempt, 0);
    }

    #[tokio::test]
    async fn test_toggle_without_result_is_rejected() {
        let previews = TempDir::new().unwrap();
        let mgr = manager(&previews);
        let err = mgr.toggle_track_exclusion(3).await.unwrap_err();
        assert!(matches!(err, ClientError::NoActiveResult));
    }

    #[test]
    fn test_reset_clears_staged_files() {
        let previews = TempDir::new().unwrap();
        let inputs = TempDir::new().unwrap();
        let video = inputs.path().join("cam.mp4");
        std::fs::write(&video, b"frames").unwrap();

        let mgr = manager(&previews);
        mgr.stage_videos(&[video]).unwrap();
        assert_eq!(mgr.staged_count(), 1);

        let snapshot = mgr.reset();
        assert_eq!(snapshot.phase, SessionPhase::Upload);
        assert_eq!(mgr.staged_count(), 0);
    }

    #[test]
    fn test_playback_url_requires_result() {
        let previews = TempDir::new().unwrap();
        let mgr = manager(&previews);
        assert!(matches!(
            mgr.video_playback_url().unwrap_err(),
            ClientError::NoActiveResult
        ));
        assert!(mgr.download_entries().is_empty());
    }
}
