// End-to-end tests against a mock analysis backend.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::{sleep, Duration};

use shelfsight_client::{
    AnalysisRequest, ClientConfig, ClientError, SessionManager, SessionPhase, StoredResult,
};

#[derive(Default)]
struct Recorded {
    fields: Mutex<BTreeMap<String, String>>,
    videos: Mutex<Vec<(String, usize)>>,
    filters: Mutex<Vec<Value>>,
    ai: Mutex<Vec<(String, Value)>>,
}

type Shared = Arc<Recorded>;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn single_result_body() -> Value {
    json!({
        "unique_persons": 7,
        "total_interactions": 41,
        "action_summary": {"reach": 22, "touch": 19},
        "shelf_interactions": {"shelf_1": 30, "shelf_2": 11},
        "dwell_time_analysis": {
            "average_dwell_time": 4.2,
            "max_dwell_time": 11.0,
            "person_dwell_times": {"1": 11.0, "2": 3.5}
        },
        "behavioral_insights": {
            "most_common_action": "reach",
            "total_actions_detected": 41,
            "average_confidence": 0.87
        },
        "action_shelf_mapping": [[1, 120, "shelf_1", "reach"]],
        "metadata": {"analysis_id": "an-1", "original_filename": "cam.mp4"},
        "download_links": {
            "csv_report": "/files/an-1/report.csv",
            "annotated_video_blob_path": "runs/an-1/annotated.mp4",
            "heatmap_image": "/files/an-1/heatmap.png"
        },
        "processing": {"tracks": [1, 2, 3]}
    })
}

fn batch_result_body() -> Value {
    json!({
        "analysis_type": "batch_analysis",
        "batch_id": "b-1",
        "results": [single_result_body(), single_result_body()],
        "summary": {
            "total_videos": 2,
            "total_unique_persons": 14,
            "total_interactions": 82,
            "average_dwell_time": 4.2
        }
    })
}

async fn record_multipart(recorded: &Recorded, multipart: &mut Multipart) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "video" || name == "videos" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.unwrap();
            recorded.videos.lock().push((file_name, data.len()));
        } else {
            let value = field.text().await.unwrap();
            recorded.fields.lock().insert(name, value);
        }
    }
}

async fn analyze_ok(State(recorded): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    record_multipart(&recorded, &mut multipart).await;
    Json(single_result_body())
}

async fn analyze_batch_ok(State(recorded): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    record_multipart(&recorded, &mut multipart).await;
    Json(batch_result_body())
}

async fn analyze_batch_untagged(
    State(recorded): State<Shared>,
    mut multipart: Multipart,
) -> Json<Value> {
    record_multipart(&recorded, &mut multipart).await;
    Json(single_result_body())
}

async fn analyze_too_large(State(recorded): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
    record_multipart(&recorded, &mut multipart).await;
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(json!({"detail": "upload exceeds limit"})),
    )
}

async fn analyze_crash(State(recorded): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
    record_multipart(&recorded, &mut multipart).await;
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": "tracker panicked"})),
    )
}

async fn analyze_unsupported(
    State(recorded): State<Shared>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    record_multipart(&recorded, &mut multipart).await;
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"detail": "Unsupported video codec"})),
    )
}

async fn analyze_slow(State(recorded): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    record_multipart(&recorded, &mut multipart).await;
    sleep(Duration::from_secs(30)).await;
    Json(single_result_body())
}

async fn filters_ok(State(recorded): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    recorded.filters.lock().push(body);
    Json(json!({
        "unique_persons": 5,
        "total_interactions": 28,
        "download_links": {"heatmap_image": "/files/an-1/heatmap-v2.png"}
    }))
}

async fn filters_fail(State(recorded): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    recorded.filters.lock().push(body);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": "recompute crashed"})),
    )
}

async fn ai_insights(State(recorded): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    recorded.ai.lock().push(("insights".to_string(), body));
    Json(json!({
        "insights": [
            {"title": "Busy aisle", "description": "Shelf 1 dominates traffic", "category": "traffic"}
        ]
    }))
}

async fn ai_qa(State(recorded): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    recorded.ai.lock().push(("qa".to_string(), body));
    Json(json!({"answer": "Seven people visited the store."}))
}

async fn ai_qa_stream(State(recorded): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    recorded.ai.lock().push(("qa_stream".to_string(), body));
    const CHUNKS: [&str; 3] = ["The store ", "saw steady ", "traffic."];
    let stream = futures_util::stream::unfold(0usize, |i| async move {
        if i >= CHUNKS.len() {
            return None;
        }
        if i > 0 {
            sleep(Duration::from_millis(30)).await;
        }
        Some((Ok::<_, std::io::Error>(Bytes::from(CHUNKS[i])), i + 1))
    });
    Body::from_stream(stream)
}

async fn ai_dwell(State(recorded): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    recorded.ai.lock().push(("dwell".to_string(), body));
    Json(json!({"insight": "Average dwell is healthy for this format."}))
}

async fn ai_heatmap(State(recorded): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    recorded.ai.lock().push(("heatmap".to_string(), body));
    Json(json!({"insight": "Hot zone near the entrance endcap."}))
}

fn full_router(recorded: Shared) -> Router {
    Router::new()
        .route("/analyze", post(analyze_ok))
        .route("/analyze-batch", post(analyze_batch_ok))
        .route("/apply-filters", post(filters_ok))
        .route("/ai/insights", post(ai_insights))
        .route("/ai/qa", post(ai_qa))
        .route("/ai/qa/stream", post(ai_qa_stream))
        .route("/ai/dwell-time-insight", post(ai_dwell))
        .route("/ai/heatmap-insight", post(ai_heatmap))
        .with_state(recorded)
}

struct Fixture {
    mgr: SessionManager,
    recorded: Shared,
    base_url: String,
    _previews: TempDir,
    _inputs: TempDir,
    videos: Vec<PathBuf>,
}

/// Start a backend from `routes`, build a manager against it, and write
/// `file_count` small videos ready to stage.
async fn fixture(routes: fn(Shared) -> Router, file_count: usize) -> Fixture {
    fixture_with_timeout(routes, file_count, None).await
}

async fn fixture_with_timeout(
    routes: fn(Shared) -> Router,
    file_count: usize,
    timeout_secs: Option<u64>,
) -> Fixture {
    let recorded: Shared = Arc::new(Recorded::default());
    let base_url = serve(routes(Arc::clone(&recorded))).await;

    let mut config = ClientConfig::new(base_url.clone());
    if let Some(secs) = timeout_secs {
        config = config.with_timeout_secs(secs);
    }

    let previews = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let mut videos = Vec::new();
    for i in 0..file_count {
        let path = inputs.path().join(format!("cam{}.mp4", i));
        std::fs::write(&path, format!("shelf camera footage {}", i)).unwrap();
        videos.push(path);
    }

    let mgr = SessionManager::new(&config, previews.path()).unwrap();
    Fixture {
        mgr,
        recorded,
        base_url,
        _previews: previews,
        _inputs: inputs,
        videos,
    }
}

#[tokio::test]
async fn test_single_analysis_round_trip() {
    let fx = fixture(full_router, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();

    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    let snapshot = fx.mgr.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Completed);
    assert_eq!(snapshot.progress.percent(), 100.0);
    assert!(snapshot.error.is_none());
    assert!(fx.mgr.has_result());

    let result = fx.mgr.active_result().unwrap();
    assert_eq!(result.unique_persons, 7);
    assert_eq!(result.analysis_id(), Some("an-1"));

    // The backend saw exactly the documented form fields.
    let fields = fx.recorded.fields.lock().clone();
    assert_eq!(fields["max_duration"], "30");
    assert_eq!(fields["frame_skip_multiplier"], "1");
    assert_eq!(fields["save_to_blob"], "true");
    assert_eq!(fields["generate_video"], "true");

    let videos = fx.recorded.videos.lock().clone();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].0, "cam0.mp4");
    assert_eq!(videos[0].1, "shelf camera footage 0".len());

    // Blob-stored artifacts play through the stream endpoint.
    assert_eq!(
        fx.mgr.video_playback_url().unwrap(),
        format!("{}/stream?blob=runs%2Fan-1%2Fannotated.mp4", fx.base_url)
    );
    let downloads = fx.mgr.download_entries();
    assert!(downloads
        .iter()
        .any(|(name, url)| name == "csv_report"
            && url == &format!("{}/files/an-1/report.csv", fx.base_url)));
    assert!(downloads.iter().all(|(name, _)| name != "annotated_video_blob_path"));
}

#[tokio::test]
async fn test_batch_analysis_round_trip() {
    let fx = fixture(full_router, 2).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    assert_eq!(fx.mgr.staged_count(), 2);

    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    assert_eq!(fx.mgr.snapshot().phase, SessionPhase::Completed);
    match fx.mgr.result().unwrap() {
        StoredResult::Batch(batch) => {
            assert_eq!(batch.results.len(), 2);
            assert_eq!(batch.summary.unwrap().total_videos, 2);
        }
        StoredResult::Single(_) => panic!("expected a batch result"),
    }

    // Both files travelled as repeated `videos` parts in one request.
    let videos = fx.recorded.videos.lock().clone();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].0, "cam0.mp4");
    assert_eq!(videos[1].0, "cam1.mp4");

    // The cursor walks the per-file results.
    fx.mgr.select_file(1).unwrap();
    assert!(fx.mgr.active_result().is_some());
    assert!(fx.mgr.select_file(2).is_err());
}

#[tokio::test]
async fn test_batch_response_without_tag_is_an_error() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze-batch", post(analyze_batch_untagged))
            .with_state(recorded)
    }
    let fx = fixture(routes, 2).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();

    let err = fx
        .mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));

    let snapshot = fx.mgr.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Error);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Analysis failed. Check the server connection and try again.")
    );
    assert_eq!(snapshot.progress.percent(), 0.0);
    assert!(!fx.mgr.has_result());
}

#[tokio::test]
async fn test_oversize_rejection_message() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze", post(analyze_too_large))
            .with_state(recorded)
    }
    let fx = fixture(routes, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();

    let err = fx
        .mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::FileTooLarge));
    assert_eq!(
        fx.mgr.snapshot().error.as_deref(),
        Some("File too large - the maximum upload size was exceeded.")
    );
}

#[tokio::test]
async fn test_server_fault_overrides_detail() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze", post(analyze_crash))
            .with_state(recorded)
    }
    let fx = fixture(routes, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();

    let err = fx
        .mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ServerError));
    // The body's detail is ignored for 500-class answers.
    assert_eq!(
        fx.mgr.snapshot().error.as_deref(),
        Some("Server error while processing the analysis - try again in a few minutes.")
    );
}

#[tokio::test]
async fn test_backend_detail_shown_verbatim() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze", post(analyze_unsupported))
            .with_state(recorded)
    }
    let fx = fixture(routes, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();

    let err = fx
        .mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status: 422, .. }));
    assert_eq!(
        fx.mgr.snapshot().error.as_deref(),
        Some("Unsupported video codec")
    );
}

#[tokio::test]
async fn test_timeout_message() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze", post(analyze_slow))
            .with_state(recorded)
    }
    let fx = fixture_with_timeout(routes, 1, Some(1)).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();

    let err = fx
        .mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
    assert_eq!(
        fx.mgr.snapshot().error.as_deref(),
        Some("Request timed out - the file may be too large or the server is busy.")
    );
}

#[tokio::test]
async fn test_processing_guard_and_reset_cancellation() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze", post(analyze_slow))
            .with_state(recorded)
    }
    let fx = fixture(routes, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    let mgr = Arc::new(fx.mgr);

    let run = tokio::spawn({
        let mgr = Arc::clone(&mgr);
        async move { mgr.run_analysis(&AnalysisRequest::default()).await }
    });

    let mut polls = 0;
    while mgr.snapshot().phase != SessionPhase::Processing {
        sleep(Duration::from_millis(20)).await;
        polls += 1;
        assert!(polls < 250, "submission never reached the processing phase");
    }

    // Gauge advances with the clock and stays under the ceiling.
    let first = mgr.snapshot().progress.percent();
    sleep(Duration::from_millis(1200)).await;
    let second = mgr.snapshot().progress.percent();
    assert!(second >= first);
    assert!(second < 90.0);

    // One submission at a time.
    let err = mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AnalysisInProgress));

    let snapshot = mgr.reset();
    assert_eq!(snapshot.phase, SessionPhase::Upload);
    assert_eq!(snapshot.progress.percent(), 0.0);
    assert_eq!(mgr.staged_count(), 0);
    // Previews are gone along with the staged set.
    assert_eq!(std::fs::read_dir(fx._previews.path()).unwrap().count(), 0);

    let result = run.await.unwrap();
    assert!(matches!(result.unwrap_err(), ClientError::Cancelled));

    // The ticker died with the run: progress stays at zero.
    sleep(Duration::from_millis(1200)).await;
    assert_eq!(mgr.snapshot().progress.percent(), 0.0);
    assert!(!mgr.has_result());
}

#[tokio::test]
async fn test_terminal_phase_requires_reset() {
    let fx = fixture(full_router, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    let err = fx
        .mgr
        .run_analysis(&AnalysisRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::SessionNotReset));
    let err = fx.mgr.stage_videos(&fx.videos).unwrap_err();
    assert!(matches!(err, ClientError::SessionNotReset));

    fx.mgr.toggle_track_exclusion(9).await.unwrap();
    assert!(fx.mgr.is_excluded(9));

    fx.mgr.reset();
    assert!(!fx.mgr.has_result());
    assert!(fx.mgr.excluded_tracks().is_empty());
    fx.mgr.stage_videos(&fx.videos).unwrap();
    assert_eq!(fx.mgr.staged_count(), 1);
}

#[tokio::test]
async fn test_filter_failure_keeps_exclusions() {
    fn routes(recorded: Shared) -> Router {
        Router::new()
            .route("/analyze", post(analyze_ok))
            .route("/apply-filters", post(filters_fail))
            .with_state(recorded)
    }
    let fx = fixture(routes, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    let excluded = fx.mgr.toggle_track_exclusion(42).await.unwrap();
    assert!(excluded);
    assert!(fx.mgr.is_excluded(42));

    // The recompute failed, so the numbers did not move and the session
    // did not leave its terminal phase.
    let result = fx.mgr.active_result().unwrap();
    assert_eq!(result.unique_persons, 7);
    let snapshot = fx.mgr.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Completed);
    assert!(snapshot.error.is_none());
    assert_eq!(fx.recorded.filters.lock().len(), 1);
}

#[tokio::test]
async fn test_filter_success_merges_patch() {
    let fx = fixture(full_router, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    let excluded = fx.mgr.toggle_track_exclusion(42).await.unwrap();
    assert!(excluded);

    // Request carried the id, the wire-form exclusions, and the opaque
    // processing payload.
    {
        let filters = fx.recorded.filters.lock();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0]["analysis_id"], "an-1");
        assert_eq!(filters[0]["excluded_track_ids"], json!(["42"]));
        assert_eq!(filters[0]["processing"]["tracks"], json!([1, 2, 3]));
    }

    // Patched fields replaced, untouched fields preserved, links merged.
    let result = fx.mgr.active_result().unwrap();
    assert_eq!(result.unique_persons, 5);
    assert_eq!(result.total_interactions, 28);
    assert_eq!(result.behavioral_insights.most_common_action, "reach");
    assert_eq!(
        result.download_links.heatmap_image.as_deref(),
        Some("/files/an-1/heatmap-v2.png")
    );
    assert_eq!(
        result.download_links.csv_report.as_deref(),
        Some("/files/an-1/report.csv")
    );

    // Toggling back sends an empty exclusion list.
    let excluded = fx.mgr.toggle_track_exclusion(42).await.unwrap();
    assert!(!excluded);
    assert_eq!(fx.recorded.filters.lock()[1]["excluded_track_ids"], json!([]));
}

#[tokio::test]
async fn test_qa_stream_delivers_chunks_in_order() {
    let fx = fixture(full_router, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    let chunks = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&chunks);
    let answer = fx
        .mgr
        .ask_streaming("How busy was the store?", move |chunk| {
            sink.lock().push(chunk.to_string());
        })
        .await
        .unwrap();

    assert_eq!(answer, "The store saw steady traffic.");
    let chunks = chunks.lock();
    assert!(!chunks.is_empty());
    assert_eq!(chunks.concat(), answer);
    assert!(answer.starts_with(&chunks[0]));
}

#[tokio::test]
async fn test_ai_passthroughs_carry_metrics() {
    let fx = fixture(full_router, 1).await;
    fx.mgr.stage_videos(&fx.videos).unwrap();
    fx.mgr.run_analysis(&AnalysisRequest::default()).await.unwrap();

    let insights = fx.mgr.generate_insights().await.unwrap();
    assert_eq!(insights.insights.len(), 1);
    assert_eq!(insights.insights[0].title, "Busy aisle");

    let answer = fx.mgr.ask("How many people?").await.unwrap();
    assert_eq!(answer.answer, "Seven people visited the store.");

    let dwell = fx.mgr.dwell_insight().await.unwrap();
    assert!(dwell.insight.contains("dwell"));

    let heatmap = fx.mgr.heatmap_insight().await.unwrap();
    assert!(heatmap.insight.contains("Hot zone"));

    let ai = fx.recorded.ai.lock();
    let find = |name: &str| {
        ai.iter()
            .find(|(n, _)| n == name)
            .map(|(_, body)| body.clone())
            .unwrap()
    };
    assert_eq!(find("insights")["metrics"]["unique_persons"], 7);
    assert_eq!(find("qa")["question"], "How many people?");
    assert_eq!(find("qa")["metrics"]["total_interactions"], 41);
    assert_eq!(find("dwell")["average_dwell_time"], 4.2);
    assert_eq!(
        find("heatmap")["heatmap_image_url"],
        format!("{}/files/an-1/heatmap.png", fx.base_url)
    );
}

#[tokio::test]
async fn test_ai_without_result_is_rejected() {
    let fx = fixture(full_router, 1).await;
    assert!(matches!(
        fx.mgr.generate_insights().await.unwrap_err(),
        ClientError::NoActiveResult
    ));
    assert!(matches!(
        fx.mgr.ask("anyone there?").await.unwrap_err(),
        ClientError::NoActiveResult
    ));
}
