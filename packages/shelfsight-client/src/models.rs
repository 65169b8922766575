use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Discriminant the backend sets on batch responses.
pub const BATCH_ANALYSIS_TAG: &str = "batch_analysis";

// ============================================================================
// Request side
// ============================================================================

/// Frame sampling multiplier accepted by the backend. Restricting this to
/// an enum keeps invalid multipliers unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum FrameSkip {
    Half,
    Full,
    Double,
    Quadruple,
}

impl FrameSkip {
    pub fn as_f64(self) -> f64 {
        match self {
            FrameSkip::Half => 0.5,
            FrameSkip::Full => 1.0,
            FrameSkip::Double => 2.0,
            FrameSkip::Quadruple => 4.0,
        }
    }

    /// Wire encoding for the `frame_skip_multiplier` form field. Whole
    /// multipliers are sent without a decimal point.
    pub fn as_field(self) -> &'static str {
        match self {
            FrameSkip::Half => "0.5",
            FrameSkip::Full => "1",
            FrameSkip::Double => "2",
            FrameSkip::Quadruple => "4",
        }
    }
}

impl Default for FrameSkip {
    fn default() -> Self {
        FrameSkip::Full
    }
}

impl std::fmt::Display for FrameSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_field())
    }
}

impl TryFrom<f64> for FrameSkip {
    type Error = String;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        match value {
            v if v == 0.5 => Ok(FrameSkip::Half),
            v if v == 1.0 => Ok(FrameSkip::Full),
            v if v == 2.0 => Ok(FrameSkip::Double),
            v if v == 4.0 => Ok(FrameSkip::Quadruple),
            other => Err(format!(
                "invalid frame skip multiplier {} (expected 0.5, 1, 2 or 4)",
                other
            )),
        }
    }
}

impl From<FrameSkip> for f64 {
    fn from(value: FrameSkip) -> f64 {
        value.as_f64()
    }
}

impl FromStr for FrameSkip {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid frame skip multiplier '{}'", s))?;
        FrameSkip::try_from(value)
    }
}

/// Scalar parameters sent with every primary analysis submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Maximum footage duration to analyze, in seconds.
    pub max_duration: u32,
    pub frame_skip: FrameSkip,
    pub save_to_blob: bool,
    pub generate_video: bool,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            max_duration: 30,
            frame_skip: FrameSkip::default(),
            save_to_blob: true,
            generate_video: true,
        }
    }
}

impl AnalysisRequest {
    pub fn new(max_duration: u32) -> Self {
        Self {
            max_duration,
            ..Default::default()
        }
    }

    pub fn with_frame_skip(mut self, frame_skip: FrameSkip) -> Self {
        self.frame_skip = frame_skip;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_duration == 0 {
            return Err(ClientError::InvalidRequest(
                "max_duration must be a positive number of seconds".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Result side
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DwellTimeAnalysis {
    #[serde(default)]
    pub average_dwell_time: f64,
    #[serde(default)]
    pub max_dwell_time: f64,
    /// Person id (as the backend keys it) to dwell seconds.
    #[serde(default)]
    pub person_dwell_times: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralInsights {
    #[serde(default)]
    pub most_common_action: String,
    #[serde(default)]
    pub total_actions_detected: u64,
    #[serde(default)]
    pub average_confidence: f64,
}

/// One tracked action event. The wire format is a bare 4-tuple
/// `[person id, frame, shelf id, action]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionShelfEvent(pub u64, pub u64, pub String, pub String);

impl ActionShelfEvent {
    pub fn person_id(&self) -> u64 {
        self.0
    }

    pub fn frame(&self) -> u64 {
        self.1
    }

    pub fn shelf_id(&self) -> &str {
        &self.2
    }

    pub fn action(&self) -> &str {
        &self.3
    }
}

/// Backend-classified outcome of the interactions at one shelf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyOutcome {
    pub shelf_id: String,
    #[serde(rename = "konversi_sukses", default)]
    pub conversions: u64,
    #[serde(rename = "keraguan_pembatalan", default)]
    pub hesitations: u64,
    #[serde(rename = "kegagalan_menarik_minat", default)]
    pub missed_interest: u64,
    #[serde(default)]
    pub total_interactions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyAnalysis {
    #[serde(default)]
    pub journey_data: Vec<JourneyOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub total_tracks: u64,
    #[serde(default)]
    pub total_shelf_interactions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_generated: Option<bool>,
}

/// Server-generated artifact links. All keys are optional; unknown keys
/// are kept so newer backends do not break older clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_video_stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_video_blob_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_video_download: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_results: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

fn overwrite_if_present(dst: &mut Option<String>, src: Option<String>) {
    if src.is_some() {
        *dst = src;
    }
}

impl DownloadLinks {
    /// Shallow merge: keys present in `newer` overwrite, keys absent from
    /// `newer` are preserved.
    pub fn merge_from(&mut self, newer: DownloadLinks) {
        overwrite_if_present(&mut self.annotated_video_stream, newer.annotated_video_stream);
        overwrite_if_present(
            &mut self.annotated_video_blob_path,
            newer.annotated_video_blob_path,
        );
        overwrite_if_present(
            &mut self.annotated_video_download,
            newer.annotated_video_download,
        );
        overwrite_if_present(&mut self.heatmap_image, newer.heatmap_image);
        overwrite_if_present(&mut self.csv_report, newer.csv_report);
        overwrite_if_present(&mut self.json_results, newer.json_results);
        self.extra.extend(newer.extra);
    }

    /// Present links as (name, value) pairs, known keys first.
    pub fn entries(&self) -> Vec<(String, String)> {
        let known = [
            ("annotated_video_stream", &self.annotated_video_stream),
            ("annotated_video_blob_path", &self.annotated_video_blob_path),
            ("annotated_video_download", &self.annotated_video_download),
            ("heatmap_image", &self.heatmap_image),
            ("csv_report", &self.csv_report),
            ("json_results", &self.json_results),
        ];
        let mut out: Vec<(String, String)> = known
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.to_string(), v.clone())))
            .collect();
        out.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// One entry of the per-track thumbnail gallery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub pid: u64,
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub duration_s: f64,
    #[serde(default)]
    pub thumbnail_url: String,
}

/// Full analysis of a single video, as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub unique_persons: u64,
    #[serde(default)]
    pub total_interactions: u64,
    #[serde(default)]
    pub action_summary: BTreeMap<String, u64>,
    #[serde(default)]
    pub shelf_interactions: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelf_dwell_times: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub dwell_time_analysis: DwellTimeAnalysis,
    #[serde(default)]
    pub behavioral_insights: BehavioralInsights,
    #[serde(default)]
    pub heatmap_data: Vec<Vec<f64>>,
    #[serde(default)]
    pub action_shelf_mapping: Vec<ActionShelfEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journey_analysis: Option<JourneyAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_info: Option<ProcessingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnalysisMetadata>,
    #[serde(default)]
    pub download_links: DownloadLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_gallery: Option<Vec<TrackSnapshot>>,
    /// Opaque backend payload, carried solely so filtered recomputes can
    /// resubmit it. Never interpreted client-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<Value>,
}

impl AnalysisResult {
    pub fn analysis_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.analysis_id.as_deref()
    }

    /// A filtered recompute needs both the analysis id and the opaque
    /// processing payload.
    pub fn supports_recompute(&self) -> bool {
        self.analysis_id().is_some() && self.processing.is_some()
    }

    /// Field-level merge of a recompute response: fields present in the
    /// patch replace, absent fields are preserved, and download links are
    /// merged key-by-key instead of replaced.
    pub fn merge_patch(&mut self, patch: ResultPatch) {
        if let Some(v) = patch.unique_persons {
            self.unique_persons = v;
        }
        if let Some(v) = patch.total_interactions {
            self.total_interactions = v;
        }
        if let Some(v) = patch.action_summary {
            self.action_summary = v;
        }
        if let Some(v) = patch.shelf_interactions {
            self.shelf_interactions = v;
        }
        if let Some(v) = patch.shelf_dwell_times {
            self.shelf_dwell_times = Some(v);
        }
        if let Some(v) = patch.dwell_time_analysis {
            self.dwell_time_analysis = v;
        }
        if let Some(v) = patch.behavioral_insights {
            self.behavioral_insights = v;
        }
        if let Some(v) = patch.heatmap_data {
            self.heatmap_data = v;
        }
        if let Some(v) = patch.action_shelf_mapping {
            self.action_shelf_mapping = v;
        }
        if let Some(v) = patch.journey_analysis {
            self.journey_analysis = Some(v);
        }
        if let Some(v) = patch.processing_info {
            self.processing_info = Some(v);
        }
        if let Some(v) = patch.metadata {
            self.metadata = Some(v);
        }
        if let Some(v) = patch.download_links {
            self.download_links.merge_from(v);
        }
        if let Some(v) = patch.track_gallery {
            self.track_gallery = Some(v);
        }
        if let Some(v) = patch.processing {
            self.processing = Some(v);
        }
    }
}

/// `/apply-filters` response: a partial result. Every field is optional so
/// an absent field is distinguishable from a present zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPatch {
    #[serde(default)]
    pub unique_persons: Option<u64>,
    #[serde(default)]
    pub total_interactions: Option<u64>,
    #[serde(default)]
    pub action_summary: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub shelf_interactions: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub shelf_dwell_times: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub dwell_time_analysis: Option<DwellTimeAnalysis>,
    #[serde(default)]
    pub behavioral_insights: Option<BehavioralInsights>,
    #[serde(default)]
    pub heatmap_data: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub action_shelf_mapping: Option<Vec<ActionShelfEvent>>,
    #[serde(default)]
    pub journey_analysis: Option<JourneyAnalysis>,
    #[serde(default)]
    pub processing_info: Option<ProcessingInfo>,
    #[serde(default)]
    pub metadata: Option<AnalysisMetadata>,
    #[serde(default)]
    pub download_links: Option<DownloadLinks>,
    #[serde(default)]
    pub track_gallery: Option<Vec<TrackSnapshot>>,
    #[serde(default)]
    pub processing: Option<Value>,
}

fn default_batch_tag() -> String {
    BATCH_ANALYSIS_TAG.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(default)]
    pub total_videos: u64,
    #[serde(default)]
    pub total_unique_persons: u64,
    #[serde(default)]
    pub total_interactions: u64,
    #[serde(default)]
    pub average_dwell_time: f64,
}

/// Multi-video analysis: per-file results plus cross-file aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysisResult {
    #[serde(default = "default_batch_tag")]
    pub analysis_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub results: Vec<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
}

/// A successful primary response, discriminated at the network boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Single(Box<AnalysisResult>),
    Batch(BatchAnalysisResult),
}

impl AnalysisOutcome {
    /// Decode a primary response body. A body whose `analysis_type` equals
    /// the batch tag decodes as a batch result; any other valid JSON object
    /// decodes as a single result. Anything else is a decode error.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ClientError::Decode(format!("response is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let is_batch = value
            .get("analysis_type")
            .and_then(Value::as_str)
            .map(|tag| tag == BATCH_ANALYSIS_TAG)
            .unwrap_or(false);

        if is_batch {
            let batch: BatchAnalysisResult = serde_json::from_value(value)
                .map_err(|e| ClientError::Decode(format!("invalid batch result: {}", e)))?;
            Ok(AnalysisOutcome::Batch(batch))
        } else {
            let single: AnalysisResult = serde_json::from_value(value)
                .map_err(|e| ClientError::Decode(format!("invalid analysis result: {}", e)))?;
            Ok(AnalysisOutcome::Single(Box::new(single)))
        }
    }

    /// The batch endpoint must answer with a batch-tagged body; anything
    /// else is malformed.
    pub fn require_batch(self) -> Result<BatchAnalysisResult> {
        match self {
            AnalysisOutcome::Batch(batch) => Ok(batch),
            AnalysisOutcome::Single(_) => Err(ClientError::Decode(
                "batch response is missing the analysis_type discriminant".to_string(),
            )),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, AnalysisOutcome::Batch(_))
    }
}

// ============================================================================
// AI assistant payloads
// ============================================================================

/// Summarized metrics sent to the AI endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub unique_persons: u64,
    pub total_interactions: u64,
    pub average_dwell_time: f64,
    pub max_dwell_time: f64,
    pub most_common_action: String,
    pub total_actions_detected: u64,
    pub average_confidence: f64,
    #[serde(default)]
    pub shelf_interactions: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            unique_persons: result.unique_persons,
            total_interactions: result.total_interactions,
            average_dwell_time: result.dwell_time_analysis.average_dwell_time,
            max_dwell_time: result.dwell_time_analysis.max_dwell_time,
            most_common_action: result.behavioral_insights.most_common_action.clone(),
            total_actions_detected: result.behavioral_insights.total_actions_detected,
            average_confidence: result.behavioral_insights.average_confidence,
            shelf_interactions: result.shelf_interactions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterRequest {
    pub analysis_id: String,
    pub excluded_track_ids: Vec<String>,
    pub processing: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaRequest {
    pub question: String,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapInsightRequest {
    pub metrics: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiInsight {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiInsightsResponse {
    #[serde(default)]
    pub insights: Vec<AiInsight>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiAnswer {
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiTextInsight {
    #[serde(default)]
    pub insight: String,
}
