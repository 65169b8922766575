use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::models::{AnalysisOutcome, AnalysisResult, BatchAnalysisResult, ResultPatch};

/// Batch presentation cursor: one file at a time or the cross-file view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    PerFile,
    Aggregate,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::PerFile
    }
}

/// The one populated result slot. Holding both kinds at once is
/// unrepresentable.
#[derive(Debug, Clone)]
pub enum StoredResult {
    Single(Box<AnalysisResult>),
    Batch(BatchAnalysisResult),
}

/// Holds the session's results, the batch selection cursor, and the
/// excluded-track set.
#[derive(Debug, Default)]
pub struct ResultStore {
    result: Option<StoredResult>,
    selected_index: usize,
    view_mode: ViewMode,
    excluded_tracks: BTreeSet<u64>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything for a fresh submission: previous result dropped,
    /// cursor rewound, exclusions emptied.
    pub fn begin_new_run(&mut self) {
        self.result = None;
        self.selected_index = 0;
        self.view_mode = ViewMode::default();
        self.excluded_tracks.clear();
    }

    pub fn clear(&mut self) {
        self.begin_new_run();
    }

    /// Store a successful primary response. The discriminated outcome
    /// decides the slot; whichever kind arrives, the other is gone.
    pub fn accept(&mut self, outcome: AnalysisOutcome) {
        self.result = Some(match outcome {
            AnalysisOutcome::Single(result) => StoredResult::Single(result),
            AnalysisOutcome::Batch(batch) => StoredResult::Batch(batch),
        });
        self.selected_index = 0;
        self.view_mode = ViewMode::default();
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn stored(&self) -> Option<&StoredResult> {
        self.result.as_ref()
    }

    pub fn single(&self) -> Option<&AnalysisResult> {
        match &self.result {
            Some(StoredResult::Single(result)) => Some(result),
            _ => None,
        }
    }

    pub fn batch(&self) -> Option<&BatchAnalysisResult> {
        match &self.result {
            Some(StoredResult::Batch(batch)) => Some(batch),
            _ => None,
        }
    }

    /// The result currently on display: the single result, or the batch
    /// entry under the cursor.
    pub fn active_result(&self) -> Option<&AnalysisResult> {
        match &self.result {
            Some(StoredResult::Single(result)) => Some(result),
            Some(StoredResult::Batch(batch)) => batch.results.get(self.selected_index),
            None => None,
        }
    }

    fn active_result_mut(&mut self) -> Option<&mut AnalysisResult> {
        match &mut self.result {
            Some(StoredResult::Single(result)) => Some(result),
            Some(StoredResult::Batch(batch)) => batch.results.get_mut(self.selected_index),
            None => None,
        }
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn select_file(&mut self, index: usize) -> Result<()> {
        let available = match &self.result {
            Some(StoredResult::Batch(batch)) => batch.results.len(),
            Some(StoredResult::Single(_)) => 1,
            None => 0,
        };
        if index >= available {
            return Err(ClientError::InvalidRequest(format!(
                "file index {} out of range ({} available)",
                index, available
            )));
        }
        self.selected_index = index;
        Ok(())
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    /// Flip one track id. Returns whether the id is excluded afterwards;
    /// toggling twice restores the prior state.
    pub fn toggle_exclusion(&mut self, track_id: u64) -> bool {
        if self.excluded_tracks.remove(&track_id) {
            false
        } else {
            self.excluded_tracks.insert(track_id);
            true
        }
    }

    pub fn is_excluded(&self, track_id: u64) -> bool {
        self.excluded_tracks.contains(&track_id)
    }

    pub fn excluded_tracks(&self) -> &BTreeSet<u64> {
        &self.excluded_tracks
    }

    /// Exclusions in wire form (the backend takes strings).
    pub fn excluded_as_wire(&self) -> Vec<String> {
        self.excluded_tracks.iter().map(u64::to_string).collect()
    }

    /// Merge a recompute patch into the displayed result.
    pub fn merge_active(&mut self, patch: ResultPatch) -> Result<()> {
        let result = self
            .active_result_mut()
            .ok_or(ClientError::NoActiveResult)?;
        result.merge_patch(patch);
        Ok(())
    }
}
