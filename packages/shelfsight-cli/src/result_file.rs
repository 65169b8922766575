use shelfsight_client::{AnalysisOutcome, AnalysisResult};
use std::path::Path;

/// Load a saved analysis result file (single or batch JSON).
pub fn load(path: &str) -> Result<AnalysisOutcome, String> {
    if !Path::new(path).exists() {
        return Err(format!("Result file not found: {}", path));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read result file '{}': {}", path, e))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| format!("Result file '{}' is not valid JSON: {}", path, e))?;
    AnalysisOutcome::from_value(value)
        .map_err(|e| format!("Result file '{}' is not an analysis result: {}", path, e))
}

/// Pick one analysis out of a loaded file. `file_index` addresses batch
/// entries; a single result only answers to index 0.
pub fn select(outcome: &AnalysisOutcome, file_index: usize) -> Result<&AnalysisResult, String> {
    match outcome {
        AnalysisOutcome::Single(result) => {
            if file_index == 0 {
                Ok(result)
            } else {
                Err(format!(
                    "Result file holds a single analysis; file index {} is out of range",
                    file_index
                ))
            }
        }
        AnalysisOutcome::Batch(batch) => batch.results.get(file_index).ok_or_else(|| {
            format!(
                "Batch holds {} results; file index {} is out of range",
                batch.results.len(),
                file_index
            )
        }),
    }
}
