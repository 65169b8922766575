use crate::cli::RefineArgs;
use crate::commands::exit_code_for;
use crate::exit_codes;
use crate::output;
use crate::result_file;
use shelfsight_client::{AnalysisApi, FilterRequest};
use std::collections::BTreeSet;

pub async fn execute(args: RefineArgs) -> i32 {
    let outcome = match result_file::load(&args.result) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let mut result = match result_file::select(&outcome, args.file_index) {
        Ok(r) => r.clone(),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    // A recompute needs the id and the opaque processing payload the
    // backend returned with the original analysis.
    let analysis_id = match result.analysis_id() {
        Some(id) => id.to_string(),
        None => {
            eprintln!("Error: Result file has no analysis_id; the backend cannot recompute it");
            return exit_codes::INPUT_ERROR;
        }
    };
    let processing = match result.processing.clone() {
        Some(p) => p,
        None => {
            eprintln!(
                "Error: Result file has no processing payload; the backend cannot recompute it"
            );
            return exit_codes::INPUT_ERROR;
        }
    };

    let excluded: BTreeSet<u64> = args.excluded.iter().copied().collect();
    let request = FilterRequest {
        analysis_id,
        excluded_track_ids: excluded.iter().map(u64::to_string).collect(),
        processing,
    };

    let config = args.connection.client_config();
    let api = match AnalysisApi::new(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            return exit_code_for(&e);
        }
    };

    log::info!(
        "Recomputing {} with {} tracks excluded",
        request.analysis_id,
        excluded.len()
    );
    let patch = match api.apply_filters(&request).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            return exit_code_for(&e);
        }
    };
    result.merge_patch(patch);

    let json = match output::to_json(&result, args.compact) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };
    if let Err(e) = output::write_output(&json, args.output.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    exit_codes::SUCCESS
}
