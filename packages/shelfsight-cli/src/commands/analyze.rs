use crate::cli::AnalyzeArgs;
use crate::commands::exit_code_for;
use crate::exit_codes;
use crate::output;
use shelfsight_client::{AnalysisRequest, SessionManager, SessionPhase, StoredResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub async fn execute(args: AnalyzeArgs) -> i32 {
    let files: Vec<PathBuf> = args.files.iter().map(PathBuf::from).collect();

    let config = args.connection.client_config();
    let preview_dir = std::env::temp_dir().join(format!("shelfsight-{}", std::process::id()));
    let manager = match SessionManager::new(&config, &preview_dir) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            return exit_code_for(&e);
        }
    };

    // Stage inputs
    if let Err(e) = manager.stage_videos(&files) {
        eprintln!("Error: {}", e);
        return exit_code_for(&e);
    }

    let request = AnalysisRequest::new(args.max_duration).with_frame_skip(args.frame_skip);

    if !args.quiet {
        if files.len() > 1 {
            eprintln!("Analyzing {} videos...", files.len());
        } else {
            eprintln!("Analyzing {}...", files[0].display());
        }
        eprintln!("  Server: {}", config.normalized_base_url());
        eprintln!(
            "  Max duration: {}s, frame skip: {}",
            args.max_duration,
            args.frame_skip.as_field()
        );
    }

    // Report progress on stderr while the request is in flight
    let poller = if args.quiet {
        None
    } else {
        let mgr = Arc::clone(&manager);
        Some(tokio::spawn(async move {
            let mut last = -1i64;
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                ticker.tick().await;
                let snapshot = mgr.snapshot();
                if snapshot.phase != SessionPhase::Processing {
                    continue;
                }
                let percent = snapshot.progress.percent().round() as i64;
                if percent != last {
                    last = percent;
                    eprintln!("  Progress: {}%", percent);
                }
            }
        }))
    };

    let run = manager.run_analysis(&request).await;
    if let Some(handle) = poller {
        handle.abort();
    }

    if let Err(e) = run {
        eprintln!("Error: {}", e.user_message());
        return exit_code_for(&e);
    }

    let json = match manager.result() {
        Some(StoredResult::Single(result)) => output::to_json(result.as_ref(), args.compact),
        Some(StoredResult::Batch(batch)) => output::to_json(&batch, args.compact),
        None => {
            eprintln!("Error: analysis finished without a result");
            return exit_codes::EXECUTION_ERROR;
        }
    };
    let json = match json {
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
    if !args.quiet {
        if let Some(ref path) = args.output {
            eprintln!("Result written to {}", path);
        }
    }

    exit_codes::SUCCESS
}
