use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use shelfsight_client::config::ADVISORY_MAX_UPLOAD_BYTES;

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    api_url: String,
    timeout_secs: u64,
    platform: String,
    arch: String,
    upload_limit_mb: u64,
    default_max_duration_secs: u32,
    frame_skip_choices: Vec<&'static str>,
}

pub fn execute(args: InfoArgs) -> i32 {
    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        api_url: args.connection.api_url.clone(),
        timeout_secs: args.connection.timeout,
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        upload_limit_mb: ADVISORY_MAX_UPLOAD_BYTES / (1024 * 1024),
        default_max_duration_secs: 30,
        frame_skip_choices: vec!["0.5", "1", "2", "4"],
    };

    if args.json {
        match output::to_json(&info, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        println!("shelfsight CLI v{}", info.cli_version);
        println!("Platform: {} ({})", info.platform, info.arch);
        println!();
        println!("API server: {}", info.api_url);
        println!("Timeout: {}s", info.timeout_secs);
        println!("Upload limit: {} MB per video", info.upload_limit_mb);
        println!(
            "Defaults: max duration {}s, frame skip choices {}",
            info.default_max_duration_secs,
            info.frame_skip_choices.join(", ")
        );
        println!("Server override: $SHELFSIGHT_API_URL or --api-url");
    }

    exit_codes::SUCCESS
}
