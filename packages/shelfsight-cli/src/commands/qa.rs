use crate::cli::QaArgs;
use crate::commands::exit_code_for;
use crate::exit_codes;
use crate::result_file;
use shelfsight_client::{AnalysisApi, MetricsSnapshot, QaRequest};
use std::io::Write;

pub async fn execute(args: QaArgs) -> i32 {
    let outcome = match result_file::load(&args.result) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let result = match result_file::select(&outcome, args.file_index) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let metrics = MetricsSnapshot::from_result(result);

    let config = args.connection.client_config();
    let api = match AnalysisApi::new(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            return exit_code_for(&e);
        }
    };

    let request = QaRequest {
        question: args.question.clone(),
        metrics,
    };

    if args.no_stream {
        match api.ask(&request).await {
            Ok(answer) => {
                println!("{}", answer.answer);
                exit_codes::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e.user_message());
                exit_code_for(&e)
            }
        }
    } else {
        let streamed = api
            .ask_stream(&request, |chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await;
        match streamed {
            Ok(_) => {
                println!();
                exit_codes::SUCCESS
            }
            Err(e) => {
                // Land the error on its own line if chunks already printed
                println!();
                eprintln!("Error: {}", e.user_message());
                exit_code_for(&e)
            }
        }
    }
}
