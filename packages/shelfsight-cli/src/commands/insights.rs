use crate::cli::InsightsArgs;
use crate::commands::exit_code_for;
use crate::exit_codes;
use crate::output;
use crate::result_file;
use shelfsight_client::{AnalysisApi, MetricsSnapshot};

pub async fn execute(args: InsightsArgs) -> i32 {
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

    let response = match api.insights(&metrics).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            return exit_code_for(&e);
        }
    };

    if args.json {
        match output::to_json(&response, false) {
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
        return exit_codes::SUCCESS;
    }

    if response.insights.is_empty() {
        println!("No insights returned.");
        return exit_codes::SUCCESS;
    }

    println!("AI Insights\n");
    for (i, insight) in response.insights.iter().enumerate() {
        match &insight.category {
            Some(category) => println!("{}. {} [{}]", i + 1, insight.title, category),
            None => println!("{}. {}", i + 1, insight.title),
        }
        println!("   {}\n", insight.description);
    }

    exit_codes::SUCCESS
}
