use crate::cli::ReportArgs;
use crate::exit_codes;
use crate::output;
use crate::result_file;
use serde::Serialize;
use shelfsight_client::views::{self, ActionBreakdown, DwellEntry, ShelfArchetype};
use shelfsight_client::{AnalysisOutcome, JourneyOutcome, MetricsSnapshot};

#[derive(Serialize)]
struct ReportView {
    metrics: MetricsSnapshot,
    top_actions: Vec<ActionBreakdown>,
    shelves: Vec<ShelfArchetype>,
    dwell: Vec<DwellEntry>,
    journey: Vec<JourneyOutcome>,
}

pub fn execute(args: ReportArgs) -> i32 {
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
    let top_actions = views::top_actions(result, args.top);
    let shelves = views::shelf_archetypes(result);
    let mut dwell = views::dwell_series(result);
    dwell.truncate(args.top);
    let journey = views::journey_series(result);

    if args.json {
        let view = ReportView {
            metrics,
            top_actions,
            shelves,
            dwell,
            journey,
        };
        match output::to_json(&view, false) {
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

    if let AnalysisOutcome::Batch(batch) = &outcome {
        println!(
            "Batch file {} of {}\n",
            args.file_index + 1,
            batch.results.len()
        );
    }

    println!("Overview");
    println!("  Unique persons:     {}", metrics.unique_persons);
    println!("  Total interactions: {}", metrics.total_interactions);
    println!(
        "  Avg dwell time:     {}",
        output::format_seconds(metrics.average_dwell_time)
    );
    println!(
        "  Max dwell time:     {}",
        output::format_seconds(metrics.max_dwell_time)
    );
    if !metrics.most_common_action.is_empty() {
        println!("  Most common action: {}", metrics.most_common_action);
    }
    println!("  Actions detected:   {}", metrics.total_actions_detected);
    println!("  Avg confidence:     {:.2}", metrics.average_confidence);

    if !top_actions.is_empty() {
        println!("\nTop Actions");
        println!("  {:<20} {:<8} {:<8} {:<16}", "Action", "Count", "Share", "Top Shelf");
        println!("  {}", "-".repeat(54));
        for action in &top_actions {
            let shelf = action
                .top_shelf
                .as_deref()
                .map(views::format_shelf_name)
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<20} {:<8} {:<8} {:<16}",
                action.action,
                action.count,
                output::format_share(action.share * 100.0),
                shelf
            );
        }
    }

    if !shelves.is_empty() {
        println!("\nShelf Engagement");
        println!(
            "  {:<16} {:<10} {:<8} {:<30} {:<8}",
            "Shelf", "Visitors", "Dwell", "Archetype", "Trend"
        );
        println!("  {}", "-".repeat(76));
        for shelf in &shelves {
            let dwell_col = shelf
                .dwell_seconds
                .map(output::format_seconds)
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<16} {:<10} {:<8} {:<30} {:<8}",
                shelf.display_name, shelf.unique_visitors, dwell_col, shelf.archetype, shelf.trend
            );
        }
    }

    if !dwell.is_empty() {
        println!("\nLongest Dwell");
        println!("  {:<12} {:<8}", "Person", "Time");
        println!("  {}", "-".repeat(21));
        for entry in &dwell {
            println!(
                "  {:<12} {:<8}",
                entry.person_id,
                output::format_seconds(entry.seconds)
            );
        }
    }

    if !journey.is_empty() {
        println!("\nJourney Outcomes");
        println!(
            "  {:<16} {:<12} {:<12} {:<8} {:<8}",
            "Shelf", "Conversions", "Hesitations", "Missed", "Total"
        );
        println!("  {}", "-".repeat(60));
        for row in &journey {
            println!(
                "  {:<16} {:<12} {:<12} {:<8} {:<8}",
                views::format_shelf_name(&row.shelf_id),
                row.conversions,
                row.hesitations,
                row.missed_interest,
                row.total_interactions
            );
        }
    }

    exit_codes::SUCCESS
}
