use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;
mod result_file;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Analyze(args) => commands::analyze::execute(args).await,
        cli::Command::Report(args) => commands::report::execute(args),
        cli::Command::Refine(args) => commands::refine::execute(args).await,
        cli::Command::Insights(args) => commands::insights::execute(args).await,
        cli::Command::Qa(args) => commands::qa::execute(args).await,
        cli::Command::Info(args) => commands::info::execute(args),
    };

    std::process::exit(exit_code);
}
