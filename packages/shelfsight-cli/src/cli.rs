use clap::{Args, Parser, Subcommand};
use shelfsight_client::{ClientConfig, FrameSkip};

#[derive(Parser)]
#[command(
    name = "shelfsight",
    version,
    about = "Retail shelf analytics from CCTV footage",
    long_about = "Submit CCTV video to a Shelfsight analysis server and work with the results.\n\
                  The server address comes from $SHELFSIGHT_API_URL or --api-url."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload videos and run a full analysis
    Analyze(AnalyzeArgs),
    /// Render a saved analysis result as a report
    Report(ReportArgs),
    /// Recompute a saved result with tracks excluded
    Refine(RefineArgs),
    /// AI-generated insights for a saved result
    Insights(InsightsArgs),
    /// Ask the AI assistant a question about a saved result
    Qa(QaArgs),
    /// Show CLI and connection information
    Info(InfoArgs),
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Analysis server base URL
    #[arg(
        long,
        env = "SHELFSIGHT_API_URL",
        default_value = "http://localhost:8000"
    )]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 900)]
    pub timeout: u64,
}

impl ConnectionArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone()).with_timeout_secs(self.timeout)
    }
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Video file path; repeat for a multi-camera batch
    #[arg(long = "file", num_args = 1.., required = true)]
    pub files: Vec<String>,

    /// Maximum footage duration to analyze, in seconds
    #[arg(long, default_value_t = 30)]
    pub max_duration: u32,

    /// Frame sampling multiplier (0.5, 1, 2 or 4)
    #[arg(long, default_value = "1")]
    pub frame_skip: FrameSkip,

    /// Write the result JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Saved analysis result (JSON file, single or batch)
    #[arg(long)]
    pub result: String,

    /// Batch entry to report on
    #[arg(long, default_value_t = 0)]
    pub file_index: usize,

    /// Rows to show in the action ranking
    #[arg(long, default_value_t = 6)]
    pub top: usize,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct RefineArgs {
    /// Saved analysis result (JSON file, single or batch)
    #[arg(long)]
    pub result: String,

    /// Track ids to exclude from the recompute
    #[arg(long = "exclude", num_args = 1.., required = true)]
    pub excluded: Vec<u64>,

    /// Batch entry to refine
    #[arg(long, default_value_t = 0)]
    pub file_index: usize,

    /// Write the merged result JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args)]
pub struct InsightsArgs {
    /// Saved analysis result (JSON file, single or batch)
    #[arg(long)]
    pub result: String,

    /// Batch entry to use
    #[arg(long, default_value_t = 0)]
    pub file_index: usize,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args)]
pub struct QaArgs {
    /// Saved analysis result (JSON file, single or batch)
    #[arg(long)]
    pub result: String,

    /// Batch entry to use
    #[arg(long, default_value_t = 0)]
    pub file_index: usize,

    /// Question for the assistant
    #[arg(long)]
    pub question: String,

    /// Wait for the full answer instead of streaming it
    #[arg(long, default_value_t = false)]
    pub no_stream: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_accepts_repeated_files() {
        let cli = Cli::try_parse_from([
            "shelfsight",
            "analyze",
            "--file",
            "a.mp4",
            "--file",
            "b.mp4",
            "--max-duration",
            "60",
        ])
        .unwrap();
        match cli.command {
            Command::Analyze(args) => {
                assert_eq!(args.files, vec!["a.mp4", "b.mp4"]);
                assert_eq!(args.max_duration, 60);
                assert_eq!(args.frame_skip, FrameSkip::Full);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_analyze_rejects_bad_frame_skip() {
        let result = Cli::try_parse_from([
            "shelfsight",
            "analyze",
            "--file",
            "a.mp4",
            "--frame-skip",
            "3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_refine_requires_exclusions() {
        let result = Cli::try_parse_from(["shelfsight", "refine", "--result", "r.json"]);
        assert!(result.is_err());
    }
}
