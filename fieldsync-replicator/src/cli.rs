use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Replicates field-survey snapshots from staging into production.
#[derive(Parser, Debug)]
#[command(name = "fieldsync-replicator", version)]
pub struct Cli {
    /// Print command summaries as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync pass, resuming from the last checkpoint.
    Sync(SyncArgs),
    /// Compare staging keys with the keys this pipeline wrote.
    VerifyCompleteness(VerifyArgs),
    /// Show destination, checkpoint and mirror status.
    Monitor(MonitorArgs),
    /// Retry failed warehouse writes.
    RetryMirror(RetryArgs),
}

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Stop after this many staging pages.
    #[arg(long)]
    pub max_pages: Option<u64>,

    /// Do not start another page after this many seconds.
    #[arg(long)]
    pub max_runtime_secs: Option<u64>,

    /// Directory for the JSON and CSV run report.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Classify and plan without writing to the destination or checkpoint.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct VerifyArgs {
    /// Number of sample keys listed per difference.
    #[arg(long)]
    pub sample: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct MonitorArgs {
    /// Also estimate what the next sync would do with unsynced keys.
    #[arg(long)]
    pub estimate: bool,
}

#[derive(Args, Debug, Default)]
pub struct RetryArgs {
    /// Keep running passes every retry interval until interrupted.
    #[arg(long)]
    pub watch: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_flags_parse() {
        let cli = Cli::try_parse_from([
            "fieldsync-replicator",
            "--json",
            "sync",
            "--max-pages",
            "3",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.max_pages, Some(3));
                assert!(args.dry_run);
                assert_eq!(args.report_dir, None);
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "fieldsync-replicator",
            "verify-completeness",
            "--sample",
            "5",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormatArg::Json);
        assert!(matches!(
            cli.command,
            Command::VerifyCompleteness(VerifyArgs { sample: Some(5) })
        ));
    }
}
