use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "campaign-summariser", about, long_about = None)]
pub struct CampaignSummariserCli {
    /// Harness settings file (TOML). Defaults are used when not given.
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Directory holding the run files, overriding the settings file.
    ///
    /// Falls back to the `RECORDS_DIR` environment variable.
    #[clap(long)]
    pub records_dir: Option<PathBuf>,

    /// Directory for cached run metrics, overriding the settings file.
    ///
    /// Falls back to the `CACHE_DIR` environment variable.
    #[clap(long)]
    pub cache_dir: Option<PathBuf>,

    /// Derive every run's metrics from its run file, ignoring and not filling the cache
    #[clap(long, default_value = "false")]
    pub no_cache: bool,

    /// Re-index the records directory before reading it, picking up run files that other tools wrote
    #[clap(long, default_value = "false")]
    pub rescan: bool,

    #[clap(subcommand)]
    pub command: SummariserCommand,
}

#[derive(Subcommand, Debug)]
pub enum SummariserCommand {
    /// Build a report from a report specification
    Report {
        /// The report specification (YAML)
        spec: PathBuf,

        /// Where to write the report. Defaults to `campaign-report-<timestamp>.json`.
        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Write a starter report specification covering every recorded configuration
    Scaffold {
        /// Runs to average per configuration
        #[clap(long, default_value = "1")]
        avg_cnt: usize,

        /// Where to write the specification
        #[clap(long, short, default_value = "fast_report.yml")]
        output: PathBuf,
    },

    /// Remove every cached run metrics entry
    CacheClear,
}
