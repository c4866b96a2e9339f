use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::probe_config::{DEFAULT_ACCURACY, DEFAULT_MAX_LANES, DEFAULT_PING_TIMEOUT_SECONDS};

pub const DEFAULT_OUTFILE: &str = "data/output/assess_latency/assess_latency.csv";

#[derive(Parser, Debug)]
#[command(name = "latprobe")]
#[command(
    about = "Sends concurrent GET and ICMP round trips to a target and judges whether its latency is stable"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Assess a single URL")]
    Assess {
        url: String,

        #[command(flatten)]
        probe: ProbeArgs,
    },
    #[command(about = "Assess many URLs concurrently and cross-check the classifier")]
    Loop {
        urls: Vec<String>,

        /// YAML file with a `targets` list and optional `thresholds`.
        #[arg(long, env = "TARGETS_FILE")]
        targets_file: Option<PathBuf>,

        /// Number of targets assessed at once.
        #[arg(short, long, default_value = "12")]
        max_threads: usize,

        #[command(flatten)]
        probe: ProbeArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Number of GET and ICMP requests sent per target.
    #[arg(short, long, default_value_t = DEFAULT_ACCURACY)]
    pub accuracy: usize,

    /// +/- band around the GET latency mean, in seconds.
    #[arg(short, long, default_value = "0.1")]
    pub threshold: f64,

    /// +/- band around the ICMP latency mean, in seconds.
    #[arg(short = 'T', long, default_value = "0.1")]
    pub ping_threshold: f64,

    /// GET standard deviation ceiling, in seconds.
    #[arg(short = 'x', long, default_value = "0.1")]
    pub std_deviation_threshold: f64,

    /// ICMP standard deviation ceiling, in seconds.
    #[arg(short = 'y', long, default_value = "0.1")]
    pub ping_std_deviation_threshold: f64,

    /// Seconds to wait between successive requests.
    #[arg(short = 'D', long, default_value = "0.0")]
    pub delay: f64,

    /// Upper bound on concurrent probe lanes per target.
    #[arg(short = 'l', long, default_value_t = DEFAULT_MAX_LANES)]
    pub max_lanes: usize,

    /// GET timeout in seconds. Unset means the request never times out.
    #[arg(long)]
    pub request_timeout: Option<f64>,

    /// Seconds `ping` waits for each echo reply.
    #[arg(long, default_value_t = DEFAULT_PING_TIMEOUT_SECONDS)]
    pub ping_timeout: u64,

    /// CSV file the feature rows are appended to.
    #[arg(short, long, default_value = DEFAULT_OUTFILE)]
    pub outfile: PathBuf,

    /// YAML decision-forest model used to cross-check verdicts.
    #[arg(long, env = "LATPROBE_MODEL")]
    pub model: Option<PathBuf>,
}
