use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

pub mod assess;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod http_probe;
pub mod icmp;
pub mod looper;
pub mod report;
pub mod resolver;
pub mod stats;
pub mod verdict;

use crate::assess::Assessor;
use crate::classifier::{Classifier, ForestClassifier};
use crate::config::app_config::{AppConfig, RunMode, default_resolver};
use crate::config::cli::Cli;
use crate::engine::NetworkProber;
use crate::error::{ProbeError, Result};
use crate::http_probe::report;
use crate::looper::{Looper, persist_and_classify};
use crate::report::{CsvSink, render_assessment, render_outcomes, render_summary};
use crate::resolver::TargetResolver;

const CONFIG_ERROR_EXIT: u8 = 2;
const ACCURACY_HINT: &str = "Accuracy option ('-a') must be greater than 1";

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_classifier(config: &AppConfig) -> Result<Option<Arc<dyn Classifier>>> {
    let Some(path) = &config.model else {
        return Ok(None);
    };
    let forest = ForestClassifier::load(path).map_err(|e| {
        ProbeError::InvalidConfig(format!("cannot load model {}: {e}", path.display()))
    })?;
    Ok(Some(Arc::new(forest)))
}

/// Cancels `cancel` on the first Ctrl-C.
fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("Interrupt received, cancelling outstanding probes");
                cancel.cancel();
            }
            Err(e) => log::error!("Unable to listen for interrupts: {e}"),
        }
    });
}

async fn run(config: AppConfig, cancel: &CancellationToken) -> Result<()> {
    let classifier = load_classifier(&config)?;
    let resolver = TargetResolver::new(default_resolver(&config.dns_hosts)?);
    let prober = Arc::new(NetworkProber::new(&config.settings)?);
    let assessor = Assessor::new(prober, resolver, config.settings);
    let sink = CsvSink::new(config.outfile);

    match config.mode {
        RunMode::Single(url) => {
            let assessment = assessor.assess(&url, cancel).await?;
            let prediction = persist_and_classify(&sink, classifier.as_deref(), &assessment);
            println!(
                "{}",
                render_assessment(&assessment.target, &assessment.host, &assessment.row)
            );
            if let Some(predicted) = prediction {
                println!("Classifier prediction: {predicted}");
            }
            println!("Results appended to {}", sink.path().display());
        }
        RunMode::Multi {
            targets,
            max_threads,
        } => {
            let looper = Looper::new(assessor, sink, classifier, max_threads);
            let loop_report = looper.run(targets, cancel).await?;
            print!("{}", render_outcomes(&loop_report.outcomes));
            println!();
            print!("{}", render_summary(&loop_report.tally));
        }
    }
    Ok(())
}

/// Process exit status for the outcome of a run. Too few samples is a usage
/// problem and ends the run cleanly, like an interrupt.
fn exit_code(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(ProbeError::Interrupted) => 0,
        Err(ProbeError::InsufficientSamples { .. }) => 0,
        Err(e) if e.is_config() => CONFIG_ERROR_EXIT,
        Err(_) => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match AppConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), report(&e));
            return ExitCode::from(CONFIG_ERROR_EXIT);
        }
    };

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    let result = run(config, &cancel).await;
    match &result {
        Ok(()) => {}
        Err(ProbeError::Interrupted) => log::warn!("Run interrupted, all probe lanes stopped"),
        Err(e @ ProbeError::InsufficientSamples { .. }) => {
            eprintln!("{} {}", "error:".red().bold(), report(e));
            eprintln!("{ACCURACY_HINT}");
        }
        Err(e) => eprintln!("{} {}", "error:".red().bold(), report(e)),
    }
    ExitCode::from(exit_code(&result))
}
