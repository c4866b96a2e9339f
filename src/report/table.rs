use std::fmt::Write;

use colored::Colorize;
use url::Url;

use super::feature_row::FeatureRow;
use crate::http_probe::result::StatusClass;
use crate::looper::{TargetOutcome, TargetTally};
use crate::resolver::ResolvedHost;

const LABEL_WIDTH: usize = 34;

fn to_fixed_width(input: &str, width: usize) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

fn push_row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "{} {}", to_fixed_width(label, LABEL_WIDTH).bold(), value);
}

fn secs(value: f64) -> String {
    format!("{value:.6} secs")
}

/// Two-column "Final Report Table" for a single assessment.
pub fn render_assessment(target: &Url, host: &ResolvedHost, row: &FeatureRow) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Final Report Table".bold().underline());

    push_row(&mut out, "URL", target);
    push_row(&mut out, "Host", host);
    push_row(&mut out, "GET Requests Sent", row.get_sent);
    push_row(&mut out, "Ping Requests Sent", row.ping_sent);
    push_row(&mut out, "Requests Delay", format!("{} secs", row.delay));
    push_row(&mut out, "Threshold", format!("{} sec", row.threshold));
    push_row(&mut out, "Ping Threshold", format!("{} sec", row.ping_threshold));
    push_row(
        &mut out,
        "Standard Deviation Threshold",
        format!("{} sec", row.std_dev_threshold),
    );
    push_row(
        &mut out,
        "Ping Standard Deviation Threshold",
        format!("{} sec", row.ping_std_dev_threshold),
    );
    push_row(&mut out, "GET Latency Mean", secs(row.get_latency_average));
    push_row(&mut out, "Min GET Latency", secs(row.min_get_latency));
    push_row(&mut out, "Max GET Latency", secs(row.max_get_latency));
    push_row(&mut out, "Ping Latency Mean", secs(row.ping_latency_average));
    push_row(&mut out, "Min Ping Latency", secs(row.min_ping_latency));
    push_row(&mut out, "Max Ping Latency", secs(row.max_ping_latency));
    push_row(&mut out, "Standard Deviation", secs(row.std_dev));
    push_row(&mut out, "Ping Standard Deviation", secs(row.ping_std_dev));

    for class in StatusClass::ALL {
        let count = row.status_count(class);
        if count > 0 {
            push_row(
                &mut out,
                &format!("Status Code: {class}"),
                format!("Responses received: {count}"),
            );
        }
    }

    push_row(
        &mut out,
        "Test Final Evaluation",
        format!("{:.4}", row.final_evaluation),
    );
    let passed = if row.passed() {
        "✅ True".green().bold()
    } else {
        "❌ False".red().bold()
    };
    push_row(&mut out, "Test Passed", passed);
    out
}

/// One line per target of a loop run, targets padded to a common width.
pub fn render_outcomes(outcomes: &[TargetOutcome]) -> String {
    let width = outcomes
        .iter()
        .map(|o| o.target().as_str().len())
        .max()
        .unwrap_or(10);

    let mut out = String::new();
    for outcome in outcomes {
        let target = to_fixed_width(outcome.target().as_str(), width);
        match outcome {
            TargetOutcome::Completed {
                host,
                verdict,
                prediction,
                row,
                ..
            } => {
                let mark = if verdict.passed { "✅" } else { "❌" };
                let classifier = match prediction {
                    Some(p) if *p == verdict.passed => "agrees".green(),
                    Some(_) => "disagrees".red(),
                    None => "unclassified".normal(),
                };
                let _ = writeln!(
                    out,
                    "[{target}] {mark} Host: {host}, GET: {:.2}ms, Ping: {:.2}ms, Score: {:.4}, Classifier: {classifier}",
                    row.get_latency_average * 1000.0,
                    row.ping_latency_average * 1000.0,
                    verdict.score,
                );
            }
            TargetOutcome::Failed { error, .. } => {
                let _ = writeln!(out, "[{target}] ❌ Assessment error: {error}");
            }
        }
    }
    out
}

/// Totals of a loop run: how often the classifier agreed with the verdict.
pub fn render_summary(tally: &TargetTally) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Loop Summary".bold().underline());
    push_row(&mut out, "Targets", tally.total());
    push_row(&mut out, "Right predictions", tally.agreements.to_string().green());
    push_row(&mut out, "Wrong predictions", tally.disagreements.to_string().red());
    push_row(&mut out, "Unclassified", tally.unclassified);
    push_row(&mut out, "Failed", tally.failed.to_string().yellow());
    if let Some(rate) = tally.agreement_rate() {
        push_row(&mut out, "Agreement rate", format!("{:.2}%", rate * 100.0));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::feature_row::tests::sample_row;

    #[test]
    fn test_fixed_width_pads_and_truncates() {
        assert_eq!(to_fixed_width("abc", 5), "abc  ");
        assert_eq!(to_fixed_width("abcdefgh", 4), "abcd");
    }

    #[test]
    fn test_assessment_lists_observed_classes_only() {
        let url = Url::parse("https://example.com/").expect("url");
        let host = ResolvedHost::Hostname("example.com".to_string());
        let text = render_assessment(&url, &host, &sample_row());

        assert!(text.contains("https://example.com/"));
        assert!(text.contains("Status Code: 2xx"));
        assert!(text.contains("Responses received: 9"));
        assert!(text.contains("Status Code: 4xx"));
        assert!(!text.contains("Status Code: 5xx"));
        assert!(text.contains("0.8333"));
        assert!(text.contains("False"));
    }

    #[test]
    fn test_outcome_lines_share_a_width() {
        let row = sample_row();
        let outcomes = vec![
            TargetOutcome::Completed {
                target: Url::parse("https://a.example/").expect("url"),
                host: ResolvedHost::Ip("192.0.2.1".parse().expect("ip")),
                verdict: crate::verdict::Verdict::from_criteria([true; 6]),
                prediction: Some(false),
                row,
            },
            TargetOutcome::Failed {
                target: Url::parse("https://longer-name.example/").expect("url"),
                error: crate::error::ProbeError::Interrupted,
            },
        ];
        let text = render_outcomes(&outcomes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[https://a.example/          ]"));
        assert!(lines[0].contains("disagrees"));
        assert!(lines[0].contains("GET: 300.00ms"));
        assert!(lines[1].contains("Assessment error: probe run interrupted"));
    }

    #[test]
    fn test_summary_counts() {
        let tally = TargetTally {
            agreements: 3,
            disagreements: 1,
            unclassified: 0,
            failed: 1,
        };
        let text = render_summary(&tally);
        assert!(text.contains("75.00%"));
        assert!(text.contains("Right predictions"));
    }
}
