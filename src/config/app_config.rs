use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};
use url::Url;

use super::cli::{Cli, Commands, ProbeArgs};
use super::probe_config::{ProbeSettings, TargetConfig, TargetsFile, ThresholdConfig};
use crate::error::{ProbeError, Result};

pub const MIN_THREADS: usize = 2;
pub const MAX_THREADS: usize = 12;

/// One loop-mode target, with its own accuracy when the targets file sets one.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub url: Url,
    pub accuracy: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum RunMode {
    Single(Url),
    Multi {
        targets: Vec<TargetSpec>,
        max_threads: usize,
    },
}

/// Validated application configuration. Building one is the last step before probing starts.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,
    pub settings: ProbeSettings,
    pub outfile: PathBuf,
    pub model: Option<PathBuf>,
    pub dns_hosts: Vec<String>,
}

impl AppConfig {
    /// Turns parsed CLI arguments, the optional targets file and environment
    /// variables into a validated configuration.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let dns_hosts: Vec<String> = env::var("DNS_HOSTS")
            .map(|hosts| {
                hosts
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let (mode, probe, file_thresholds) = match cli.command {
            Commands::Assess { url, probe } => (RunMode::Single(parse_target(&url)?), probe, None),
            Commands::Loop {
                urls,
                targets_file,
                max_threads,
                probe,
            } => {
                if !(MIN_THREADS..=MAX_THREADS).contains(&max_threads) {
                    return Err(ProbeError::InvalidConfig(format!(
                        "max-threads must be between {MIN_THREADS} and {MAX_THREADS}, got {max_threads}"
                    )));
                }
                let mut raw: Vec<TargetConfig> = urls
                    .into_iter()
                    .map(|url| TargetConfig {
                        url,
                        accuracy: None,
                    })
                    .collect();
                let mut file_thresholds = None;
                if let Some(path) = targets_file {
                    let file = load_targets_file(&path)?;
                    log::info!("Loaded {} targets from {}", file.targets.len(), path.display());
                    raw.extend(file.targets);
                    file_thresholds = file.thresholds;
                }
                if raw.is_empty() {
                    return Err(ProbeError::InvalidConfig(
                        "loop mode needs at least one URL or a targets file".to_string(),
                    ));
                }
                let targets = raw
                    .iter()
                    .map(target_spec)
                    .collect::<Result<Vec<_>>>()?;
                (
                    RunMode::Multi {
                        targets,
                        max_threads,
                    },
                    probe,
                    file_thresholds,
                )
            }
        };

        let settings = probe_settings(&probe, file_thresholds)?;
        log::info!("Using DNS hosts: {:?}", dns_hosts);

        Ok(AppConfig {
            mode,
            settings,
            outfile: probe.outfile,
            model: probe.model,
            dns_hosts,
        })
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ProbeError::InvalidConfig(format!("{name} must be a non-negative number, got {value}"))
    })
}

fn probe_settings(probe: &ProbeArgs, overrides: Option<ThresholdConfig>) -> Result<ProbeSettings> {
    let thresholds = overrides.unwrap_or(ThresholdConfig {
        response_delta: probe.threshold,
        ping_delta: probe.ping_threshold,
        stdev_ceiling: probe.std_deviation_threshold,
        ping_stdev_ceiling: probe.ping_std_deviation_threshold,
    });
    let request_timeout = probe
        .request_timeout
        .map(|t| seconds("request-timeout", t))
        .transpose()?;

    let settings = ProbeSettings {
        accuracy: probe.accuracy,
        max_lanes: probe.max_lanes,
        delay: seconds("delay", probe.delay)?,
        thresholds,
        ping_timeout: Duration::from_secs(probe.ping_timeout),
        request_timeout,
    };
    settings.validate()?;
    if settings.accuracy < 2 {
        log::warn!(
            "Accuracy {} is below 2: no standard deviation can be computed",
            settings.accuracy
        );
    }
    Ok(settings)
}

/// Parses a target URL, insisting on an http(s) scheme and a host.
pub fn parse_target(raw: &str) -> Result<Url> {
    let invalid = |reason: &str| ProbeError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs can be probed"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("URL has no host"));
    }
    Ok(url)
}

fn target_spec(target: &TargetConfig) -> Result<TargetSpec> {
    if target.accuracy == Some(0) {
        return Err(ProbeError::InvalidConfig(format!(
            "accuracy for {} must be at least 1",
            target.url
        )));
    }
    Ok(TargetSpec {
        url: parse_target(&target.url)?,
        accuracy: target.accuracy,
    })
}

/// Load a YAML targets file.
pub fn load_targets_file(path: &Path) -> Result<TargetsFile> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}

/// Setup a DNS resolver using the provided DNS hosts
/// This function creates a `TokioAsyncResolver` configured with the specified DNS hosts.
/// It sets the resolver options to have 2 attempts, a timeout of 100 milliseconds, and a cache size of 1024 for quick DNS lookups.
pub fn setup_resolver(dns_hosts: &[String]) -> Result<TokioAsyncResolver> {
    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = Duration::from_millis(100);
    opts.cache_size = 1024;

    let mut name_servers = NameServerConfigGroup::new();

    for host in dns_hosts {
        let ip: IpAddr = host.parse().map_err(|_| {
            ProbeError::InvalidConfig(format!("DNS host '{host}' is not an IP address"))
        })?;
        name_servers.push(NameServerConfig {
            socket_addr: (ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// Resolver for target hosts: explicit name servers when `DNS_HOSTS` was set,
/// the system configuration otherwise.
pub fn default_resolver(dns_hosts: &[String]) -> Result<TokioAsyncResolver> {
    if !dns_hosts.is_empty() {
        return setup_resolver(dns_hosts);
    }
    match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(resolver) => Ok(resolver),
        Err(e) => {
            log::warn!("Unable to read system DNS configuration ({e}), using defaults");
            Ok(TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn test_parse_target_accepts_http_and_https() {
        assert!(parse_target("http://example.com").is_ok());
        let url = parse_target("https://example.com:8443/path?q=1").expect("url");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_target_rejects_bad_input() {
        assert!(matches!(
            parse_target("example.com"),
            Err(ProbeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_target("ftp://example.com/file"),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_single_mode_from_cli() {
        let config =
            AppConfig::from_cli(cli(&["latprobe", "assess", "-a", "5", "https://example.com"]))
                .expect("config");
        assert!(
            matches!(config.mode, RunMode::Single(ref u) if u.as_str() == "https://example.com/")
        );
        assert_eq!(config.settings.accuracy, 5);
        assert_eq!(config.settings.delay, Duration::ZERO);
    }

    #[test]
    fn test_max_threads_bounds() {
        let err = AppConfig::from_cli(cli(&["latprobe", "loop", "-m", "13", "https://a.example"]))
            .unwrap_err();
        assert!(err.is_config());
        let err = AppConfig::from_cli(cli(&["latprobe", "loop", "-m", "1", "https://a.example"]))
            .unwrap_err();
        assert!(err.is_config());
        assert!(
            AppConfig::from_cli(cli(&["latprobe", "loop", "-m", "2", "https://a.example"])).is_ok()
        );
    }

    #[test]
    fn test_missing_targets_file_is_an_io_error() {
        let err = AppConfig::from_cli(cli(&[
            "latprobe",
            "loop",
            "--targets-file",
            "/nonexistent/x.yml",
        ]))
        .unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = AppConfig::from_cli(cli(&[
            "latprobe",
            "assess",
            "--delay=-1",
            "https://example.com",
        ]))
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_targets_file_merges_with_urls_and_overrides_thresholds() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("targets.yml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            "targets:\n  - url: https://b.example\n    accuracy: 3\n  - url: https://c.example\nthresholds:\n  stdev_ceiling: 0.5"
        )
        .expect("write");

        let config = AppConfig::from_cli(cli(&[
            "latprobe",
            "loop",
            "--targets-file",
            path.to_str().expect("utf8"),
            "https://a.example",
        ]))
        .expect("config");

        match config.mode {
            RunMode::Multi {
                targets,
                max_threads,
            } => {
                assert_eq!(max_threads, 12);
                let hosts: Vec<_> = targets.iter().filter_map(|t| t.url.host_str()).collect();
                assert_eq!(hosts, vec!["a.example", "b.example", "c.example"]);
                let accuracies: Vec<_> = targets.iter().map(|t| t.accuracy).collect();
                assert_eq!(accuracies, vec![None, Some(3), None]);
            }
            other => panic!("unexpected mode {other:?}"),
        }
        assert_eq!(config.settings.thresholds.stdev_ceiling, 0.5);
        assert_eq!(config.settings.thresholds.response_delta, 0.1);
    }

    #[test]
    fn test_zero_target_accuracy_rejected() {
        let err = target_spec(&TargetConfig {
            url: "https://a.example".to_string(),
            accuracy: Some(0),
        })
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_setup_resolver_rejects_non_ip_hosts() {
        let err = setup_resolver(&["dns.example".to_string()]).unwrap_err();
        assert!(err.is_config());
    }
}
