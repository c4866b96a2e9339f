use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::http_probe::result::{ProbeOutcome, Sample};

/// Exit status `ping` uses when the echo went out but nothing came back.
const NO_REPLY_EXIT: i32 = if cfg!(target_os = "macos") { 2 } else { 1 };

/// Grace period on top of the echo wait before the child is abandoned.
const SPAWN_GRACE: Duration = Duration::from_secs(1);

fn ping_command(host: &str, wait: Duration) -> Command {
    let is_v6 = matches!(host.parse::<IpAddr>(), Ok(IpAddr::V6(_)));
    let program = if is_v6 && cfg!(target_os = "macos") {
        "ping6"
    } else {
        "ping"
    };

    let mut cmd = Command::new(program);
    cmd.args(["-n", "-c", "1"]);
    if !(is_v6 && cfg!(target_os = "macos")) {
        // Linux takes whole seconds, macOS milliseconds.
        let wait_arg = if cfg!(target_os = "macos") {
            wait.as_millis().max(1).to_string()
        } else {
            wait.as_secs().max(1).to_string()
        };
        cmd.args(["-W", &wait_arg]);
    }
    cmd.arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Extracts the round trip from a `ping` reply line, in seconds.
/// Understands both `time=12.3 ms` and the sub-millisecond `time<1 ms` form.
pub fn parse_reply_seconds(stdout: &str) -> Option<f64> {
    let line = stdout.lines().find(|line| line.contains("time=") || line.contains("time<"))?;
    let idx = line.find("time=").or_else(|| line.find("time<"))? + "time=".len();
    let number: String = line[idx..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let millis: f64 = number.parse().ok()?;
    Some(millis / 1000.0)
}

/// Sends one ICMP echo to `host`. No reply and failures both report a latency
/// of 0.0; only the outcome tells them apart.
pub async fn echo(host: &str, wait: Duration) -> Sample {
    let mut cmd = ping_command(host, wait);

    let output = match tokio::time::timeout(wait + SPAWN_GRACE, cmd.output()).await {
        Err(_) => {
            log::warn!("ICMP echo to {host} did not return within {:?}", wait);
            return Sample::new(0.0, ProbeOutcome::Timeout);
        }
        Ok(Err(e)) => {
            log::warn!("Unable to run ping for {host}: {e}");
            return Sample::new(0.0, ProbeOutcome::Failure(e.to_string()));
        }
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        return match parse_reply_seconds(&stdout) {
            Some(seconds) => Sample::new(seconds, ProbeOutcome::Reply),
            None => {
                log::warn!("ICMP echo to {host} succeeded but reported no round trip");
                Sample::new(0.0, ProbeOutcome::Failure("unparsable ping output".to_string()))
            }
        };
    }

    match output.status.code() {
        Some(NO_REPLY_EXIT) => {
            log::warn!("ICMP echo to {host}: no reply");
            Sample::new(0.0, ProbeOutcome::Timeout)
        }
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("ICMP echo to {host} failed: {}", stderr.trim());
            Sample::new(0.0, ProbeOutcome::Failure(stderr.trim().to_string()))
        }
    }
}
