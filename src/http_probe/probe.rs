use std::time::{Duration, Instant};

use reqwest::Client;
use url::Url;

use super::prelude::*;
use super::report;
use crate::error::Result;

const USER_AGENT: &str = "latprobe/1.0";

/// Builds the shared GET client. Without `request_timeout` the client keeps
/// reqwest's default, which never times a request out.
pub fn build_client(request_timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Sends one GET and times the whole call, connection and server think time included.
/// A failed request still yields the time spent before it failed.
pub async fn timed_get(client: &Client, url: &Url) -> Sample {
    let start = Instant::now();
    let status_result = client.get(url.clone()).send().await;
    let http_duration = start.elapsed().as_secs_f64();

    match status_result {
        Ok(resp) => {
            let code = resp.status().as_u16();
            match StatusClass::from_code(code) {
                Some(class) => Sample::new(http_duration, ProbeOutcome::Status(class)),
                None => {
                    log::warn!("GET {url} answered with non-standard status {code}");
                    Sample::new(
                        http_duration,
                        ProbeOutcome::Failure(format!("non-standard status {code}")),
                    )
                }
            }
        }
        Err(e) if e.is_timeout() => {
            log::warn!("GET {url} timed out after {:.3}s", http_duration);
            Sample::new(http_duration, ProbeOutcome::Timeout)
        }
        Err(e) => {
            let message = report(&e);
            log::warn!("GET {url} failed: {message}");
            Sample::new(http_duration, ProbeOutcome::Failure(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_is_a_timed_failure() {
        let client = build_client(Some(Duration::from_secs(2))).expect("client");
        // Port 9 (discard) is closed on any sane test host.
        let url = Url::parse("http://127.0.0.1:9/").expect("url");
        let sample = timed_get(&client, &url).await;
        assert!(matches!(
            sample.outcome,
            ProbeOutcome::Failure(_) | ProbeOutcome::Timeout
        ));
        assert!(sample.latency_seconds >= 0.0);
    }

    #[test]
    fn test_build_client_without_timeout() {
        assert!(build_client(None).is_ok());
    }
}
