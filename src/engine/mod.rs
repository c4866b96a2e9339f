pub mod batch;
pub mod dispatch;
pub mod pool;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::config::probe_config::ProbeSettings;
use crate::error::Result;
use crate::http_probe::prelude::*;
use crate::icmp;
use crate::resolver::ResolvedHost;

/// The two round trips a slot performs. Implementations time their own calls.
pub trait Prober: Send + Sync + 'static {
    fn get(&self, url: &Url) -> impl Future<Output = Sample> + Send;

    fn echo(&self, host: &ResolvedHost) -> impl Future<Output = Sample> + Send;
}

/// Real network prober: reqwest for GET, the system `ping` for ICMP.
pub struct NetworkProber {
    client: Client,
    ping_timeout: Duration,
}

impl NetworkProber {
    pub fn new(settings: &ProbeSettings) -> Result<Self> {
        Ok(Self {
            client: build_client(settings.request_timeout)?,
            ping_timeout: settings.ping_timeout,
        })
    }
}

impl Prober for NetworkProber {
    async fn get(&self, url: &Url) -> Sample {
        timed_get(&self.client, url).await
    }

    async fn echo(&self, host: &ResolvedHost) -> Sample {
        let host = host.to_string();
        icmp::echo(&host, self.ping_timeout).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct InFlight<'a>(&'a AtomicUsize);

    impl<'a> InFlight<'a> {
        fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
            let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            Self(counter)
        }
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Prober that hands out canned samples, then repeats a fallback.
    pub(crate) struct ScriptedProber {
        gets: Mutex<VecDeque<Sample>>,
        echoes: Mutex<VecDeque<Sample>>,
        fallback_get: Sample,
        fallback_echo: Sample,
        /// Simulated time each probe spends on the wire.
        pub(crate) wire_time: Duration,
        pub(crate) in_flight: AtomicUsize,
        pub(crate) peak_in_flight: AtomicUsize,
        pub(crate) get_calls: AtomicUsize,
    }

    impl ScriptedProber {
        pub(crate) fn steady(get_latency: f64, echo_latency: f64) -> Self {
            Self {
                gets: Mutex::new(VecDeque::new()),
                echoes: Mutex::new(VecDeque::new()),
                fallback_get: Sample::new(get_latency, ProbeOutcome::Status(StatusClass::Success)),
                fallback_echo: Sample::new(echo_latency, ProbeOutcome::Reply),
                wire_time: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
                get_calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_wire_time(mut self, wire_time: Duration) -> Self {
            self.wire_time = wire_time;
            self
        }

        pub(crate) fn with_gets(self, samples: Vec<Sample>) -> Self {
            self.gets.lock().expect("lock").extend(samples);
            self
        }

        pub(crate) fn with_echoes(self, samples: Vec<Sample>) -> Self {
            self.echoes.lock().expect("lock").extend(samples);
            self
        }

        fn next(queue: &Mutex<VecDeque<Sample>>, fallback: &Sample) -> Sample {
            queue
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| fallback.clone())
        }
    }

    impl Prober for ScriptedProber {
        async fn get(&self, _url: &Url) -> Sample {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);
            if !self.wire_time.is_zero() {
                tokio::time::sleep(self.wire_time).await;
            }
            Self::next(&self.gets, &self.fallback_get)
        }

        async fn echo(&self, _host: &ResolvedHost) -> Sample {
            if !self.wire_time.is_zero() {
                tokio::time::sleep(self.wire_time).await;
            }
            Self::next(&self.echoes, &self.fallback_echo)
        }
    }
}
