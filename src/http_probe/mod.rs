pub mod probe;
pub mod result;

pub mod prelude {
    pub use super::probe::{build_client, timed_get};
    pub use super::result::{ProbeOutcome, ProbeResult, Protocol, Sample, StatusClass};
}

use std::fmt::Write;

/// Flattens an error and its sources into one line per cause.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}
