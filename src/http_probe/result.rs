use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Get,
    Icmp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Get => write!(f, "GET"),
            Protocol::Icmp => write!(f, "ICMP"),
        }
    }
}

/// HTTP status family, labelled the way the feature row columns are ("1xx".."5xx").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub const ALL: [StatusClass; 5] = [
        StatusClass::Informational,
        StatusClass::Success,
        StatusClass::Redirection,
        StatusClass::ClientError,
        StatusClass::ServerError,
    ];

    /// Returns `None` for codes outside 100..=599.
    pub fn from_code(code: u16) -> Option<Self> {
        match code / 100 {
            1 => Some(StatusClass::Informational),
            2 => Some(StatusClass::Success),
            3 => Some(StatusClass::Redirection),
            4 => Some(StatusClass::ClientError),
            5 => Some(StatusClass::ServerError),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusClass::Informational => "1xx",
            StatusClass::Success => "2xx",
            StatusClass::Redirection => "3xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// GET answered with a status in a known class.
    Status(StatusClass),
    /// ICMP echo answered.
    Reply,
    Failure(String),
    Timeout,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Status(_) | ProbeOutcome::Reply)
    }
}

/// One timed round trip as reported by a prober, before it is tied to a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub latency_seconds: f64,
    pub outcome: ProbeOutcome,
}

impl Sample {
    pub fn new(latency_seconds: f64, outcome: ProbeOutcome) -> Self {
        Self {
            latency_seconds: latency_seconds.max(0.0),
            outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub slot_id: usize,
    pub protocol: Protocol,
    pub latency_seconds: f64,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn from_sample(slot_id: usize, protocol: Protocol, sample: Sample) -> Self {
        Self {
            slot_id,
            protocol,
            latency_seconds: sample.latency_seconds,
            outcome: sample.outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class_from_code() {
        assert_eq!(StatusClass::from_code(101), Some(StatusClass::Informational));
        assert_eq!(StatusClass::from_code(200), Some(StatusClass::Success));
        assert_eq!(StatusClass::from_code(308), Some(StatusClass::Redirection));
        assert_eq!(StatusClass::from_code(404), Some(StatusClass::ClientError));
        assert_eq!(StatusClass::from_code(599), Some(StatusClass::ServerError));
        assert_eq!(StatusClass::from_code(600), None);
        assert_eq!(StatusClass::from_code(99), None);
    }

    #[test]
    fn test_labels_follow_column_names() {
        let labels: Vec<&str> = StatusClass::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["1xx", "2xx", "3xx", "4xx", "5xx"]);
    }

    #[test]
    fn test_sample_clamps_negative_latency() {
        let sample = Sample::new(-0.5, ProbeOutcome::Timeout);
        assert_eq!(sample.latency_seconds, 0.0);
    }
}
