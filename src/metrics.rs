use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

const SUCCESS: &str = "success";
const VALIDATION_FAILURE: &str = "validation_failure";
const GENERATION_FAILURE: &str = "generation_failure";
const USAGE_SINK_FAILURE: &str = "usage_sink_failure";

/// Handler counters, served in Prometheus text format on `GET /metrics`.
pub struct HandlerMetrics {
    registry: Registry,
    requests: IntCounter,
    outcomes: IntCounterVec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub validation_failures: u64,
    pub generation_failures: u64,
    pub usage_sink_failures: u64,
}

impl HandlerMetrics {
    /// Each handler gets its own registry so several can live in one process.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("rgenai_edit".to_string()), None)?;

        let requests = IntCounter::new("requests_total", "Edit requests received")?;
        let outcomes = IntCounterVec::new(
            Opts::new(
                "outcomes_total",
                "Edit request outcomes and usage records that could not be written",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(outcomes.clone()))?;

        // Export every series from the start, not only after its first event.
        for outcome in [SUCCESS, VALIDATION_FAILURE, GENERATION_FAILURE, USAGE_SINK_FAILURE] {
            outcomes.with_label_values(&[outcome]);
        }

        Ok(Self {
            registry,
            requests,
            outcomes,
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn record_success(&self) {
        self.outcomes.with_label_values(&[SUCCESS]).inc();
    }

    pub fn record_validation_failure(&self) {
        self.outcomes.with_label_values(&[VALIDATION_FAILURE]).inc();
    }

    pub fn record_generation_failure(&self) {
        self.outcomes.with_label_values(&[GENERATION_FAILURE]).inc();
    }

    pub fn record_sink_failure(&self) {
        self.outcomes.with_label_values(&[USAGE_SINK_FAILURE]).inc();
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let outcome = |label: &str| self.outcomes.with_label_values(&[label]).get();
        MetricsSnapshot {
            requests: self.requests.get(),
            successes: outcome(SUCCESS),
            validation_failures: outcome(VALIDATION_FAILURE),
            generation_failures: outcome(GENERATION_FAILURE),
            usage_sink_failures: outcome(USAGE_SINK_FAILURE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_exported_in_text_format() {
        let metrics = HandlerMetrics::new().unwrap();
        metrics.record_request();
        metrics.record_success();
        metrics.record_sink_failure();

        let text = metrics.encode().unwrap();
        assert!(text.contains("rgenai_edit_requests_total 1"));
        assert!(text.contains("rgenai_edit_outcomes_total{outcome=\"success\"} 1"));
        assert!(text.contains("rgenai_edit_outcomes_total{outcome=\"usage_sink_failure\"} 1"));
        assert!(text.contains("rgenai_edit_outcomes_total{outcome=\"generation_failure\"} 0"));
        assert!(metrics.content_type().starts_with("text/plain"));
    }

    #[test]
    fn handlers_do_not_share_counters() {
        let first = HandlerMetrics::new().unwrap();
        let second = HandlerMetrics::new().unwrap();
        first.record_validation_failure();

        assert_eq!(first.snapshot().validation_failures, 1);
        assert_eq!(second.snapshot().validation_failures, 0);
    }
}
