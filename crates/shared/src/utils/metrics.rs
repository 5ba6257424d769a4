use prometheus_client::metrics::{counter::Counter, family::Family};
use prometheus_client::registry::Registry;
use prometheus_client_derive_encode::{EncodeLabelSet, EncodeLabelValue};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Admitted,
    Rejected,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RateLimitLabels {
    pub endpoint: String,
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub rate_limit_decisions: Family<RateLimitLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "rate_limit_decisions",
            "Rate limiter decisions by endpoint and outcome",
            self.rate_limit_decisions.clone(),
        );
    }

    pub fn record_decision(&self, endpoint: &str, outcome: Outcome) {
        let labels = RateLimitLabels {
            endpoint: endpoint.to_string(),
            outcome,
        };
        self.rate_limit_decisions.get_or_create(&labels).inc();
    }

    pub fn decisions(&self, endpoint: &str, outcome: Outcome) -> u64 {
        let labels = RateLimitLabels {
            endpoint: endpoint.to_string(),
            outcome,
        };
        self.rate_limit_decisions.get_or_create(&labels).get()
    }
}
