use crate::model::{OutcomeResult, TaskOutcome};
use serde::{Deserialize, Serialize};

/// Per-version outcome summary used to judge a running test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetrics {
    pub version_id: String,
    pub total_tasks: u64,
    pub successes: u64,
    pub failures: u64,
    pub partials: u64,
    pub abandoned: u64,
    pub success_rate: f64,
    pub avg_confidence: f64,
    pub avg_duration_ms: Option<f64>,
    pub avg_tokens: Option<f64>,
}

/// Running sums for one version.
///
/// `push` and `merge` are order-independent, so outcome sets can be split
/// across workers and the partial aggregators merged in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregator {
    version_id: String,
    successes: u64,
    failures: u64,
    partials: u64,
    abandoned: u64,
    confidence_sum: f64,
    // Sums of u64 samples; u128 holds 2^64 of them.
    duration_sum: u128,
    duration_n: u64,
    tokens_sum: u128,
    tokens_n: u64,
}

impl Aggregator {
    pub fn new(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            ..Default::default()
        }
    }

    /// Outcomes attributed to another version are skipped.
    pub fn push(&mut self, o: &TaskOutcome) {
        if o.version_id != self.version_id {
            return;
        }
        match o.result {
            OutcomeResult::Success => self.successes += 1,
            OutcomeResult::Failure => self.failures += 1,
            OutcomeResult::Partial => self.partials += 1,
            OutcomeResult::Abandoned => self.abandoned += 1,
        }
        self.confidence_sum += o.confidence;
        if let Some(d) = o.duration_ms {
            self.duration_sum += u128::from(d);
            self.duration_n += 1;
        }
        if let Some(t) = o.tokens {
            self.tokens_sum += u128::from(t);
            self.tokens_n += 1;
        }
    }

    pub fn merge(mut self, other: Aggregator) -> Aggregator {
        debug_assert_eq!(self.version_id, other.version_id);
        self.successes += other.successes;
        self.failures += other.failures;
        self.partials += other.partials;
        self.abandoned += other.abandoned;
        self.confidence_sum += other.confidence_sum;
        self.duration_sum += other.duration_sum;
        self.duration_n += other.duration_n;
        self.tokens_sum += other.tokens_sum;
        self.tokens_n += other.tokens_n;
        self
    }

    fn total(&self) -> u64 {
        self.successes + self.failures + self.partials + self.abandoned
    }

    pub fn finish(self) -> VersionMetrics {
        let total = self.total();
        let ratio = |num: f64, n: u64| if n == 0 { 0.0 } else { num / n as f64 };

        VersionMetrics {
            success_rate: ratio(self.successes as f64, total),
            avg_confidence: ratio(self.confidence_sum, total),
            avg_duration_ms: (self.duration_n > 0)
                .then(|| ratio(self.duration_sum as f64, self.duration_n)),
            avg_tokens: (self.tokens_n > 0).then(|| ratio(self.tokens_sum as f64, self.tokens_n)),
            total_tasks: total,
            successes: self.successes,
            failures: self.failures,
            partials: self.partials,
            abandoned: self.abandoned,
            version_id: self.version_id,
        }
    }
}

impl<'a> Extend<&'a TaskOutcome> for Aggregator {
    fn extend<I: IntoIterator<Item = &'a TaskOutcome>>(&mut self, iter: I) {
        for o in iter {
            self.push(o);
        }
    }
}

/// Recomputes the summary for `version_id` from scratch; nothing is cached.
pub fn aggregate<'a, I>(version_id: &str, outcomes: I) -> VersionMetrics
where
    I: IntoIterator<Item = &'a TaskOutcome>,
{
    let mut agg = Aggregator::new(version_id);
    agg.extend(outcomes);
    agg.finish()
}
