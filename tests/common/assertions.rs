// Custom test assertions for integration tests

use cdc_replicator::cdc::canonical::CanonicalRecord;
use cdc_replicator::cdc::sink::{DeliveryOutcome, StoredDocument};

/// Assertion result for detailed error messages
#[derive(Debug)]
pub struct AssertionResult {
    pub passed: bool,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl AssertionResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
            expected: None,
            actual: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn assert(self) {
        if !self.passed {
            let mut msg = self.message;
            if let Some(expected) = self.expected {
                msg.push_str(&format!("\n  expected: {}", expected));
            }
            if let Some(actual) = self.actual {
                msg.push_str(&format!("\n  actual: {}", actual));
            }
            panic!("{}", msg);
        }
    }
}

/// Every outcome is a delivery
pub fn assert_all_delivered(outcomes: &[DeliveryOutcome]) -> AssertionResult {
    match outcomes.iter().find(|o| !o.is_delivered()) {
        None => AssertionResult::pass(),
        Some(failed) => AssertionResult::fail(format!("Sink {} was not written", failed.sink()))
            .with_expected("delivered")
            .with_actual(
                failed
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            ),
    }
}

/// Outcomes are reported for exactly these sinks, in this order
pub fn assert_outcome_order(outcomes: &[DeliveryOutcome], expected: &[&str]) -> AssertionResult {
    let actual: Vec<&str> = outcomes.iter().map(|o| o.sink()).collect();
    if actual == expected {
        AssertionResult::pass()
    } else {
        AssertionResult::fail("Outcome order mismatch")
            .with_expected(format!("{:?}", expected))
            .with_actual(format!("{:?}", actual))
    }
}

/// The stored document landed in `database.collection` with this record
pub fn assert_stored(
    stored: &StoredDocument,
    database: &str,
    collection: &str,
    record: &CanonicalRecord,
) -> AssertionResult {
    if stored.database != database || stored.collection != collection {
        return AssertionResult::fail("Document stored in the wrong place")
            .with_expected(format!("{}.{}", database, collection))
            .with_actual(format!("{}.{}", stored.database, stored.collection));
    }
    if &stored.record != record {
        return AssertionResult::fail("Stored record mismatch")
            .with_expected(format!("{:?}", record))
            .with_actual(format!("{:?}", stored.record));
    }
    AssertionResult::pass()
}

/// Assert that a duration is within acceptable bounds
#[macro_export]
macro_rules! assert_duration {
    ($duration:expr, $min_ms:expr, $max_ms:expr) => {
        let min = std::time::Duration::from_millis($min_ms);
        let max = std::time::Duration::from_millis($max_ms);
        assert!(
            $duration >= min && $duration <= max,
            "Expected duration {:?} to be between {:?} and {:?}",
            $duration,
            min,
            max
        );
    };
}
