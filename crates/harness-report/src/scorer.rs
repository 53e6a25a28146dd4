//! C9 (scoring half): four independent 0..100 scores derived from one
//! `TestRecord` (spec §4.9).

use std::time::Duration;

use harness_types::records::TestRecord;

/// The four independent scores, each clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scores {
    pub overall: f64,
    pub quality: f64,
    pub performance: f64,
    pub compliance: f64,
}

/// Thresholds the performance score is computed against; these are the
/// same ceilings `LoadHarness` evaluated the record's load sample with.
#[derive(Debug, Clone, Copy)]
pub struct ScoringThresholds {
    pub response_time_ceiling: Duration,
    pub memory_ceiling_bytes: u64,
}

#[must_use]
pub fn score(record: &TestRecord, thresholds: ScoringThresholds) -> Scores {
    Scores {
        overall: overall_score(record),
        quality: quality_score(record),
        performance: performance_score(record, thresholds),
        compliance: compliance_score(record),
    }
}

fn overall_score(record: &TestRecord) -> f64 {
    let mut total = 0usize;
    let mut passed = 0usize;

    for validation in record.validations.values() {
        total += 1;
        if validation.success {
            passed += 1;
        }
    }
    if let Some(protocol) = &record.protocol {
        total += 1;
        if protocol.success {
            passed += 1;
        }
    }
    for scenario in record.scenarios.values() {
        total += 1;
        if scenario.success {
            passed += 1;
        }
    }
    if let Some(load) = &record.load {
        total += 1;
        if load.success {
            passed += 1;
        }
    }

    let base = if total == 0 {
        100.0
    } else {
        (passed as f64 / total as f64) * 100.0
    };
    let penalty = 5.0 * record.errors.len() as f64;
    let bonus = if record.protocol.is_some() && record.load.is_some() { 5.0 } else { 0.0 };

    clamp(base - penalty + bonus)
}

fn quality_score(record: &TestRecord) -> f64 {
    if record.validations.is_empty() {
        return 100.0;
    }
    let sum: f64 = record
        .validations
        .values()
        .map(|v| {
            if v.success {
                100.0
            } else if v.files_inspected == 0 {
                0.0
            } else {
                clamp((1.0 - v.errors.len() as f64 / v.files_inspected as f64) * 100.0)
            }
        })
        .sum();
    clamp(sum / record.validations.len() as f64)
}

fn performance_score(record: &TestRecord, thresholds: ScoringThresholds) -> f64 {
    let Some(load) = &record.load else {
        return 100.0;
    };

    let mut value = 100.0;

    let response_excess = excess_ratio(
        load.mean.as_secs_f64(),
        thresholds.response_time_ceiling.as_secs_f64(),
    );
    value -= response_excess.min(1.0) * 50.0;

    let memory_excess = excess_ratio(
        load.peak_memory_bytes as f64,
        thresholds.memory_ceiling_bytes as f64,
    );
    value -= memory_excess.min(1.0) * 50.0;

    if load.leak_hint {
        value -= 30.0;
    }

    let total_requests = load.successful_requests + load.failed_requests;
    let success_ratio = if total_requests == 0 {
        1.0
    } else {
        load.successful_requests as f64 / total_requests as f64
    };
    value *= success_ratio;

    clamp(value)
}

fn compliance_score(record: &TestRecord) -> f64 {
    let Some(protocol) = &record.protocol else {
        return 100.0;
    };
    if !protocol.handshake_ok {
        return 0.0;
    }

    let required = protocol.method_probes.len().max(1);
    let supported = protocol.supported_methods.len();
    let base = 50.0 + 50.0 * (supported as f64 / required as f64);
    let penalty = 10.0 * protocol.errors.len() as f64;
    clamp(base - penalty)
}

fn excess_ratio(observed: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 || observed <= ceiling {
        0.0
    } else {
        (observed - ceiling) / ceiling
    }
}

fn clamp(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            response_time_ceiling: Duration::from_secs(1),
            memory_ceiling_bytes: 256 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_types::records::{LoadSample, ProtocolReport};
    use std::path::PathBuf;

    #[test]
    fn empty_record_scores_are_in_range_and_perfect() {
        let record = TestRecord::new(PathBuf::from("/tmp/x"));
        let scores = score(&record, ScoringThresholds::default());
        assert!((0.0..=100.0).contains(&scores.overall));
        assert_eq!(scores.quality, 100.0);
        assert_eq!(scores.performance, 100.0);
        assert_eq!(scores.compliance, 100.0);
    }

    #[test]
    fn failed_handshake_zeroes_compliance() {
        let mut record = TestRecord::new(PathBuf::from("/tmp/x"));
        let mut protocol = ProtocolReport::new();
        protocol.finalize(false);
        record.protocol = Some(protocol);
        let scores = score(&record, ScoringThresholds::default());
        assert_eq!(scores.compliance, 0.0);
    }

    #[test]
    fn leak_hint_costs_at_least_thirty_points() {
        let mut record = TestRecord::new(PathBuf::from("/tmp/x"));
        let mut load = LoadSample::empty();
        load.leak_hint = true;
        load.successful_requests = 10;
        record.load = Some(load);
        let with_leak = score(&record, ScoringThresholds::default()).performance;

        let mut record2 = TestRecord::new(PathBuf::from("/tmp/x"));
        let mut load2 = LoadSample::empty();
        load2.successful_requests = 10;
        record2.load = Some(load2);
        let without_leak = score(&record2, ScoringThresholds::default()).performance;

        assert!(with_leak <= without_leak - 30.0);
    }

    #[test]
    fn all_scores_stay_within_bounds() {
        let mut record = TestRecord::new(PathBuf::from("/tmp/x"));
        record.errors = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let scores = score(&record, ScoringThresholds::default());
        assert!((0.0..=100.0).contains(&scores.overall));
        assert!((0.0..=100.0).contains(&scores.quality));
        assert!((0.0..=100.0).contains(&scores.performance));
        assert!((0.0..=100.0).contains(&scores.compliance));
    }
}
