//! Result records produced by each component of the engine (spec §3).
//!
//! These types are handed by value from producer to consumer; nothing in
//! this crate mutates a record after its producing stage has returned it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-validator-check result. Invariant: `success == errors.is_empty()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub validator_name: String,
    pub success: bool,
    pub elapsed: Duration,
    pub files_inspected: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub detail: HashMap<String, Value>,
}

impl ValidationRecord {
    pub fn new(validator_name: impl Into<String>) -> Self {
        Self {
            validator_name: validator_name.into(),
            success: true,
            elapsed: Duration::ZERO,
            files_inspected: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            detail: HashMap::new(),
        }
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.success = false;
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Result of probing one required MCP method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodProbe {
    pub method: String,
    pub request_body: Value,
    pub raw_response: Option<Value>,
    pub elapsed: Duration,
    pub success: bool,
    pub error: Option<String>,
}

/// Result of probing one required MCP capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityProbe {
    pub capability: String,
    pub advertised_by_server: bool,
    pub functional_success: bool,
    pub error: Option<String>,
}

/// Aggregate outcome of the protocol handshake and probe sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolReport {
    pub negotiated_version: Option<String>,
    pub supported_methods: Vec<String>,
    pub advertised_capabilities: Vec<String>,
    pub method_probes: Vec<MethodProbe>,
    pub capability_probes: Vec<CapabilityProbe>,
    pub errors: Vec<String>,
    pub handshake_ok: bool,
    pub success: bool,
}

impl ProtocolReport {
    pub fn new() -> Self {
        Self {
            negotiated_version: None,
            supported_methods: Vec::new(),
            advertised_capabilities: Vec::new(),
            method_probes: Vec::new(),
            capability_probes: Vec::new(),
            errors: Vec::new(),
            handshake_ok: false,
            success: false,
        }
    }

    /// Recompute `success` per spec §4.4: the handshake succeeded and no
    /// required method probe reported a failure. `handshake_ok` is also
    /// retained so the compliance score can zero itself out per spec §4.9.
    pub fn finalize(&mut self, handshake_ok: bool) {
        self.handshake_ok = handshake_ok;
        let all_methods_ok = self.method_probes.iter().all(|p| p.success);
        self.success = handshake_ok && all_methods_ok && self.errors.is_empty();
    }
}

impl Default for ProtocolReport {
    fn default() -> Self {
        Self::new()
    }
}

/// One labelled step within a `ScenarioRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub label: String,
    pub success: bool,
    pub elapsed: Duration,
    pub detail: HashMap<String, Value>,
    pub error: Option<String>,
}

/// A named end-to-end functional scenario (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub name: String,
    pub steps: Vec<StepRecord>,
    pub success: bool,
}

impl ScenarioRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            success: true,
        }
    }

    pub fn push_step(&mut self, step: StepRecord) {
        if !step.success {
            self.success = false;
        }
        self.steps.push(step);
    }
}

/// Per-band load metrics (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandMetrics {
    pub band_name: String,
    pub duration: Duration,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub error_rate: f64,
    pub requests_per_second: f64,
    pub average_response_time: Duration,
}

/// Response-time percentile curve plus memory sampling and leak hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSample {
    pub mean: Duration,
    pub median: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
    pub average_memory_bytes: u64,
    pub peak_memory_bytes: u64,
    pub leak_hint: bool,
    pub requests_per_second: f64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub bands: Vec<BandMetrics>,
    pub success: bool,
    pub errors: Vec<String>,
}

impl LoadSample {
    pub fn empty() -> Self {
        Self {
            mean: Duration::ZERO,
            median: Duration::ZERO,
            p95: Duration::ZERO,
            p99: Duration::ZERO,
            max: Duration::ZERO,
            average_memory_bytes: 0,
            peak_memory_bytes: 0,
            leak_hint: false,
            requests_per_second: 0.0,
            successful_requests: 0,
            failed_requests: 0,
            bands: Vec::new(),
            success: true,
            errors: Vec::new(),
        }
    }
}

/// Failure policy for a pipeline stage (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    Stop,
    Continue,
    Retry,
}

/// Result of executing one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub elapsed: Duration,
    pub success: bool,
    pub skipped: bool,
    pub retries_performed: u32,
    pub error: Option<String>,
    pub detail: HashMap<String, Value>,
}

impl StageRecord {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elapsed: Duration::ZERO,
            success: true,
            skipped: true,
            retries_performed: 0,
            error: None,
            detail: HashMap::new(),
        }
    }
}

/// Every validator result plus protocol/scenario/load outcomes for one
/// target directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: uuid::Uuid,
    pub target_path: PathBuf,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub elapsed: Duration,
    pub success: bool,
    pub validations: HashMap<String, ValidationRecord>,
    pub protocol: Option<ProtocolReport>,
    pub scenarios: HashMap<String, ScenarioRecord>,
    pub load: Option<LoadSample>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl TestRecord {
    pub fn new(target_path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            target_path,
            timestamp: chrono::Utc::now(),
            elapsed: Duration::ZERO,
            success: false,
            validations: HashMap::new(),
            protocol: None,
            scenarios: HashMap::new(),
            load: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Recompute top-level `success`: every validation passed, and (when
    /// present) protocol, scenarios and load all passed too.
    pub fn finalize(&mut self) {
        let validations_ok = self.validations.values().all(|v| v.success);
        let protocol_ok = self.protocol.as_ref().map_or(true, |p| p.success);
        let scenarios_ok = self.scenarios.values().all(|s| s.success);
        let load_ok = self.load.as_ref().map_or(true, |l| l.success);
        self.success = validations_ok && protocol_ok && scenarios_ok && load_ok;
    }
}

/// Result of executing the ordered stage list against one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: uuid::Uuid,
    pub target_path: PathBuf,
    pub elapsed: Duration,
    pub success: bool,
    pub stages: HashMap<String, StageRecord>,
    pub total_stages: usize,
    pub completed_stages: usize,
    pub skipped_stages: usize,
    pub failed_stages: usize,
    pub test_record: Option<TestRecord>,
    pub errors: Vec<String>,
}

impl PipelineRecord {
    pub fn new(target_path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            target_path,
            elapsed: Duration::ZERO,
            success: false,
            stages: HashMap::new(),
            total_stages: 0,
            completed_stages: 0,
            skipped_stages: 0,
            failed_stages: 0,
            test_record: None,
            errors: Vec::new(),
        }
    }

    /// Invariant of spec §8: `completed + failed + skipped == total`.
    pub fn recount(&mut self) {
        self.completed_stages = self
            .stages
            .values()
            .filter(|s| !s.skipped && s.success)
            .count();
        self.skipped_stages = self.stages.values().filter(|s| s.skipped).count();
        self.failed_stages = self
            .stages
            .values()
            .filter(|s| !s.skipped && !s.success)
            .count();
        self.total_stages = self.stages.len();
    }
}

/// Aggregate of a `BatchRunner` fan-out across many targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub request_id: uuid::Uuid,
    pub pipelines: HashMap<PathBuf, PipelineRecord>,
    pub total_servers: usize,
    pub completed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub average_duration: Duration,
    pub fastest_duration: Duration,
    pub slowest_duration: Duration,
    pub success_rate: f64,
    pub most_common_failures: Vec<(String, usize)>,
    pub per_stage_success_rate: HashMap<String, f64>,
}

impl BatchRecord {
    pub fn new(total_servers: usize) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4(),
            pipelines: HashMap::new(),
            total_servers,
            completed_tests: 0,
            failed_tests: 0,
            skipped_tests: 0,
            average_duration: Duration::ZERO,
            fastest_duration: Duration::ZERO,
            slowest_duration: Duration::ZERO,
            success_rate: 0.0,
            most_common_failures: Vec::new(),
            per_stage_success_rate: HashMap::new(),
        }
    }
}
