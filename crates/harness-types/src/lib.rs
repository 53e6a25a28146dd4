//! Data model, configuration, context and error taxonomy shared by every
//! crate in the MCP conformance harness.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod records;

pub use config::{HarnessConfig, Profile, ProfileDocument};
pub use context::{EnvironmentView, HarnessContext};
pub use error::{HarnessError, HarnessResult};
pub use records::{
    BandMetrics, BatchRecord, CapabilityProbe, FailurePolicy, LoadSample, MethodProbe,
    PipelineRecord, ProtocolReport, ScenarioRecord, StageRecord, StepRecord, TestRecord,
    ValidationRecord,
};
