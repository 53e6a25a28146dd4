//! The ordered-stage `Pipeline` (C7) and worker-pool `BatchRunner` (C8)
//! that compose validators, probes and drivers into one orchestration
//! engine (spec §4.7, §4.8).

pub mod batch;
pub mod pipeline;
pub mod stage;
pub mod test_suite;

pub use batch::{run_batch, BatchTarget};
pub use pipeline::Pipeline;
pub use stage::{default_stage_defs, stage_enabled, StageDef};
pub use test_suite::run_test_suite;
