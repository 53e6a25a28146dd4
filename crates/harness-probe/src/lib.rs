//! Live-server probing: spawning a server under test and driving the
//! protocol handshake, functional scenarios and load bands against it.

pub mod load_harness;
pub mod protocol_probe;
pub mod scenario_driver;
pub mod spawn;

pub use load_harness::{run_load, LoadHarnessConfig};
pub use protocol_probe::{run_protocol_probe, ProtocolProbeConfig};
pub use scenario_driver::run_scenarios;
pub use spawn::{LiveServer, DEFAULT_SHUTDOWN_TIMEOUT};
