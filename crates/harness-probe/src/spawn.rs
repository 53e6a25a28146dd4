//! Shared spawn-and-connect helper used by `ProtocolProbe`, `ScenarioDriver`
//! and `LoadHarness`: each owns its own server lifecycle (spawn via
//! `SafeInvoker`, wire up `RpcTransport`, guarantee kill-and-wait on every
//! exit path, spec §4.4's "Termination").

use std::time::Duration;

use harness_invoke::{ChildGuard, SafeInvoker};
use harness_rpc::RpcTransport;
use harness_types::error::{HarnessError, HarnessResult};

/// A live connection to a freshly spawned server under test: the transport
/// to speak JSON-RPC with it, and the scope guard that owns its process.
pub struct LiveServer {
    pub transport: RpcTransport,
    guard: ChildGuard,
}

impl LiveServer {
    /// Spawn `binary_name` inside `invoker`'s working directory and wire up
    /// an `RpcTransport` over its stdio.
    pub fn spawn(invoker: &SafeInvoker, binary_name: &str, args: &[String]) -> HarnessResult<Self> {
        let prepared = invoker.prepare_compiled_binary(binary_name, args)?;
        let mut child = prepared.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HarnessError::Transport("failed to acquire child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::Transport("failed to acquire child stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HarnessError::Transport("failed to acquire child stderr".to_string()))?;

        let transport = RpcTransport::new(stdin, stdout, stderr);
        Ok(Self {
            transport,
            guard: ChildGuard::new(child),
        })
    }

    /// Close the transport, then kill and wait the child with a bounded
    /// shutdown timeout. Always invoked on every exit path by callers using
    /// this as a scope-local value (spec §4.4).
    pub async fn shutdown(self, shutdown_timeout: Duration) {
        self.transport.close().await;
        self.guard.stop(shutdown_timeout).await;
    }

    #[must_use]
    pub fn is_alive(&mut self) -> bool {
        match self.guard.child_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// OS process id of the spawned server, used by `LoadHarness`'s memory
    /// sampler. `None` once the child has already exited.
    #[must_use]
    pub fn pid(&mut self) -> Option<u32> {
        self.guard.child_mut().and_then(tokio::process::Child::id)
    }
}

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
