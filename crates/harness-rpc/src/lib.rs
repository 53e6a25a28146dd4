//! C3: `RpcTransport` — a line-delimited JSON-RPC 2.0 client over a child
//! process's stdio, with correlated request IDs, per-call deadlines and
//! orderly shutdown (spec §4.3).
//!
//! Every call is serialised through one critical section: call n+1 cannot be
//! written until call n has returned or timed out. This forbids pipelining
//! on purpose, matching the one-in-flight-per-transport contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use harness_types::context::HarnessContext;
use harness_types::error::{HarnessError, HarnessResult};

/// The fixed per-call deadline: 10 seconds regardless of caller context
/// (spec §4.3). Caller-context cancellation is honoured in addition;
/// whichever fires first wins.
pub const CALL_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RequestEnvelope<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    #[allow(dead_code)]
    code: i64,
    message: String,
}

struct Streams {
    writer: BufWriter<ChildStdin>,
    reader: tokio::io::Lines<BufReader<ChildStdout>>,
    stderr: Option<ChildStderr>,
}

/// A JSON-RPC 2.0 client bound to one child process's stdio. Calls are
/// serialised through a single async mutex: a call may not interleave
/// with another on the same transport (spec §4.3, §5).
pub struct RpcTransport {
    streams: Mutex<Option<Streams>>,
    next_id: AtomicU64,
}

impl RpcTransport {
    #[must_use]
    pub fn new(stdin: ChildStdin, stdout: ChildStdout, stderr: ChildStderr) -> Self {
        Self {
            streams: Mutex::new(Some(Streams {
                writer: BufWriter::new(stdin),
                reader: BufReader::new(stdout).lines(),
                stderr: Some(stderr),
            })),
            next_id: AtomicU64::new(1),
        }
    }

    /// Perform one request/response call. Takes the critical section,
    /// assigns the next monotonically increasing id, writes the request
    /// line, and waits for a complete response line or the deadline,
    /// whichever fires first (spec §4.3).
    pub async fn call(&self, ctx: &HarnessContext, method: &str, params: Value) -> HarnessResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RequestEnvelope {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let line = serde_json::to_string(&request)
            .map_err(|e| HarnessError::Transport(format!("encoding request: {e}")))?;

        let mut guard = self.streams.lock().await;
        let streams = guard
            .as_mut()
            .ok_or_else(|| HarnessError::Transport("transport already closed".to_string()))?;

        trace!(%method, id, "writing rpc request");
        streams
            .writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| HarnessError::Transport(format!("writing request: {e}")))?;
        streams
            .writer
            .write_all(b"\n")
            .await
            .map_err(|e| HarnessError::Transport(format!("writing newline: {e}")))?;
        streams
            .writer
            .flush()
            .await
            .map_err(|e| HarnessError::Transport(format!("flushing request: {e}")))?;

        let deadline = ctx.with_timeout(CALL_DEADLINE);
        let response_line = tokio::select! {
            line = streams.reader.next_line() => line,
            () = deadline.cancelled_or_deadline() => {
                return Err(HarnessError::Timeout(format!("call to {method} timed out")));
            }
        };

        let line = response_line
            .map_err(|e| HarnessError::Transport(format!("reading response: {e}")))?
            .ok_or_else(|| HarnessError::Transport("stream closed before a response arrived".to_string()))?;

        debug!(%method, id, "received rpc response");
        let response: ResponseEnvelope = serde_json::from_str(&line)
            .map_err(|e| HarnessError::Transport(format!("parsing response: {e} (line: {line})")))?;

        match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(HarnessError::Transport(error.message)),
            (Some(result), Some(_)) => Ok(result),
            (None, None) => Err(HarnessError::ProtocolConformance(
                "response carries neither `result` nor `error`".to_string(),
            )),
        }
    }

    /// Close all three stream handles in order (stdin, stdout, stderr).
    /// Idempotent: calling more than once is a no-op after the first.
    pub async fn close(&self) {
        let mut guard = self.streams.lock().await;
        if let Some(mut streams) = guard.take() {
            let _ = streams.writer.shutdown().await;
            drop(streams.reader);
            if let Some(stderr) = streams.stderr.take() {
                drop(stderr);
            }
        }
    }

    /// Drain and log the child's stderr on a dedicated reader task, so
    /// diagnostic output isn't lost while the transport is driving calls.
    pub fn spawn_stderr_logger(stderr: ChildStderr) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "child_process_stderr", "{line}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    async fn spawn_cat() -> tokio::process::Child {
        Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .expect("cat must be available in the test environment")
    }

    #[tokio::test]
    async fn call_against_a_well_behaved_echo_round_trips() {
        // `cat` isn't a JSON-RPC server, so this test only exercises framing
        // and the deadline path rather than a real response; a true
        // integration test lives in harness-pipeline against a fixture
        // server binary.
        let mut child = spawn_cat().await;
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        let transport = RpcTransport::new(stdin, stdout, stderr);

        let ctx = HarnessContext::background();
        let result = transport.call(&ctx, "initialize", serde_json::json!({})).await;
        // `cat` echoes the request back verbatim (no `result`/`error`
        // fields) or the call times out -- either way this must fail, and
        // must do so within the fixed per-call deadline rather than hang.
        assert!(result.is_err());

        transport.close().await;
        let _ = child.start_kill();
    }

    #[tokio::test]
    async fn ids_are_strictly_increasing() {
        let mut child = spawn_cat().await;
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        let transport = RpcTransport::new(stdin, stdout, stderr);

        let first = transport.next_id.fetch_add(1, Ordering::SeqCst);
        let second = transport.next_id.fetch_add(1, Ordering::SeqCst);
        assert!(second > first);

        transport.close().await;
        let _ = child.start_kill();
    }
}
