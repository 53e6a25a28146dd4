//! End-to-end scenarios run against small fixture Go servers: pre-validation
//! failure on an empty directory, protocol failure on a compilable-but-silent
//! server, and full pipeline success on a conformant one. These mirror the
//! literal walkthroughs described for the pipeline's stage-plus-suite run.
//!
//! Every scenario after the empty-directory one needs a real `go` toolchain
//! on `PATH` to compile its fixture; skip gracefully when it is absent
//! rather than failing the suite, matching the toolchain-absence handling
//! `harness-pipeline`'s own stage table already does at `pre_validation`.

use std::io::Write;
use std::path::Path;

use harness_pipeline::Pipeline;
use harness_types::config::HarnessConfig;
use harness_types::context::HarnessContext;

fn has_go_toolchain() -> bool {
    std::process::Command::new("go")
        .arg("version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn write_fixture(dir: &Path, main_go: &str) {
    std::fs::write(
        dir.join("go.mod"),
        "module fixture\n\ngo 1.21\n",
    )
    .unwrap();
    let mut file = std::fs::File::create(dir.join("main.go")).unwrap();
    file.write_all(main_go.as_bytes()).unwrap();
}

const SILENT_SERVER: &str = r#"
package main

func main() {
	select {}
}
"#;

const CONFORMANT_SERVER: &str = r#"
// jsonrpc2-compatible line-delimited MCP server.
package main

import (
	"bufio"
	"encoding/json"
	"fmt"
	"os"
)

type request struct {
	JSONRPC string          `json:"jsonrpc"`
	ID      json.RawMessage `json:"id"`
	Method  string          `json:"method"`
	Params  json.RawMessage `json:"params"`
}

type rpcError struct {
	Code    int    `json:"code"`
	Message string `json:"message"`
}

type response struct {
	JSONRPC string      `json:"jsonrpc"`
	ID      json.RawMessage `json:"id"`
	Result  interface{} `json:"result,omitempty"`
	Error   *rpcError   `json:"error,omitempty"`
}

func main() {
	reader := bufio.NewReader(os.Stdin)
	for {
		line, err := reader.ReadString('\n')
		if err != nil {
			return
		}
		var req request
		if err := json.Unmarshal([]byte(line), &req); err != nil {
			continue
		}

		var result interface{}
		var rpcErr *rpcError

		switch req.Method {
		case "initialize":
			result = map[string]interface{}{
				"protocolVersion": "2024-11-05",
				"serverInfo":      map[string]interface{}{"name": "fixture-server", "version": "0.1.0"},
				"capabilities": map[string]interface{}{
					"tools": map[string]interface{}{},
				},
			}
		case "tools/list":
			result = map[string]interface{}{
				"tools": []interface{}{
					map[string]interface{}{
						"name":        "echo",
						"description": "echoes its input",
						"inputSchema": map[string]interface{}{"type": "object"},
					},
				},
			}
		case "tools/call":
			var params map[string]interface{}
			if err := json.Unmarshal(req.Params, &params); err != nil {
				rpcErr = &rpcError{Code: -32602, Message: "invalid params"}
			} else {
				result = map[string]interface{}{
					"content": []interface{}{
						map[string]interface{}{"type": "text", "text": "ok"},
					},
				}
			}
		default:
			rpcErr = &rpcError{Code: -32601, Message: "method not found"}
		}

		resp := response{JSONRPC: "2.0", ID: req.ID, Result: result, Error: rpcErr}
		out, _ := json.Marshal(resp)
		fmt.Fprintln(os.Stdout, string(out))
	}
}
"#;

#[tokio::test]
async fn empty_directory_halts_at_pre_validation() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(HarnessConfig::default());
    let ctx = HarnessContext::background();

    let record = pipeline.run(&ctx, dir.path(), "fixture-server").await;

    assert!(!record.success);
    assert!(record.test_record.is_none());
    assert!(!record.stages.get("pre_validation").unwrap().success);
}

#[tokio::test]
async fn silent_server_fails_the_protocol_probe() {
    if !has_go_toolchain() {
        eprintln!("go toolchain not found on PATH, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), SILENT_SERVER);

    let mut config = HarnessConfig::default();
    config.enable_scenarios = false;
    config.enable_load = false;
    let pipeline = Pipeline::new(config);
    let ctx = HarnessContext::background();

    let record = pipeline.run(&ctx, dir.path(), "fixture-server").await;

    assert!(!record.success);
    let test_record = record.test_record.expect("compilation stages should pass");
    let protocol = test_record.protocol.expect("protocol probe should have run");
    assert!(!protocol.success);
}

#[tokio::test]
async fn conformant_server_passes_the_full_pipeline() {
    if !has_go_toolchain() {
        eprintln!("go toolchain not found on PATH, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), CONFORMANT_SERVER);

    let mut config = HarnessConfig::default();
    config.enable_load = false;
    let pipeline = Pipeline::new(config);
    let ctx = HarnessContext::background();

    let record = pipeline.run(&ctx, dir.path(), "fixture-server").await;

    let test_record = record.test_record.expect("suite should have run");
    let protocol = test_record.protocol.expect("protocol probe should have run");
    assert!(protocol.success, "protocol probe errors: {:?}", protocol.errors);
    assert!(
        test_record.scenarios.values().all(|s| s.success),
        "scenario failures: {:?}",
        test_record.scenarios
    );
    assert!(record.success);
}
