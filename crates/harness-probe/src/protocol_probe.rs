//! C4: `ProtocolProbe` — drives the MCP handshake and required-method /
//! capability probes (spec §4.4).

use serde_json::{json, Value};

use harness_invoke::SafeInvoker;
use harness_types::context::HarnessContext;
use harness_types::records::{CapabilityProbe, MethodProbe, ProtocolReport};

use crate::spawn::{LiveServer, DEFAULT_SHUTDOWN_TIMEOUT};

/// Configuration the probe needs from `HarnessConfig`.
pub struct ProtocolProbeConfig {
    pub protocol_version: String,
    pub required_methods: Vec<String>,
    pub required_capabilities: Vec<String>,
}

/// Runs the full handshake + probe sweep against a freshly spawned server,
/// then tears the server down on every exit path.
pub async fn run_protocol_probe(
    ctx: &HarnessContext,
    invoker: &SafeInvoker,
    binary_name: &str,
    config: &ProtocolProbeConfig,
) -> ProtocolReport {
    let mut report = ProtocolReport::new();

    let live = match LiveServer::spawn(invoker, binary_name, &[]) {
        Ok(live) => live,
        Err(e) => {
            report.errors.push(e.to_string());
            report.finalize(false);
            return report;
        }
    };

    let handshake_ok = handshake(ctx, &live, config, &mut report).await;

    for method in &config.required_methods {
        let probe = probe_method(ctx, &live, method).await;
        if probe.success {
            report.supported_methods.push(method.clone());
        }
        report.method_probes.push(probe);
    }

    for capability in &config.required_capabilities {
        let probe = probe_capability(ctx, &live, capability, &report).await;
        report.capability_probes.push(probe);
    }

    probe_error_paths(ctx, &live, &mut report).await;

    report.finalize(handshake_ok);
    live.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await;
    report
}

async fn handshake(
    ctx: &HarnessContext,
    live: &LiveServer,
    config: &ProtocolProbeConfig,
    report: &mut ProtocolReport,
) -> bool {
    let params = json!({
        "protocolVersion": config.protocol_version,
        "capabilities": { "roots": { "listChanged": true } },
        "clientInfo": { "name": "mcp-conformance-harness", "version": env!("CARGO_PKG_VERSION") },
    });

    match live.transport.call(ctx, "initialize", params).await {
        Ok(Value::Object(map)) => {
            if !map.contains_key("serverInfo") {
                report
                    .errors
                    .push("initialize response missing required `serverInfo`".to_string());
                return false;
            }
            if let Some(Value::String(version)) = map.get("protocolVersion") {
                report.negotiated_version = Some(version.clone());
            }
            if let Some(Value::Object(capabilities)) = map.get("capabilities") {
                report
                    .advertised_capabilities
                    .extend(capabilities.keys().cloned());
            }
            true
        }
        Ok(_) => {
            report
                .errors
                .push("initialize response was not a JSON object".to_string());
            false
        }
        Err(e) => {
            report.errors.push(format!("initialize failed: {e}"));
            false
        }
    }
}

async fn probe_method(ctx: &HarnessContext, live: &LiveServer, method: &str) -> MethodProbe {
    let start = tokio::time::Instant::now();
    let params = method_params(method);

    let result = live.transport.call(ctx, method, params.clone()).await;
    let elapsed = start.elapsed();

    match (method, result) {
        ("tools/list", Ok(ref value)) => {
            let ok = value.get("tools").is_some_and(Value::is_array)
                && value["tools"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .all(tool_shape_is_valid);
            MethodProbe {
                method: method.to_string(),
                request_body: params,
                raw_response: Some(value.clone()),
                elapsed,
                success: ok,
                error: (!ok).then(|| "tools/list response failed the shape contract".to_string()),
            }
        }
        ("tools/call", Ok(ref value)) => {
            let ok = value
                .get("content")
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().all(content_item_shape_is_valid));
            MethodProbe {
                method: method.to_string(),
                request_body: params,
                raw_response: Some(value.clone()),
                elapsed,
                success: ok,
                error: (!ok).then(|| "tools/call response failed the shape contract".to_string()),
            }
        }
        // A "tool not found" error on a dummy call is a successful probe:
        // the probe is about the method being served, not about the tool
        // being real (spec §4.4).
        ("tools/call", Err(e)) => MethodProbe {
            method: method.to_string(),
            request_body: params,
            raw_response: None,
            elapsed,
            success: true,
            error: Some(e.to_string()),
        },
        (_, Ok(value)) => MethodProbe {
            method: method.to_string(),
            request_body: params,
            raw_response: Some(value),
            elapsed,
            success: true,
            error: None,
        },
        (_, Err(e)) => MethodProbe {
            method: method.to_string(),
            request_body: params,
            raw_response: None,
            elapsed,
            success: false,
            error: Some(e.to_string()),
        },
    }
}

fn method_params(method: &str) -> Value {
    match method {
        "tools/list" => json!({}),
        "tools/call" => json!({ "name": "dummy_tool", "arguments": {} }),
        _ => json!({}),
    }
}

fn tool_shape_is_valid(tool: &Value) -> bool {
    tool.get("name").is_some()
        && tool.get("description").is_some()
        && tool
            .get("inputSchema")
            .and_then(|schema| schema.get("type"))
            .and_then(Value::as_str)
            == Some("object")
}

fn content_item_shape_is_valid(item: &Value) -> bool {
    item.get("type").is_some() && item.get("text").is_some()
}

async fn probe_capability(
    ctx: &HarnessContext,
    live: &LiveServer,
    capability: &str,
    report: &ProtocolReport,
) -> CapabilityProbe {
    let advertised = report
        .advertised_capabilities
        .iter()
        .any(|c| c == capability);

    let (functional_success, error) = match capability {
        "tools" => match live.transport.call(ctx, "tools/list", json!({})).await {
            Ok(value) => (value.get("tools").is_some_and(Value::is_array), None),
            Err(e) => (false, Some(e.to_string())),
        },
        _ => (advertised, None),
    };

    CapabilityProbe {
        capability: capability.to_string(),
        advertised_by_server: advertised,
        functional_success,
        error,
    }
}

async fn probe_error_paths(ctx: &HarnessContext, live: &LiveServer, report: &mut ProtocolReport) {
    if live
        .transport
        .call(ctx, "definitely/unknown/method", json!({}))
        .await
        .is_ok()
    {
        report
            .errors
            .push("unknown method call unexpectedly succeeded".to_string());
    }

    if live
        .transport
        .call(ctx, "tools/call", json!("this is not a valid params object"))
        .await
        .is_ok()
    {
        report
            .errors
            .push("malformed params call unexpectedly succeeded".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_shape_validation_requires_object_schema() {
        let good = json!({"name": "echo", "description": "", "inputSchema": {"type": "object"}});
        assert!(tool_shape_is_valid(&good));
        let bad = json!({"name": "echo"});
        assert!(!tool_shape_is_valid(&bad));
    }

    #[test]
    fn content_item_shape_requires_type_and_text() {
        assert!(content_item_shape_is_valid(&json!({"type": "text", "text": "hi"})));
        assert!(!content_item_shape_is_valid(&json!({"type": "text"})));
    }
}
