//! `HarnessConfig`: the immutable run configuration (spec §3) plus the
//! named-profile persistence format (spec §6).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Immutable per-run configuration. Every field has a default; the engine
/// must tolerate absence of any individual option.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Overall wall-clock deadline for a single pipeline run.
    pub overall_deadline: Duration,
    /// Upper bound on concurrent workers in `BatchRunner`.
    pub worker_pool_cap: usize,
    /// Whether validators marked parallel-safe may run concurrently.
    pub parallel_stages: bool,
    /// Whether a stage-loop failure with policy `stop` still lets the
    /// pipeline proceed to the post-stage `TestSuite` phase.
    pub continue_on_stage_failure: bool,
    /// Enable the security-lint validator and the `security_scan` stage.
    pub enable_security: bool,
    /// Enable the style validator and the `lint_check` stage.
    pub enable_style: bool,
    /// Enable `ScenarioDriver` scenarios as part of the `TestSuite`.
    pub enable_scenarios: bool,
    /// Enable `LoadHarness` sampling as part of the `TestSuite`.
    pub enable_load: bool,
    /// Negotiated MCP protocol version to present in `initialize`.
    pub protocol_version: String,
    /// Method names the server must serve to be conformant.
    pub required_methods: Vec<String>,
    /// Capability names the server must advertise/support.
    pub required_capabilities: Vec<String>,
    /// Response-time ceiling used by `LoadHarness` and the performance score.
    pub response_time_ceiling: Duration,
    /// Resident-memory ceiling in bytes.
    pub memory_ceiling_bytes: u64,
    /// Overrides for the paths of external tools SafeInvoker may invoke,
    /// keyed by logical tool name (`"toolchain"`, `"style_linter"`,
    /// `"security_linter"`, `"vuln_checker"`).
    pub external_tool_paths: HashMap<String, PathBuf>,
    /// Number of retries a failed pipeline stage gets.
    pub retry_count: u32,
    /// Base delay between stage retries; attempt `n` waits `n * retry_delay`.
    pub retry_delay: Duration,
    /// Report format requested by the caller (`json`, `html`, `xml`).
    pub report_format: String,
    /// Output path prefix for reports; extension is appended if absent.
    pub output_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            overall_deadline: Duration::from_secs(10 * 60),
            worker_pool_cap: 4,
            parallel_stages: false,
            continue_on_stage_failure: false,
            enable_security: true,
            enable_style: true,
            enable_scenarios: true,
            enable_load: true,
            protocol_version: "2024-11-05".to_string(),
            required_methods: vec!["initialize".to_string(), "tools/list".to_string(), "tools/call".to_string()],
            required_capabilities: vec!["tools".to_string()],
            response_time_ceiling: Duration::from_secs(1),
            memory_ceiling_bytes: 256 * 1024 * 1024,
            external_tool_paths: HashMap::new(),
            retry_count: 1,
            retry_delay: Duration::from_secs(1),
            report_format: "json".to_string(),
            output_path: None,
        }
    }
}

impl HarnessConfig {
    /// Reject configurations the engine cannot safely run. Must be called
    /// before a `Pipeline` or `BatchRunner` is constructed from this config.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.overall_deadline.is_zero() {
            return Err(HarnessError::Internal(
                "overall_deadline must be positive".to_string(),
            ));
        }
        if self.response_time_ceiling.is_zero() {
            return Err(HarnessError::Internal(
                "response_time_ceiling must be positive".to_string(),
            ));
        }
        if self.worker_pool_cap == 0 {
            return Err(HarnessError::Internal(
                "worker_pool_cap must be at least 1".to_string(),
            ));
        }
        if self.required_methods.is_empty() {
            return Err(HarnessError::Internal(
                "required_methods must not be empty".to_string(),
            ));
        }
        match self.report_format.as_str() {
            "json" | "html" | "xml" => {}
            other => {
                return Err(HarnessError::Internal(format!(
                    "unknown report format: {other}"
                )));
            }
        }
        Ok(())
    }
}

/// One named, persisted configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub config: HarnessConfig,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The top-level document written to/read from a caller-supplied path, per
/// spec §6's "Configuration persistence (optional)".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub version: String,
    pub default_profile: Option<String>,
    pub profiles: HashMap<String, Profile>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Default for ProfileDocument {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            default_profile: None,
            profiles: HashMap::new(),
            last_updated: chrono::Utc::now(),
        }
    }
}

impl ProfileDocument {
    /// Load a profile document from disk, or an empty document if the path
    /// does not exist yet.
    pub fn load(path: &std::path::Path) -> HarnessResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::Internal(format!("reading profile document: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| HarnessError::Internal(format!("parsing profile document: {e}")))
    }

    /// Persist the document, creating parent directories as needed.
    pub fn save(&self, path: &std::path::Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HarnessError::Internal(format!("creating profile directory: {e}")))?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| HarnessError::Internal(format!("serializing profile document: {e}")))?;
        std::fs::write(path, raw)
            .map_err(|e| HarnessError::Internal(format!("writing profile document: {e}")))
    }

    pub fn upsert(&mut self, profile: Profile) {
        self.profiles.insert(profile.name.clone(), profile);
        self.last_updated = chrono::Utc::now();
    }

    pub fn remove(&mut self, name: &str) -> Option<Profile> {
        let removed = self.profiles.remove(name);
        if removed.is_some() {
            self.last_updated = chrono::Utc::now();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(HarnessConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_worker_cap_is_refused() {
        let mut cfg = HarnessConfig::default();
        cfg.worker_pool_cap = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_required_methods_is_refused() {
        let mut cfg = HarnessConfig::default();
        cfg.required_methods.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_report_format_is_refused() {
        let mut cfg = HarnessConfig::default();
        cfg.report_format = "pdf".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn profile_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let mut doc = ProfileDocument::default();
        doc.upsert(Profile {
            name: "default".to_string(),
            description: "baseline".to_string(),
            config: HarnessConfig::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        });
        doc.save(&path).unwrap();
        let loaded = ProfileDocument::load(&path).unwrap();
        assert_eq!(loaded.version, "1.0");
        assert!(loaded.profiles.contains_key("default"));
    }
}
