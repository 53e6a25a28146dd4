//! The fixed error-pattern table scanned against every error string
//! collected from a failed run (spec §4.10).

use regex::Regex;

pub struct PatternDef {
    pub name: &'static str,
    pub regex: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub solutions: &'static [&'static str],
    pub confidence: f64,
}

pub const PATTERNS: &[PatternDef] = &[
    PatternDef {
        name: "missing_package",
        regex: r"(?i)(no required module|cannot find package|package .* is not in)",
        description: "a required package or module could not be resolved",
        category: "dependency",
        solutions: &["run the module tidy/download command", "verify the module manifest's require block"],
        confidence: 0.9,
    },
    PatternDef {
        name: "undefined_identifier",
        regex: r"(?i)(undefined:|undeclared name|undefined reference)",
        description: "the build referenced a name with no declaration in scope",
        category: "code",
        solutions: &["check for a missing import", "check for a typo in the identifier name"],
        confidence: 0.85,
    },
    PatternDef {
        name: "timeout",
        regex: r"(?i)(timed out|timeout|deadline exceeded)",
        description: "an operation did not complete before its deadline",
        category: "performance",
        solutions: &["check the server starts and reads from stdin promptly", "increase the relevant timeout if the workload is legitimately slow"],
        confidence: 0.8,
    },
    PatternDef {
        name: "refused_connection",
        regex: r"(?i)(connection refused|broken pipe|closed stream|econnrefused)",
        description: "the transport could not reach or stayed connected to the server process",
        category: "protocol",
        solutions: &["confirm the server stays alive after startup", "check stdout is flushed after every response"],
        confidence: 0.8,
    },
    PatternDef {
        name: "permission_denied",
        regex: r"(?i)(permission denied|access is denied|eacces)",
        description: "a filesystem or process operation was denied by the OS",
        category: "environment",
        solutions: &["check the target directory and scratch binary are writable", "check the compiled binary carries the execute bit"],
        confidence: 0.6,
    },
];

#[must_use]
pub fn matches(pattern: &PatternDef, text: &str) -> bool {
    Regex::new(pattern.regex).is_ok_and(|re| re.is_match(text))
}
