//! Keyword-family categorisation of a primary error string (spec §4.10).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureFamily {
    CompilationBuild,
    SyntaxParse,
    TimeoutDeadline,
    ConnectionNetwork,
    PermissionAccess,
    MemoryOom,
    DependencyModule,
    General,
}

impl FailureFamily {
    #[must_use]
    pub fn broad_category(self) -> &'static str {
        match self {
            Self::CompilationBuild | Self::SyntaxParse => "code",
            Self::TimeoutDeadline | Self::MemoryOom => "performance",
            Self::ConnectionNetwork => "protocol",
            Self::PermissionAccess => "environment",
            Self::DependencyModule => "dependency",
            Self::General => "general",
        }
    }

    #[must_use]
    pub fn estimated_fix_time(self) -> &'static str {
        match self {
            Self::CompilationBuild => "15-30 minutes",
            Self::SyntaxParse => "10-20 minutes",
            Self::TimeoutDeadline => "30-60 minutes",
            Self::ConnectionNetwork => "15-45 minutes",
            Self::PermissionAccess => "5-15 minutes",
            Self::MemoryOom => "1-2 hours",
            Self::DependencyModule => "10-30 minutes",
            Self::General => "30-60 minutes",
        }
    }
}

#[must_use]
pub fn categorize(error: &str) -> FailureFamily {
    let lower = error.to_ascii_lowercase();
    let families: &[(&[&str], FailureFamily)] = &[
        (&["compil", "build failed", "build error"], FailureFamily::CompilationBuild),
        (&["syntax", "parse", "unexpected token"], FailureFamily::SyntaxParse),
        (&["timed out", "timeout", "deadline"], FailureFamily::TimeoutDeadline),
        (&["connection refused", "connect:", "network", "broken pipe"], FailureFamily::ConnectionNetwork),
        (&["permission denied", "access denied", "eacces"], FailureFamily::PermissionAccess),
        (&["out of memory", "oom", "memory limit"], FailureFamily::MemoryOom),
        (&["module", "go.mod", "dependency", "no required module"], FailureFamily::DependencyModule),
    ];

    for (keywords, family) in families {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return *family;
        }
    }
    FailureFamily::General
}

/// Suggestions keyed on the failed stage's name (spec §4.10).
#[must_use]
pub fn stage_suggestions(stage_name: &str) -> &'static [&'static str] {
    match stage_name {
        "pre_validation" => &[
            "confirm the target directory contains the entry file and module manifest",
            "confirm the toolchain is installed and on PATH",
        ],
        "dependency_check" => &[
            "run the module verifier directly to see detailed messages",
            "check network access to the module proxy",
        ],
        "compilation_validation" => &[
            "run the build to see detailed messages",
            "check imports",
            "check module manifest",
        ],
        "syntax_validation" => &[
            "review the entry source against the required structure",
            "check for typos in required type declarations",
        ],
        "security_scan" => &[
            "review flagged patterns in the entry source",
            "add explicit timeouts to HTTP clients",
        ],
        "lint_check" => &[
            "run the formatter and vetter locally",
            "address reported style violations",
        ],
        "environment_setup" => &["check filesystem permissions on the target directory"],
        _ => &[],
    }
}
