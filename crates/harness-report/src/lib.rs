//! C9: `Scorer` and `Reporter` — four independent 0..100 scores plus
//! JSON/HTML/XML rendering of a `TestRecord` (spec §4.9).

pub mod reporter;
pub mod scorer;

pub use reporter::{default_output_path, render, resolve_output_path, ReportFormat};
pub use scorer::{score, ScoringThresholds, Scores};
