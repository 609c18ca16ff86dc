use std::path::PathBuf;

use thiserror::Error;

/// Top-level error surfaced by [`crate::parse_tja`] and the public façade.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no decoder produced a clean decoding of {path}")]
    Encoding { path: PathBuf },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Malformed-TJA failures, fatal to the current file (§7 of the spec).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("#END seen outside an open course body (line {line})")]
    EndOutsideBody { line: usize },
    #[error("#BRANCHEND without matching #BRANCHSTART (line {line})")]
    BranchEndWithoutStart { line: usize },
    #[error("missing or non-numeric BPM (line {line})")]
    InvalidBpm { line: usize },
    #[error("missing or non-numeric OFFSET (line {line})")]
    InvalidOffset { line: usize },
    #[error("nested #START (line {line})")]
    NestedStart { line: usize },
    #[error("duplicate COURSE/STYLE/player combination (line {line})")]
    DuplicateCourse { line: usize },
}

/// Non-fatal diagnostics recorded during parsing/compilation. Conversion
/// continues after any of these; they are surfaced to the caller rather
/// than silently swallowed (§7 recovery policy).
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertWarning {
    /// A roll/balloon/kusudama was never closed by a matching `8`; it was
    /// terminated at song end (or at a branch fork boundary).
    UnterminatedDrumroll { course_line: usize },
    /// An `#...` command this parser doesn't recognize was ignored.
    UnknownCommand { command: String, line: usize },
    /// A note symbol in `{C,D,E,G,H,I}` was downgraded to its nearest
    /// supported kind.
    DowngradedSymbol { from: char, to: char },
    /// `LEVEL` fell outside `[1,10]` and was clamped.
    LevelClamped { given: i32, clamped: i32 },
    /// The `BALLOON` list had fewer entries than balloon-type notes;
    /// the last value (or 5) was repeated to cover the remainder.
    BalloonListPadded,
    /// The `BALLOON` list had more entries than balloon-type notes; the
    /// extras were dropped.
    BalloonListTruncated,
    /// `#SECTION` encountered; its effect on the binary's branch
    /// accuracy accumulators is a documented known-quirk (see spec §9).
    SectionBranchQuirk,
}
