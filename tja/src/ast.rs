//! The TJA abstract syntax tree: the parser's output (§3 of the spec).

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TJACourseKind {
    Easy,
    Normal,
    Hard,
    Oni,
    Ura,
}

impl TJACourseKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            "oni" => Some(Self::Oni),
            "edit" | "ura" | "oni-ura" => Some(Self::Ura),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TJAStyle {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TJAPlayer {
    None,
    P1,
    P2,
}

/// Key identifying one compiled course within a song: `(difficulty,
/// style, player)` from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CourseId {
    pub course: TJACourseKind,
    pub style: TJAStyle,
    pub player: TJAPlayer,
}

/// The three fumen-visible branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BranchKind {
    Normal,
    Expert,
    Master,
}

pub const BRANCH_KINDS: [BranchKind; 3] =
    [BranchKind::Normal, BranchKind::Expert, BranchKind::Master];

/// `#BRANCHSTART kind,...` gate kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BranchCondKind {
    Rolls,
    Accuracy,
    Score,
}

impl BranchCondKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "r" => Some(Self::Rolls),
            "p" => Some(Self::Accuracy),
            "s" => Some(Self::Score),
            _ => None,
        }
    }
}

/// The branch-fork condition attached to the measure immediately
/// preceding a `#BRANCHSTART` (spec §4.C, §4.E.4).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BranchFork {
    pub kind: BranchCondKind,
    pub advanced: i32,
    pub master: i32,
}

/// A state command or structural marker attached to a sub-position
/// within a measure (spec §3, §4.B).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TJAEventKind {
    BpmChange(f64),
    Scroll(f64),
    GogoStart,
    GogoEnd,
    BarlineOff,
    BarlineOn,
    Measure(i32, i32),
    Delay(f64),
    BranchStart {
        kind: BranchCondKind,
        advanced: i32,
        master: i32,
    },
    BranchEnd,
    SwitchBranch(BranchKind),
    Section,
    LevelHold,
    SeNoteChange(i32),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TJAEvent {
    /// 0-based sub-position within the measure; `position == notes.len()`
    /// means "end of measure, before the barline" (spec §3 invariant).
    pub position: usize,
    pub kind: TJAEventKind,
}

/// A parsed but not-yet-compiled measure: raw note characters plus the
/// events interleaved between them (spec §3, §4.B).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TJAMeasure {
    pub notes: Vec<char>,
    pub events: Vec<TJAEvent>,
}

/// A single note or drumroll-opening/closing symbol with its absolute
/// timestamp (spec §3).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TJANote {
    pub pos_ms: f64,
    pub symbol: char,
    /// For roll-opening symbols (`5,6,7,9`), the absolute ms at which the
    /// matching `8` closed it.
    pub roll_end_ms: Option<f64>,
}

/// A fully timestamped measure, post state-command resolution (spec §3).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TJAMeasureProcessed {
    pub bpm: f64,
    pub scroll: f64,
    pub gogo: bool,
    pub barline: bool,
    pub time_sig: (i32, i32),
    pub subdivisions: i32,
    pub measure_start_ms: f64,
    pub measure_end_ms: f64,
    pub senote: i32,
    pub notes: Vec<TJANote>,
    /// Set when this measure immediately precedes a `#BRANCHSTART`.
    pub branch_fork: Option<BranchFork>,
    /// `#LEVELHOLD` seen at or before this measure.
    pub level_hold: bool,
    /// This measure is a `#SECTION` sentinel (spec §4.E.6).
    pub section: bool,
}

impl TJAMeasureProcessed {
    pub fn duration_ms(time_sig: (i32, i32), bpm: f64) -> f64 {
        4.0 * (time_sig.0 as f64 / time_sig.1 as f64) * 60000.0 / bpm
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TJACourse {
    pub course: TJACourseKind,
    pub level: i32,
    pub balloons: Vec<i32>,
    pub score_init: i32,
    pub score_diff: i32,
    pub style: TJAStyle,
    pub player: TJAPlayer,
    /// Linear stream produced by the parser: measures interleaved with
    /// branch-switch/start/end events, not yet resolved into branches.
    pub notes: Vec<TJAMeasure>,
    /// Filled in by [`crate::compile::compile_course`].
    pub branches: BTreeMap<BranchKind, Vec<TJAMeasureProcessed>>,
}

impl TJACourse {
    pub fn new(course: TJACourseKind, style: TJAStyle, player: TJAPlayer) -> Self {
        Self {
            course,
            level: 1,
            balloons: Vec::new(),
            score_init: 0,
            score_diff: 0,
            style,
            player,
            notes: Vec::new(),
            branches: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TJASong {
    pub bpm: f64,
    pub offset_seconds: f64,
    pub courses: BTreeMap<CourseId, TJACourse>,
}
