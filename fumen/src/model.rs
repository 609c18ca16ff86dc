//! The fumen in-memory model: codec input/output and translator output
//! (spec §3).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Note `type_id`s, fixed by the binary format (spec §4.E.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u16)]
pub enum NoteKind {
    Don = 1,
    Ka = 2,
    BigDon = 3,
    BigKa = 4,
    Roll = 5,
    BigRoll = 6,
    Balloon = 7,
    RollEnd = 8,
    Kusudama = 9,
    HandLeft = 0xA,
    HandRight = 0xB,
    Adlib = 0xF,
}

impl NoteKind {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::Don),
            2 => Some(Self::Ka),
            3 => Some(Self::BigDon),
            4 => Some(Self::BigKa),
            5 => Some(Self::Roll),
            6 => Some(Self::BigRoll),
            7 => Some(Self::Balloon),
            8 => Some(Self::RollEnd),
            9 => Some(Self::Kusudama),
            0xA => Some(Self::HandLeft),
            0xB => Some(Self::HandRight),
            0xF => Some(Self::Adlib),
            _ => None,
        }
    }

    /// Whether this kind carries a trailing `duration_ms` field (spec §3, §4.D).
    pub fn has_duration(self) -> bool {
        matches!(self, Self::Roll | Self::BigRoll | Self::Balloon | Self::Kusudama)
    }
}

/// 520-byte fumen header (spec §3, §4.D). `timing_windows` and
/// `branch_point_tables` are preserved verbatim from any file read and
/// otherwise left zeroed, since their exact internal layout beyond size
/// is unspecified (spec §4.D: "Unknown header bytes preserved").
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FumenHeader {
    pub timing_windows: Vec<u8>,
    pub branch_point_tables: Vec<u8>,
    pub difficulty: u8,
    pub stars: u8,
    pub score_init: u16,
    pub score_diff: u16,
    pub style: u8,
    pub is_papamama: u8,
}

pub const HEADER_LEN: usize = 520;
/// `b000..b431`: 36 timing-window records, byte layout undocumented.
pub const TIMING_WINDOWS_LEN: usize = 432;
/// `b432..b507`: the branch-point tables, byte layout undocumented.
pub const BRANCH_POINT_TABLES_LEN: usize = 507 - 432 + 1;
/// Bytes after the explicit fields, zeroed to pad the header to 520.
pub const HEADER_TAIL_PAD_LEN: usize =
    HEADER_LEN - TIMING_WINDOWS_LEN - BRANCH_POINT_TABLES_LEN - 8;

impl Default for FumenHeader {
    fn default() -> Self {
        let mut timing_windows = vec![0; TIMING_WINDOWS_LEN];
        // b000..b003 double as the byte-order probe `codec::detect_byte_order`
        // reads back (a little-endian `1.0f32`); a zeroed header would read
        // back as big-endian and desync every other field.
        timing_windows[..4].copy_from_slice(&1.0f32.to_le_bytes());
        Self {
            timing_windows,
            branch_point_tables: vec![0; BRANCH_POINT_TABLES_LEN],
            difficulty: 0,
            stars: 0,
            score_init: 0,
            score_diff: 0,
            style: 0,
            is_papamama: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FumenNote {
    pub type_id: u16,
    pub pos_ms: f32,
    pub item_id: u32,
    pub padding: u16,
    pub score_init: u16,
    pub score_diff: u16,
    pub duration_ms: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FumenBranch {
    pub speed: f32,
    pub notes: Vec<FumenNote>,
}

impl FumenBranch {
    pub fn length(&self) -> u16 {
        self.notes.len() as u16
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FumenMeasure {
    pub bpm: f32,
    pub offset_start: f32,
    pub offset_end: f32,
    pub duration: f32,
    pub gogo: bool,
    pub barline: bool,
    pub branch_info: [i32; 6],
    pub branches: [FumenBranch; 3],
    pub padding1: u16,
    pub padding2: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FumenCourse {
    pub score_init: i32,
    pub score_diff: i32,
    pub header: FumenHeader,
    pub measures: Vec<FumenMeasure>,
    /// Preserved verbatim across read/write; meaning undocumented (spec §4.D).
    pub unknown_headroom1: u16,
    pub unknown_headroom2: u16,
}
