//! The fumen binary codec: bit-exact reader/writer for the 520-byte
//! header, per-measure records, and per-note records (spec §4.D).
//!
//! Byte order is autodetected on read and fixed to little-endian on
//! write, so a round trip through `read`/`write` is only guaranteed
//! byte-identical for files that were already little-endian (spec §6,
//! §8 scenario 6).

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Error;
use crate::model::{
    FumenBranch, FumenCourse, FumenHeader, FumenMeasure, FumenNote, NoteKind,
    BRANCH_POINT_TABLES_LEN, HEADER_LEN, HEADER_TAIL_PAD_LEN, TIMING_WINDOWS_LEN,
};

/// Probe the first 4 bytes as a little-endian `f32`; fumen's leading
/// field is always `≈1.0` when read in its native order (spec §4.D).
fn detect_byte_order(bytes: &[u8]) -> Result<bool, Error> {
    if bytes.len() < 4 {
        return Err(Error::Truncated { context: "byte-order probe" });
    }
    let probe = LittleEndian::read_f32(&bytes[..4]);
    Ok((probe - 1.0).abs() < 0.5)
}

pub fn decode(bytes: &[u8], exclude_empty_measures: bool) -> Result<FumenCourse, Error> {
    let little_endian = detect_byte_order(bytes)?;
    if little_endian {
        decode_with::<LittleEndian>(bytes, exclude_empty_measures)
    } else {
        decode_with::<BigEndian>(bytes, exclude_empty_measures)
    }
}

fn decode_with<B: ByteOrder>(bytes: &[u8], exclude_empty_measures: bool) -> Result<FumenCourse, Error> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Truncated { context: "header" });
    }
    let mut cursor = Cursor::new(bytes);

    let mut timing_windows = vec![0u8; TIMING_WINDOWS_LEN];
    cursor.read_exact(&mut timing_windows).map_err(|_| Error::Truncated { context: "timing windows" })?;
    let mut branch_point_tables = vec![0u8; BRANCH_POINT_TABLES_LEN];
    cursor
        .read_exact(&mut branch_point_tables)
        .map_err(|_| Error::Truncated { context: "branch point tables" })?;
    let difficulty = read_u8(&mut cursor)?;
    let stars = read_u8(&mut cursor)?;
    let score_init = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "score_init" })?;
    let score_diff = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "score_diff" })?;
    let style = read_u8(&mut cursor)?;
    let is_papamama = read_u8(&mut cursor)?;
    let mut pad = [0u8; HEADER_TAIL_PAD_LEN];
    cursor.read_exact(&mut pad).map_err(|_| Error::Truncated { context: "header pad" })?;

    let header = FumenHeader {
        timing_windows,
        branch_point_tables,
        difficulty,
        stars,
        score_init,
        score_diff,
        style,
        is_papamama,
    };

    let measure_count = cursor.read_i32::<B>().map_err(|_| Error::Truncated { context: "measure_count" })?;
    if measure_count < 0 || measure_count as usize > bytes.len() {
        return Err(Error::LengthOverflow { context: "measure_count", value: measure_count as i64 });
    }
    let unknown_headroom1 = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "headroom1" })?;
    let unknown_headroom2 = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "headroom2" })?;

    let mut measures = Vec::with_capacity(measure_count as usize);
    for _ in 0..measure_count {
        let measure = decode_measure::<B>(&mut cursor)?;
        if exclude_empty_measures && measure.branches.iter().all(|b| b.notes.is_empty()) && measure.branch_info.iter().all(|g| *g == -1) {
            continue;
        }
        measures.push(measure);
    }

    Ok(FumenCourse {
        score_init: score_init as i32,
        score_diff: score_diff as i32,
        header,
        measures,
        unknown_headroom1,
        unknown_headroom2,
    })
}

fn decode_measure<B: ByteOrder>(cursor: &mut Cursor<&[u8]>) -> Result<FumenMeasure, Error> {
    let bpm = cursor.read_f32::<B>().map_err(|_| Error::Truncated { context: "measure bpm" })?;
    let offset_start = cursor.read_f32::<B>().map_err(|_| Error::Truncated { context: "measure offset" })?;
    let gogo = read_u8(cursor)? != 0;
    let barline = read_u8(cursor)? != 0;
    let padding1 = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "measure padding1" })?;
    let mut branch_info = [0i32; 6];
    for slot in branch_info.iter_mut() {
        *slot = cursor.read_i32::<B>().map_err(|_| Error::Truncated { context: "branch_info" })?;
    }
    let padding2 = cursor.read_u32::<B>().map_err(|_| Error::Truncated { context: "measure padding2" })?;

    let branches = [
        decode_branch::<B>(cursor)?,
        decode_branch::<B>(cursor)?,
        decode_branch::<B>(cursor)?,
    ];

    // `offset_end`/`duration` aren't persisted (spec §4.D write side); the
    // binary carries no per-measure time signature, so recompute assuming
    // the overwhelmingly common 4/4 bar, matching `tja`'s own default.
    let duration = 4.0 * 60000.0 / bpm as f64;
    Ok(FumenMeasure {
        bpm,
        offset_start,
        offset_end: offset_start + duration as f32,
        duration: duration as f32,
        gogo,
        barline,
        branch_info,
        branches,
        padding1,
        padding2,
    })
}

fn decode_branch<B: ByteOrder>(cursor: &mut Cursor<&[u8]>) -> Result<FumenBranch, Error> {
    let length = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "branch length" })?;
    let speed = cursor.read_f32::<B>().map_err(|_| Error::Truncated { context: "branch speed" })?;
    let _padding = cursor.read_u32::<B>().map_err(|_| Error::Truncated { context: "branch padding" })?;

    let mut notes = Vec::with_capacity(length as usize);
    for _ in 0..length {
        notes.push(decode_note::<B>(cursor)?);
    }
    Ok(FumenBranch { speed, notes })
}

fn decode_note<B: ByteOrder>(cursor: &mut Cursor<&[u8]>) -> Result<FumenNote, Error> {
    let type_id = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "note type_id" })?;
    let kind = NoteKind::from_u16(type_id).ok_or(Error::UnknownNoteKind { type_id })?;
    let pos_ms = cursor.read_f32::<B>().map_err(|_| Error::Truncated { context: "note pos_ms" })?;
    let item_id = cursor.read_u32::<B>().map_err(|_| Error::Truncated { context: "note item_id" })?;
    let padding = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "note padding" })?;
    let score_init = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "note score_init" })?;
    let score_diff = cursor.read_u16::<B>().map_err(|_| Error::Truncated { context: "note score_diff" })?;
    let duration_ms = if kind.has_duration() {
        Some(cursor.read_f32::<B>().map_err(|_| Error::Truncated { context: "note duration_ms" })?)
    } else {
        None
    };

    Ok(FumenNote { type_id, pos_ms, item_id, padding, score_init, score_diff, duration_ms })
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    cursor.read_u8().map_err(|_| Error::Truncated { context: "byte" })
}

/// Serialize a course little-endian (spec §4.D write side).
pub fn encode(course: &FumenCourse) -> Vec<u8> {
    let mut out = Vec::new();
    let h = &course.header;
    out.extend_from_slice(&h.timing_windows);
    out.extend_from_slice(&h.branch_point_tables);
    out.push(h.difficulty);
    out.push(h.stars);
    out.write_u16::<LittleEndian>(h.score_init).unwrap();
    out.write_u16::<LittleEndian>(h.score_diff).unwrap();
    out.push(h.style);
    out.push(h.is_papamama);
    out.extend(std::iter::repeat(0u8).take(crate::model::HEADER_TAIL_PAD_LEN));
    debug_assert_eq!(out.len(), HEADER_LEN);

    out.write_i32::<LittleEndian>(course.measures.len() as i32).unwrap();
    out.write_u16::<LittleEndian>(course.unknown_headroom1).unwrap();
    out.write_u16::<LittleEndian>(course.unknown_headroom2).unwrap();

    for measure in &course.measures {
        encode_measure(&mut out, measure);
    }
    out
}

fn encode_measure(out: &mut Vec<u8>, measure: &FumenMeasure) {
    out.write_f32::<LittleEndian>(measure.bpm).unwrap();
    out.write_f32::<LittleEndian>(measure.offset_start).unwrap();
    out.push(measure.gogo as u8);
    out.push(measure.barline as u8);
    out.write_u16::<LittleEndian>(measure.padding1).unwrap();
    for slot in measure.branch_info {
        out.write_i32::<LittleEndian>(slot).unwrap();
    }
    out.write_u32::<LittleEndian>(measure.padding2).unwrap();
    for branch in &measure.branches {
        encode_branch(out, branch);
    }
}

fn encode_branch(out: &mut Vec<u8>, branch: &FumenBranch) {
    out.write_u16::<LittleEndian>(branch.length()).unwrap();
    out.write_f32::<LittleEndian>(branch.speed).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    for note in &branch.notes {
        encode_note(out, note);
    }
}

fn encode_note(out: &mut Vec<u8>, note: &FumenNote) {
    out.write_u16::<LittleEndian>(note.type_id).unwrap();
    out.write_f32::<LittleEndian>(note.pos_ms).unwrap();
    out.write_u32::<LittleEndian>(note.item_id).unwrap();
    out.write_u16::<LittleEndian>(note.padding).unwrap();
    out.write_u16::<LittleEndian>(note.score_init).unwrap();
    out.write_u16::<LittleEndian>(note.score_diff).unwrap();
    if let Some(duration) = note.duration_ms {
        out.write_f32::<LittleEndian>(duration).unwrap();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::FumenHeader;
    use pretty_assertions::assert_eq;

    pub(crate) fn sample_course() -> FumenCourse {
        FumenCourse {
            score_init: 100,
            score_diff: 10,
            header: FumenHeader { difficulty: 3, stars: 7, score_init: 100, score_diff: 10, style: 0, ..Default::default() },
            measures: vec![FumenMeasure {
                bpm: 120.0,
                offset_start: 0.0,
                offset_end: 2000.0,
                duration: 2000.0,
                gogo: false,
                barline: true,
                branch_info: [-1; 6],
                branches: [
                    FumenBranch {
                        speed: 1.0,
                        notes: vec![FumenNote {
                            type_id: 1,
                            pos_ms: 0.0,
                            item_id: 0,
                            padding: 0,
                            score_init: 100,
                            score_diff: 10,
                            duration_ms: None,
                        }],
                    },
                    FumenBranch::default(),
                    FumenBranch::default(),
                ],
                padding1: 0,
                padding2: 0,
            }],
            unknown_headroom1: 0,
            unknown_headroom2: 0,
        }
    }

    #[test]
    fn encode_then_decode_preserves_notes() {
        let course = sample_course();
        let bytes = encode(&course);
        let decoded = decode(&bytes, false).unwrap();
        assert_eq!(decoded.measures.len(), 1);
        assert_eq!(decoded.measures[0].branches[0].notes.len(), 1);
        assert_eq!(decoded.measures[0].branches[0].notes[0].type_id, 1);
        assert_eq!(decoded.header.difficulty, 3);
        assert_eq!(decoded.header.stars, 7);
    }

    #[test]
    fn truncated_file_is_an_error() {
        let bytes = vec![0u8; 10];
        assert!(matches!(decode(&bytes, false), Err(Error::Truncated { .. })));
    }

    #[test]
    fn unknown_type_id_is_an_error() {
        let mut course = sample_course();
        course.measures[0].branches[0].notes[0].type_id = 200;
        let bytes = encode(&course);
        assert!(matches!(decode(&bytes, false), Err(Error::UnknownNoteKind { type_id: 200 })));
    }
}
