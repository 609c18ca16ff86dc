//! Aligns a compiled `tja::TJACourse`'s three branches onto fumen's
//! fixed three-branch-per-measure model and emits one `FumenCourse` per
//! `(course, style, player)` (spec §4.E).

use std::collections::BTreeMap;

use tja::{
    BranchCondKind, BranchKind, CourseId, ConvertWarning, TJACourseKind, TJAMeasureProcessed,
    TJANote, TJASong,
};

use crate::model::{FumenBranch, FumenCourse, FumenHeader, FumenMeasure, FumenNote};

pub fn convert_tja_to_fumen(song: &TJASong) -> (BTreeMap<CourseId, FumenCourse>, Vec<ConvertWarning>) {
    let mut warnings = Vec::new();
    let mut out = BTreeMap::new();
    for (id, course) in &song.courses {
        out.insert(*id, translate_course(*id, course, &mut warnings));
    }
    (out, warnings)
}

fn translate_course(
    id: CourseId,
    course: &tja::TJACourse,
    warnings: &mut Vec<ConvertWarning>,
) -> FumenCourse {
    let empty = Vec::new();
    let normal = course.branches.get(&BranchKind::Normal).unwrap_or(&empty);
    let expert = course.branches.get(&BranchKind::Expert).unwrap_or(normal);
    let master = course.branches.get(&BranchKind::Master).unwrap_or(normal);

    let mut balloon_cursor = BalloonCursor::new(&course.balloons);
    let mut frozen_branch_info: Option<[i32; 6]> = None;

    let mut measures = Vec::with_capacity(normal.len());
    for i in 0..normal.len() {
        let n = &normal[i];
        let e = expert.get(i).unwrap_or(n);
        let m = master.get(i).unwrap_or(n);

        let mut branch_info = if n.section {
            [-1; 6]
        } else if let Some(fork) = n.branch_fork {
            derive_branch_info(fork)
        } else {
            [-1; 6]
        };

        if let Some(frozen) = frozen_branch_info {
            branch_info = frozen;
        } else if n.level_hold && n.branch_fork.is_some() {
            frozen_branch_info = Some(branch_info);
        }

        let branches = [
            translate_branch(n, &mut balloon_cursor, warnings),
            translate_branch(e, &mut balloon_cursor, warnings),
            translate_branch(m, &mut balloon_cursor, warnings),
        ];

        // `#SECTION` resets the branch accuracy accumulators; on top of the
        // all-`-1` `branch_info`, the existing fumen convention flags this
        // on the measure record's own padding bits so a reader can tell a
        // section sentinel apart from an ordinary non-forking measure.
        let padding1: u16 = if n.section { 1 } else { 0 };

        measures.push(FumenMeasure {
            bpm: n.bpm as f32,
            offset_start: n.measure_start_ms as f32,
            offset_end: n.measure_end_ms as f32,
            duration: (n.measure_end_ms - n.measure_start_ms) as f32,
            gogo: n.gogo,
            barline: n.barline,
            branch_info,
            branches,
            padding1,
            padding2: 0,
        });
    }

    balloon_cursor.finish(warnings);

    FumenHeaderBuild { id, course, measures }.build()
}

struct FumenHeaderBuild<'a> {
    id: CourseId,
    course: &'a tja::TJACourse,
    measures: Vec<FumenMeasure>,
}

impl FumenHeaderBuild<'_> {
    fn build(self) -> FumenCourse {
        let difficulty = match self.id.course {
            TJACourseKind::Easy => 0,
            TJACourseKind::Normal => 1,
            TJACourseKind::Hard => 2,
            TJACourseKind::Oni => 3,
            TJACourseKind::Ura => 4,
        };
        let style = match self.id.style {
            tja::TJAStyle::Single => 0,
            tja::TJAStyle::Double => 1,
        };
        let header = FumenHeader {
            difficulty,
            stars: self.course.level as u8,
            score_init: self.course.score_init as u16,
            score_diff: self.course.score_diff as u16,
            style,
            ..Default::default()
        };
        FumenCourse {
            score_init: self.course.score_init,
            score_diff: self.course.score_diff,
            header,
            measures: self.measures,
            unknown_headroom1: 0,
            unknown_headroom2: 0,
        }
    }
}

/// `p`/`r`/`s` thresholds into fumen's fixed six-slot layout
/// `[adv_notes, mas_notes, adv_rolls, mas_rolls, adv_score, mas_score]`
/// (spec §4.E.4). Accuracy is stored as `notes × 4` per fumen convention.
fn derive_branch_info(fork: tja::BranchFork) -> [i32; 6] {
    let mut slots = [-1; 6];
    match fork.kind {
        BranchCondKind::Accuracy => {
            slots[0] = fork.advanced * 4;
            slots[1] = fork.master * 4;
        }
        BranchCondKind::Rolls => {
            slots[2] = fork.advanced;
            slots[3] = fork.master;
        }
        BranchCondKind::Score => {
            slots[4] = fork.advanced;
            slots[5] = fork.master;
        }
    }
    slots
}

fn translate_branch(
    processed: &TJAMeasureProcessed,
    balloons: &mut BalloonCursor,
    warnings: &mut Vec<ConvertWarning>,
) -> FumenBranch {
    let mut notes = Vec::new();
    for note in &processed.notes {
        if let Some(fumen_note) = translate_note(note, processed.senote, balloons, warnings) {
            notes.push(fumen_note);
        }
    }
    FumenBranch { speed: processed.scroll as f32, notes }
}

/// `senote` is the sound-effect-annotation state active for this measure
/// (spec §3, §4.E.2 "SENOTE variants"); fumen has no separate `type_id`
/// for it, so it rides along in the otherwise-unused `padding` field.
fn translate_note(
    note: &TJANote,
    senote: i32,
    balloons: &mut BalloonCursor,
    warnings: &mut Vec<ConvertWarning>,
) -> Option<FumenNote> {
    let (type_id, downgrade_warning) = match note.symbol {
        '0' => return None,
        '1' => (1, None),
        '2' => (2, None),
        '3' => (3, None),
        '4' => (4, None),
        '5' => (5, None),
        '6' => (6, None),
        '7' => (7, None),
        '8' => (8, None),
        '9' => (9, None),
        'A' => (0xA, None),
        'B' => (0xB, None),
        'F' => (0xF, None),
        'C' | 'D' | 'E' => (1, Some(('1', note.symbol))),
        'G' | 'H' | 'I' => (3, Some(('3', note.symbol))),
        _ => return None,
    };
    if let Some((to, from)) = downgrade_warning {
        warnings.push(ConvertWarning::DowngradedSymbol { from, to });
    }

    let item_id = if matches!(type_id, 7 | 9) { balloons.next() } else { 0 };
    let duration_ms = if matches!(type_id, 5 | 6 | 7 | 9) {
        Some((note.roll_end_ms.unwrap_or(note.pos_ms) - note.pos_ms) as f32)
    } else {
        None
    };

    Some(FumenNote {
        type_id,
        pos_ms: note.pos_ms as f32,
        item_id,
        padding: senote as u16,
        score_init: 0,
        score_diff: 0,
        duration_ms,
    })
}

/// Assigns each balloon/kusudama note the sequential index spec.md §4.E.2
/// calls `balloon_index`; `values` (the `BALLOON:` list) only decides
/// whether that count lines up with how many balloon notes actually
/// appeared, for the padded/truncated diagnostics.
struct BalloonCursor<'a> {
    values: &'a [i32],
    index: usize,
}

impl<'a> BalloonCursor<'a> {
    fn new(values: &'a [i32]) -> Self {
        Self { values, index: 0 }
    }

    fn next(&mut self) -> u32 {
        let i = self.index;
        self.index += 1;
        i as u32
    }

    fn finish(self, warnings: &mut Vec<ConvertWarning>) {
        // A longer `BALLOON:` list than there are balloon notes truncates
        // silently (spec §9); only running out early is worth a warning.
        if self.index > self.values.len() {
            warnings.push(ConvertWarning::BalloonListPadded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tja::{BranchFork, TJACourse, TJAPlayer, TJAStyle};

    fn measure(notes: Vec<TJANote>) -> TJAMeasureProcessed {
        TJAMeasureProcessed {
            bpm: 120.0,
            scroll: 1.0,
            gogo: false,
            barline: true,
            time_sig: (4, 4),
            subdivisions: notes.len().max(1) as i32,
            measure_start_ms: 0.0,
            measure_end_ms: 2000.0,
            senote: 0,
            notes,
            branch_fork: None,
            level_hold: false,
            section: false,
        }
    }

    fn note(symbol: char, pos_ms: f64, roll_end_ms: Option<f64>) -> TJANote {
        TJANote { pos_ms, symbol, roll_end_ms }
    }

    fn single_branch_course(measures: Vec<TJAMeasureProcessed>, balloons: Vec<i32>) -> TJACourse {
        let mut branches = BTreeMap::new();
        branches.insert(BranchKind::Normal, measures.clone());
        branches.insert(BranchKind::Expert, measures.clone());
        branches.insert(BranchKind::Master, measures);
        TJACourse {
            course: TJACourseKind::Oni,
            level: 8,
            balloons,
            score_init: 100,
            score_diff: 10,
            style: TJAStyle::Single,
            player: TJAPlayer::None,
            notes: Vec::new(),
            branches,
        }
    }

    fn id() -> CourseId {
        CourseId { course: TJACourseKind::Oni, style: TJAStyle::Single, player: TJAPlayer::None }
    }

    #[test]
    fn downgraded_symbol_emits_warning_and_maps_to_nearest_kind() {
        let course = single_branch_course(vec![measure(vec![note('C', 0.0, None)])], vec![]);
        let mut warnings = Vec::new();
        let fumen_course = translate_course(id(), &course, &mut warnings);
        assert_eq!(fumen_course.measures[0].branches[0].notes[0].type_id, 1);
        assert!(warnings.contains(&ConvertWarning::DowngradedSymbol { from: 'C', to: '1' }));
    }

    #[test]
    fn balloon_item_id_increments_in_measure_then_branch_order() {
        let course = single_branch_course(
            vec![
                measure(vec![note('7', 0.0, Some(500.0))]),
                measure(vec![note('7', 2000.0, Some(2500.0))]),
            ],
            vec![10, 20],
        );
        let mut warnings = Vec::new();
        let fumen_course = translate_course(id(), &course, &mut warnings);
        // Normal, Expert, and Master all carry a balloon in measure 0 since
        // this fixture clones the same measures into every branch; the
        // cursor walks Normal/Expert/Master within each measure in turn.
        assert_eq!(fumen_course.measures[0].branches[0].notes[0].item_id, 0);
        assert_eq!(fumen_course.measures[0].branches[1].notes[0].item_id, 1);
    }

    #[test]
    fn accuracy_branch_info_is_stored_times_four() {
        let mut m = measure(vec![]);
        m.branch_fork = Some(BranchFork { kind: BranchCondKind::Accuracy, advanced: 50, master: 80 });
        let course = single_branch_course(vec![m], vec![]);
        let mut warnings = Vec::new();
        let fumen_course = translate_course(id(), &course, &mut warnings);
        assert_eq!(fumen_course.measures[0].branch_info, [200, 320, -1, -1, -1, -1]);
    }

    #[test]
    fn level_hold_freezes_branch_info_for_later_measures() {
        let mut forking = measure(vec![]);
        forking.branch_fork = Some(BranchFork { kind: BranchCondKind::Rolls, advanced: 3, master: 6 });
        forking.level_hold = true;
        let held = measure(vec![]);
        let course = single_branch_course(vec![forking, held], vec![]);
        let mut warnings = Vec::new();
        let fumen_course = translate_course(id(), &course, &mut warnings);
        assert_eq!(fumen_course.measures[0].branch_info, fumen_course.measures[1].branch_info);
    }

    #[test]
    fn roll_duration_is_derived_from_paired_close() {
        let course = single_branch_course(vec![measure(vec![note('5', 100.0, Some(900.0))])], vec![]);
        let mut warnings = Vec::new();
        let fumen_course = translate_course(id(), &course, &mut warnings);
        assert_eq!(fumen_course.measures[0].branches[0].notes[0].duration_ms, Some(800.0));
    }

    #[test]
    fn section_sentinel_sets_branch_info_and_padding_flag() {
        let mut m = measure(vec![]);
        m.section = true;
        let course = single_branch_course(vec![m], vec![]);
        let mut warnings = Vec::new();
        let fumen_course = translate_course(id(), &course, &mut warnings);
        assert_eq!(fumen_course.measures[0].branch_info, [-1; 6]);
        assert_eq!(fumen_course.measures[0].padding1, 1);
    }

    #[test]
    fn longer_balloon_list_truncates_silently() {
        let course = single_branch_course(vec![measure(vec![note('7', 0.0, Some(500.0))])], vec![10, 20, 30]);
        let mut warnings = Vec::new();
        translate_course(id(), &course, &mut warnings);
        assert!(!warnings.contains(&ConvertWarning::BalloonListTruncated));
        assert!(!warnings.contains(&ConvertWarning::BalloonListPadded));
    }
}
