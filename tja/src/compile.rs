//! The chart compiler: resolves state-command fallthrough into
//! per-note absolute timestamps and splits the course into its three
//! fumen-visible branches (spec §4.C).
//!
//! State-command fallthrough is the subtle part here: a command at
//! sub-position `k` affects notes from `k` onward *within the same
//! measure*; a command at `position == notes.len()` only affects
//! subsequent measures. Attaching a command to "the next measure"
//! instead of the tail of the current one desynchronizes charts with
//! mid-measure tempo changes (spec §9).

use crate::ast::{
    BranchFork, BranchKind, TJACourse, TJAEventKind, TJAMeasure, TJAMeasureProcessed, TJANote,
    BRANCH_KINDS,
};
use crate::error::ConvertWarning;

#[derive(Clone, Copy)]
struct RunningState {
    bpm: f64,
    scroll: f64,
    gogo: bool,
    barline: bool,
    time_sig: (i32, i32),
    senote: i32,
    cursor_ms: f64,
    level_hold: bool,
}

/// An in-flight roll/balloon/kusudama. `measure_idx` is the index the
/// opening measure will have once it's pushed to `Lane::out`. While
/// still being built, `measure_idx == lane.out.len()` and the note
/// lives in the caller's local `notes` buffer instead.
struct OpenRoll {
    measure_idx: usize,
    note_idx: usize,
}

struct Lane {
    state: RunningState,
    out: Vec<TJAMeasureProcessed>,
    open_roll: Option<OpenRoll>,
}

/// Compile `course.notes` into `course.branches`, mutating the course
/// in place. Non-fatal issues are appended to `warnings`.
pub fn compile_course(
    course: &mut TJACourse,
    song_bpm: f64,
    song_offset_seconds: f64,
    warnings: &mut Vec<ConvertWarning>,
) {
    let initial = RunningState {
        bpm: song_bpm,
        scroll: 1.0,
        gogo: false,
        barline: true,
        time_sig: (4, 4),
        senote: 0,
        cursor_ms: -song_offset_seconds * 1000.0,
        level_hold: false,
    };

    let mut lanes: [Lane; 3] = [
        Lane { state: initial, out: Vec::new(), open_roll: None },
        Lane { state: initial, out: Vec::new(), open_roll: None },
        Lane { state: initial, out: Vec::new(), open_roll: None },
    ];

    let mut forked = false;
    let mut active = 0usize; // index into lanes/BRANCH_KINDS; meaningful only while forked

    for measure in &course.notes {
        if !forked {
            // Unforked: every lane sees identical input and advances in
            // lock-step, so lane 0 (N) drives the branch-state machine
            // and lanes 1/2 just replay the same transitions. If lane 0
            // opens a fork partway through this very measure (a
            // `#BRANCHSTART` always lands at position 0), the measure's
            // notes belong solely to the branch named by the `#N/#E/#M`
            // that follows it; don't replay them onto lanes 1/2.
            process_on_lane(&mut lanes, 0, measure, &mut forked, &mut active, warnings);
            if !forked {
                process_on_lane(&mut lanes, 1, measure, &mut forked, &mut active, warnings);
                process_on_lane(&mut lanes, 2, measure, &mut forked, &mut active, warnings);
            }
        } else {
            // Forked: this measure's content belongs to whichever
            // branch its leading `#N/#E/#M` switch names (falling back
            // to whatever's already active, e.g. the #BRANCHEND marker
            // measure which carries no switch of its own).
            let mut target = active;
            for ev in measure.events.iter().filter(|e| e.position == 0) {
                if let TJAEventKind::SwitchBranch(branch) = ev.kind {
                    target = branch_index(branch);
                }
            }
            let was_forked = forked;
            process_on_lane(&mut lanes, target, measure, &mut forked, &mut active, warnings);
            if was_forked && !forked {
                // The branch just closed (a `#BRANCHEND` in this
                // measure): its content is shared, not branch-specific,
                // so replicate it onto the other two lanes to bring all
                // three back into lock-step.
                let closing = lanes[target].out.last().cloned().expect("just pushed");
                for idx in 0..3 {
                    if idx != target {
                        lanes[idx].out.push(closing.clone());
                    }
                }
            }
        }
    }

    // Song end: any still-open roll is terminated at its lane's end.
    for lane in lanes.iter_mut() {
        if let Some(roll) = lane.open_roll.take() {
            let end_ms = lane.state.cursor_ms;
            close_roll_in_out(lane, roll, end_ms);
            warnings.push(ConvertWarning::UnterminatedDrumroll { course_line: lane.out.len() });
        }
    }

    equalize_lengths(&mut lanes);

    for (kind, lane) in BRANCH_KINDS.iter().zip(lanes) {
        course.branches.insert(*kind, lane.out);
    }
}

/// Process one source measure against a single lane, mutating that
/// lane's state/output and the shared fork-tracking flags.
fn process_on_lane(
    lanes: &mut [Lane; 3],
    lane_idx: usize,
    measure: &TJAMeasure,
    forked: &mut bool,
    active: &mut usize,
    warnings: &mut Vec<ConvertWarning>,
) {
    let n = measure.notes.len();
    let mut branch_fork_for_prev: Option<BranchFork> = None;
    let mut notes: Vec<TJANote> = Vec::with_capacity(n);

    for ev in measure.events.iter().filter(|e| e.position == 0) {
        apply_event(
            lanes,
            lane_idx,
            forked,
            active,
            warnings,
            &mut branch_fork_for_prev,
            &ev.kind,
        );
    }

    let time_sig = lanes[lane_idx].state.time_sig;
    let bpm_at_start = lanes[lane_idx].state.bpm;
    let gogo = lanes[lane_idx].state.gogo;
    let barline = lanes[lane_idx].state.barline;
    let scroll_at_start = lanes[lane_idx].state.scroll;
    let senote_at_start = lanes[lane_idx].state.senote;
    let measure_start_ms = lanes[lane_idx].state.cursor_ms;
    let mut section = false;

    for k in 0..n {
        if k > 0 {
            for ev in measure.events.iter().filter(|e| e.position == k) {
                apply_event(
                    lanes,
                    lane_idx,
                    forked,
                    active,
                    warnings,
                    &mut branch_fork_for_prev,
                    &ev.kind,
                );
            }
        }
        let st = lanes[lane_idx].state;
        if measure
            .events
            .iter()
            .any(|e| e.position == k && matches!(e.kind, TJAEventKind::Section))
        {
            section = true;
        }
        let slot_ms = TJAMeasureProcessed::duration_ms(st.time_sig, st.bpm) / n as f64;
        let pos_ms = st.cursor_ms;
        let symbol = measure.notes[k];

        handle_symbol(lanes, lane_idx, symbol, pos_ms, &mut notes);

        lanes[lane_idx].state.cursor_ms += slot_ms;
    }

    for ev in measure.events.iter().filter(|e| e.position == n) {
        if matches!(ev.kind, TJAEventKind::Section) {
            section = true;
        }
        apply_event(
            lanes,
            lane_idx,
            forked,
            active,
            warnings,
            &mut branch_fork_for_prev,
            &ev.kind,
        );
    }

    let measure_end_ms = lanes[lane_idx].state.cursor_ms;
    let level_hold = lanes[lane_idx].state.level_hold;

    let processed = TJAMeasureProcessed {
        bpm: bpm_at_start,
        scroll: scroll_at_start,
        gogo,
        barline,
        time_sig,
        subdivisions: n as i32,
        measure_start_ms,
        measure_end_ms,
        senote: senote_at_start,
        notes,
        branch_fork: None,
        level_hold,
        section,
    };

    if let Some(fork) = branch_fork_for_prev {
        if let Some(prev) = lanes[lane_idx].out.last_mut() {
            prev.branch_fork = Some(fork);
        }
    }

    lanes[lane_idx].out.push(processed);
}

#[allow(clippy::too_many_arguments)]
fn apply_event(
    lanes: &mut [Lane; 3],
    lane_idx: usize,
    forked: &mut bool,
    active: &mut usize,
    warnings: &mut Vec<ConvertWarning>,
    branch_fork_for_prev: &mut Option<BranchFork>,
    kind: &TJAEventKind,
) {
    match *kind {
        TJAEventKind::BpmChange(v) => lanes[lane_idx].state.bpm = v,
        TJAEventKind::Scroll(v) => lanes[lane_idx].state.scroll = v,
        TJAEventKind::GogoStart => lanes[lane_idx].state.gogo = true,
        TJAEventKind::GogoEnd => lanes[lane_idx].state.gogo = false,
        TJAEventKind::BarlineOff => lanes[lane_idx].state.barline = false,
        TJAEventKind::BarlineOn => lanes[lane_idx].state.barline = true,
        TJAEventKind::Measure(num, den) => lanes[lane_idx].state.time_sig = (num, den),
        TJAEventKind::Delay(seconds) => lanes[lane_idx].state.cursor_ms += seconds * 1000.0,
        TJAEventKind::SeNoteChange(v) => lanes[lane_idx].state.senote = v,
        TJAEventKind::LevelHold => lanes[lane_idx].state.level_hold = true,
        TJAEventKind::Section => {}
        TJAEventKind::BranchStart { kind, advanced, master } => {
            *branch_fork_for_prev = Some(BranchFork { kind, advanced, master });
            if !*forked {
                *forked = true;
                *active = 0; // N is initial (spec §4.C)
                sync_close_rolls(lanes, lane_idx, warnings);
            }
        }
        TJAEventKind::SwitchBranch(branch) => {
            *active = branch_index(branch);
        }
        TJAEventKind::BranchEnd => {
            if *forked {
                *forked = false;
                sync_close_rolls(lanes, lane_idx, warnings);
            }
        }
    }
}

fn branch_index(branch: BranchKind) -> usize {
    match branch {
        BranchKind::Normal => 0,
        BranchKind::Expert => 1,
        BranchKind::Master => 2,
    }
}

/// At a fork boundary (entering or leaving a branch block), force-close
/// any roll left open on the non-canonical lanes using lane N's current
/// timeline (spec §9: "terminate the roll at the fork boundary using
/// the N-branch timeline"), then re-sync every lane's running state to
/// lane N's so un-forked processing resumes identically everywhere.
fn sync_close_rolls(lanes: &mut [Lane; 3], active_lane_idx: usize, warnings: &mut Vec<ConvertWarning>) {
    let canonical = lanes[0].state;
    let boundary_ms = canonical.cursor_ms;

    for idx in 0..3 {
        // The active lane's own in-flight roll (if any) lives in the
        // caller's in-progress `notes` buffer, not `out` yet, and may
        // legitimately continue across the fork marker; leave it open.
        let roll = if idx == active_lane_idx {
            None
        } else {
            lanes[idx].open_roll.take()
        };
        if let Some(roll) = roll {
            close_roll_in_out(&mut lanes[idx], roll, boundary_ms);
            warnings.push(ConvertWarning::UnterminatedDrumroll { course_line: lanes[idx].out.len() });
        }
        lanes[idx].state = canonical;
    }
}

fn close_roll_in_out(lane: &mut Lane, roll: OpenRoll, end_ms: f64) {
    if let Some(m) = lane.out.get_mut(roll.measure_idx) {
        if let Some(note) = m.notes.get_mut(roll.note_idx) {
            note.roll_end_ms = Some(end_ms);
        }
    }
}

fn equalize_lengths(lanes: &mut [Lane; 3]) {
    let max_len = lanes.iter().map(|l| l.out.len()).max().unwrap_or(0);
    for idx in 0..3 {
        while lanes[idx].out.len() < max_len {
            let pos = lanes[idx].out.len();
            let cloned = lanes[0].out.get(pos).cloned().unwrap_or_else(empty_measure);
            lanes[idx].out.push(cloned);
        }
    }
}

fn empty_measure() -> TJAMeasureProcessed {
    TJAMeasureProcessed {
        bpm: 120.0,
        scroll: 1.0,
        gogo: false,
        barline: true,
        time_sig: (4, 4),
        subdivisions: 0,
        measure_start_ms: 0.0,
        measure_end_ms: 0.0,
        senote: 0,
        notes: Vec::new(),
        branch_fork: None,
        level_hold: false,
        section: false,
    }
}

fn handle_symbol(
    lanes: &mut [Lane; 3],
    lane_idx: usize,
    symbol: char,
    pos_ms: f64,
    notes: &mut Vec<TJANote>,
) {
    match symbol {
        '5' | '6' | '7' => open_roll(lanes, lane_idx, pos_ms, symbol, notes),
        '9' => {
            // 9000/9008 quirk: a second '9' seen while one is already
            // open (only rests in between) continues it rather than
            // opening a new kusudama (spec §4.C).
            if lanes[lane_idx].open_roll.is_none() {
                open_roll(lanes, lane_idx, pos_ms, symbol, notes);
            } else {
                notes.push(TJANote { pos_ms, symbol, roll_end_ms: None });
            }
        }
        '8' => {
            // An '8' with no open roll is a malformed chart; keep the
            // symbol as a plain note rather than failing the convert.
            if let Some(roll) = lanes[lane_idx].open_roll.take() {
                if roll.measure_idx == lanes[lane_idx].out.len() {
                    if let Some(note) = notes.get_mut(roll.note_idx) {
                        note.roll_end_ms = Some(pos_ms);
                    }
                } else {
                    close_roll_in_out(&mut lanes[lane_idx], roll, pos_ms);
                }
            }
            notes.push(TJANote { pos_ms, symbol, roll_end_ms: None });
        }
        _ => notes.push(TJANote { pos_ms, symbol, roll_end_ms: None }),
    }
}

fn open_roll(
    lanes: &mut [Lane; 3],
    lane_idx: usize,
    pos_ms: f64,
    symbol: char,
    notes: &mut Vec<TJANote>,
) {
    let note_idx = notes.len();
    notes.push(TJANote { pos_ms, symbol, roll_end_ms: None });
    lanes[lane_idx].open_roll = Some(OpenRoll {
        measure_idx: lanes[lane_idx].out.len(),
        note_idx,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{TJACourseKind, TJAPlayer, TJAStyle};
    use crate::parser::TJAParser;
    use pretty_assertions::assert_eq;

    fn compile(tja: &str) -> (TJACourse, Vec<ConvertWarning>) {
        let song = TJAParser::new().parse(tja).unwrap();
        let id = crate::ast::CourseId {
            course: TJACourseKind::Oni,
            style: TJAStyle::Single,
            player: TJAPlayer::None,
        };
        let mut course = song.courses.get(&id).unwrap().clone();
        let mut warnings = Vec::new();
        compile_course(&mut course, song.bpm, song.offset_seconds, &mut warnings);
        (course, warnings)
    }

    #[test]
    fn minimal_song_timing() {
        let (course, _) = compile("BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n1010,\n#END");
        let normal = &course.branches[&BranchKind::Normal];
        assert_eq!(normal.len(), 1);
        let m = &normal[0];
        assert_eq!(m.measure_start_ms, 0.0);
        assert_eq!(m.measure_end_ms, 2000.0);
        assert_eq!(m.notes[0].pos_ms, 0.0);
        assert_eq!(m.notes[0].symbol, '1');
        assert_eq!(m.notes[2].pos_ms, 1000.0);
        assert_eq!(m.notes[2].symbol, '1');
    }

    #[test]
    fn mid_measure_bpm_change() {
        let tja = "BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n10\n#BPMCHANGE 240\n10,\n#END";
        let (course, _) = compile(tja);
        let m = &course.branches[&BranchKind::Normal][0];
        assert_eq!(m.measure_end_ms, 1500.0);
        assert_eq!(m.notes[0].pos_ms, 0.0);
        assert_eq!(m.notes[1].pos_ms, 500.0);
        assert_eq!(m.notes[2].pos_ms, 1000.0);
        assert_eq!(m.notes[3].pos_ms, 1250.0);
    }

    #[test]
    fn drumroll_across_measures() {
        let tja = "BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n5000,\n0008,\n#END";
        let (course, warnings) = compile(tja);
        let branch = &course.branches[&BranchKind::Normal];
        assert_eq!(branch.len(), 2);
        let roll = &branch[0].notes[0];
        assert_eq!(roll.symbol, '5');
        assert_eq!(roll.pos_ms, 0.0);
        assert_eq!(roll.roll_end_ms, Some(3500.0));
        assert!(warnings.is_empty());
    }

    #[test]
    fn branching_equal_lengths_and_fork_info() {
        let tja = "BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n1010,\n#BRANCHSTART p,50,80\n#N\n1010,\n#E\n2020,\n#M\n3030,\n#BRANCHEND\n#END";
        let (course, _) = compile(tja);
        for kind in BRANCH_KINDS {
            assert_eq!(course.branches[&kind].len(), 3);
        }
        let n = &course.branches[&BranchKind::Normal][0];
        let fork = n.branch_fork.expect("fork info on measure preceding #BRANCHSTART");
        assert_eq!(fork.advanced, 50);
        assert_eq!(fork.master, 80);
    }
}
