//! The two-mode TJA body/header scanner (spec §4.B).

use std::collections::BTreeMap;

use crate::ast::{
    BranchCondKind, CourseId, TJACourse, TJACourseKind, TJAEvent, TJAEventKind, TJAMeasure,
    TJAPlayer, TJASong, TJAStyle,
};
use crate::error::{ConvertWarning, ParseError};

#[derive(Default)]
pub struct TJAParser {}

impl TJAParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse already-decoded TJA source into a [`TJASong`]. Non-fatal
    /// issues (unknown commands, clamped levels, ...) are appended to
    /// `warnings` rather than aborting the scan.
    pub fn parse(&self, text: &str) -> Result<TJASong, ParseError> {
        let mut warnings = Vec::new();
        self.parse_with_warnings(text, &mut warnings)
    }

    pub fn parse_with_warnings(
        &self,
        text: &str,
        warnings: &mut Vec<ConvertWarning>,
    ) -> Result<TJASong, ParseError> {
        let lines = crate::decode::logical_lines(text);

        let mut song_bpm: Option<f64> = None;
        let mut song_offset: Option<f64> = None;
        let mut courses: BTreeMap<CourseId, TJACourse> = BTreeMap::new();

        let mut draft_course = TJACourseKind::Oni;
        let mut draft_level = 1;
        let mut draft_balloons: Vec<i32> = Vec::new();
        let mut draft_score_init = 0;
        let mut draft_score_diff = 0;
        let mut draft_style = TJAStyle::Single;

        let mut body: Option<BodyState> = None;

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;

            if let Some(active) = body.as_mut() {
                if let Some(rest) = line.strip_prefix('#') {
                    let (cmd, arg) = split_command(rest);
                    match cmd {
                        "START" => return Err(ParseError::NestedStart { line: line_no }),
                        "END" => {
                            active.finish_trailing_measure();
                            let finished = body.take().unwrap();
                            let id = CourseId {
                                course: finished.course,
                                style: finished.style,
                                player: finished.player,
                            };
                            if courses.contains_key(&id) {
                                return Err(ParseError::DuplicateCourse { line: line_no });
                            }
                            courses.insert(id, finished.into_course());
                        }
                        "BPMCHANGE" => {
                            if let Some(v) = parse_f64(arg) {
                                active.push_event(TJAEventKind::BpmChange(v));
                            }
                        }
                        "MEASURE" => {
                            if let Some((n, d)) = arg.split_once('/') {
                                let n: i32 = n.trim().parse().unwrap_or(4);
                                let d: i32 = d.trim().parse().unwrap_or(4);
                                active.push_event(TJAEventKind::Measure(n, d));
                            }
                        }
                        "SCROLL" => {
                            if let Some(v) = parse_f64(arg) {
                                active.push_event(TJAEventKind::Scroll(v));
                            }
                        }
                        "GOGOSTART" => active.push_event(TJAEventKind::GogoStart),
                        "GOGOEND" => active.push_event(TJAEventKind::GogoEnd),
                        "BARLINEOFF" => active.push_event(TJAEventKind::BarlineOff),
                        "BARLINEON" => active.push_event(TJAEventKind::BarlineOn),
                        "DELAY" => {
                            if let Some(v) = parse_f64(arg) {
                                active.push_event(TJAEventKind::Delay(v));
                            }
                        }
                        "BRANCHSTART" => {
                            let mut parts = arg.split(',');
                            let kind = parts
                                .next()
                                .and_then(BranchCondKind::from_str)
                                .unwrap_or(BranchCondKind::Accuracy);
                            let advanced: i32 =
                                parts.next().and_then(|v| v.trim().parse().ok()).unwrap_or(0);
                            let master: i32 =
                                parts.next().and_then(|v| v.trim().parse().ok()).unwrap_or(0);
                            active.branch_depth += 1;
                            active.push_event(TJAEventKind::BranchStart {
                                kind,
                                advanced,
                                master,
                            });
                        }
                        "N" => active.push_event(TJAEventKind::SwitchBranch(
                            crate::ast::BranchKind::Normal,
                        )),
                        "E" => active.push_event(TJAEventKind::SwitchBranch(
                            crate::ast::BranchKind::Expert,
                        )),
                        "M" => active.push_event(TJAEventKind::SwitchBranch(
                            crate::ast::BranchKind::Master,
                        )),
                        "BRANCHEND" => {
                            if active.branch_depth == 0 {
                                return Err(ParseError::BranchEndWithoutStart { line: line_no });
                            }
                            active.branch_depth -= 1;
                            active.push_event(TJAEventKind::BranchEnd);
                        }
                        "SECTION" => {
                            active.push_event(TJAEventKind::Section);
                            warnings.push(ConvertWarning::SectionBranchQuirk);
                        }
                        "LEVELHOLD" => active.push_event(TJAEventKind::LevelHold),
                        "SENOTECHANGE" => {
                            let v: i32 = arg.trim().parse().unwrap_or(0);
                            active.push_event(TJAEventKind::SeNoteChange(v));
                        }
                        other => warnings.push(ConvertWarning::UnknownCommand {
                            command: other.to_string(),
                            line: line_no,
                        }),
                    }
                } else {
                    active.feed_notes(line);
                }
                continue;
            }

            // header mode
            if let Some(rest) = line.strip_prefix('#') {
                let (cmd, arg) = split_command(rest);
                match cmd {
                    "START" => {
                        let player = match arg {
                            "P1" => TJAPlayer::P1,
                            "P2" => TJAPlayer::P2,
                            _ => TJAPlayer::None,
                        };
                        body = Some(BodyState::new(
                            draft_course,
                            draft_style,
                            player,
                            draft_level,
                            draft_balloons.clone(),
                            draft_score_init,
                            draft_score_diff,
                        ));
                    }
                    "END" => return Err(ParseError::EndOutsideBody { line: line_no }),
                    _ => {}
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_ascii_uppercase();
                let value = value.trim();
                match key.as_str() {
                    "BPM" => {
                        song_bpm =
                            Some(parse_f64(value).ok_or(ParseError::InvalidBpm { line: line_no })?)
                    }
                    "OFFSET" => {
                        song_offset = Some(
                            parse_f64(value).ok_or(ParseError::InvalidOffset { line: line_no })?,
                        )
                    }
                    "COURSE" => {
                        draft_course = TJACourseKind::from_str(value).unwrap_or(TJACourseKind::Oni);
                        draft_level = 1;
                        draft_balloons.clear();
                        draft_score_init = 0;
                        draft_score_diff = 0;
                    }
                    "LEVEL" => {
                        let given: i32 = value.parse().unwrap_or(1);
                        let clamped = given.clamp(1, 10);
                        if clamped != given {
                            warnings.push(ConvertWarning::LevelClamped { given, clamped });
                        }
                        draft_level = clamped;
                    }
                    "BALLOON" => {
                        draft_balloons = value
                            .split(',')
                            .filter(|v| !v.trim().is_empty())
                            .map(|v| v.trim().parse().unwrap_or(0))
                            .collect();
                    }
                    "SCOREINIT" => draft_score_init = value.parse().unwrap_or(0),
                    "SCOREDIFF" => draft_score_diff = value.parse().unwrap_or(0),
                    "STYLE" => {
                        draft_style = if value.eq_ignore_ascii_case("double") {
                            TJAStyle::Double
                        } else {
                            TJAStyle::Single
                        };
                    }
                    _ => {}
                }
            }
        }

        Ok(TJASong {
            bpm: song_bpm.ok_or(ParseError::InvalidBpm { line: 0 })?,
            offset_seconds: song_offset.ok_or(ParseError::InvalidOffset { line: 0 })?,
            courses,
        })
    }
}

fn split_command(rest: &str) -> (&str, &str) {
    let trimmed = rest.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (trimmed, ""),
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

struct BodyState {
    course: TJACourseKind,
    style: TJAStyle,
    player: TJAPlayer,
    level: i32,
    balloons: Vec<i32>,
    score_init: i32,
    score_diff: i32,
    measures: Vec<TJAMeasure>,
    current: TJAMeasure,
    branch_depth: i32,
}

impl BodyState {
    #[allow(clippy::too_many_arguments)]
    fn new(
        course: TJACourseKind,
        style: TJAStyle,
        player: TJAPlayer,
        level: i32,
        balloons: Vec<i32>,
        score_init: i32,
        score_diff: i32,
    ) -> Self {
        Self {
            course,
            style,
            player,
            level,
            balloons,
            score_init,
            score_diff,
            measures: Vec::new(),
            current: TJAMeasure::default(),
            branch_depth: 0,
        }
    }

    fn push_event(&mut self, kind: TJAEventKind) {
        let position = self.current.notes.len();
        self.current.events.push(TJAEvent { position, kind });
    }

    fn feed_notes(&mut self, line: &str) {
        let chunks: Vec<&str> = line.split(',').collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            for ch in chunk.chars().filter(|c| !c.is_whitespace()) {
                self.current.notes.push(ch);
            }
            if i < last {
                self.finish_measure();
            }
        }
    }

    fn finish_measure(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.measures.push(finished);
    }

    /// Flush the in-progress measure at `#END`, unless it's a bare
    /// trailing artifact of the final comma (no notes, no events):
    /// that carries no information and would otherwise show up as a
    /// phantom extra measure on every course.
    fn finish_trailing_measure(&mut self) {
        if !self.current.notes.is_empty() || !self.current.events.is_empty() {
            self.finish_measure();
        }
    }

    fn into_course(self) -> TJACourse {
        let mut course = TJACourse::new(self.course, self.style, self.player);
        course.level = self.level;
        course.balloons = self.balloons;
        course.score_init = self.score_init;
        course.score_diff = self.score_diff;
        course.notes = self.measures;
        course
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_song() {
        let tja = "BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n1010,\n#END";
        let song = TJAParser::new().parse(tja).unwrap();
        assert_eq!(song.bpm, 120.0);
        assert_eq!(song.offset_seconds, 0.0);
        assert_eq!(song.courses.len(), 1);
        let id = CourseId {
            course: TJACourseKind::Oni,
            style: TJAStyle::Single,
            player: TJAPlayer::None,
        };
        let course = &song.courses[&id];
        assert_eq!(course.notes.len(), 1);
        assert_eq!(course.notes[0].notes, vec!['1', '0', '1', '0']);
    }

    #[test]
    fn branchend_without_start_is_an_error() {
        let tja = "BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n#BRANCHEND\n#END";
        let err = TJAParser::new().parse(tja).unwrap_err();
        assert!(matches!(err, ParseError::BranchEndWithoutStart { .. }));
    }

    #[test]
    fn end_outside_body_is_an_error() {
        let tja = "BPM:120\nOFFSET:0\n#END";
        let err = TJAParser::new().parse(tja).unwrap_err();
        assert!(matches!(err, ParseError::EndOutsideBody { .. }));
    }

    #[test]
    fn double_style_two_players() {
        let tja = "BPM:120\nOFFSET:0\nSTYLE:Double\nCOURSE:Oni\n#START P1\n1010,\n#END\n#START P2\n2020,\n#END";
        let song = TJAParser::new().parse(tja).unwrap();
        assert_eq!(song.courses.len(), 2);
        let p1 = CourseId {
            course: TJACourseKind::Oni,
            style: TJAStyle::Double,
            player: TJAPlayer::P1,
        };
        let p2 = CourseId {
            course: TJACourseKind::Oni,
            style: TJAStyle::Double,
            player: TJAPlayer::P2,
        };
        assert_eq!(song.courses[&p1].notes[0].notes, vec!['1', '0', '1', '0']);
        assert_eq!(song.courses[&p2].notes[0].notes, vec!['2', '0', '2', '0']);
    }

    #[test]
    fn empty_measure_between_commas_is_kept() {
        let tja = "BPM:120\nOFFSET:0\nCOURSE:Oni\n#START\n,\n1010,\n#END";
        let song = TJAParser::new().parse(tja).unwrap();
        let id = CourseId {
            course: TJACourseKind::Oni,
            style: TJAStyle::Single,
            player: TJAPlayer::None,
        };
        let course = &song.courses[&id];
        assert_eq!(course.notes.len(), 2);
        assert!(course.notes[0].notes.is_empty());
    }
}
