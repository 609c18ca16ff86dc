//! Public façade: the four entry points most callers need (spec §4.F).

use std::path::Path;

use tja::{ConvertWarning, TJASong};

use crate::codec;
use crate::error::Error;
use crate::model::FumenCourse;

pub use tja::CourseId;

/// Decode and compile a `.tja` file. Thin re-export of [`tja::parse_tja`]
/// so callers that only care about the fumen side don't need to depend
/// on the `tja` crate directly.
pub fn parse_tja(path: impl AsRef<Path>) -> Result<(TJASong, Vec<ConvertWarning>), tja::Error> {
    tja::parse_tja(path)
}

/// Translate an already-parsed, already-compiled song into one
/// [`FumenCourse`] per course/style/player combination.
pub fn convert_tja_to_fumen(song: &TJASong) -> (std::collections::BTreeMap<CourseId, FumenCourse>, Vec<ConvertWarning>) {
    crate::translate::convert_tja_to_fumen(song)
}

/// Read and decode a fumen `.bin` file.
///
/// `exclude_empty_measures` drops measures whose three branches are all
/// empty and whose `branch_info` is all `-1` (spec §4.D); some fumen
/// writers pad files with these.
pub fn parse_fumen(path: impl AsRef<Path>, exclude_empty_measures: bool) -> Result<FumenCourse, Error> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "decoding fumen course");
    codec::decode(&bytes, exclude_empty_measures)
}

/// Encode and write a fumen `.bin` file, always in little-endian (spec §4.D).
pub fn write_fumen(path: impl AsRef<Path>, course: &FumenCourse) -> Result<(), Error> {
    let path = path.as_ref();
    let bytes = codec::encode(course);
    tracing::debug!(path = %path.display(), len = bytes.len(), "writing fumen course");
    std::fs::write(path, bytes).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn parse_fumen_rejects_truncated_file() {
        let dir = tempdir();
        let path = dir.join("truncated.bin");
        std::fs::File::create(&path).unwrap().write_all(&[0u8; 3]).unwrap();
        let err = parse_fumen(&path, false).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn write_then_parse_round_trips() {
        let course = crate::codec::tests::sample_course();
        let dir = tempdir();
        let path = dir.join("roundtrip.bin");
        write_fumen(&path, &course).unwrap();
        let back = parse_fumen(&path, false).unwrap();
        assert_eq!(back, course);
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("fumen-api-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
