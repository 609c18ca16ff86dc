//! TJA chart text format: decoding, parsing, and compilation into
//! timestamped per-branch measures.
//!
//! This crate only understands the textual `.tja` side of the pipeline.
//! It has no notion of the fumen binary format; that lives in the
//! sibling `fumen` crate, which depends on this one.

pub mod ast;
pub mod compile;
pub mod decode;
pub mod error;
pub mod parser;

pub use ast::*;
pub use error::{ConvertWarning, Error, ParseError};
pub use parser::TJAParser;

use std::path::Path;

/// Decode, parse, and compile a `.tja` file in one call.
///
/// Non-fatal issues encountered along the way (unknown commands, clamped
/// levels, unterminated rolls, ...) are collected into the returned
/// warning list rather than aborting the parse.
pub fn parse_tja(path: impl AsRef<Path>) -> Result<(TJASong, Vec<ConvertWarning>), Error> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, encoding) = decode::decode(&bytes).map_err(|_| Error::Encoding {
        path: path.to_path_buf(),
    })?;
    tracing::debug!(?encoding, path = %path.display(), "decoded tja source");

    let mut warnings = Vec::new();
    let mut song = TJAParser::new().parse_with_warnings(&text, &mut warnings)?;
    for course in song.courses.values_mut() {
        compile::compile_course(course, song.bpm, song.offset_seconds, &mut warnings);
    }
    Ok((song, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("tja-lib-test-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parse_tja_surfaces_parser_level_warnings() {
        let path = write_fixture(
            "unknown-command.tja",
            "BPM:120\nOFFSET:0\nLEVEL:99\nCOURSE:Oni\n#START\n#NOTACOMMAND\n1010,\n#END",
        );
        let (_, warnings) = parse_tja(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConvertWarning::UnknownCommand { command, .. } if command == "NOTACOMMAND")));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConvertWarning::LevelClamped { given: 99, clamped: 10 })));
    }
}
