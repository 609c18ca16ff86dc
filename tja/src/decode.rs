//! Text decoding: BOM-aware UTF-8, then UTF-8 without BOM, then
//! Shift-JIS, matching the sniffing `tja`'s own `hitseq` example and
//! `taiko-untitled` both reach for `encoding_rs` to do.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which decoder produced the winning string, surfaced as a diagnostic
/// (spec §9: "Document this and surface the chosen encoding").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectedEncoding {
    Utf8WithBom,
    Utf8,
    ShiftJis,
}

/// Try UTF-8 with BOM, then UTF-8 without BOM, then Shift-JIS. The first
/// decoder producing no replacement character wins; if both UTF-8 and
/// Shift-JIS are clean, UTF-8 is preferred (spec §9).
pub fn decode(bytes: &[u8]) -> Result<(String, DetectedEncoding), ()> {
    if let Some(rest) = bytes.strip_prefix(b"\xef\xbb\xbf") {
        let (text, _, had_errors) = encoding_rs::UTF_8.decode(rest);
        if !had_errors {
            return Ok((text.into_owned(), DetectedEncoding::Utf8WithBom));
        }
    }

    let (text, _, had_errors) = encoding_rs::UTF_8.decode_without_bom_handling(bytes);
    if !had_errors {
        return Ok((text.into_owned(), DetectedEncoding::Utf8));
    }

    let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
    if !had_errors {
        return Ok((text.into_owned(), DetectedEncoding::ShiftJis));
    }

    Err(())
}

/// Split decoded text into trimmed, comment-stripped, non-blank logical
/// lines (spec §4.A).
pub fn logical_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn utf8_with_bom() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice("TITLE:日本語".as_bytes());
        let (text, enc) = decode(&bytes).unwrap();
        assert_eq!(enc, DetectedEncoding::Utf8WithBom);
        assert_eq!(text, "TITLE:日本語");
    }

    #[test]
    fn utf8_without_bom() {
        let bytes = "TITLE:plain".as_bytes();
        let (text, enc) = decode(bytes).unwrap();
        assert_eq!(enc, DetectedEncoding::Utf8);
        assert_eq!(text, "TITLE:plain");
    }

    #[test]
    fn shift_jis_fallback() {
        let (bytes, _, had_errors) = encoding_rs::SHIFT_JIS.encode("TITLE:日本語");
        assert!(!had_errors);
        let (text, enc) = decode(&bytes).unwrap();
        assert_eq!(enc, DetectedEncoding::ShiftJis);
        assert_eq!(text, "TITLE:日本語");
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        let lines = logical_lines("BPM:120 // comment\n\n  COURSE:Oni  \n");
        assert_eq!(lines, vec!["BPM:120", "COURSE:Oni"]);
    }
}
