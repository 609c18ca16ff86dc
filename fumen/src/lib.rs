//! Fumen binary chart codec plus the TJA-to-fumen translator.
//!
//! This crate reads and writes the `.bin` fumen format and converts a
//! compiled [`tja::TJASong`] into one [`FumenCourse`] per course/style/
//! player combination. The textual `.tja` side lives entirely in the
//! sibling `tja` crate.

pub mod api;
pub mod codec;
pub mod error;
pub mod model;
pub mod translate;

pub use api::{convert_tja_to_fumen, parse_fumen, parse_tja, write_fumen, CourseId};
pub use error::Error;
pub use model::*;
