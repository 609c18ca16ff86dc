pub mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::AppArgs;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = match AppArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Parse(e)) => {
            eprintln!("tja2fumen: failed to parse {}: {e}", args.input.display());
            ExitCode::from(2)
        }
        Err(Failure::Write(e)) => {
            eprintln!("tja2fumen: failed to write output: {e}");
            ExitCode::from(3)
        }
    }
}

enum Failure {
    Parse(tja::Error),
    Write(fumen::Error),
}

fn run(args: &AppArgs) -> Result<(), Failure> {
    let (song, parse_warnings) = fumen::parse_tja(&args.input).map_err(Failure::Parse)?;
    for warning in &parse_warnings {
        tracing::warn!(?warning, "tja parse warning");
    }

    let (courses, convert_warnings) = fumen::convert_tja_to_fumen(&song);
    for warning in &convert_warnings {
        tracing::warn!(?warning, "fumen conversion warning");
    }

    let out_dir = match &args.out_dir {
        Some(dir) => dir.clone(),
        None => args.input.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
    };
    let stem = args.input.file_stem().and_then(|s| s.to_str()).unwrap_or("chart");

    for (id, course) in &courses {
        let path = out_dir.join(output_filename(stem, id));
        tracing::debug!(path = %path.display(), "writing course");
        fumen::write_fumen(&path, course).map_err(Failure::Write)?;
    }

    Ok(())
}

fn output_filename(stem: &str, id: &fumen::CourseId) -> String {
    let difficulty = match id.course {
        tja::TJACourseKind::Easy => "easy",
        tja::TJACourseKind::Normal => "normal",
        tja::TJACourseKind::Hard => "hard",
        tja::TJACourseKind::Oni => "oni",
        tja::TJACourseKind::Ura => "ura",
    };
    match id.player {
        tja::TJAPlayer::None => format!("{stem}_{difficulty}.bin"),
        tja::TJAPlayer::P1 => format!("{stem}_{difficulty}_p1.bin"),
        tja::TJAPlayer::P2 => format!("{stem}_{difficulty}_p2.bin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_follow_stem_difficulty_player_convention() {
        let id = fumen::CourseId {
            course: tja::TJACourseKind::Oni,
            style: tja::TJAStyle::Double,
            player: tja::TJAPlayer::P2,
        };
        assert_eq!(output_filename("song", &id), "song_oni_p2.bin");

        let id = fumen::CourseId {
            course: tja::TJACourseKind::Normal,
            style: tja::TJAStyle::Single,
            player: tja::TJAPlayer::None,
        };
        assert_eq!(output_filename("song", &id), "song_normal.bin");
    }
}
