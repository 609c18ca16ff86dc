use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct AppArgs {
    #[arg(value_name = "TJA_FILE", help = "Path to the .tja chart to convert")]
    pub input: PathBuf,

    #[arg(
        short,
        long,
        value_name = "DIR",
        help = "Write the .bin files here instead of next to the input"
    )]
    pub out_dir: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Raise logging from warn to debug",
        default_value_t = false
    )]
    pub verbose: bool,
}
