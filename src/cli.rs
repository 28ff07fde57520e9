use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "popclick", about = "Detect sustained tones and mouth pops in audio files")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (defaults to ./popclick.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Channel to analyse; channels are never mixed
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Use the delayed-match tone detection variant
    #[arg(long)]
    pub delay_match: bool,

    /// Tone trigger ratio of main band to flanking bands
    #[arg(long)]
    pub sensitivity: Option<f32>,

    /// Maximum template distance still counted as a pop
    #[arg(long)]
    pub pop_sensitivity: Option<f32>,

    /// Pop reference template (JSON) replacing the built-in one
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}
