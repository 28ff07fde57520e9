mod audio;
mod cli;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

use cli::Cli;
use popclick::{Detectors, DetectorConfig, PopTemplate};
use report::DetectedEvent;

/// Sample rate the band edges were tuned at.
const TUNED_SAMPLE_RATE: u32 = 44100;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let config_path = cli.config.clone().or_else(config::find_config);
    let mut file_config = config::Config::default();
    if let Some(ref path) = config_path {
        match config::load_config(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                file_config = cfg;
            }
            Err(e) => log::warn!("Failed to load config from {}: {:#}", path.display(), e),
        }
    }

    // Merge: flags win over the config file
    let mut detector_config = file_config.detector;
    if cli.delay_match {
        detector_config.tone.delay_match = true;
    }
    if let Some(sensitivity) = cli.sensitivity {
        detector_config.tone.sensitivity = sensitivity;
    }
    if let Some(sensitivity) = cli.pop_sensitivity {
        detector_config.pop.sensitivity = sensitivity;
    }
    if cli.channel == 0 {
        cli.channel = file_config.output.channel;
    }
    let json = cli.json || file_config.output.json;
    let template_path = cli.template.clone().or(file_config.output.template);

    detector_config
        .validate()
        .context("Invalid detector configuration")?;

    let template = match template_path {
        Some(ref path) => {
            log::info!("Pop template: {}", path.display());
            Arc::new(
                PopTemplate::load(path)
                    .with_context(|| format!("Failed to load pop template {}", path.display()))?,
            )
        }
        None => PopTemplate::builtin().context("Built-in pop template is invalid")?,
    };

    log::info!(
        "Block size {} ({} steps), tone sensitivity {:.2}{}, pop sensitivity {:.2}",
        detector_config.analysis.block_size,
        detector_config.analysis.steps_per_block,
        detector_config.tone.sensitivity,
        if detector_config.tone.delay_match { " (delayed match)" } else { "" },
        detector_config.pop.sensitivity
    );

    let progress = MultiProgress::new();
    let show_progress = !(json || cli.quiet);

    // One detector per file; only the template is shared.
    let results: Vec<(&Path, Result<Vec<DetectedEvent>>)> = cli
        .inputs
        .par_iter()
        .map(|input| {
            let result = analyze_file(
                input,
                cli.channel,
                &detector_config,
                &template,
                &progress,
                show_progress,
            );
            (input.as_path(), result)
        })
        .collect();

    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(events) => report::print_events(path, events, json)?,
            Err(e) => {
                log::error!("{}: {:#}", path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, results.len());
    }
    Ok(())
}

fn analyze_file(
    input: &Path,
    channel: usize,
    config: &DetectorConfig,
    template: &Arc<PopTemplate>,
    progress: &MultiProgress,
    show_progress: bool,
) -> Result<Vec<DetectedEvent>> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let audio_data = audio::decode::decode_channel(input, channel)?;
    if audio_data.sample_rate != TUNED_SAMPLE_RATE {
        log::warn!(
            "{} is {}Hz; detection bands are tuned for {}Hz",
            input.display(),
            audio_data.sample_rate,
            TUNED_SAMPLE_RATE
        );
    }

    let mut detectors = Detectors::with_template(config.clone(), Arc::clone(template))?;

    let blocks = audio_data.samples.len().div_ceil(detectors.preferred_block_size());
    let pb = if show_progress {
        let pb = progress.add(ProgressBar::new(blocks as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} blocks {msg}")?
                .progress_chars("=>-"),
        );
        pb.set_message(input.display().to_string());
        pb
    } else {
        ProgressBar::hidden()
    };

    let events = report::detect_events(
        &mut detectors,
        &audio_data.samples,
        audio_data.sample_rate,
        &pb,
    );
    log::info!("{}: {} event(s)", input.display(), events.len());
    Ok(events)
}
