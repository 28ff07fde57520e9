use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use popclick::{Detectors, FrameEvents};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    TssStart,
    TssEnd,
    Pop,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::TssStart => "tss-start",
            EventKind::TssEnd => "tss-end",
            EventKind::Pop => "pop",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedEvent {
    /// Seconds from the start of the file.
    pub time: f64,
    pub kind: EventKind,
}

/// Expands one block's bitmask into events stamped with the block start.
pub fn block_events(
    events: FrameEvents,
    block_index: usize,
    step_size: usize,
    sample_rate: u32,
) -> Vec<DetectedEvent> {
    let time = (block_index * step_size) as f64 / sample_rate as f64;
    [
        (FrameEvents::TONE_START, EventKind::TssStart),
        (FrameEvents::TONE_END, EventKind::TssEnd),
        (FrameEvents::POP, EventKind::Pop),
    ]
    .into_iter()
    .filter(|(flag, _)| events.contains(*flag))
    .map(|(_, kind)| DetectedEvent { time, kind })
    .collect()
}

/// Runs `detectors` over every block of `samples`. The final partial block
/// is padded with silence.
pub fn detect_events(
    detectors: &mut Detectors,
    samples: &[f32],
    sample_rate: u32,
    progress: &ProgressBar,
) -> Vec<DetectedEvent> {
    let block_size = detectors.preferred_block_size();
    let step_size = detectors.preferred_step_size();
    let mut events = Vec::new();
    let mut padded = vec![0.0f32; block_size];

    for (block_index, block) in samples.chunks(block_size).enumerate() {
        let bits = if block.len() == block_size {
            detectors.process_block(block)
        } else {
            padded[..block.len()].copy_from_slice(block);
            padded[block.len()..].fill(0.0);
            detectors.process_block(&padded)
        };
        events.extend(block_events(bits, block_index, step_size, sample_rate));
        progress.inc(1);
    }
    progress.finish_and_clear();
    events
}

pub fn print_events(path: &Path, events: &[DetectedEvent], json: bool) -> anyhow::Result<()> {
    for event in events {
        if json {
            let line = serde_json::json!({
                "file": path.display().to_string(),
                "time": event.time,
                "event": event.kind,
            });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!("{}\t{:.3}\t{}", path.display(), event.time, event.kind);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use popclick::DetectorConfig;

    #[test]
    fn block_events_use_block_start_time() {
        let events = block_events(FrameEvents::TONE_END | FrameEvents::POP, 10, 512, 44100);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::TssEnd);
        assert_eq!(events[1].kind, EventKind::Pop);
        assert!((events[0].time - 5120.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn empty_mask_has_no_events() {
        assert!(block_events(FrameEvents::NONE, 3, 512, 44100).is_empty());
    }

    #[test]
    fn kinds_serialize_kebab_case() {
        let event = DetectedEvent {
            time: 1.5,
            kind: EventKind::TssStart,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"time":1.5,"kind":"tss-start"}"#
        );
        assert_eq!(EventKind::Pop.to_string(), "pop");
    }

    #[test]
    fn detects_tone_in_samples() {
        let mut detectors = Detectors::new(DetectorConfig::default()).unwrap();
        // exact bin 64 of a 512-point FFT, one second plus a partial block
        let samples: Vec<f32> = (0..44100)
            .map(|n| (2.0 * std::f32::consts::PI * 64.0 * n as f32 / 512.0).sin())
            .collect();
        let events = detect_events(&mut detectors, &samples, 44100, &ProgressBar::hidden());
        let starts: Vec<&DetectedEvent> = events
            .iter()
            .filter(|e| e.kind == EventKind::TssStart)
            .collect();
        assert_eq!(starts.len(), 1);
        assert!(starts[0].time < 0.1);
    }
}
