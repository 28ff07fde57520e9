pub mod bands;
pub mod frontend;
pub mod pop;
pub mod template;
pub mod tone;

use std::fmt;
use std::sync::Arc;

use crate::error::{DetectorError, Result};
use crate::params::DetectorConfig;

use bands::BandAnalyzer;
use frontend::SpectrumFrontend;
use pop::PopDetector;
use template::PopTemplate;
use tone::ToneDetector;

/// Bitmask of events seen in one frame (or ORed over the frames of a block).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameEvents(u8);

impl FrameEvents {
    pub const NONE: FrameEvents = FrameEvents(0);
    pub const TONE_START: FrameEvents = FrameEvents(1);
    pub const TONE_END: FrameEvents = FrameEvents(1 << 1);
    pub const POP: FrameEvents = FrameEvents(1 << 2);

    pub fn from_bits(bits: u8) -> Self {
        FrameEvents(bits & 0b111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: FrameEvents) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FrameEvents) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for FrameEvents {
    type Output = FrameEvents;

    fn bitor(self, rhs: FrameEvents) -> FrameEvents {
        FrameEvents(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FrameEvents {
    fn bitor_assign(&mut self, rhs: FrameEvents) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for FrameEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (FrameEvents::TONE_START, "tss-start"),
            (FrameEvents::TONE_END, "tss-end"),
            (FrameEvents::POP, "pop"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// One independent detection session: band analyzer, tone state machine,
/// pop detector and the sample front end. Create one per audio stream; the
/// only thing instances share is the read-only pop template.
pub struct Detectors {
    config: DetectorConfig,
    bands: BandAnalyzer,
    tone: ToneDetector,
    pop: PopDetector,
    frontend: SpectrumFrontend,
}

impl Detectors {
    /// Builds a detector using the built-in pop template.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Self::with_template(config, PopTemplate::builtin()?)
    }

    pub fn with_template(config: DetectorConfig, template: Arc<PopTemplate>) -> Result<Self> {
        config.validate()?;
        let spectrum_len = config.analysis.spectrum_len();
        if template.primary_height() > spectrum_len {
            return Err(DetectorError::TemplateShape(format!(
                "{} template rows exceed the {} spectrum bins",
                template.primary_height(),
                spectrum_len
            )));
        }

        let bands = BandAnalyzer::new(spectrum_len, config.tone.low_pass_weight)?;
        let tone = ToneDetector::new(config.tone.clone());
        let pop = PopDetector::new(config.pop.clone(), template)?;
        let frontend =
            SpectrumFrontend::new(config.analysis.block_size, config.analysis.steps_per_block);

        Ok(Self {
            config,
            bands,
            tone,
            pop,
            frontend,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Samples the host should pass to each `process_block` call.
    pub fn preferred_block_size(&self) -> usize {
        self.config.analysis.block_size
    }

    /// Host step between blocks; blocks do not overlap on the host side.
    pub fn preferred_step_size(&self) -> usize {
        self.config.analysis.block_size
    }

    pub fn spectrum_len(&self) -> usize {
        self.config.analysis.spectrum_len()
    }

    pub fn tone(&self) -> &ToneDetector {
        &self.tone
    }

    pub fn pop(&self) -> &PopDetector {
        &self.pop
    }

    /// Back to session start: smoothed spectrum, counters, pop history and
    /// overlap buffer all cleared. The pop refractory counter keeps running.
    pub fn reset(&mut self) {
        self.bands.reset();
        self.tone.reset();
        self.pop.reset();
        self.frontend.reset();
    }

    /// Runs both detectors on one power spectrum. Frames must arrive in order.
    ///
    /// # Panics
    ///
    /// If `spectrum` does not have exactly `block_size / 2` bins.
    pub fn process_frame(&mut self, spectrum: &[f32]) -> FrameEvents {
        assert_eq!(
            spectrum.len(),
            self.spectrum_len(),
            "spectrum has the wrong number of bins"
        );
        Self::detect(&mut self.bands, &mut self.tone, &mut self.pop, spectrum)
    }

    /// Feeds `block_size` new samples and analyses every hop-spaced window
    /// that ends inside them. Returns the events of all those frames ORed.
    ///
    /// # Panics
    ///
    /// If `samples` does not hold exactly `block_size` samples.
    pub fn process_block(&mut self, samples: &[f32]) -> FrameEvents {
        self.frontend.push_block(samples);
        let mut events = FrameEvents::NONE;
        for step in 0..self.config.analysis.steps_per_block {
            let spectrum = self.frontend.spectrum(step);
            events |= Self::detect(&mut self.bands, &mut self.tone, &mut self.pop, spectrum);
        }
        events
    }

    fn detect(
        bands: &mut BandAnalyzer,
        tone: &mut ToneDetector,
        pop: &mut PopDetector,
        spectrum: &[f32],
    ) -> FrameEvents {
        let mut events = FrameEvents::NONE;

        let energies = bands.update(spectrum);
        let tone_events = tone.step(&energies);
        if tone_events.start {
            events.insert(FrameEvents::TONE_START);
        }
        if tone_events.end {
            events.insert(FrameEvents::TONE_END);
        }

        if pop.step(spectrum) {
            events.insert(FrameEvents::POP);
        }
        events
    }
}
