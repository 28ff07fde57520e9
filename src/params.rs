use serde::Deserialize;

use crate::detect::bands::UPPER_BAND_LOW;
use crate::error::{DetectorError, Result};

/// Lower-band energy above this counts as speech.
pub const SPEECH_THRESH: f32 = 0.5;
/// Frames after the last speech frame during which tones are ignored.
pub const SPEECH_SHADOW_TIME: u32 = 100;

/// Every tunable of a detector instance. Fixed once the detector is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub analysis: AnalysisParams,
    #[serde(default)]
    pub tone: ToneParams,
    #[serde(default)]
    pub pop: PopParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisParams {
    /// FFT length in samples, also the number of samples per `process_block` call.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Analysis frames per block; the window hops by `block_size / steps_per_block`.
    #[serde(default = "default_steps_per_block")]
    pub steps_per_block: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToneParams {
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_hysteresis_factor")]
    pub hysteresis_factor: f32,
    /// EMA weight given to the newest spectrum.
    #[serde(default = "default_low_pass_weight")]
    pub low_pass_weight: f32,
    #[serde(default = "default_min_frames")]
    pub min_frames: u32,
    #[serde(default = "default_min_frames_long")]
    pub min_frames_long: u32,
    /// Use the delayed-match variant of the tone state machine.
    #[serde(default)]
    pub delay_match: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopParams {
    /// Rows below this are left out of the template distance.
    #[serde(default = "default_start_bin")]
    pub start_bin: usize,
    #[serde(default = "default_max_shift_up")]
    pub max_shift_up: usize,
    #[serde(default = "default_max_shift_down")]
    pub max_shift_down: usize,
    /// Maximum template distance that still counts as a pop.
    #[serde(default = "default_pop_sensitivity")]
    pub sensitivity: f32,
    /// Frames that must pass after a pop before the next one can fire.
    #[serde(default = "default_refractory")]
    pub refractory: u32,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            steps_per_block: default_steps_per_block(),
        }
    }
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            hysteresis_factor: default_hysteresis_factor(),
            low_pass_weight: default_low_pass_weight(),
            min_frames: default_min_frames(),
            min_frames_long: default_min_frames_long(),
            delay_match: false,
        }
    }
}

impl Default for PopParams {
    fn default() -> Self {
        Self {
            start_bin: default_start_bin(),
            max_shift_up: default_max_shift_up(),
            max_shift_down: default_max_shift_down(),
            sensitivity: default_pop_sensitivity(),
            refractory: default_refractory(),
        }
    }
}

fn default_block_size() -> usize { 512 }
fn default_steps_per_block() -> usize { 4 }
fn default_sensitivity() -> f32 { 5.0 }
fn default_hysteresis_factor() -> f32 { 0.4 }
fn default_low_pass_weight() -> f32 { 0.6 }
fn default_min_frames() -> u32 { 20 }
fn default_min_frames_long() -> u32 { 100 }
fn default_start_bin() -> usize { 2 }
fn default_max_shift_up() -> usize { 2 }
fn default_max_shift_down() -> usize { 4 }
fn default_pop_sensitivity() -> f32 { 8.5 }
fn default_refractory() -> u32 { 15 }

impl AnalysisParams {
    /// Number of power bins in each spectrum.
    pub fn spectrum_len(&self) -> usize {
        self.block_size / 2
    }

    pub fn step_size(&self) -> usize {
        self.block_size / self.steps_per_block
    }
}

impl DetectorConfig {
    /// Rejects settings that would make a band, the hop or the shift range empty.
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if analysis.block_size == 0 {
            return Err(DetectorError::ZeroBlockSize);
        }
        if analysis.spectrum_len() <= UPPER_BAND_LOW {
            return Err(DetectorError::BlockTooSmall {
                block_size: analysis.block_size,
                bins: analysis.spectrum_len(),
                needed: UPPER_BAND_LOW,
            });
        }
        if analysis.steps_per_block == 0 || analysis.block_size % analysis.steps_per_block != 0 {
            return Err(DetectorError::UnevenSteps {
                block_size: analysis.block_size,
                steps: analysis.steps_per_block,
            });
        }

        let weight = self.tone.low_pass_weight;
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(DetectorError::InvalidWeight(weight));
        }

        if self.pop.max_shift_up + self.pop.max_shift_down == 0 {
            return Err(DetectorError::ShiftRange {
                up: self.pop.max_shift_up,
                down: self.pop.max_shift_down,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.spectrum_len(), 256);
        assert_eq!(config.analysis.step_size(), 128);
    }

    #[test]
    fn rejects_zero_block_size() {
        let mut config = DetectorConfig::default();
        config.analysis.block_size = 0;
        assert!(matches!(config.validate(), Err(DetectorError::ZeroBlockSize)));
    }

    #[test]
    fn rejects_block_without_upper_band() {
        let mut config = DetectorConfig::default();
        config.analysis.block_size = 360;
        assert!(matches!(
            config.validate(),
            Err(DetectorError::BlockTooSmall { bins: 180, .. })
        ));
    }

    #[test]
    fn rejects_uneven_steps() {
        let mut config = DetectorConfig::default();
        config.analysis.steps_per_block = 3;
        assert!(matches!(config.validate(), Err(DetectorError::UnevenSteps { .. })));
    }

    #[test]
    fn rejects_bad_weight() {
        let mut config = DetectorConfig::default();
        config.tone.low_pass_weight = 0.0;
        assert!(matches!(config.validate(), Err(DetectorError::InvalidWeight(_))));
        config.tone.low_pass_weight = 1.5;
        assert!(matches!(config.validate(), Err(DetectorError::InvalidWeight(_))));
    }

    #[test]
    fn rejects_empty_shift_range() {
        let mut config = DetectorConfig::default();
        config.pop.max_shift_up = 0;
        config.pop.max_shift_down = 0;
        assert!(matches!(config.validate(), Err(DetectorError::ShiftRange { .. })));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: DetectorConfig = toml::from_str(
            "[tone]\nsensitivity = 3.0\n\n[pop]\nrefractory = 30\n",
        )
        .unwrap();
        assert_eq!(config.tone.sensitivity, 3.0);
        assert_eq!(config.tone.min_frames, 20);
        assert_eq!(config.pop.refractory, 30);
        assert_eq!(config.analysis.block_size, 512);
    }
}
