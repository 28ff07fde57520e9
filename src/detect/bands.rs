use crate::error::{DetectorError, Result};

pub const LOWER_BAND_LOW: usize = 3;
pub const MAIN_BAND_LOW: usize = 40;
pub const MAIN_BAND_HIGH: usize = 100;
pub const OPTIONAL_BAND_HIGH: usize = 180;
pub const UPPER_BAND_LOW: usize = OPTIONAL_BAND_HIGH;

/// Half-open bin range `[low, high)`. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRange {
    low: usize,
    high: usize,
}

impl BandRange {
    pub fn new(low: usize, high: usize) -> Result<Self> {
        if high <= low {
            return Err(DetectorError::EmptyBand { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn high(&self) -> usize {
        self.high
    }

    pub fn width(&self) -> usize {
        self.high - self.low
    }

    fn mean(&self, bins: &[f32]) -> f32 {
        bins[self.low..self.high].iter().sum::<f32>() / self.width() as f32
    }
}

/// Band averages of the smoothed spectrum for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergies {
    pub lower: f32,
    pub main: f32,
    pub optional: f32,
    pub upper: f32,
}

/// Per-bin EMA of spectral power, reduced to four band averages.
pub struct BandAnalyzer {
    low_pass: Vec<f32>,
    weight: f32,
    lower: BandRange,
    main: BandRange,
    optional: BandRange,
    upper: BandRange,
}

impl BandAnalyzer {
    /// `spectrum_len` fixes the upper band's end; the other edges are constant.
    pub fn new(spectrum_len: usize, weight: f32) -> Result<Self> {
        Ok(Self {
            low_pass: vec![0.0; spectrum_len],
            weight,
            lower: BandRange::new(LOWER_BAND_LOW, MAIN_BAND_LOW)?,
            main: BandRange::new(MAIN_BAND_LOW, MAIN_BAND_HIGH)?,
            optional: BandRange::new(MAIN_BAND_HIGH, OPTIONAL_BAND_HIGH)?,
            upper: BandRange::new(UPPER_BAND_LOW, spectrum_len)?,
        })
    }

    /// # Panics
    ///
    /// If `spectrum` is not exactly as long as the smoothed spectrum.
    pub fn update(&mut self, spectrum: &[f32]) -> BandEnergies {
        assert_eq!(
            spectrum.len(),
            self.low_pass.len(),
            "band analyzer expects {} bins",
            self.low_pass.len()
        );
        let w = self.weight;
        for (smoothed, &power) in self.low_pass.iter_mut().zip(spectrum) {
            *smoothed = *smoothed * (1.0 - w) + power * w;
        }

        BandEnergies {
            lower: self.lower.mean(&self.low_pass),
            main: self.main.mean(&self.low_pass),
            optional: self.optional.mean(&self.low_pass),
            upper: self.upper.mean(&self.low_pass),
        }
    }

    pub fn low_pass(&self) -> &[f32] {
        &self.low_pass
    }

    pub fn reset(&mut self) {
        self.low_pass.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_range() {
        assert!(matches!(
            BandRange::new(40, 40),
            Err(DetectorError::EmptyBand { low: 40, high: 40 })
        ));
        assert!(BandRange::new(50, 40).is_err());
    }

    #[test]
    fn too_short_spectrum_has_no_upper_band() {
        assert!(BandAnalyzer::new(180, 0.6).is_err());
        assert!(BandAnalyzer::new(181, 0.6).is_ok());
    }

    #[test]
    fn converges_monotonically_to_constant_input() {
        let mut analyzer = BandAnalyzer::new(256, 0.6).unwrap();
        let spectrum = vec![2.0f32; 256];
        let mut previous = 0.0f32;
        for _ in 0..60 {
            let bands = analyzer.update(&spectrum);
            assert!(bands.main >= previous - 1e-6);
            assert!(bands.main <= 2.0 + 1e-6);
            previous = bands.main;
        }
        for &value in analyzer.low_pass() {
            assert!((value - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn first_frame_is_weighted() {
        let mut analyzer = BandAnalyzer::new(256, 0.6).unwrap();
        let bands = analyzer.update(&vec![1.0; 256]);
        assert!((bands.lower - 0.6).abs() < 1e-6);
        assert!((bands.upper - 0.6).abs() < 1e-6);
    }

    #[test]
    fn band_edges_are_half_open() {
        // Full weight so the low pass equals the input.
        let mut analyzer = BandAnalyzer::new(256, 1.0).unwrap();
        let mut spectrum = vec![0.0f32; 256];
        spectrum[2] = 100.0;
        spectrum[39] = 37.0;
        spectrum[40] = 60.0;
        spectrum[99] = 60.0;
        spectrum[100] = 80.0;
        spectrum[180] = 76.0;
        spectrum[255] = 76.0;
        let bands = analyzer.update(&spectrum);
        assert!((bands.lower - 1.0).abs() < 1e-6);
        assert!((bands.main - 2.0).abs() < 1e-6);
        assert!((bands.optional - 1.0).abs() < 1e-6);
        assert!((bands.upper - 2.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "band analyzer expects 256 bins")]
    fn short_spectrum_panics() {
        let mut analyzer = BandAnalyzer::new(256, 0.6).unwrap();
        analyzer.update(&vec![1.0; 200]);
    }

    #[test]
    #[should_panic(expected = "band analyzer expects 256 bins")]
    fn long_spectrum_panics() {
        let mut analyzer = BandAnalyzer::new(256, 0.6).unwrap();
        analyzer.update(&vec![1.0; 300]);
    }

    #[test]
    fn reset_clears_state() {
        let mut analyzer = BandAnalyzer::new(256, 0.6).unwrap();
        analyzer.update(&vec![5.0; 256]);
        analyzer.reset();
        assert!(analyzer.low_pass().iter().all(|&v| v == 0.0));
    }
}
