use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Peak of the unit-RMS Hann window is `2 * HANN_NORM_GAIN`.
const HANN_NORM_GAIN: f32 = 0.8165;

/// Turns blocks of mono samples into power spectra. Keeps the previous
/// block so every analysis window can reach back across the block edge.
pub struct SpectrumFrontend {
    block_size: usize,
    steps: usize,
    overlap: Vec<f32>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    buffer: Vec<Complex<f32>>,
    spectrum: Vec<f32>,
}

impl SpectrumFrontend {
    pub fn new(block_size: usize, steps: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(block_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            block_size,
            steps,
            overlap: vec![0.0; block_size * 2],
            window: hann_window(block_size),
            fft,
            scratch,
            buffer: vec![Complex::new(0.0, 0.0); block_size],
            spectrum: vec![0.0; block_size / 2],
        }
    }

    pub fn hop(&self) -> usize {
        self.block_size / self.steps
    }

    /// Appends a block of exactly `block_size` samples.
    pub fn push_block(&mut self, samples: &[f32]) {
        assert_eq!(
            samples.len(),
            self.block_size,
            "expected a block of {} samples",
            self.block_size
        );
        self.overlap.copy_within(self.block_size.., 0);
        self.overlap[self.block_size..].copy_from_slice(samples);
    }

    /// Power spectrum of analysis window `step` of the current block. Step 0
    /// starts one hop into the previous block, the last step covers exactly
    /// the newest block.
    pub fn spectrum(&mut self, step: usize) -> &[f32] {
        debug_assert!(step < self.steps);
        let start = (step + 1) * self.hop();
        let frame = &self.overlap[start..start + self.block_size];
        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / self.block_size as f32;
        for (power, bin) in self.spectrum.iter_mut().zip(&self.buffer) {
            *power = (*bin * scale).norm_sqr();
        }
        &self.spectrum
    }

    pub fn reset(&mut self) {
        self.overlap.fill(0.0);
    }
}

/// Hann window normalized to unit RMS, so the speech threshold is read
/// against the same power scale the detector was tuned on.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            HANN_NORM_GAIN * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        })
        .collect()
}
