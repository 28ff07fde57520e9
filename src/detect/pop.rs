//! Click/pop detection by template matching.
//!
//! Recent spectra are kept as a grid of columns (one per frame) holding the
//! lowest bins plus one aggregated high-frequency value. Each frame the grid
//! is normalized by its peak and compared against the reference template at
//! a few row offsets; a close enough match outside the refractory window is
//! a pop.

use std::sync::Arc;

use crate::error::{DetectorError, Result};
use crate::params::PopParams;

use super::template::PopTemplate;

/// Fixed-size ring of spectrum columns. The newest column overwrites the
/// oldest; logical cell 0 is always the oldest column's first row.
pub struct PopHistory {
    data: Vec<f32>,
    primary_height: usize,
    columns: usize,
    /// Physical index of the oldest column.
    head: usize,
}

impl PopHistory {
    /// # Panics
    ///
    /// If `columns` is zero.
    pub fn new(primary_height: usize, columns: usize) -> Self {
        assert!(columns > 0, "pop history needs at least one column");
        Self {
            data: vec![0.0; (primary_height + 1) * columns],
            primary_height,
            columns,
            head: 0,
        }
    }

    pub fn height(&self) -> usize {
        self.primary_height + 1
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push_column(&mut self, primary: &[f32], aggregate: f32) {
        debug_assert_eq!(primary.len(), self.primary_height);
        let start = self.head * self.height();
        self.data[start..start + self.primary_height].copy_from_slice(primary);
        self.data[start + self.primary_height] = aggregate;
        self.head = (self.head + 1) % self.columns;
    }

    /// Value at logical `cell`, counting from the oldest column.
    pub fn get(&self, cell: usize) -> f32 {
        let height = self.height();
        let column = (cell / height + self.head) % self.columns;
        self.data[column * height + cell % height]
    }

    pub fn peak(&self) -> f32 {
        self.data.iter().copied().fold(0.0f32, f32::max)
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.head = 0;
    }
}

pub struct PopDetector {
    params: PopParams,
    template: Arc<PopTemplate>,
    history: PopHistory,
    /// Saturates at `u32::MAX`.
    frames_since_pop: u32,
    last_min_diff: f32,
}

impl PopDetector {
    pub fn new(params: PopParams, template: Arc<PopTemplate>) -> Result<Self> {
        if params.start_bin >= template.height() {
            return Err(DetectorError::StartBin {
                start_bin: params.start_bin,
                height: template.height(),
            });
        }
        if params.max_shift_up + params.max_shift_down == 0 {
            return Err(DetectorError::ShiftRange {
                up: params.max_shift_up,
                down: params.max_shift_down,
            });
        }

        let history = PopHistory::new(template.primary_height(), template.columns());
        if history.len() != template.len() {
            return Err(DetectorError::TemplateSize {
                template: template.len(),
                buffer: history.len(),
            });
        }

        Ok(Self {
            params,
            template,
            history,
            frames_since_pop: 0,
            last_min_diff: f32::INFINITY,
        })
    }

    pub fn template(&self) -> &PopTemplate {
        &self.template
    }

    pub fn history(&self) -> &PopHistory {
        &self.history
    }

    /// Best template distance of the last frame; infinite while the history
    /// is silent.
    pub fn last_min_diff(&self) -> f32 {
        self.last_min_diff
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_min_diff = f32::INFINITY;
    }

    pub fn step(&mut self, spectrum: &[f32]) -> bool {
        let primary_height = self.template.primary_height();
        assert!(
            spectrum.len() >= primary_height,
            "spectrum has {} bins, pop history needs {}",
            spectrum.len(),
            primary_height
        );

        // high bins carry nothing useful on their own
        let (primary, high) = spectrum.split_at(primary_height);
        self.history.push_column(primary, high.iter().sum());

        let peak = self.history.peak();
        let min_diff = if peak > 0.0 {
            let up = self.params.max_shift_up as isize;
            let down = self.params.max_shift_down as isize;
            (-up..down)
                .map(|shift| self.template_diff(peak, shift))
                .fold(f32::INFINITY, f32::min)
        } else {
            f32::INFINITY
        };
        self.last_min_diff = min_diff;
        log::trace!("pop min diff {:.4}", min_diff);

        self.frames_since_pop = self.frames_since_pop.saturating_add(1);
        if min_diff < self.params.sensitivity && self.frames_since_pop > self.params.refractory {
            log::debug!("pop detected, distance {:.4}", min_diff);
            self.frames_since_pop = 0;
            return true;
        }
        false
    }

    /// L1 distance between the peak-normalized history and the template
    /// moved by `shift` rows.
    fn template_diff(&self, peak: f32, shift: isize) -> f32 {
        let height = self.template.height();
        let mut diff = 0.0;
        for column in 0..self.template.columns() {
            let base = column * height;
            for row in self.params.start_bin..height {
                let cell = base + row;
                let expected = self.template.normalized_at(cell, shift);
                diff += (expected - self.history.get(cell) / peak).abs();
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLICK: [f32; 3] = [1.0, 0.5, 0.2];
    const SILENCE: [f32; 3] = [0.0; 3];

    fn small_template() -> Arc<PopTemplate> {
        let mut values = vec![0.0; 6];
        values.extend_from_slice(&CLICK);
        Arc::new(PopTemplate::new(values, 2, 3).unwrap())
    }

    fn small_params() -> PopParams {
        PopParams {
            start_bin: 0,
            max_shift_up: 0,
            max_shift_down: 1,
            sensitivity: 0.5,
            refractory: 15,
        }
    }

    /// Frames (1-based) on which a pop fired.
    fn run(detector: &mut PopDetector, frames: &[[f32; 3]]) -> Vec<usize> {
        frames
            .iter()
            .enumerate()
            .filter(|(_, spectrum)| detector.step(&spectrum[..]))
            .map(|(i, _)| i + 1)
            .collect()
    }

    fn sequence(clicks: &[usize], len: usize) -> Vec<[f32; 3]> {
        (1..=len)
            .map(|frame| if clicks.contains(&frame) { CLICK } else { SILENCE })
            .collect()
    }

    #[test]
    fn ring_keeps_chronological_order() {
        let mut history = PopHistory::new(2, 3);
        history.push_column(&[1.0, 2.0], 3.0);
        history.push_column(&[4.0, 5.0], 6.0);
        history.push_column(&[7.0, 8.0], 9.0);
        history.push_column(&[10.0, 11.0], 12.0);
        let cells: Vec<f32> = (0..history.len()).map(|c| history.get(c)).collect();
        assert_eq!(cells, vec![4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(history.peak(), 12.0);
    }

    #[test]
    #[should_panic(expected = "pop history needs at least one column")]
    fn history_without_columns_panics() {
        PopHistory::new(2, 0);
    }

    #[test]
    fn silence_never_pops() {
        let mut detector = PopDetector::new(small_params(), small_template()).unwrap();
        assert!(run(&mut detector, &sequence(&[], 40)).is_empty());
        assert!(detector.last_min_diff().is_infinite());
    }

    #[test]
    fn click_matching_template_pops() {
        let mut detector = PopDetector::new(small_params(), small_template()).unwrap();
        assert_eq!(run(&mut detector, &sequence(&[21], 30)), vec![21]);
    }

    #[test]
    fn match_is_scale_invariant() {
        let mut detector = PopDetector::new(small_params(), small_template()).unwrap();
        let mut frames = sequence(&[], 20);
        frames.push([1000.0, 500.0, 200.0]);
        assert_eq!(run(&mut detector, &frames), vec![21]);
        assert!(detector.last_min_diff() < 1e-5);
    }

    #[test]
    fn refractory_suppresses_close_second_click() {
        let mut detector = PopDetector::new(small_params(), small_template()).unwrap();
        assert_eq!(run(&mut detector, &sequence(&[21, 31], 50)), vec![21]);
    }

    #[test]
    fn separated_clicks_both_pop() {
        let mut detector = PopDetector::new(small_params(), small_template()).unwrap();
        assert_eq!(run(&mut detector, &sequence(&[21, 37], 50)), vec![21, 37]);
    }

    #[test]
    fn refractory_applies_from_session_start() {
        let mut detector = PopDetector::new(small_params(), small_template()).unwrap();
        assert_eq!(run(&mut detector, &sequence(&[5, 25], 30)), vec![25]);
    }

    #[test]
    fn shift_compensates_row_offset() {
        let template = Arc::new(PopTemplate::new(vec![0.0, 1.0, 0.5, 0.3], 3, 1).unwrap());
        let params = PopParams {
            start_bin: 0,
            max_shift_up: 0,
            max_shift_down: 2,
            sensitivity: 0.1,
            refractory: 0,
        };
        let live = [1.0, 0.5, 0.0, 0.3];

        let mut detector = PopDetector::new(params.clone(), Arc::clone(&template)).unwrap();
        assert!(detector.step(&live));
        assert!(detector.last_min_diff() < 1e-6);

        let unshifted = PopParams {
            max_shift_down: 1,
            ..params
        };
        let mut detector = PopDetector::new(unshifted, template).unwrap();
        assert!(!detector.step(&live));
        assert!((detector.last_min_diff() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn high_bins_are_summed() {
        let template = Arc::new(PopTemplate::new(vec![0.5, 1.0], 1, 1).unwrap());
        let mut detector = PopDetector::new(
            PopParams {
                start_bin: 0,
                ..small_params()
            },
            template,
        )
        .unwrap();
        detector.step(&[1.0, 0.5, 0.75, 0.75]);
        assert_eq!(detector.history().get(0), 1.0);
        assert_eq!(detector.history().get(1), 2.0);
    }

    #[test]
    fn builtin_template_fed_back_matches() {
        let template = PopTemplate::builtin().unwrap();
        let mut detector = PopDetector::new(PopParams::default(), Arc::clone(&template)).unwrap();
        let height = template.height();
        let mut popped = false;
        for column in template.values().chunks(height) {
            let mut spectrum = vec![0.0f32; 256];
            spectrum[..height].copy_from_slice(column);
            popped |= detector.step(&spectrum);
        }
        assert!(detector.last_min_diff() < 1e-5);
        assert!(popped);
    }

    #[test]
    fn rejects_start_bin_outside_template() {
        let params = PopParams {
            start_bin: 3,
            ..small_params()
        };
        assert!(matches!(
            PopDetector::new(params, small_template()),
            Err(DetectorError::StartBin { start_bin: 3, height: 3 })
        ));
    }
}
