//! Sustained-tone ("TSS") onset/offset detection.
//!
//! The detector watches how strongly the main band dominates its flanking
//! bands and turns that ratio into start/end events with hysteresis. Energy
//! in the lower band is treated as speech, and tones are ignored for a fixed
//! shadow period after it.

use crate::params::{ToneParams, SPEECH_SHADOW_TIME, SPEECH_THRESH};

use super::bands::BandEnergies;

const INITIAL_FRAMES_SINCE: u32 = 1000;
const INITIAL_SAVED_OTHER_BANDS: f32 = 0.0002;

/// Start/end flags produced for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToneEvents {
    pub start: bool,
    pub end: bool,
}

/// Per-session counters. All counters saturate at `u32::MAX`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneState {
    pub consecutive_matches: u32,
    pub frames_since_speech: u32,
    pub frames_since_match: u32,
    /// Flanking-band baseline captured when the last tone was confirmed.
    pub saved_other_bands: f32,
}

impl Default for ToneState {
    fn default() -> Self {
        Self {
            consecutive_matches: 0,
            frames_since_speech: INITIAL_FRAMES_SINCE,
            frames_since_match: INITIAL_FRAMES_SINCE,
            saved_other_bands: INITIAL_SAVED_OTHER_BANDS,
        }
    }
}

pub struct ToneDetector {
    params: ToneParams,
    state: ToneState,
}

impl ToneDetector {
    pub fn new(params: ToneParams) -> Self {
        Self {
            params,
            state: ToneState::default(),
        }
    }

    pub fn state(&self) -> &ToneState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ToneState::default();
    }

    /// Frames of continuous matching needed before a tone is confirmed.
    fn immediate_match_frame(&self) -> u32 {
        if self.params.delay_match {
            self.params.min_frames_long
        } else {
            self.params.min_frames
        }
    }

    pub fn step(&mut self, bands: &BandEnergies) -> ToneEvents {
        let immediate = self.immediate_match_frame();
        let sensitivity = self.params.sensitivity;
        let relaxed = sensitivity * self.params.hysteresis_factor;
        let state = &mut self.state;

        state.frames_since_speech = state.frames_since_speech.saturating_add(1);
        if bands.lower > SPEECH_THRESH {
            state.frames_since_speech = 0;
        }

        let other_bands = (bands.lower + bands.upper) / 2.0;
        let matchiness = bands.main / other_bands;
        let out_of_shadow = state.frames_since_speech > SPEECH_SHADOW_TIME;
        state.frames_since_match = state.frames_since_match.saturating_add(1);

        log::trace!(
            "bands lower={:.6} main={:.6} optional={:.6} upper={:.6} matchiness={:.3}",
            bands.lower,
            bands.main,
            bands.optional,
            bands.upper,
            matchiness
        );

        let matching = out_of_shadow
            && (matchiness >= sensitivity
                || (state.consecutive_matches > 0 && matchiness >= relaxed)
                || (state.consecutive_matches > immediate
                    && bands.main / state.saved_other_bands >= relaxed * 0.5));

        if self.params.delay_match {
            return Self::step_delayed(&self.params, state, matching, out_of_shadow, other_bands);
        }

        let mut events = ToneEvents::default();
        if matching {
            state.consecutive_matches = state.consecutive_matches.saturating_add(1);
            if state.consecutive_matches == immediate {
                events.start = true;
                state.saved_other_bands = other_bands;
                log::debug!("tone start, baseline {:.6}", other_bands);
            }
        } else {
            if state.consecutive_matches >= immediate {
                events.end = true;
                log::debug!("tone end after {} frames", state.consecutive_matches);
            }
            state.consecutive_matches = 0;
        }
        events
    }

    /// Delayed-match variant. A confirmed tone is only reported once its
    /// timer runs out, and a second tone arriving inside that window is
    /// reported as a start and end in the same frame. The intended timing of
    /// this mode was never settled, so it stays off by default.
    fn step_delayed(
        params: &ToneParams,
        state: &mut ToneState,
        matching: bool,
        out_of_shadow: bool,
        other_bands: f32,
    ) -> ToneEvents {
        let mut events = ToneEvents::default();
        if matching {
            if state.consecutive_matches == 0 && state.frames_since_match <= params.min_frames_long {
                events.start = true;
                events.end = true;
                state.frames_since_match = INITIAL_FRAMES_SINCE;
                log::debug!("double tone inside the delay window");
            }

            state.consecutive_matches = state.consecutive_matches.saturating_add(1);
            if state.consecutive_matches == params.min_frames {
                state.frames_since_match = state.consecutive_matches;
            } else if state.consecutive_matches == params.min_frames_long {
                events.start = true;
                state.saved_other_bands = other_bands;
                log::debug!("long tone start, baseline {:.6}", other_bands);
            }
        } else {
            let delayed = state.frames_since_match == params.min_frames_long && out_of_shadow;
            if delayed {
                events.start = true;
            }
            if state.consecutive_matches >= params.min_frames_long || delayed {
                events.end = true;
                log::debug!("tone end after {} frames", state.consecutive_matches);
            }
            state.consecutive_matches = 0;
        }
        events
    }
}
