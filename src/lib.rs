//! Frame-by-frame detection of sustained tones and click/pop sounds in a
//! stream of short-time power spectra.
//!
//! Build a [`Detectors`] per audio stream and feed it either raw sample
//! blocks ([`Detectors::process_block`]) or ready power spectra
//! ([`Detectors::process_frame`]). Each call returns a [`FrameEvents`]
//! bitmask: bit 0 tone start, bit 1 tone end, bit 2 pop.

pub mod detect;
pub mod error;
pub mod params;

pub use detect::template::PopTemplate;
pub use detect::{Detectors, FrameEvents};
pub use error::{DetectorError, Result};
pub use params::DetectorConfig;
