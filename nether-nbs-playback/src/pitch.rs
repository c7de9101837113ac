//! Conversions from note parameters to audio-backend terms
//!
//! The scheduler never produces sound; these are for consumers that do.

use crate::{CENTS_PER_SEMITONE, GAIN_DIVISOR, PAN_DIVISOR, PITCH_CENTER_KEY, SEMITONES_PER_OCTAVE};

/// Playback-rate multiplier for a sample recorded at key 45 (F#4)
///
/// `2 ^ ((key + pitch / 100 - 45) / 12)`: one octave up doubles the rate.
pub fn playback_rate(key: u8, pitch: i16) -> f64 {
    let semitones =
        key as f64 + pitch as f64 / CENTS_PER_SEMITONE - PITCH_CENTER_KEY as f64;
    (semitones / SEMITONES_PER_OCTAVE).exp2()
}

/// Output gain for a velocity (full velocity is half scale)
pub fn gain(velocity: u8) -> f32 {
    velocity as f32 / GAIN_DIVISOR
}

/// Stereo pan position, -1.0 (left) to 1.0 (right) for in-range panning
pub fn stereo_pan(panning: i16) -> f32 {
    panning as f32 / PAN_DIVISOR
}
