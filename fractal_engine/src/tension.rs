// Tension model: a small oscillator bank yielding 0..1 tension per bar.
//
// Four bands, each a slow sine amplitude-modulated by a faster one at a small
// depth:
//
//   band(t) = sin(2πt / period + phase) × (1 + depth × sin(2πt / mod_period))
//             ─────────────────────────────────────────────────────────────
//                                   1 + depth
//
// which stays within [−1, 1]. The bands are mixed at fixed weights that sum
// to 1, so the mix is also in [−1, 1], then renormalized to [0, 1].
//
// Elapsed time is derived from the bar index and tempo only
// (`bar × beats_per_bar × 60 / bpm`); the model holds no state, so the
// tension of any bar can be re-derived independently. Non-finite
// intermediate values (zero periods, zero tempo) degrade to the neutral 0.5.

use crate::types::Mood;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Mixing weights of the four bands (slowest first).
pub const BAND_WEIGHTS: [f64; 4] = [0.15, 0.35, 0.30, 0.20];

/// Neutral tension returned when the arithmetic degenerates.
pub const NEUTRAL_TENSION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensionBand {
    /// Period of the main sine in seconds.
    pub period_secs: f64,
    /// Phase offset in radians.
    pub phase: f64,
    /// Period of the modulating sine in seconds.
    pub mod_period_secs: f64,
    /// Modulation depth, typically 0.05–0.2.
    pub mod_depth: f64,
}

impl TensionBand {
    fn value(&self, t: f64) -> f64 {
        let carrier = (TAU * t / self.period_secs + self.phase).sin();
        let depth = self.mod_depth.abs();
        let modulator = 1.0 + depth * (TAU * t / self.mod_period_secs).sin();
        let v = carrier * modulator / (1.0 + depth);
        if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensionModel {
    pub bands: [TensionBand; 4],
    pub beats_per_bar: u32,
}

impl TensionModel {
    /// Default bank with mood-specific phases. Periods range from a ten
    /// minute arc down to a sub-minute swell.
    pub fn for_mood(mood: Mood) -> Self {
        let (p0, p1, p2, p3) = match mood {
            Mood::Melancholic => (-1.2, 0.4, 2.1, 0.9),
            Mood::Dreamy => (-0.8, 1.1, 0.3, 2.6),
            Mood::Calm => (-1.5, -0.6, 1.7, 0.2),
            Mood::Dark => (-0.3, 0.9, -1.4, 1.8),
            Mood::Epic => (-1.57, 0.0, 0.8, 1.2),
            Mood::Joyful => (0.2, 1.4, 2.4, -0.7),
            Mood::Enthusiastic => (0.5, 1.9, -0.2, 2.9),
        };
        TensionModel {
            bands: [
                TensionBand {
                    period_secs: 600.0,
                    phase: p0,
                    mod_period_secs: 47.0,
                    mod_depth: 0.10,
                },
                TensionBand {
                    period_secs: 240.0,
                    phase: p1,
                    mod_period_secs: 31.0,
                    mod_depth: 0.15,
                },
                TensionBand {
                    period_secs: 120.0,
                    phase: p2,
                    mod_period_secs: 17.0,
                    mod_depth: 0.10,
                },
                TensionBand {
                    period_secs: 45.0,
                    phase: p3,
                    mod_period_secs: 7.0,
                    mod_depth: 0.20,
                },
            ],
            beats_per_bar: 4,
        }
    }

    /// Seconds from the start of the piece to the downbeat of `bar`.
    pub fn elapsed_secs(&self, bar: u32, bpm: f64) -> f64 {
        f64::from(bar) * f64::from(self.beats_per_bar) * 60.0 / bpm
    }

    /// Tension for `bar` at `bpm`, in [0, 1].
    pub fn tension(&self, bar: u32, bpm: f64) -> f64 {
        let t = self.elapsed_secs(bar, bpm);
        if !t.is_finite() {
            return NEUTRAL_TENSION;
        }
        let mix: f64 = self
            .bands
            .iter()
            .zip(BAND_WEIGHTS)
            .map(|(band, w)| band.value(t) * w)
            .sum();
        let normalized = (mix + 1.0) / 2.0;
        if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            NEUTRAL_TENSION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = BAND_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tension_in_unit_range_for_all_moods() {
        for mood in Mood::ALL {
            let model = TensionModel::for_mood(mood);
            for bar in 0..2000 {
                let v = model.tension(bar, 72.0);
                assert!((0.0..=1.0).contains(&v), "{mood:?} bar {bar}: {v}");
            }
        }
    }

    #[test]
    fn tension_is_pure() {
        let model = TensionModel::for_mood(Mood::Melancholic);
        let a: Vec<f64> = (0..64).map(|b| model.tension(b, 66.0)).collect();
        let b: Vec<f64> = (0..64).rev().map(|b| model.tension(b, 66.0)).collect();
        let b: Vec<f64> = b.into_iter().rev().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_parameters_stay_in_range() {
        let mut model = TensionModel::for_mood(Mood::Dark);
        model.bands[0].period_secs = 0.0;
        model.bands[1].mod_period_secs = 0.0;
        model.bands[2].mod_depth = 50.0;
        for bar in 0..200 {
            let v = model.tension(bar, 90.0);
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(model.tension(3, 0.0), NEUTRAL_TENSION);
        assert!((0.0..=1.0).contains(&model.tension(3, f64::NAN)));
    }

    #[test]
    fn bar_zero_depends_only_on_phases() {
        let model = TensionModel::for_mood(Mood::Epic);
        let expected: f64 = model
            .bands
            .iter()
            .zip(BAND_WEIGHTS)
            .map(|(b, w)| b.phase.sin() / (1.0 + b.mod_depth) * w)
            .sum();
        let v = model.tension(0, 120.0);
        assert!((v - (expected + 1.0) / 2.0).abs() < 1e-12);
        assert_eq!(v, model.tension(0, 60.0));
    }
}
