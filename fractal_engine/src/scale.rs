// Key and scale support.
//
// Each mood maps onto a mode (see `Mood::default_scale`), and the blueprint
// may override it. Blues pieces additionally use the hexatonic blues scale.
//
// This module provides:
// - Scale definitions with their interval patterns
// - Pitch-to-degree mapping and snapping to the nearest in-scale pitch
// - Degree-to-pitch conversion in a given register
// - Diatonic triad quality per degree, used by the non-blues harmony walk
//
// Used by dna.rs (root snapping + chord quality) and render.rs (melodic
// figures, sparkles, harmony lines).

use crate::types::ChordQuality;
use serde::{Deserialize, Serialize};

/// Interval pattern from the tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Major: 1 2 3 4 5 6 7
    Ionian,
    /// Minor with raised 6th.
    Dorian,
    /// Minor with flat 2nd.
    Phrygian,
    /// Major with raised 4th.
    Lydian,
    /// Major with flat 7th.
    Mixolydian,
    /// Natural minor.
    Aeolian,
    /// Hexatonic blues: 1 b3 4 #4 5 b7
    Blues,
}

impl Scale {
    /// Semitone intervals from the tonic to each scale degree.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Ionian => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }

    /// The 12 pitch classes that are in the scale, indexed relative to the
    /// tonic.
    pub fn pitch_classes(self) -> [bool; 12] {
        let mut pcs = [false; 12];
        for &interval in self.intervals() {
            pcs[interval as usize] = true;
        }
        pcs
    }
}

/// A scale anchored on a tonic pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub scale: Scale,
    /// Pitch class of the tonic (0 = C, 2 = D, 9 = A, ...).
    pub tonic_pc: u8,
}

impl Key {
    pub fn new(scale: Scale, tonic_pc: u8) -> Self {
        Key {
            scale,
            tonic_pc: tonic_pc % 12,
        }
    }

    fn relative_pc(&self, pitch: u8) -> u8 {
        (pitch % 12 + 12 - self.tonic_pc) % 12
    }

    /// Check if a MIDI pitch is in this key.
    pub fn contains(&self, pitch: u8) -> bool {
        self.scale.pitch_classes()[self.relative_pc(pitch) as usize]
    }

    /// All in-key pitches in `[low, high]`.
    pub fn pitches_in_range(&self, low: u8, high: u8) -> Vec<u8> {
        (low..=high).filter(|&p| self.contains(p)).collect()
    }

    /// Snap a pitch to the nearest in-key pitch, preferring the lower
    /// neighbour on ties.
    pub fn snap(&self, pitch: u8) -> u8 {
        if self.contains(pitch) {
            return pitch;
        }
        for offset in 1u8..=6 {
            if pitch >= offset && self.contains(pitch - offset) {
                return pitch - offset;
            }
            if pitch <= 127 - offset && self.contains(pitch + offset) {
                return pitch + offset;
            }
        }
        pitch
    }

    /// Scale degree (0-based) of a pitch, or `None` if it is out of key.
    pub fn degree_of(&self, pitch: u8) -> Option<usize> {
        let pc = self.relative_pc(pitch);
        self.scale.intervals().iter().position(|&iv| iv == pc)
    }

    /// Pitch of a scale degree at or above `base` (a C-anchored register
    /// pitch). Degrees past the scale length wrap into higher octaves.
    pub fn degree_to_pitch(&self, degree: usize, base: u8) -> u8 {
        let intervals = self.scale.intervals();
        let octave = (degree / intervals.len()) as u16;
        let semis =
            u16::from(self.tonic_pc) + u16::from(intervals[degree % intervals.len()]) + octave * 12;
        (u16::from(base) + semis).min(127) as u8
    }

    /// Quality of the triad stacked in thirds on `degree`.
    ///
    /// Only seven-note modes have diatonic triads; the blues scale answers
    /// `Dominant` for every degree.
    pub fn triad_quality(&self, degree: usize) -> ChordQuality {
        let intervals = self.scale.intervals();
        if intervals.len() != 7 {
            return ChordQuality::Dominant;
        }
        let at = |d: usize| u16::from(intervals[d % 7]) + 12 * (d / 7) as u16;
        let root = at(degree);
        let third = at(degree + 2) - root;
        let fifth = at(degree + 4) - root;
        match (third, fifth) {
            (4, 7) => ChordQuality::Major,
            (3, 7) => ChordQuality::Minor,
            (3, 6) => ChordQuality::Diminished,
            _ => ChordQuality::Major,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_minor_membership() {
        let key = Key::new(Scale::Aeolian, 9);
        // A4=69, B4=71, C5=72, D5=74, E5=76, F5=77, G5=79
        for p in [69, 71, 72, 74, 76, 77, 79] {
            assert!(key.contains(p), "{p} should be in A minor");
        }
        assert!(!key.contains(70)); // Bb
        assert!(!key.contains(73)); // C#
    }

    #[test]
    fn snap_prefers_lower_neighbour() {
        let key = Key::new(Scale::Ionian, 0);
        assert_eq!(key.snap(60), 60);
        assert_eq!(key.snap(61), 60); // C# -> C
        assert_eq!(key.snap(66), 65); // F# -> F
    }

    #[test]
    fn degree_roundtrip() {
        let key = Key::new(Scale::Dorian, 2);
        let p = key.degree_to_pitch(4, 60);
        assert_eq!(p, 69); // A above D
        assert_eq!(key.degree_of(p), Some(4));
        assert_eq!(key.degree_to_pitch(7, 60), 74); // octave wrap
    }

    #[test]
    fn major_scale_triads() {
        let key = Key::new(Scale::Ionian, 0);
        assert_eq!(key.triad_quality(0), ChordQuality::Major);
        assert_eq!(key.triad_quality(1), ChordQuality::Minor);
        assert_eq!(key.triad_quality(4), ChordQuality::Major);
        assert_eq!(key.triad_quality(5), ChordQuality::Minor);
        assert_eq!(key.triad_quality(6), ChordQuality::Diminished);
    }

    #[test]
    fn blues_scale_is_hexatonic() {
        let key = Key::new(Scale::Blues, 4);
        assert_eq!(Scale::Blues.intervals().len(), 6);
        assert!(key.contains(4 + 60)); // E
        assert!(key.contains(10 + 60)); // Bb, the blue note over E
        assert_eq!(key.triad_quality(0), ChordQuality::Dominant);
    }
}
