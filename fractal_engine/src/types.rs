// Shared vocabulary types for the engine.
//
// Layers, moods, genres, chord qualities and the small style tags that flow
// between the DNA generator, the brains and the renderers. Everything here is
// a closed enumeration with serde support so blueprints and libraries can be
// authored in JSON, and so unknown names fail at load time.
//
// See also: `timbre.rs` for the timbre enumeration, `scale.rs` for how a mood
// maps onto a mode.

use crate::scale::Scale;
use serde::{Deserialize, Serialize};

/// One musical role rendered by the brain.
///
/// Ordering matters: brains render active layers in `Layer::ALL` order, and
/// `BTreeMap<Layer, _>` iteration follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Sustained pad chords. Rendered unconditionally.
    Accompaniment,
    Bass,
    Drums,
    Melody,
    Harmony,
    PianoAccompaniment,
    Sparkles,
    SoundFx,
}

impl Layer {
    pub const ALL: [Layer; 8] = [
        Layer::Accompaniment,
        Layer::Bass,
        Layer::Drums,
        Layer::Melody,
        Layer::Harmony,
        Layer::PianoAccompaniment,
        Layer::Sparkles,
        Layer::SoundFx,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Mood selector. Drives tempo, default mode, tension phases and the tagged
/// phrase groups a brain draws themes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Melancholic,
    Dreamy,
    Calm,
    Dark,
    Epic,
    Joyful,
    Enthusiastic,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Melancholic,
        Mood::Dreamy,
        Mood::Calm,
        Mood::Dark,
        Mood::Epic,
        Mood::Joyful,
        Mood::Enthusiastic,
    ];

    /// Tempo bounds in BPM that the DNA generator draws the base tempo from.
    pub fn tempo_range(self) -> (f64, f64) {
        match self {
            Mood::Melancholic => (60.0, 72.0),
            Mood::Dreamy => (64.0, 78.0),
            Mood::Calm => (66.0, 80.0),
            Mood::Dark => (56.0, 68.0),
            Mood::Epic => (80.0, 100.0),
            Mood::Joyful => (96.0, 118.0),
            Mood::Enthusiastic => (104.0, 126.0),
        }
    }

    /// The mode used when the blueprint does not specify one.
    pub fn default_scale(self) -> Scale {
        match self {
            Mood::Melancholic => Scale::Aeolian,
            Mood::Dreamy => Scale::Lydian,
            Mood::Calm => Scale::Ionian,
            Mood::Dark => Scale::Phrygian,
            Mood::Epic => Scale::Dorian,
            Mood::Joyful => Scale::Ionian,
            Mood::Enthusiastic => Scale::Mixolydian,
        }
    }

    /// Starting point on the (valence, arousal) plane, both in [0, 1].
    pub fn axes(self) -> (f64, f64) {
        match self {
            Mood::Melancholic => (0.25, 0.30),
            Mood::Dreamy => (0.60, 0.25),
            Mood::Calm => (0.65, 0.15),
            Mood::Dark => (0.10, 0.45),
            Mood::Epic => (0.55, 0.80),
            Mood::Joyful => (0.90, 0.65),
            Mood::Enthusiastic => (0.80, 0.90),
        }
    }

    pub fn is_minor(self) -> bool {
        matches!(self, Mood::Melancholic | Mood::Dark | Mood::Epic)
    }
}

/// Genre selector. Picks the brain variant and the DNA harmony walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Ambient,
    Blues,
}

/// Chord quality of a `GhostChord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant,
    Diminished,
}

impl ChordQuality {
    /// Semitone intervals above the root. Dominant chords carry the flat 7th.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Dominant => &[0, 4, 7, 10],
            ChordQuality::Diminished => &[0, 3, 6],
        }
    }

    /// Interval of the chord's third.
    pub fn third(self) -> u8 {
        self.intervals()[1]
    }

    /// Interval of the chord's fifth.
    pub fn fifth(self) -> u8 {
        self.intervals()[2]
    }
}

/// Chord inversion: which chord tone sits in the bass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inversion {
    #[default]
    Root,
    First,
    Second,
}

impl Inversion {
    /// Number of lowest chord tones raised by an octave.
    pub fn rotation(self) -> usize {
        match self {
            Inversion::Root => 0,
            Inversion::First => 1,
            Inversion::Second => 2,
        }
    }
}

/// Seeded binary rhythmic feel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmicFeel {
    /// Swung eighths: the offbeat eighth lands two thirds into the beat.
    Shuffle,
    Straight,
}

impl RhythmicFeel {
    /// Offset in beats of the offbeat eighth note.
    pub fn offbeat(self) -> f64 {
        match self {
            RhythmicFeel::Shuffle => 2.0 / 3.0,
            RhythmicFeel::Straight => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BassStyle {
    /// One root held for the whole bar.
    Drone,
    /// Root on beats 1 and 3, fifth in between.
    Pulse,
    /// Root / fifth / octave / fifth in quarters.
    RootFifth,
    /// Quarter-note walking line approaching the next chord.
    Walking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumStyle {
    /// Sparse, soft textural hits.
    Ambient,
    /// Brushes on a swung ride pattern.
    Brushes,
    /// Shuffle groove: swung hats, backbeat on 2 and 4.
    ShuffleGroove,
    /// Straight eighths, backbeat on 2 and 4.
    StraightGroove,
}

/// Register preference for a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    Low,
    #[default]
    Mid,
    High,
}

impl Register {
    /// MIDI pitch of the C that anchors this register.
    pub fn base_pitch(self) -> u8 {
        match self {
            Register::Low => 36,
            Register::Mid => 60,
            Register::High => 72,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_order_is_stable() {
        for (i, layer) in Layer::ALL.iter().enumerate() {
            assert_eq!(layer.index(), i);
        }
        assert!(Layer::Accompaniment < Layer::SoundFx);
    }

    #[test]
    fn tempo_ranges_are_ordered() {
        for mood in Mood::ALL {
            let (lo, hi) = mood.tempo_range();
            assert!(lo < hi, "{mood:?} has inverted tempo range");
        }
    }

    #[test]
    fn chord_intervals_start_at_root() {
        for q in [
            ChordQuality::Major,
            ChordQuality::Minor,
            ChordQuality::Dominant,
            ChordQuality::Diminished,
        ] {
            assert_eq!(q.intervals()[0], 0);
        }
        assert_eq!(ChordQuality::Dominant.intervals().len(), 4);
    }

    #[test]
    fn layer_serde_names() {
        let json = serde_json::to_string(&Layer::PianoAccompaniment).unwrap();
        assert_eq!(json, "\"piano_accompaniment\"");
        let back: Layer = serde_json::from_str("\"sound_fx\"").unwrap();
        assert_eq!(back, Layer::SoundFx);
    }
}
