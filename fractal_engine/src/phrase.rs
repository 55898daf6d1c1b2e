// Phrases and the phrase mutator.
//
// A phrase is an ordered list of notes positioned on a tick grid
// (`TICKS_PER_BEAT` ticks per beat, four beats per bar). Pitches are stored
// as named scale degrees relative to the chord or key root, so a phrase can
// be replayed over any harmony.
//
// Mutations never modify a phrase in place: each transform builds a new
// `Phrase` from the old one.
// - transpose: shift by {−4, −3, 3, 4} semitones, remapped to the nearest
//   named degree
// - invert: mirror every degree around the phrase's first degree
// - rhythm-vary: with 50% chance, merge one pair of adjacent short notes
// - jitter: perturb rendered onsets by at most ±0.2 beat (applied at render
//   time, see `jitter_onset`)
//
// The blues brain holds one ensemble-wide `MutationKind` and applies it to
// every library phrase it plays until the kind is re-rolled.

use crate::event::Technique;
use fractal_prng::SeededRng;
use serde::{Deserialize, Serialize};

pub const TICKS_PER_BEAT: u32 = 12;
pub const BEATS_PER_BAR: u32 = 4;
pub const TICKS_PER_BAR: u32 = TICKS_PER_BEAT * BEATS_PER_BAR;

/// Notes at or below this length count as "short" for rhythm variation.
pub const SHORT_NOTE_TICKS: u32 = TICKS_PER_BEAT / 2;

/// Largest onset perturbation applied by jitter, in beats.
pub const MAX_JITTER_BEATS: f64 = 0.2;

/// Semitone offsets a transpose mutation draws from.
pub const TRANSPOSE_OFFSETS: [i8; 4] = [-4, -3, 3, 4];

/// Longest phrase a library may hold, in bars.
pub const MAX_PHRASE_BARS: u32 = 64;

/// A named scale degree, spanning a twelfth above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Degree {
    #[serde(rename = "1")]
    Root,
    #[serde(rename = "b2")]
    FlatSecond,
    #[serde(rename = "2")]
    Second,
    #[serde(rename = "b3")]
    FlatThird,
    #[serde(rename = "3")]
    Third,
    #[serde(rename = "4")]
    Fourth,
    #[serde(rename = "#4")]
    SharpFourth,
    #[serde(rename = "5")]
    Fifth,
    #[serde(rename = "b6")]
    FlatSixth,
    #[serde(rename = "6")]
    Sixth,
    #[serde(rename = "b7")]
    FlatSeventh,
    #[serde(rename = "7")]
    Seventh,
    #[serde(rename = "8")]
    Octave,
    #[serde(rename = "9")]
    Ninth,
    #[serde(rename = "b10")]
    FlatTenth,
    #[serde(rename = "10")]
    Tenth,
    #[serde(rename = "11")]
    Eleventh,
    #[serde(rename = "12")]
    Twelfth,
}

impl Degree {
    pub const ALL: [Degree; 18] = [
        Degree::Root,
        Degree::FlatSecond,
        Degree::Second,
        Degree::FlatThird,
        Degree::Third,
        Degree::Fourth,
        Degree::SharpFourth,
        Degree::Fifth,
        Degree::FlatSixth,
        Degree::Sixth,
        Degree::FlatSeventh,
        Degree::Seventh,
        Degree::Octave,
        Degree::Ninth,
        Degree::FlatTenth,
        Degree::Tenth,
        Degree::Eleventh,
        Degree::Twelfth,
    ];

    pub fn semitones(self) -> i32 {
        match self {
            Degree::Root => 0,
            Degree::FlatSecond => 1,
            Degree::Second => 2,
            Degree::FlatThird => 3,
            Degree::Third => 4,
            Degree::Fourth => 5,
            Degree::SharpFourth => 6,
            Degree::Fifth => 7,
            Degree::FlatSixth => 8,
            Degree::Sixth => 9,
            Degree::FlatSeventh => 10,
            Degree::Seventh => 11,
            Degree::Octave => 12,
            Degree::Ninth => 14,
            Degree::FlatTenth => 15,
            Degree::Tenth => 16,
            Degree::Eleventh => 17,
            Degree::Twelfth => 19,
        }
    }

    /// The named degree closest to `semitones`, folding by octaves into the
    /// named span first. Ties go to the lower degree.
    pub fn nearest(semitones: i32) -> Degree {
        let top = Degree::Twelfth.semitones();
        let mut s = semitones;
        while s < 0 {
            s += 12;
        }
        while s > top {
            s -= 12;
        }
        let mut best = Degree::Root;
        let mut best_dist = i32::MAX;
        for d in Degree::ALL {
            let dist = (d.semitones() - s).abs();
            if dist < best_dist {
                best = d;
                best_dist = dist;
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseNote {
    pub tick: u32,
    pub duration: u32,
    pub degree: Degree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique: Option<Technique>,
}

impl PhraseNote {
    pub fn new(tick: u32, duration: u32, degree: Degree) -> Self {
        PhraseNote {
            tick,
            duration,
            degree,
            technique: None,
        }
    }

    pub fn with(mut self, technique: Technique) -> Self {
        self.technique = Some(technique);
        self
    }

    pub fn end_tick(&self) -> u32 {
        self.tick.saturating_add(self.duration)
    }
}

/// An ordered note list. Deserialized phrases go through `Phrase::new`, so
/// notes are always sorted by onset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PhraseData")]
pub struct Phrase {
    pub id: String,
    pub notes: Vec<PhraseNote>,
}

#[derive(Deserialize)]
struct PhraseData {
    id: String,
    notes: Vec<PhraseNote>,
}

impl From<PhraseData> for Phrase {
    fn from(data: PhraseData) -> Self {
        Phrase::new(data.id, data.notes)
    }
}

impl Phrase {
    /// Build a phrase, ordering notes by onset.
    pub fn new(id: impl Into<String>, mut notes: Vec<PhraseNote>) -> Self {
        notes.sort_by_key(|n| n.tick);
        Phrase {
            id: id.into(),
            notes,
        }
    }

    /// End tick of the longest-sounding note.
    pub fn length_ticks(&self) -> u32 {
        self.notes.iter().map(PhraseNote::end_tick).max().unwrap_or(0)
    }

    /// Length in whole bars (at least one).
    pub fn bar_length(&self) -> u32 {
        self.length_ticks().div_ceil(TICKS_PER_BAR).max(1)
    }

    /// Notes whose onset falls within bar `local_bar` of the phrase.
    pub fn notes_in_bar(&self, local_bar: u32) -> impl Iterator<Item = &PhraseNote> {
        let start = local_bar.saturating_mul(TICKS_PER_BAR);
        let end = start.saturating_add(TICKS_PER_BAR);
        self.notes
            .iter()
            .filter(move |n| n.tick >= start && n.tick < end)
    }

    fn map_degrees(&self, f: impl Fn(Degree) -> Degree) -> Phrase {
        Phrase {
            id: self.id.clone(),
            notes: self
                .notes
                .iter()
                .map(|n| PhraseNote {
                    degree: f(n.degree),
                    ..n.clone()
                })
                .collect(),
        }
    }

    /// Shift every degree by `offset` semitones, snapping to named degrees.
    pub fn transposed(&self, offset: i32) -> Phrase {
        self.map_degrees(|d| Degree::nearest(d.semitones() + offset))
    }

    /// Mirror every degree around the first note's degree.
    pub fn inverted(&self) -> Phrase {
        let Some(axis) = self.notes.first().map(|n| n.degree.semitones()) else {
            return self.clone();
        };
        self.map_degrees(|d| Degree::nearest(2 * axis - d.semitones()))
    }

    /// With 50% chance, merge the first adjacent pair of short notes found
    /// from a seeded start index: the first note absorbs the second's
    /// duration and the second is dropped.
    pub fn rhythm_varied(&self, rng: &mut SeededRng) -> Phrase {
        if !rng.random_bool(0.5) {
            return self.clone();
        }
        let pairs = self.notes.len().saturating_sub(1);
        let Some(start) = rng.next_index(pairs) else {
            return self.clone();
        };
        let mergeable = |i: usize| {
            let (a, b) = (&self.notes[i], &self.notes[i + 1]);
            a.duration <= SHORT_NOTE_TICKS
                && b.duration <= SHORT_NOTE_TICKS
                && b.tick == a.end_tick()
        };
        let Some(i) = (0..pairs).map(|k| (start + k) % pairs).find(|&i| mergeable(i)) else {
            return self.clone();
        };
        let mut notes = self.notes.clone();
        let absorbed = notes.remove(i + 1);
        notes[i].duration += absorbed.duration;
        Phrase {
            id: self.id.clone(),
            notes,
        }
    }

    /// Apply a mutation kind. Jitter and `None` leave the phrase unchanged;
    /// jitter acts on rendered onsets instead.
    pub fn mutated(&self, kind: MutationKind, rng: &mut SeededRng) -> Phrase {
        match kind {
            MutationKind::None | MutationKind::Jitter => self.clone(),
            MutationKind::Transpose(offset) => self.transposed(i32::from(offset)),
            MutationKind::Invert => self.inverted(),
            MutationKind::RhythmVary => self.rhythm_varied(rng),
        }
    }
}

/// The ensemble-wide mutation currently applied to library phrases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "offset", rename_all = "snake_case")]
pub enum MutationKind {
    #[default]
    None,
    Transpose(i8),
    Invert,
    RhythmVary,
    Jitter,
}

impl MutationKind {
    /// Draw a fresh mutation kind. Never returns `None`.
    pub fn roll(rng: &mut SeededRng) -> MutationKind {
        match rng.range_usize(0, 4) {
            0 => {
                let idx = rng.range_usize(0, TRANSPOSE_OFFSETS.len());
                MutationKind::Transpose(TRANSPOSE_OFFSETS[idx])
            }
            1 => MutationKind::Invert,
            2 => MutationKind::RhythmVary,
            _ => MutationKind::Jitter,
        }
    }
}

/// Perturb an onset by at most ±`MAX_JITTER_BEATS`, keeping it inside
/// `[0, bar_beats)`.
pub fn jitter_onset(onset: f64, rng: &mut SeededRng, bar_beats: f64) -> f64 {
    let delta = rng.range_f64(-MAX_JITTER_BEATS, MAX_JITTER_BEATS);
    let upper = (bar_beats - 1.0 / f64::from(TICKS_PER_BEAT)).max(0.0);
    (onset + delta).clamp(0.0, upper)
}

/// Convert a tick position to beats.
pub fn ticks_to_beats(ticks: u32) -> f64 {
    f64::from(ticks) / f64::from(TICKS_PER_BEAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lick() -> Phrase {
        Phrase::new(
            "lick",
            vec![
                PhraseNote::new(0, 6, Degree::Root),
                PhraseNote::new(6, 6, Degree::FlatThird),
                PhraseNote::new(12, 12, Degree::Fourth),
                PhraseNote::new(24, 24, Degree::Fifth),
            ],
        )
    }

    #[test]
    fn deserialized_notes_are_sorted() {
        let json = r#"{"id":"late_first","notes":[
            {"tick":24,"duration":12,"degree":"5"},
            {"tick":0,"duration":12,"degree":"1"}
        ]}"#;
        let phrase: Phrase = serde_json::from_str(json).unwrap();
        assert_eq!(phrase.notes[0].tick, 0);
        assert_eq!(phrase.notes[1].tick, 24);
        assert_eq!(phrase.inverted().notes[0].degree, Degree::Root);
    }

    #[test]
    fn end_tick_saturates() {
        let note = PhraseNote::new(u32::MAX - 2, u32::MAX, Degree::Root);
        assert_eq!(note.end_tick(), u32::MAX);
    }

    #[test]
    fn nearest_degree_ties_go_low_and_fold() {
        assert_eq!(Degree::nearest(13), Degree::Octave);
        assert_eq!(Degree::nearest(18), Degree::Eleventh);
        assert_eq!(Degree::nearest(-3), Degree::Sixth);
        assert_eq!(Degree::nearest(22), Degree::FlatSeventh);
        for d in Degree::ALL {
            assert_eq!(Degree::nearest(d.semitones()), d);
        }
    }

    #[test]
    fn transpose_shifts_and_snaps() {
        let up = lick().transposed(4);
        let degrees: Vec<Degree> = up.notes.iter().map(|n| n.degree).collect();
        assert_eq!(
            degrees,
            vec![Degree::Third, Degree::Fifth, Degree::Sixth, Degree::Seventh]
        );
        // Original untouched.
        assert_eq!(lick().notes[0].degree, Degree::Root);
    }

    #[test]
    fn invert_mirrors_around_first_degree() {
        let p = Phrase::new(
            "p",
            vec![
                PhraseNote::new(0, 12, Degree::Fifth),
                PhraseNote::new(12, 12, Degree::Sixth),
                PhraseNote::new(24, 12, Degree::Fourth),
            ],
        );
        let inv = p.inverted();
        let degrees: Vec<Degree> = inv.notes.iter().map(|n| n.degree).collect();
        assert_eq!(degrees, vec![Degree::Fifth, Degree::Fourth, Degree::Sixth]);
        assert_eq!(Phrase::new("empty", vec![]).inverted().notes.len(), 0);
    }

    #[test]
    fn rhythm_vary_merges_adjacent_short_notes_or_keeps() {
        let original = lick();
        let mut merged_seen = false;
        for seed in 0..64 {
            let mut rng = SeededRng::new(seed);
            let varied = original.rhythm_varied(&mut rng);
            if varied.notes.len() == original.notes.len() {
                assert_eq!(varied, original);
            } else {
                merged_seen = true;
                assert_eq!(varied.notes.len(), 3);
                assert_eq!(varied.notes[0].duration, 12);
                assert_eq!(varied.length_ticks(), original.length_ticks());
            }
        }
        assert!(merged_seen, "50% merge should happen for some seed");
    }

    #[test]
    fn bar_length_from_longest_note() {
        assert_eq!(lick().bar_length(), 1);
        let long = Phrase::new("l", vec![PhraseNote::new(40, 20, Degree::Root)]);
        assert_eq!(long.bar_length(), 2);
        assert_eq!(Phrase::new("e", vec![]).bar_length(), 1);
    }

    #[test]
    fn notes_in_bar_windows_by_tick() {
        let p = Phrase::new(
            "two-bar",
            vec![
                PhraseNote::new(0, 12, Degree::Root),
                PhraseNote::new(47, 1, Degree::Second),
                PhraseNote::new(48, 12, Degree::Third),
            ],
        );
        assert_eq!(p.notes_in_bar(0).count(), 2);
        assert_eq!(p.notes_in_bar(1).count(), 1);
        assert_eq!(p.notes_in_bar(2).count(), 0);
    }

    #[test]
    fn jitter_is_bounded() {
        let mut rng = SeededRng::new(5);
        for i in 0..1000 {
            let onset = f64::from(i % 4);
            let j = jitter_onset(onset, &mut rng, 4.0);
            assert!((j - onset).abs() <= MAX_JITTER_BEATS + 1e-12);
            assert!((0.0..4.0).contains(&j));
        }
    }

    #[test]
    fn mutation_roll_never_none() {
        let mut rng = SeededRng::new(77);
        for _ in 0..200 {
            let kind = MutationKind::roll(&mut rng);
            assert_ne!(kind, MutationKind::None);
            if let MutationKind::Transpose(o) = kind {
                assert!(TRANSPOSE_OFFSETS.contains(&o));
            }
        }
    }
}
