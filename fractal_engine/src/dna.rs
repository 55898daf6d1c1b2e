// Suite DNA: the once-per-run harmony, tempo and style plan.
//
// Generated once per session from (total bars, mood, genre, key, navigator
// sections, phrase library, PRNG) and immutable afterwards. Draw order is
// fixed so a seed always produces the same DNA: tempo, feel, styles, harmony,
// solo plans.
//
// Harmony is a track of `GhostChord`s produced section by section. Each
// section's walk runs until its bar budget is spent; the final chord of a
// section is clipped to the remainder, so the track always covers exactly
// `total_bars` with no gaps.
// - Blues: weighted walk over I / IV / V / bVI with fixed transition
//   weights, durations of 4 (60%), 2 (30%) or 8 (10%) bars, and a 30% chance
//   of a first/second inversion once the track is non-empty.
// - Other genres: the root wanders by an interval drawn from
//   {0, +5, +7, −5, +4, +2, −7}, snapped into the key; the chord takes the
//   key's diatonic triad quality; durations come from {4, 8, 4, 2, 4}.
//
// Weighted branches resolve through `fractal_prng::select_branch`, so a roll
// of exactly 0 deterministically selects the last enumerated branch.
//
// Solo plans: every section naming a solo-plan source tag gets one of the
// tag's plan ids. Each tag's id list is seed-shuffled once, then handed out
// round-robin in section order.

use crate::blueprint::{Blueprint, TempoRange};
use crate::library::PhraseLibrary;
use crate::navigator::BlueprintNavigator;
use crate::scale::Key;
use crate::types::{BassStyle, ChordQuality, DrumStyle, Genre, Inversion, Mood, RhythmicFeel};
use fractal_prng::{SeededRng, select_branch};
use serde::Serialize;
use std::collections::BTreeMap;

/// MIDI pitch of the C under which chord roots are placed.
const ROOT_OCTAVE_BASE: u8 = 48;

/// Intervals the non-blues root walk draws from.
pub const WANDER_INTERVALS: [i32; 7] = [0, 5, 7, -5, 4, 2, -7];

/// Durations the non-blues walk draws from (uniformly, duplicates weight 4).
pub const WANDER_DURATIONS: [u32; 5] = [4, 8, 4, 2, 4];

/// Blues chord durations and their weights.
pub const BLUES_DURATIONS: [(u32, f64); 3] = [(4, 0.6), (2, 0.3), (8, 0.1)];

/// A harmonic span: one chord held over one or more bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GhostChord {
    /// MIDI pitch of the root.
    pub root: u8,
    pub quality: ChordQuality,
    pub start_bar: u32,
    pub duration_bars: u32,
    pub inversion: Inversion,
}

impl GhostChord {
    /// First bar after the chord.
    pub fn end_bar(&self) -> u32 {
        self.start_bar + self.duration_bars
    }

    pub fn contains(&self, bar: u32) -> bool {
        bar >= self.start_bar && bar < self.end_bar()
    }

    /// Pitch class of the root.
    pub fn root_pc(&self) -> u8 {
        self.root % 12
    }

    /// Voiced chord tones, inversion applied, with the lowest tone placed in
    /// `[base, base + 12)`.
    pub fn pitches(&self, base: u8) -> Vec<u8> {
        let intervals = self.quality.intervals();
        let rotation = self.inversion.rotation().min(intervals.len() - 1);
        let mut tones: Vec<i32> = intervals.iter().map(|&iv| i32::from(iv)).collect();
        for tone in tones.iter_mut().take(rotation) {
            *tone += 12;
        }
        tones.sort_unstable();
        let lowest = i32::from(self.root_pc()) + tones[0];
        let shift = i32::from(base) + (lowest - i32::from(base)).rem_euclid(12) - lowest;
        tones
            .iter()
            .map(|&t| (i32::from(self.root_pc()) + t + shift).clamp(0, 127) as u8)
            .collect()
    }

    /// The sounding bass note in `[base, base + 12)`: the root, or the third
    /// or fifth for inverted chords.
    pub fn bass_note(&self, base: u8) -> u8 {
        self.pitches(base)[0]
    }

    /// The root placed in `[base, base + 12)`.
    pub fn root_in(&self, base: u8) -> u8 {
        let offset = (i32::from(self.root_pc()) - i32::from(base)).rem_euclid(12);
        (i32::from(base) + offset).clamp(0, 127) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteDna {
    pub total_bars: u32,
    pub harmony: Vec<GhostChord>,
    /// Base tempo in BPM.
    pub base_tempo: f64,
    pub feel: RhythmicFeel,
    pub bass_style: BassStyle,
    pub drum_style: DrumStyle,
    /// Section id → solo plan id.
    pub solo_plans: BTreeMap<String, String>,
}

impl SuiteDna {
    /// Chord sounding at `epoch` (looping over the piece).
    pub fn chord_at(&self, epoch: u32) -> Option<&GhostChord> {
        if self.total_bars == 0 {
            return None;
        }
        let bar = epoch % self.total_bars;
        self.harmony.iter().find(|c| c.contains(bar))
    }

    /// The chord following the one at `epoch`, wrapping to the first.
    pub fn next_chord(&self, epoch: u32) -> Option<&GhostChord> {
        let current = self.chord_at(epoch)?;
        let idx = self.harmony.iter().position(|c| c == current)?;
        self.harmony.get((idx + 1) % self.harmony.len())
    }

    /// Sum of all chord spans.
    pub fn harmony_bars(&self) -> u32 {
        self.harmony.iter().map(|c| c.duration_bars).sum()
    }

    pub fn solo_plan_for(&self, section_id: &str) -> Option<&str> {
        self.solo_plans.get(section_id).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Blues walk
// ---------------------------------------------------------------------------

/// Scale step of a blues chord relative to the key tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BluesStep {
    Tonic,
    Subdominant,
    Dominant,
    FlatSix,
}

impl BluesStep {
    /// Outgoing transitions with their weights, in enumeration order.
    pub fn transitions(self) -> &'static [(BluesStep, f64)] {
        use BluesStep::*;
        match self {
            Tonic => &[(Subdominant, 0.6), (Dominant, 0.2), (FlatSix, 0.2)],
            Subdominant => &[(Tonic, 0.7), (Dominant, 0.3)],
            Dominant => &[(Tonic, 0.8), (Subdominant, 0.2)],
            FlatSix => &[(Dominant, 0.9), (Subdominant, 0.1)],
        }
    }

    /// Resolve a roll in [0, 1) to the next step.
    pub fn next(self, roll: f64) -> BluesStep {
        let table = self.transitions();
        let weights: Vec<f64> = table.iter().map(|&(_, w)| w).collect();
        let idx = select_branch(roll, &weights).unwrap_or(0);
        table[idx].0
    }

    pub fn semitones(self) -> u8 {
        match self {
            BluesStep::Tonic => 0,
            BluesStep::Subdominant => 5,
            BluesStep::Dominant => 7,
            BluesStep::FlatSix => 8,
        }
    }

    pub fn quality(self) -> ChordQuality {
        match self {
            BluesStep::FlatSix => ChordQuality::Major,
            _ => ChordQuality::Dominant,
        }
    }
}

fn blues_duration(roll: f64) -> u32 {
    let weights: Vec<f64> = BLUES_DURATIONS.iter().map(|&(_, w)| w).collect();
    let idx = select_branch(roll, &weights).unwrap_or(0);
    BLUES_DURATIONS[idx].0
}

fn walk_blues(key: Key, budgets: &[u32], rng: &mut SeededRng) -> Vec<GhostChord> {
    blues_walk(key, budgets, || rng.next_f64())
}

/// The blues walk over per-section bar budgets, drawing every decision from
/// `roll` (values in [0, 1)). Each chord takes up to four rolls in a fixed
/// order: next step, duration, inversion chance, inversion choice.
pub fn blues_walk(key: Key, budgets: &[u32], mut roll: impl FnMut() -> f64) -> Vec<GhostChord> {
    let base = ROOT_OCTAVE_BASE + key.tonic_pc;
    let mut track: Vec<GhostChord> = Vec::new();
    let mut step = BluesStep::Tonic;
    let mut bar = 0;
    for &budget in budgets {
        let mut remaining = budget;
        while remaining > 0 {
            if !track.is_empty() {
                step = step.next(roll());
            }
            let duration = blues_duration(roll()).min(remaining);
            let inversion = if !track.is_empty() && roll() < 0.3 {
                if roll() < 0.5 {
                    Inversion::First
                } else {
                    Inversion::Second
                }
            } else {
                Inversion::Root
            };
            track.push(GhostChord {
                root: base + step.semitones(),
                quality: step.quality(),
                start_bar: bar,
                duration_bars: duration,
                inversion,
            });
            bar += duration;
            remaining -= duration;
        }
    }
    track
}

// ---------------------------------------------------------------------------
// Modal wander
// ---------------------------------------------------------------------------

fn walk_modal(key: Key, budgets: &[u32], rng: &mut SeededRng) -> Vec<GhostChord> {
    let base = i32::from(ROOT_OCTAVE_BASE + key.tonic_pc);
    let mut track = Vec::new();
    // Semitones above the tonic of the current root, always in 0..12.
    let mut rel: i32 = 0;
    let mut bar = 0;
    for &budget in budgets {
        let mut remaining = budget;
        while remaining > 0 {
            if !track.is_empty() {
                let interval = WANDER_INTERVALS[rng.range_usize(0, WANDER_INTERVALS.len())];
                let raw = (base + (rel + interval).rem_euclid(12)).clamp(0, 127) as u8;
                rel = (i32::from(key.snap(raw)) - base).rem_euclid(12);
            }
            let duration =
                WANDER_DURATIONS[rng.range_usize(0, WANDER_DURATIONS.len())].min(remaining);
            let root = (base + rel) as u8;
            let quality = key
                .degree_of(root)
                .map(|d| key.triad_quality(d))
                .unwrap_or(ChordQuality::Major);
            track.push(GhostChord {
                root,
                quality,
                start_bar: bar,
                duration_bars: duration,
                inversion: Inversion::Root,
            });
            bar += duration;
            remaining -= duration;
        }
    }
    track
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

fn styles(
    genre: Genre,
    mood: Mood,
    feel: RhythmicFeel,
    rng: &mut SeededRng,
) -> (BassStyle, DrumStyle) {
    match genre {
        Genre::Blues => {
            let bass = if rng.random_bool(0.7) {
                BassStyle::Walking
            } else {
                BassStyle::RootFifth
            };
            let drums = match (feel, mood) {
                (_, Mood::Melancholic | Mood::Calm | Mood::Dreamy) => DrumStyle::Brushes,
                (RhythmicFeel::Shuffle, _) => DrumStyle::ShuffleGroove,
                (RhythmicFeel::Straight, _) => DrumStyle::StraightGroove,
            };
            (bass, drums)
        }
        Genre::Ambient => {
            let bass = if matches!(mood, Mood::Dark | Mood::Melancholic) {
                BassStyle::Drone
            } else if rng.random_bool(0.5) {
                BassStyle::Pulse
            } else {
                BassStyle::Drone
            };
            (bass, DrumStyle::Ambient)
        }
    }
}

fn assign_solo_plans(
    blueprint: &Blueprint,
    library: &PhraseLibrary,
    rng: &mut SeededRng,
) -> BTreeMap<String, String> {
    let mut pools: BTreeMap<&str, (Vec<String>, usize)> = BTreeMap::new();
    let mut plans = BTreeMap::new();
    for section in &blueprint.sections {
        let Some(tag) = section.solo_plan_source.as_deref() else {
            continue;
        };
        let (ids, cursor) = pools.entry(tag).or_insert_with(|| {
            let mut ids = library.solo_plan_ids(tag);
            rng.shuffle(&mut ids);
            (ids, 0)
        });
        if ids.is_empty() {
            tracing::debug!(section = %section.id, tag, "no solo plans for tag");
            continue;
        }
        plans.insert(section.id.clone(), ids[*cursor % ids.len()].clone());
        *cursor += 1;
    }
    plans
}

/// Generate the suite DNA for a session.
pub fn generate_suite_dna(
    blueprint: &Blueprint,
    navigator: &BlueprintNavigator,
    mood: Mood,
    genre: Genre,
    library: &PhraseLibrary,
    rng: &mut SeededRng,
) -> SuiteDna {
    let key = Key::new(
        blueprint.scale.unwrap_or_else(|| mood.default_scale()),
        blueprint.key_pc,
    );

    let TempoRange { min, max } = blueprint.tempo.unwrap_or_else(|| {
        let (min, max) = mood.tempo_range();
        TempoRange { min, max }
    });
    let base_tempo = rng.range_f64(min, max);

    let feel = if rng.random_bool(0.7) {
        RhythmicFeel::Shuffle
    } else {
        RhythmicFeel::Straight
    };
    let (bass_style, drum_style) = styles(genre, mood, feel, rng);

    let budgets: Vec<u32> = navigator
        .sections()
        .iter()
        .map(|s| s.range.bar_count)
        .collect();
    let harmony = match genre {
        Genre::Blues => walk_blues(key, &budgets, rng),
        Genre::Ambient => walk_modal(key, &budgets, rng),
    };

    let solo_plans = assign_solo_plans(blueprint, library, rng);

    tracing::debug!(
        chords = harmony.len(),
        base_tempo,
        ?feel,
        "generated suite DNA"
    );

    SuiteDna {
        total_bars: navigator.total_bars(),
        harmony,
        base_tempo,
        feel,
        bass_style,
        drum_style,
        solo_plans,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dna_for(bp: &Blueprint, total: u32, mood: Mood, genre: Genre, seed: u64) -> SuiteDna {
        let nav = BlueprintNavigator::new(bp, total).unwrap();
        let lib = PhraseLibrary::default_library();
        let mut rng = SeededRng::new(seed);
        generate_suite_dna(bp, &nav, mood, genre, &lib, &mut rng)
    }

    fn assert_covers(dna: &SuiteDna) {
        let mut next = 0;
        for chord in &dna.harmony {
            assert_eq!(chord.start_bar, next, "gap before {chord:?}");
            assert!(chord.duration_bars > 0);
            next = chord.end_bar();
        }
        assert_eq!(next, dna.total_bars);
        assert_eq!(dna.harmony_bars(), dna.total_bars);
    }

    #[test]
    fn harmony_covers_total_bars_exactly() {
        for seed in 0..20 {
            for total in [1, 7, 16, 33, 100] {
                let ambient = Blueprint::ambient_suite();
                let dna = dna_for(&ambient, total, Mood::Dreamy, Genre::Ambient, seed);
                assert_covers(&dna);
                let blues = Blueprint::blues_suite();
                let dna = dna_for(&blues, total, Mood::Joyful, Genre::Blues, seed);
                assert_covers(&dna);
            }
        }
    }

    #[test]
    fn zero_roll_selects_last_branch() {
        assert_eq!(BluesStep::Tonic.next(0.0), BluesStep::FlatSix);
        assert_eq!(BluesStep::Subdominant.next(0.0), BluesStep::Dominant);
        assert_eq!(BluesStep::Dominant.next(0.0), BluesStep::Subdominant);
        assert_eq!(BluesStep::FlatSix.next(0.0), BluesStep::Subdominant);
        // Interior rolls follow the weights.
        assert_eq!(BluesStep::Tonic.next(0.1), BluesStep::Subdominant);
        assert_eq!(BluesStep::Tonic.next(0.7), BluesStep::Dominant);
        assert_eq!(BluesStep::Tonic.next(0.9), BluesStep::FlatSix);
        assert_eq!(blues_duration(0.0), 8);
        assert_eq!(blues_duration(0.5), 4);
        assert_eq!(blues_duration(0.75), 2);
    }

    #[test]
    fn blues_track_opens_on_tonic_in_root_position() {
        let dna = dna_for(&Blueprint::blues_suite(), 48, Mood::Joyful, Genre::Blues, 3);
        let first = dna.harmony[0];
        assert_eq!(first.start_bar, 0);
        assert_eq!(first.root % 12, 4); // E
        assert_eq!(first.quality, ChordQuality::Dominant);
        assert_eq!(first.inversion, Inversion::Root);
    }

    #[test]
    fn modal_roots_stay_in_key() {
        let bp = Blueprint::ambient_suite();
        let dna = dna_for(&bp, 64, Mood::Melancholic, Genre::Ambient, 11);
        let key = Key::new(Mood::Melancholic.default_scale(), bp.key_pc);
        for chord in &dna.harmony {
            assert!(key.contains(chord.root), "{chord:?} out of key");
            assert!(chord.root >= ROOT_OCTAVE_BASE + bp.key_pc);
            assert!(chord.root < ROOT_OCTAVE_BASE + bp.key_pc + 12);
        }
    }

    #[test]
    fn tempo_within_mood_or_override() {
        let dna = dna_for(&Blueprint::ambient_suite(), 16, Mood::Dark, Genre::Ambient, 5);
        let (lo, hi) = Mood::Dark.tempo_range();
        assert!(dna.base_tempo >= lo && dna.base_tempo < hi);
        let dna = dna_for(&Blueprint::blues_suite(), 16, Mood::Dark, Genre::Blues, 5);
        assert!(dna.base_tempo >= 84.0 && dna.base_tempo < 104.0);
    }

    #[test]
    fn solo_plans_round_robin_over_shuffled_ids() {
        let bp = Blueprint::blues_suite();
        let dna = dna_for(&bp, 48, Mood::Joyful, Genre::Blues, 9);
        // Three sections name the source and three plans exist: all distinct.
        let assigned: std::collections::BTreeSet<&String> = dna.solo_plans.values().collect();
        assert_eq!(dna.solo_plans.len(), 3);
        assert_eq!(assigned.len(), 3);
        // Ambient suite names no source.
        let dna = dna_for(&Blueprint::ambient_suite(), 48, Mood::Calm, Genre::Ambient, 9);
        assert!(dna.solo_plans.is_empty());
    }

    #[test]
    fn same_seed_same_dna() {
        let bp = Blueprint::blues_suite();
        let a = dna_for(&bp, 64, Mood::Epic, Genre::Blues, 1234);
        let b = dna_for(&bp, 64, Mood::Epic, Genre::Blues, 1234);
        assert_eq!(a, b);
    }

    #[test]
    fn chord_pitches_respect_inversion_and_register() {
        let chord = GhostChord {
            root: 48, // C
            quality: ChordQuality::Major,
            start_bar: 0,
            duration_bars: 4,
            inversion: Inversion::First,
        };
        // E G C with the lowest tone in [60, 72).
        assert_eq!(chord.pitches(60), vec![64, 67, 72]);
        assert_eq!(chord.bass_note(36), 40);
        assert_eq!(chord.root_in(36), 36);
        let root_pos = GhostChord {
            inversion: Inversion::Root,
            ..chord
        };
        assert_eq!(root_pos.pitches(60), vec![60, 64, 67]);
    }

    #[test]
    fn chord_at_loops_and_next_wraps() {
        let bp = Blueprint::single_section("main");
        let dna = dna_for(&bp, 16, Mood::Melancholic, Genre::Ambient, 42);
        assert_eq!(dna.chord_at(0).unwrap().start_bar, 0);
        assert_eq!(dna.chord_at(16), dna.chord_at(0));
        let last = *dna.harmony.last().unwrap();
        assert_eq!(dna.next_chord(last.start_bar), dna.harmony.first());
    }
}
