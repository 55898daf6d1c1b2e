// Phrase, riff and drum-kit library.
//
// Pre-authored material the brains draw from, tagged by style (genre), mood
// and group tag:
// - ambient themes (tag "theme"), used by the ambient soloist gate
// - blues licks (tag "blues_lick") and bass riffs (tag "blues_bass")
// - solo plans: ordered lick sequences assigned to sections by the DNA
//   generator (tag "blues_solo")
// - drum kits: sample-name tables keyed by drum style
//
// Selection degrades instead of failing: an exact (style, mood, tag) match
// is preferred, then (style, tag), then (tag) alone, and finally `None`,
// in which case the caller emits nothing for that layer this bar.
//
// The built-in library is `PhraseLibrary::default_library()`; a JSON file
// with the same shape can replace it via `PhraseLibrary::load`.

use crate::error::LibraryError;
use crate::event::Technique;
use crate::phrase::{Degree, MAX_PHRASE_BARS, Phrase, PhraseNote, TICKS_PER_BAR};
use crate::types::{DrumStyle, Genre, Mood};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedPhrase {
    pub tag: String,
    pub style: Genre,
    /// `None` means the phrase suits any mood.
    #[serde(default)]
    pub mood: Option<Mood>,
    pub phrase: Phrase,
}

/// An ordered lick sequence a soloist works through over a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoloPlan {
    pub id: String,
    pub tag: String,
    /// Phrase ids, played in order and wrapping.
    pub licks: Vec<String>,
}

/// Sample names for one drum kit. Each slot may offer alternates; the
/// renderer rotates through them by bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrumKit {
    pub style: DrumStyle,
    pub kick: Vec<String>,
    pub snare: Vec<String>,
    pub hihat: Vec<String>,
    pub ride: Vec<String>,
    pub perc: Vec<String>,
}

impl DrumKit {
    /// Pick a slot's sample for `bar`, rotating through alternates.
    pub fn sample(slot: &[String], bar: u32) -> Option<&str> {
        if slot.is_empty() {
            return None;
        }
        slot.get(bar as usize % slot.len()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseLibrary {
    pub phrases: Vec<TaggedPhrase>,
    pub solo_plans: Vec<SoloPlan>,
    pub drum_kits: Vec<DrumKit>,
}

impl PhraseLibrary {
    /// Load and validate a library from JSON.
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(json: &str) -> Result<Self, LibraryError> {
        let library: PhraseLibrary = serde_json::from_str(json)?;
        library.validate()?;
        Ok(library)
    }

    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.phrases.is_empty() {
            return Err(LibraryError::Empty);
        }
        if let Some(p) = self.phrases.iter().find(|p| p.phrase.notes.is_empty()) {
            return Err(LibraryError::EmptyPhrase(p.phrase.id.clone()));
        }
        let max_ticks = MAX_PHRASE_BARS * TICKS_PER_BAR;
        for p in &self.phrases {
            let too_long = p.phrase.notes.iter().find(|n| {
                n.tick
                    .checked_add(n.duration)
                    .is_none_or(|end| end > max_ticks)
            });
            if let Some(note) = too_long {
                return Err(LibraryError::PhraseTooLong {
                    phrase: p.phrase.id.clone(),
                    tick: note.tick,
                    max_bars: MAX_PHRASE_BARS,
                });
            }
        }
        for plan in &self.solo_plans {
            for lick in &plan.licks {
                if self.phrase_by_id(lick).is_none() {
                    return Err(LibraryError::UnknownLick {
                        plan: plan.id.clone(),
                        lick: lick.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn phrase_by_id(&self, id: &str) -> Option<&Phrase> {
        self.phrases
            .iter()
            .find(|p| p.phrase.id == id)
            .map(|p| &p.phrase)
    }

    fn filtered(&self, tag: &str, pred: impl Fn(&TaggedPhrase) -> bool) -> Vec<&Phrase> {
        self.phrases
            .iter()
            .filter(|p| p.tag == tag && pred(p))
            .map(|p| &p.phrase)
            .collect()
    }

    /// Candidates for (style, mood, tag), loosening the filter until
    /// something matches: exact → any mood → any style.
    pub fn candidates(&self, style: Genre, mood: Mood, tag: &str) -> Vec<&Phrase> {
        let exact = self.filtered(tag, |p| {
            p.style == style && p.mood.is_none_or(|m| m == mood)
        });
        if !exact.is_empty() {
            return exact;
        }
        let any_mood = self.filtered(tag, |p| p.style == style);
        if !any_mood.is_empty() {
            tracing::debug!(tag, ?mood, "no phrase for mood; using any-mood pool");
            return any_mood;
        }
        let any_style = self.filtered(tag, |_| true);
        if !any_style.is_empty() {
            tracing::debug!(tag, ?style, "no phrase for style; using any-style pool");
        }
        any_style
    }

    /// Pick a phrase for (style, mood, tag) with a unit value in [0, 1).
    pub fn select(&self, style: Genre, mood: Mood, tag: &str, unit: f64) -> Option<&Phrase> {
        let pool = self.candidates(style, mood, tag);
        if pool.is_empty() {
            return None;
        }
        let idx = ((unit.clamp(0.0, 1.0) * pool.len() as f64) as usize).min(pool.len() - 1);
        pool.get(idx).copied()
    }

    /// Solo plan ids carrying `tag`, in library order.
    pub fn solo_plan_ids(&self, tag: &str) -> Vec<String> {
        self.solo_plans
            .iter()
            .filter(|p| p.tag == tag)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn solo_plan(&self, id: &str) -> Option<&SoloPlan> {
        self.solo_plans.iter().find(|p| p.id == id)
    }

    /// Kit for a drum style, falling back to the first kit.
    pub fn drum_kit(&self, style: DrumStyle) -> Option<&DrumKit> {
        self.drum_kits
            .iter()
            .find(|k| k.style == style)
            .or_else(|| self.drum_kits.first())
    }
}

// ---------------------------------------------------------------------------
// Built-in material
// ---------------------------------------------------------------------------

fn n(tick: u32, duration: u32, degree: Degree) -> PhraseNote {
    PhraseNote::new(tick, duration, degree)
}

fn tagged(tag: &str, style: Genre, mood: Option<Mood>, phrase: Phrase) -> TaggedPhrase {
    TaggedPhrase {
        tag: tag.into(),
        style,
        mood,
        phrase,
    }
}

fn names(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

impl PhraseLibrary {
    pub fn default_library() -> Self {
        use Degree::*;
        use Genre::{Ambient, Blues};

        let phrases = vec![
            // Ambient themes. Degrees are relative to the key tonic.
            tagged(
                "theme",
                Ambient,
                Some(Mood::Melancholic),
                Phrase::new(
                    "falling-leaves",
                    vec![
                        n(0, 24, Fifth),
                        n(24, 12, FlatSixth),
                        n(36, 12, Fifth),
                        n(48, 36, FlatThird),
                        n(84, 12, Second),
                        n(96, 48, Root),
                    ],
                ),
            ),
            tagged(
                "theme",
                Ambient,
                Some(Mood::Melancholic),
                Phrase::new(
                    "grey-harbor",
                    vec![
                        n(0, 12, Root),
                        n(12, 12, FlatThird),
                        n(24, 24, Fourth),
                        n(48, 18, FlatThird),
                        n(66, 6, Second),
                        n(72, 24, Root),
                    ],
                ),
            ),
            tagged(
                "theme",
                Ambient,
                Some(Mood::Dreamy),
                Phrase::new(
                    "drift",
                    vec![
                        n(0, 18, Third),
                        n(18, 6, SharpFourth),
                        n(24, 24, Fifth),
                        n(48, 24, Seventh),
                        n(72, 24, Ninth),
                    ],
                ),
            ),
            tagged(
                "theme",
                Ambient,
                Some(Mood::Dark),
                Phrase::new(
                    "undertow",
                    vec![
                        n(0, 36, Root),
                        n(36, 12, FlatSecond),
                        n(48, 48, Root),
                        n(96, 24, FlatSixth),
                        n(120, 24, Fifth),
                    ],
                ),
            ),
            tagged(
                "theme",
                Ambient,
                None,
                Phrase::new(
                    "open-sky",
                    vec![
                        n(0, 12, Root),
                        n(12, 12, Second),
                        n(24, 12, Fifth),
                        n(36, 12, Octave),
                        n(48, 48, Fifth),
                    ],
                ),
            ),
            tagged(
                "theme",
                Ambient,
                Some(Mood::Epic),
                Phrase::new(
                    "ascent",
                    vec![
                        n(0, 12, Root),
                        n(12, 12, Fifth),
                        n(24, 24, Octave),
                        n(48, 12, FlatSeventh),
                        n(60, 12, Fifth),
                        n(72, 24, FlatTenth),
                    ],
                ),
            ),
            // Blues licks. Degrees are relative to the current chord root.
            tagged(
                "blues_lick",
                Blues,
                None,
                Phrase::new(
                    "box-one",
                    vec![
                        n(0, 6, Octave),
                        n(6, 6, FlatSeventh),
                        n(12, 6, Fifth),
                        n(18, 6, FlatThird).with(Technique::Bend),
                        n(24, 12, Third),
                        n(36, 12, Root).with(Technique::Vibrato),
                    ],
                ),
            ),
            tagged(
                "blues_lick",
                Blues,
                None,
                Phrase::new(
                    "turnaround",
                    vec![
                        n(0, 6, Fifth),
                        n(6, 6, SharpFourth),
                        n(12, 6, Fourth),
                        n(18, 6, FlatThird),
                        n(24, 24, Root).with(Technique::Slide),
                    ],
                ),
            ),
            tagged(
                "blues_lick",
                Blues,
                None,
                Phrase::new(
                    "call",
                    vec![
                        n(0, 4, FlatThird).with(Technique::Slide),
                        n(4, 8, Third),
                        n(12, 12, Fifth),
                        n(30, 6, FlatSeventh),
                        n(36, 12, Octave).with(Technique::Bend),
                    ],
                ),
            ),
            tagged(
                "blues_lick",
                Blues,
                None,
                Phrase::new(
                    "response",
                    vec![
                        n(0, 6, Octave),
                        n(6, 6, FlatTenth).with(Technique::Bend),
                        n(12, 6, Octave),
                        n(18, 6, FlatSeventh),
                        n(24, 6, Fifth),
                        n(30, 6, FlatSeventh),
                        n(36, 12, Fifth),
                    ],
                ),
            ),
            tagged(
                "blues_lick",
                Blues,
                Some(Mood::Melancholic),
                Phrase::new(
                    "slow-moan",
                    vec![
                        n(0, 24, FlatThird).with(Technique::Bend),
                        n(24, 12, Root),
                        n(36, 6, FlatSeventh),
                        n(42, 6, Root),
                        n(48, 48, Fifth).with(Technique::Vibrato),
                    ],
                ),
            ),
            // Blues bass riffs, one bar of quarters relative to the chord.
            tagged(
                "blues_bass",
                Blues,
                None,
                Phrase::new(
                    "boogie",
                    vec![
                        n(0, 12, Root),
                        n(12, 12, Third),
                        n(24, 12, Fifth),
                        n(36, 12, Sixth),
                    ],
                ),
            ),
            tagged(
                "blues_bass",
                Blues,
                None,
                Phrase::new(
                    "octave-walk",
                    vec![
                        n(0, 12, Root),
                        n(12, 12, Octave),
                        n(24, 12, FlatSeventh),
                        n(36, 12, Fifth),
                    ],
                ),
            ),
        ];

        let solo_plans = vec![
            SoloPlan {
                id: "plan-call-response".into(),
                tag: "blues_solo".into(),
                licks: names(&["call", "response", "call", "turnaround"]),
            },
            SoloPlan {
                id: "plan-box".into(),
                tag: "blues_solo".into(),
                licks: names(&["box-one", "response", "box-one", "turnaround"]),
            },
            SoloPlan {
                id: "plan-moan".into(),
                tag: "blues_solo".into(),
                licks: names(&["slow-moan", "call", "turnaround"]),
            },
        ];

        let drum_kits = vec![
            DrumKit {
                style: DrumStyle::Ambient,
                kick: names(&["kick_felt", "kick_sub"]),
                snare: names(&["rim_soft"]),
                hihat: names(&["shaker_a", "shaker_b"]),
                ride: names(&["cymbal_swell"]),
                perc: names(&["chimes_low", "wood_drop"]),
            },
            DrumKit {
                style: DrumStyle::Brushes,
                kick: names(&["kick_jazz"]),
                snare: names(&["brush_sweep", "brush_tap"]),
                hihat: names(&["hat_foot"]),
                ride: names(&["ride_dry"]),
                perc: names(&["rim_click"]),
            },
            DrumKit {
                style: DrumStyle::ShuffleGroove,
                kick: names(&["kick_vintage"]),
                snare: names(&["snare_crack", "snare_ghost"]),
                hihat: names(&["hat_closed", "hat_half"]),
                ride: names(&["ride_bell"]),
                perc: names(&["tamb_hit"]),
            },
            DrumKit {
                style: DrumStyle::StraightGroove,
                kick: names(&["kick_tight"]),
                snare: names(&["snare_fat"]),
                hihat: names(&["hat_closed"]),
                ride: names(&["ride_wash"]),
                perc: names(&["cowbell_low"]),
            },
        ];

        PhraseLibrary {
            phrases,
            solo_plans,
            drum_kits,
        }
    }
}
