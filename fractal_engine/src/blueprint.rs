// Blueprint: the declarative, hierarchical composition plan.
//
// A blueprint is authored data. It names an ordered list of sections, each
// with a relative duration (percent of the piece), an active layer set,
// instrumentation rules and per-layer behavior; sections may be subdivided
// into sub-sections with percent-of-parent durations. The blueprint also
// carries the key, an optional mode/tempo override, a tension curve and a
// timbre substitution table.
//
// Instrumentation comes in three tagged variants, each with a fully specified
// field set:
// - `Flat`: one rule per layer for the whole section.
// - `Staged`: the section is split into equal stages, each listing its rules.
// - `Lottery`: one-shot list of (layer, rule) pairs that the lottery shuffles
//   and spreads across `stage_count` stages (intros that "summon" layers).
//
// `Blueprint::from_json` validates everything that can be checked up front.
// Sibling percentages that do not sum to ~100 are tolerated with a warning;
// the navigator skews bar distribution rather than failing.
//
// See also: `navigator.rs` (bar ranges), `lottery.rs` (rule evaluation),
// `dna.rs` (solo-plan sources, tempo override).

use crate::error::BlueprintError;
use crate::scale::Scale;
use crate::timbre::Timbre;
use crate::types::{Layer, Register};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Allowed deviation of sibling percent sums from 100 before warning.
pub const PERCENT_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    /// Tonic pitch class (0 = C).
    #[serde(default)]
    pub key_pc: u8,
    /// Mode override; `None` uses the mood's default.
    #[serde(default)]
    pub scale: Option<Scale>,
    /// Tempo override; `None` uses the mood's tempo range.
    #[serde(default)]
    pub tempo: Option<TempoRange>,
    #[serde(default)]
    pub tension_curve: TensionCurve,
    pub sections: Vec<Section>,
    /// Disfavored timbre → preferred timbre, applied before a lottery commit.
    #[serde(default)]
    pub substitutions: BTreeMap<Timbre, Timbre>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
}

/// Where the per-bar tension comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TensionCurve {
    /// The oscillator-bank tension model (`tension.rs`).
    #[default]
    Oscillator,
    /// Piecewise-linear curve over normalized piece progress.
    Authored { points: Vec<CurvePoint> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub progress: f64,
    pub tension: f64,
}

impl TensionCurve {
    /// Evaluate an authored curve at `progress` in [0, 1]. Returns `None`
    /// for the oscillator variant or an empty curve.
    pub fn at(&self, progress: f64) -> Option<f64> {
        let TensionCurve::Authored { points } = self else {
            return None;
        };
        let first = points.first()?;
        let progress = progress.clamp(0.0, 1.0);
        if progress <= first.progress {
            return Some(first.tension.clamp(0.0, 1.0));
        }
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if progress <= b.progress {
                let span = b.progress - a.progress;
                let t = if span > 0.0 {
                    (progress - a.progress) / span
                } else {
                    1.0
                };
                return Some((a.tension + (b.tension - a.tension) * t).clamp(0.0, 1.0));
            }
        }
        points.last().map(|p| p.tension.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    /// Relative duration as a percent of the piece.
    pub percent: f64,
    /// Layers allowed to sound in this section.
    pub layers: BTreeSet<Layer>,
    #[serde(default)]
    pub instrumentation: Instrumentation,
    #[serde(default)]
    pub behaviors: BTreeMap<Layer, LayerBehavior>,
    /// Tag of the solo-plan group this section draws its soloist plan from.
    #[serde(default)]
    pub solo_plan_source: Option<String>,
    #[serde(default)]
    pub sub_sections: Vec<SubSection>,
}

impl Section {
    /// Behavior for a layer, falling back to the layer's defaults.
    pub fn behavior(&self, layer: Layer) -> LayerBehavior {
        self.behaviors
            .get(&layer)
            .cloned()
            .unwrap_or_else(|| LayerBehavior::default_for(layer))
    }

    /// Whether any stage of this section carries a rule for `layer`.
    pub fn has_rule_for(&self, layer: Layer) -> bool {
        match &self.instrumentation {
            Instrumentation::Flat { rules } => rules.contains_key(&layer),
            Instrumentation::Staged { stages } => stages.iter().any(|s| s.contains_key(&layer)),
            Instrumentation::Lottery { rules, .. } => rules.iter().any(|r| r.layer == layer),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSection {
    pub id: String,
    /// Relative duration as a percent of the parent section.
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrumentation {
    Flat {
        rules: BTreeMap<Layer, InstrumentRule>,
    },
    Staged {
        stages: Vec<BTreeMap<Layer, InstrumentRule>>,
    },
    Lottery {
        stage_count: usize,
        rules: Vec<LayerRule>,
    },
}

impl Default for Instrumentation {
    fn default() -> Self {
        Instrumentation::Flat {
            rules: BTreeMap::new(),
        }
    }
}

impl Instrumentation {
    /// Number of equal stages the section span is divided into.
    pub fn stage_count(&self) -> usize {
        match self {
            Instrumentation::Flat { .. } => 1,
            Instrumentation::Staged { stages } => stages.len().max(1),
            Instrumentation::Lottery { stage_count, .. } => (*stage_count).max(1),
        }
    }

    /// Whether layers are revealed over time (summon progress is reported).
    pub fn is_staged(&self) -> bool {
        !matches!(self, Instrumentation::Flat { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRule {
    pub layer: Layer,
    #[serde(flatten)]
    pub rule: InstrumentRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRule {
    pub options: Vec<WeightedTimbre>,
    #[serde(default = "default_activation_chance")]
    pub activation_chance: f64,
}

impl InstrumentRule {
    /// Rule with equally weighted options that always activates.
    pub fn of(timbres: &[Timbre]) -> Self {
        InstrumentRule {
            options: timbres
                .iter()
                .map(|&timbre| WeightedTimbre { timbre, weight: 1.0 })
                .collect(),
            activation_chance: 1.0,
        }
    }

    pub fn weighted(options: &[(Timbre, f64)]) -> Self {
        InstrumentRule {
            options: options
                .iter()
                .map(|&(timbre, weight)| WeightedTimbre { timbre, weight })
                .collect(),
            activation_chance: 1.0,
        }
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.activation_chance = chance;
        self
    }
}

fn default_activation_chance() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedTimbre {
    pub timbre: Timbre,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Per-layer behavior rules within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerBehavior {
    /// Notes per bar at zero tension.
    pub min_notes: u32,
    /// Notes per bar at full tension.
    pub max_notes: u32,
    #[serde(default)]
    pub register: Register,
    #[serde(default)]
    pub phrase_source: PhraseSource,
}

impl LayerBehavior {
    pub fn default_for(layer: Layer) -> Self {
        let (min_notes, max_notes, register) = match layer {
            Layer::Accompaniment => (1, 1, Register::Mid),
            Layer::Bass => (1, 4, Register::Low),
            Layer::Drums => (2, 8, Register::Low),
            Layer::Melody => (2, 6, Register::Mid),
            Layer::Harmony => (1, 4, Register::Mid),
            Layer::PianoAccompaniment => (2, 8, Register::Mid),
            Layer::Sparkles => (0, 4, Register::High),
            Layer::SoundFx => (0, 1, Register::High),
        };
        LayerBehavior {
            min_notes,
            max_notes,
            register,
            phrase_source: PhraseSource::Generated,
        }
    }

    /// Note count for a tension value in [0, 1].
    pub fn density(&self, tension: f64) -> u32 {
        let span = self.max_notes.saturating_sub(self.min_notes) as f64;
        self.min_notes + (span * tension.clamp(0.0, 1.0)).round() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhraseSource {
    /// The renderer generates material from the chord and scale.
    #[default]
    Generated,
    /// Draw phrases from the library group with this tag.
    Library { tag: String },
}

impl Blueprint {
    /// Parse and validate a blueprint from JSON.
    pub fn from_json(json: &str) -> Result<Self, BlueprintError> {
        let blueprint: Blueprint = serde_json::from_str(json)?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Load and validate a blueprint from a JSON file.
    pub fn load(path: &Path) -> Result<Self, BlueprintError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Check every structural constraint. Percent skew is logged, not
    /// rejected.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        if self.sections.is_empty() {
            return Err(BlueprintError::NoSections);
        }
        if let Some(TempoRange { min, max }) = self.tempo {
            if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
                return Err(BlueprintError::InvalidTempo { min, max });
            }
        }
        if let TensionCurve::Authored { points } = &self.tension_curve {
            validate_curve(points)?;
        }
        for section in &self.sections {
            validate_section(section)?;
        }
        self.warn_on_percent_skew();
        Ok(())
    }

    /// Log a warning for every sibling group whose percents stray from 100.
    /// Returns the number of skewed groups.
    pub fn warn_on_percent_skew(&self) -> usize {
        let mut skewed = 0;
        let total: f64 = self.sections.iter().map(|s| s.percent).sum();
        if (total - 100.0).abs() > PERCENT_TOLERANCE {
            tracing::warn!(
                blueprint = %self.name,
                total,
                "section percents do not sum to 100; bar distribution will be skewed"
            );
            skewed += 1;
        }
        for section in &self.sections {
            if section.sub_sections.is_empty() {
                continue;
            }
            let sub_total: f64 = section.sub_sections.iter().map(|s| s.percent).sum();
            if (sub_total - 100.0).abs() > PERCENT_TOLERANCE {
                tracing::warn!(
                    section = %section.id,
                    total = sub_total,
                    "sub-section percents do not sum to 100; bar distribution will be skewed"
                );
                skewed += 1;
            }
        }
        skewed
    }
}

fn validate_curve(points: &[CurvePoint]) -> Result<(), BlueprintError> {
    if points.is_empty() {
        return Err(BlueprintError::InvalidTensionCurve("no points".into()));
    }
    for p in points {
        if !(p.progress.is_finite() && p.tension.is_finite()) {
            return Err(BlueprintError::InvalidTensionCurve(
                "non-finite point".into(),
            ));
        }
        if !(0.0..=1.0).contains(&p.tension) || !(0.0..=1.0).contains(&p.progress) {
            return Err(BlueprintError::InvalidTensionCurve(format!(
                "point ({}, {}) outside [0, 1]",
                p.progress, p.tension
            )));
        }
    }
    if points.windows(2).any(|w| w[1].progress < w[0].progress) {
        return Err(BlueprintError::InvalidTensionCurve(
            "points must be ordered by progress".into(),
        ));
    }
    Ok(())
}

fn validate_percent(id: &str, value: f64) -> Result<(), BlueprintError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BlueprintError::InvalidPercent {
            section: id.to_string(),
            value,
        })
    }
}

fn validate_rule(section: &str, layer: Layer, rule: &InstrumentRule) -> Result<(), BlueprintError> {
    if rule.options.is_empty() {
        return Err(BlueprintError::EmptyOptions {
            section: section.to_string(),
            layer,
        });
    }
    if rule
        .options
        .iter()
        .any(|o| !(o.weight.is_finite() && o.weight > 0.0))
    {
        return Err(BlueprintError::InvalidWeight {
            section: section.to_string(),
            layer,
        });
    }
    if !(0.0..=1.0).contains(&rule.activation_chance) {
        return Err(BlueprintError::InvalidActivationChance {
            section: section.to_string(),
            layer,
            value: rule.activation_chance,
        });
    }
    Ok(())
}

fn validate_section(section: &Section) -> Result<(), BlueprintError> {
    validate_percent(&section.id, section.percent)?;
    for sub in &section.sub_sections {
        validate_percent(&sub.id, sub.percent)?;
    }
    match &section.instrumentation {
        Instrumentation::Flat { rules } => {
            for (&layer, rule) in rules {
                validate_rule(&section.id, layer, rule)?;
            }
        }
        Instrumentation::Staged { stages } => {
            if stages.is_empty() {
                return Err(BlueprintError::EmptyStages {
                    section: section.id.clone(),
                });
            }
            for stage in stages {
                for (&layer, rule) in stage {
                    validate_rule(&section.id, layer, rule)?;
                }
            }
        }
        Instrumentation::Lottery { stage_count, rules } => {
            if *stage_count == 0 {
                return Err(BlueprintError::ZeroStageCount {
                    section: section.id.clone(),
                });
            }
            for r in rules {
                validate_rule(&section.id, r.layer, &r.rule)?;
            }
        }
    }
    for (&layer, behavior) in &section.behaviors {
        if behavior.min_notes > behavior.max_notes {
            return Err(BlueprintError::InvertedDensity {
                section: section.id.clone(),
                layer,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Built-in blueprints
// ---------------------------------------------------------------------------

fn layer_set(layers: &[Layer]) -> BTreeSet<Layer> {
    layers.iter().copied().collect()
}

fn library_behavior(layer: Layer, tag: &str) -> LayerBehavior {
    LayerBehavior {
        phrase_source: PhraseSource::Library { tag: tag.into() },
        ..LayerBehavior::default_for(layer)
    }
}

impl Blueprint {
    /// A one-section blueprint covering the whole piece with every layer
    /// allowed and no authored rules.
    pub fn single_section(id: &str) -> Self {
        Blueprint {
            name: format!("{id}-only"),
            key_pc: 9,
            scale: None,
            tempo: None,
            tension_curve: TensionCurve::Oscillator,
            sections: vec![Section {
                id: id.into(),
                percent: 100.0,
                layers: layer_set(&Layer::ALL),
                instrumentation: Instrumentation::default(),
                behaviors: BTreeMap::from([(
                    Layer::Melody,
                    library_behavior(Layer::Melody, "theme"),
                )]),
                solo_plan_source: None,
                sub_sections: Vec::new(),
            }],
            substitutions: BTreeMap::new(),
        }
    }

    /// Four-part ambient suite: a summoning intro, a staged development, a
    /// full climax and a thinning outro.
    pub fn ambient_suite() -> Self {
        use Layer::*;
        use Timbre as T;

        let intro = Section {
            id: "intro".into(),
            percent: 15.0,
            layers: layer_set(&[Accompaniment, Bass, Sparkles, SoundFx]),
            instrumentation: Instrumentation::Lottery {
                stage_count: 3,
                rules: vec![
                    LayerRule {
                        layer: Accompaniment,
                        rule: InstrumentRule::weighted(&[(T::WarmPad, 2.0), (T::GlassPad, 1.0)]),
                    },
                    LayerRule {
                        layer: Bass,
                        rule: InstrumentRule::of(&[T::SynthBass, T::FretlessBass]),
                    },
                    LayerRule {
                        layer: Sparkles,
                        rule: InstrumentRule::of(&[T::Celesta, T::MusicBox]),
                    },
                    LayerRule {
                        layer: SoundFx,
                        rule: InstrumentRule::of(&[T::Wind]).with_chance(0.6),
                    },
                ],
            },
            behaviors: BTreeMap::new(),
            solo_plan_source: None,
            sub_sections: Vec::new(),
        };

        let development = Section {
            id: "development".into(),
            percent: 40.0,
            layers: layer_set(&[
                Accompaniment,
                Bass,
                Drums,
                Melody,
                Harmony,
                PianoAccompaniment,
                Sparkles,
            ]),
            instrumentation: Instrumentation::Staged {
                stages: vec![
                    BTreeMap::from([
                        (Melody, InstrumentRule::weighted(&[(T::Flute, 2.0), (T::Violin, 1.0)])),
                        (Harmony, InstrumentRule::of(&[T::Strings])),
                    ]),
                    BTreeMap::from([
                        (
                            PianoAccompaniment,
                            InstrumentRule::of(&[T::AcousticPiano, T::ElectricPiano]),
                        ),
                        (Melody, InstrumentRule::of(&[T::Flute, T::Violin, T::Saxophone])),
                        (Drums, InstrumentRule::of(&[T::AmbientKit]).with_chance(0.5)),
                    ]),
                ],
            },
            behaviors: BTreeMap::from([
                (Melody, library_behavior(Melody, "theme")),
                (
                    Harmony,
                    LayerBehavior {
                        min_notes: 1,
                        max_notes: 3,
                        ..LayerBehavior::default_for(Harmony)
                    },
                ),
            ]),
            solo_plan_source: None,
            sub_sections: vec![
                SubSection {
                    id: "development-a".into(),
                    percent: 50.0,
                },
                SubSection {
                    id: "development-b".into(),
                    percent: 50.0,
                },
            ],
        };

        let climax = Section {
            id: "climax".into(),
            percent: 30.0,
            layers: layer_set(&Layer::ALL),
            instrumentation: Instrumentation::Flat {
                rules: BTreeMap::from([
                    (Accompaniment, InstrumentRule::of(&[T::Strings, T::Choir])),
                    (Drums, InstrumentRule::of(&[T::AmbientKit])),
                    (Melody, InstrumentRule::weighted(&[(T::Violin, 2.0), (T::Flute, 1.0)])),
                    (Sparkles, InstrumentRule::of(&[T::Bells])),
                ]),
            },
            behaviors: BTreeMap::from([
                (Melody, library_behavior(Melody, "theme")),
                (
                    Sparkles,
                    LayerBehavior {
                        min_notes: 1,
                        max_notes: 6,
                        ..LayerBehavior::default_for(Sparkles)
                    },
                ),
            ]),
            solo_plan_source: None,
            sub_sections: vec![
                SubSection {
                    id: "climax-rise".into(),
                    percent: 60.0,
                },
                SubSection {
                    id: "climax-peak".into(),
                    percent: 40.0,
                },
            ],
        };

        let outro = Section {
            id: "outro".into(),
            percent: 15.0,
            layers: layer_set(&[Accompaniment, Sparkles, SoundFx]),
            instrumentation: Instrumentation::Flat {
                rules: BTreeMap::from([
                    (Accompaniment, InstrumentRule::of(&[T::GlassPad])),
                    (SoundFx, InstrumentRule::of(&[T::Rain, T::Shimmer])),
                ]),
            },
            behaviors: BTreeMap::new(),
            solo_plan_source: None,
            sub_sections: Vec::new(),
        };

        Blueprint {
            name: "ambient-suite".into(),
            key_pc: 9,
            scale: None,
            tempo: None,
            tension_curve: TensionCurve::Oscillator,
            sections: vec![intro, development, climax, outro],
            substitutions: BTreeMap::from([(T::Saxophone, T::Flute)]),
        }
    }

    /// Head / solo / out-chorus blues form with an authored tension arc.
    pub fn blues_suite() -> Self {
        use Layer::*;
        use Timbre as T;

        let band = [Accompaniment, Bass, Drums, Melody, PianoAccompaniment];

        let head = Section {
            id: "head".into(),
            percent: 25.0,
            layers: layer_set(&band),
            instrumentation: Instrumentation::Flat {
                rules: BTreeMap::from([
                    (Accompaniment, InstrumentRule::of(&[T::Organ])),
                    (Bass, InstrumentRule::of(&[T::UprightBass])),
                    (Drums, InstrumentRule::of(&[T::BluesKit])),
                    (PianoAccompaniment, InstrumentRule::of(&[T::ElectricPiano])),
                    (
                        Melody,
                        InstrumentRule::weighted(&[(T::Harmonica, 2.0), (T::Saxophone, 1.0)]),
                    ),
                ]),
            },
            behaviors: BTreeMap::from([(Melody, library_behavior(Melody, "blues_lick"))]),
            solo_plan_source: Some("blues_solo".into()),
            sub_sections: Vec::new(),
        };

        let solo = Section {
            id: "solo".into(),
            percent: 50.0,
            layers: layer_set(&[
                Accompaniment,
                Bass,
                Drums,
                Melody,
                Harmony,
                PianoAccompaniment,
            ]),
            instrumentation: Instrumentation::Staged {
                stages: vec![
                    BTreeMap::from([(
                        Melody,
                        InstrumentRule::of(&[T::CleanGuitar, T::OverdriveGuitar]),
                    )]),
                    BTreeMap::from([
                        (Melody, InstrumentRule::of(&[T::OverdriveGuitar])),
                        (Harmony, InstrumentRule::of(&[T::Organ]).with_chance(0.8)),
                    ]),
                ],
            },
            behaviors: BTreeMap::from([(Melody, library_behavior(Melody, "blues_lick"))]),
            solo_plan_source: Some("blues_solo".into()),
            sub_sections: vec![
                SubSection {
                    id: "chorus-1".into(),
                    percent: 50.0,
                },
                SubSection {
                    id: "chorus-2".into(),
                    percent: 50.0,
                },
            ],
        };

        let out = Section {
            id: "out-chorus".into(),
            percent: 25.0,
            layers: layer_set(&band),
            instrumentation: Instrumentation::Flat {
                rules: BTreeMap::from([(
                    Melody,
                    InstrumentRule::of(&[T::Harmonica, T::Saxophone]),
                )]),
            },
            behaviors: BTreeMap::from([(Melody, library_behavior(Melody, "blues_lick"))]),
            solo_plan_source: Some("blues_solo".into()),
            sub_sections: Vec::new(),
        };

        Blueprint {
            name: "blues-suite".into(),
            key_pc: 4,
            scale: Some(Scale::Mixolydian),
            tempo: Some(TempoRange {
                min: 84.0,
                max: 104.0,
            }),
            tension_curve: TensionCurve::Authored {
                points: vec![
                    CurvePoint {
                        progress: 0.0,
                        tension: 0.3,
                    },
                    CurvePoint {
                        progress: 0.5,
                        tension: 0.8,
                    },
                    CurvePoint {
                        progress: 0.85,
                        tension: 0.9,
                    },
                    CurvePoint {
                        progress: 1.0,
                        tension: 0.4,
                    },
                ],
            },
            sections: vec![head, solo, out],
            substitutions: BTreeMap::new(),
        }
    }
}
