// Brains: per-bar orchestration of layers, themes and mutation.
//
// A brain is the genre-specific conductor. Each bar it:
// 1. reacts to navigator transitions (a section start is a macro mutation:
//    a fresh ensemble-wide mutation kind and a drift of the mood axes; a
//    sub-section start is a micro mutation),
// 2. resolves the bar's tension (authored curve if the blueprint has one,
//    the oscillator bank otherwise),
// 3. runs the instrumentation lottery to decide which layers sound,
// 4. renders every sounding layer, and
// 5. bundles events, hints and telemetry into a `BarOutput`.
//
// `BrainCore` holds what both genres share: the session's read-only data
// (blueprint, library, DNA behind `Arc`), the brain's own PRNG stream, the
// lottery and the mutable `BrainState`. The genre modules own only the
// decisions that differ: `ambient.rs` gates library themes by tension,
// `blues.rs` plays solo-plan licks and re-rolls mutations on 12-bar
// boundaries and stagnation.
//
// Renderers (`render.rs`) never see `BrainState`; the core builds a
// `RenderContext` per layer and hands it over.

pub mod ambient;
pub mod blues;

use crate::blueprint::{Blueprint, LayerBehavior, Section};
use crate::dna::{GhostChord, SuiteDna};
use crate::event::{BarOutput, FractalEvent, InstrumentHints};
use crate::library::PhraseLibrary;
use crate::lottery::InstrumentationLottery;
use crate::navigator::NavigationInfo;
use crate::phrase::{MutationKind, Phrase};
use crate::render::{self, RenderContext};
use crate::scale::Key;
use crate::tension::TensionModel;
use crate::timbre::Timbre;
use crate::types::{Genre, Layer, Mood};
use fractal_prng::SeededRng;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use ambient::AmbientBrain;
pub use blues::BluesBrain;

/// Consecutive identical bars after which a layer counts as stagnant.
pub const STAGNATION_LIMIT: u32 = 3;

/// Largest step the mood axes drift on a section change.
pub const MOOD_DRIFT: f64 = 0.1;

/// A genre-specific conductor producing one bar at a time.
pub trait Brain {
    fn genre(&self) -> Genre;

    /// Produce bar `epoch`. `chord` is the DNA chord sounding at this bar and
    /// `next_chord` the one after it.
    fn generate_bar(
        &mut self,
        epoch: u32,
        chord: &GhostChord,
        next_chord: Option<&GhostChord>,
        nav: &NavigationInfo,
    ) -> BarOutput;

    fn core(&self) -> &BrainCore;
}

/// Build the brain for a genre.
pub fn new_brain(genre: Genre, core: BrainCore) -> Box<dyn Brain> {
    match genre {
        Genre::Ambient => Box::new(AmbientBrain::new(core)),
        Genre::Blues => Box::new(BluesBrain::new(core)),
    }
}

/// What the melody soloist is doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Soloist {
    #[default]
    Idle,
    /// Playing `phrase` over bars `[start, end)`.
    PlayingTheme { phrase: Phrase, start: u32, end: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrainState {
    pub valence: f64,
    pub arousal: f64,
    pub soloist: Soloist,
    /// First epoch at which a new theme may start.
    pub busy_until: u32,
    /// Per layer: hash of the last bar's pitches and how many consecutive
    /// bars repeated it.
    pub stagnation: BTreeMap<Layer, (u64, u32)>,
    pub mutation: MutationKind,
    /// Count of micro mutations applied so far.
    pub micro_variation: u32,
}

impl BrainState {
    pub fn new(mood: Mood) -> Self {
        let (valence, arousal) = mood.axes();
        BrainState {
            valence,
            arousal,
            soloist: Soloist::Idle,
            busy_until: 0,
            stagnation: BTreeMap::new(),
            mutation: MutationKind::None,
            micro_variation: 0,
        }
    }
}

/// State and services shared by every brain variant.
pub struct BrainCore {
    pub seed: u64,
    pub mood: Mood,
    pub blueprint: Arc<Blueprint>,
    pub library: Arc<PhraseLibrary>,
    pub dna: Arc<SuiteDna>,
    pub key: Key,
    pub tension_model: TensionModel,
    pub rng: SeededRng,
    pub lottery: InstrumentationLottery,
    pub state: BrainState,
}

/// Per-bar values the core resolves before rendering.
pub struct BarFrame {
    pub tension: f64,
    pub hints: InstrumentHints,
}

/// The bar being rendered: position, harmony and resolved frame.
pub struct BarScene<'a> {
    pub epoch: u32,
    pub nav: &'a NavigationInfo,
    pub chord: &'a GhostChord,
    pub next_chord: Option<&'a GhostChord>,
    pub frame: &'a BarFrame,
}

impl<'a> BarScene<'a> {
    /// Render context for one layer of this bar.
    pub fn context<'b>(
        &self,
        layer: Layer,
        behavior: &'b LayerBehavior,
        key: Key,
        dna: &'b SuiteDna,
        library: &'b PhraseLibrary,
    ) -> RenderContext<'b>
    where
        'a: 'b,
    {
        RenderContext {
            epoch: self.epoch,
            bar: self.nav.bar,
            chord: self.chord,
            next_chord: self.next_chord,
            tension: self.frame.tension,
            timbre: self
                .frame
                .hints
                .timbres
                .get(&layer)
                .copied()
                .unwrap_or_else(|| Timbre::default_for(layer)),
            key,
            feel: dna.feel,
            behavior,
            bass_style: dna.bass_style,
            drum_style: dna.drum_style,
            kit: library.drum_kit(dna.drum_style),
        }
    }
}

impl BrainCore {
    pub fn new(
        seed: u64,
        mood: Mood,
        blueprint: Arc<Blueprint>,
        library: Arc<PhraseLibrary>,
        dna: Arc<SuiteDna>,
        rng: SeededRng,
    ) -> Self {
        let key = Key::new(
            blueprint.scale.unwrap_or_else(|| mood.default_scale()),
            blueprint.key_pc,
        );
        BrainCore {
            seed,
            mood,
            blueprint,
            library,
            dna,
            key,
            tension_model: TensionModel::for_mood(mood),
            rng,
            lottery: InstrumentationLottery::new(seed),
            state: BrainState::new(mood),
        }
    }

    pub fn section(&self, nav: &NavigationInfo) -> Option<&Section> {
        self.blueprint.sections.get(nav.section_index)
    }

    /// Tension for a bar: the authored curve at the bar's progress, or the
    /// oscillator bank at the DNA tempo.
    pub fn tension(&self, epoch: u32, nav: &NavigationInfo) -> f64 {
        self.blueprint
            .tension_curve
            .at(nav.progress)
            .unwrap_or_else(|| self.tension_model.tension(epoch, self.dna.base_tempo))
    }

    /// Transitions, tension and lottery for the bar.
    pub fn begin_bar(&mut self, epoch: u32, nav: &NavigationInfo) -> BarFrame {
        if nav.is_part_transition {
            self.macro_mutation(nav);
        } else if nav.is_sub_part_transition {
            self.micro_mutation(nav);
        }
        let tension = self.tension(epoch, nav);
        let hints = self.lottery.update(&self.blueprint, nav, &mut self.rng);
        BarFrame { tension, hints }
    }

    fn macro_mutation(&mut self, nav: &NavigationInfo) {
        self.state.mutation = MutationKind::roll(&mut self.rng);
        let dv = self.rng.range_f64(-MOOD_DRIFT, MOOD_DRIFT);
        let da = self.rng.range_f64(-MOOD_DRIFT, MOOD_DRIFT);
        self.state.valence = (self.state.valence + dv).clamp(0.0, 1.0);
        self.state.arousal = (self.state.arousal + da).clamp(0.0, 1.0);
        tracing::debug!(
            section = %nav.section_id,
            mutation = ?self.state.mutation,
            "macro mutation"
        );
    }

    fn micro_mutation(&mut self, nav: &NavigationInfo) {
        self.state.micro_variation += 1;
        if let MutationKind::Transpose(offset) = self.state.mutation {
            self.state.mutation = MutationKind::Transpose(-offset);
        }
        tracing::debug!(
            sub_section = ?nav.sub_section_id,
            variation = self.state.micro_variation,
            "micro mutation"
        );
    }

    /// Update stagnation counters for `layers` from this bar's events. A
    /// silent bar breaks a run. Returns true when any layer reached
    /// `STAGNATION_LIMIT`.
    pub fn observe_stagnation(&mut self, layers: &[Layer], events: &[FractalEvent]) -> bool {
        let mut stagnant = false;
        for &layer in layers {
            let pitches: Vec<u8> = events
                .iter()
                .filter(|e| e.layer == layer)
                .map(|e| e.pitch)
                .collect();
            if pitches.is_empty() {
                self.state.stagnation.remove(&layer);
                continue;
            }
            let hash = pitch_hash(&pitches);
            let entry = self.state.stagnation.entry(layer).or_insert((hash, 0));
            if entry.0 == hash {
                entry.1 += 1;
            } else {
                *entry = (hash, 0);
            }
            stagnant |= entry.1 >= STAGNATION_LIMIT;
        }
        stagnant
    }

    /// Bundle the bar's output, ordering events by onset then layer.
    pub fn finish(
        &self,
        epoch: u32,
        nav: &NavigationInfo,
        frame: BarFrame,
        mut events: Vec<FractalEvent>,
    ) -> BarOutput {
        events.sort_by(|a, b| a.onset.total_cmp(&b.onset).then(a.layer.cmp(&b.layer)));
        let coverage = frame.hints.timbres.len() as f64 / Layer::ALL.len() as f64;
        let aesthetic_score =
            (0.4 * coverage + 0.3 * frame.tension + 0.3 * self.state.valence).clamp(0.0, 1.0);
        BarOutput {
            bar: epoch,
            events,
            hints: frame.hints,
            tension: frame.tension,
            aesthetic_score,
            navigation: Some(nav.clone()),
        }
    }
}

/// FNV-1a over a pitch sequence.
fn pitch_hash(pitches: &[u8]) -> u64 {
    pitches.iter().fold(0xcbf2_9ce4_8422_2325, |h, &p| {
        (h ^ u64::from(p)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Render every sounding layer through the generated renderers, skipping
/// the layers the caller handles itself.
pub(crate) fn render_generated(
    core: &mut BrainCore,
    scene: &BarScene,
    skip: &[Layer],
) -> Vec<FractalEvent> {
    let BrainCore {
        blueprint,
        library,
        dna,
        key,
        rng,
        ..
    } = core;
    let Some(section) = blueprint.sections.get(scene.nav.section_index) else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for &layer in scene.frame.hints.timbres.keys() {
        if skip.contains(&layer) {
            continue;
        }
        let behavior = section.behavior(layer);
        let ctx = scene.context(layer, &behavior, *key, dna, library);
        events.extend(render::render_layer(layer, &ctx, rng));
    }
    events
}
