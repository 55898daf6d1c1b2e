// Blues brain: solo-plan licks over the DNA's I/IV/V walk.
//
// The melody plays licks from the section's solo plan (assigned in the DNA)
// back to back, cycling through the plan's lick list. Each lick is mutated
// with the current ensemble-wide mutation kind when it starts. Lick degrees
// follow the chord: they are measured from the root of the chord sounding
// when the lick starts. Sections without a plan draw from the melody
// layer's library group, and fall back to the generated figure if that is
// empty too.
//
// A root-fifth bass plays riffs from the "blues_bass" group, re-anchored on
// each chord; a walking bass uses the generated walking line.
//
// Mutation re-rolls happen at every 12-bar boundary and whenever a line
// layer (melody or bass) has repeated the same pitches for
// `STAGNATION_LIMIT` consecutive bars; the counters then reset.

use super::{BarScene, Brain, BrainCore, STAGNATION_LIMIT, Soloist, render_generated};
use crate::blueprint::PhraseSource;
use crate::dna::GhostChord;
use crate::event::{BarOutput, FractalEvent};
use crate::navigator::NavigationInfo;
use crate::phrase::{MutationKind, Phrase};
use crate::render::{melody_fallback, render_phrase_bar};
use crate::types::{BassStyle, Genre, Layer};
use fractal_prng::hash_unit;

/// Bars in one blues chorus; mutation re-rolls on these boundaries.
pub const CHORUS_BARS: u32 = 12;

/// Library group the root-fifth bass draws riffs from.
pub const BASS_RIFF_TAG: &str = "blues_bass";

/// Layers whose stagnation triggers a mutation re-roll.
const LINE_LAYERS: [Layer; 2] = [Layer::Melody, Layer::Bass];

const LICK_SALT: u64 = 0xb1e5;
const RIFF_SALT: u64 = 0xba55;

pub struct BluesBrain {
    core: BrainCore,
    /// Position in the current section's lick list.
    lick_cursor: usize,
    /// Root pitch class the current lick is measured from.
    lick_root_pc: u8,
}

impl BluesBrain {
    pub fn new(core: BrainCore) -> Self {
        BluesBrain {
            core,
            lick_cursor: 0,
            lick_root_pc: 0,
        }
    }

    fn reroll_mutation(&mut self, epoch: u32, reason: &str) {
        self.core.state.mutation = MutationKind::roll(&mut self.core.rng);
        tracing::debug!(epoch, reason, mutation = ?self.core.state.mutation, "mutation re-rolled");
    }

    /// The next lick to play in this section.
    fn next_lick(&mut self, epoch: u32, nav: &NavigationInfo, tag: Option<&str>) -> Option<Phrase> {
        let core = &self.core;
        if let Some(plan) = core
            .dna
            .solo_plan_for(&nav.section_id)
            .and_then(|id| core.library.solo_plan(id))
        {
            if !plan.licks.is_empty() {
                let lick = &plan.licks[self.lick_cursor % plan.licks.len()];
                self.lick_cursor += 1;
                if let Some(phrase) = core.library.phrase_by_id(lick) {
                    return Some(phrase.clone());
                }
                tracing::warn!(
                    plan = %plan.id,
                    lick = %lick,
                    "solo plan lick missing from library"
                );
            }
        }
        let unit = hash_unit(core.seed, u64::from(epoch), LICK_SALT);
        core.library
            .select(Genre::Blues, core.mood, tag?, unit)
            .cloned()
    }

    fn melody(&mut self, scene: &BarScene, tag: Option<&str>) -> Vec<FractalEvent> {
        let epoch = scene.epoch;
        if epoch >= self.core.state.busy_until {
            self.core.state.soloist = match self.next_lick(epoch, scene.nav, tag) {
                Some(lick) => {
                    let lick = lick.mutated(self.core.state.mutation, &mut self.core.rng);
                    let end = epoch.saturating_add(lick.bar_length());
                    self.core.state.busy_until = end;
                    self.lick_root_pc = scene.chord.root_pc();
                    Soloist::PlayingTheme {
                        phrase: lick,
                        start: epoch,
                        end,
                    }
                }
                None => Soloist::Idle,
            };
        }

        let core = &mut self.core;
        let Some(section) = core.blueprint.sections.get(scene.nav.section_index) else {
            return Vec::new();
        };
        let behavior = section.behavior(Layer::Melody);
        let ctx = scene.context(Layer::Melody, &behavior, core.key, &core.dna, &core.library);
        match &core.state.soloist {
            Soloist::PlayingTheme { phrase, start, end } if epoch >= *start && epoch < *end => {
                render_phrase_bar(
                    Layer::Melody,
                    phrase,
                    epoch - start,
                    self.lick_root_pc,
                    &ctx,
                    core.state.mutation == MutationKind::Jitter,
                    &mut core.rng,
                )
            }
            _ => melody_fallback(&ctx),
        }
    }

    /// Root-fifth riff bar, or `None` when no riff is available.
    fn bass_riff(&mut self, scene: &BarScene) -> Option<Vec<FractalEvent>> {
        let core = &mut self.core;
        let chord = scene.chord;
        let unit = hash_unit(core.seed, u64::from(chord.start_bar), RIFF_SALT);
        let riff = core
            .library
            .select(Genre::Blues, core.mood, BASS_RIFF_TAG, unit)?;
        let section = core.blueprint.sections.get(scene.nav.section_index)?;
        let behavior = section.behavior(Layer::Bass);
        let ctx = scene.context(Layer::Bass, &behavior, core.key, &core.dna, &core.library);
        let local = scene.nav.bar.saturating_sub(chord.start_bar) % riff.bar_length();
        Some(render_phrase_bar(
            Layer::Bass,
            riff,
            local,
            chord.root_pc(),
            &ctx,
            false,
            &mut core.rng,
        ))
    }
}

impl Brain for BluesBrain {
    fn genre(&self) -> Genre {
        Genre::Blues
    }

    fn generate_bar(
        &mut self,
        epoch: u32,
        chord: &GhostChord,
        next_chord: Option<&GhostChord>,
        nav: &NavigationInfo,
    ) -> BarOutput {
        if nav.is_part_transition {
            self.lick_cursor = 0;
            self.core.state.busy_until = epoch;
        }
        let frame = self.core.begin_bar(epoch, nav);
        if epoch % CHORUS_BARS == 0 {
            self.reroll_mutation(epoch, "chorus boundary");
        }

        let scene = BarScene {
            epoch,
            nav,
            chord,
            next_chord,
            frame: &frame,
        };
        let melody_tag = self.core.section(nav).and_then(|s| {
            match s.behavior(Layer::Melody).phrase_source {
                PhraseSource::Library { tag } => Some(tag),
                PhraseSource::Generated => None,
            }
        });
        let melody_sounding = frame.hints.timbres.contains_key(&Layer::Melody);
        let riff_bass = frame.hints.timbres.contains_key(&Layer::Bass)
            && self.core.dna.bass_style == BassStyle::RootFifth;

        let mut skip = Vec::new();
        if melody_sounding {
            skip.push(Layer::Melody);
        }
        let riff = if riff_bass { self.bass_riff(&scene) } else { None };
        if riff.is_some() {
            skip.push(Layer::Bass);
        }

        let mut events = render_generated(&mut self.core, &scene, &skip);
        events.extend(riff.unwrap_or_default());
        if melody_sounding {
            events.extend(self.melody(&scene, melody_tag.as_deref()));
        }

        if self.core.observe_stagnation(&LINE_LAYERS, &events) {
            self.core.state.stagnation.clear();
            self.reroll_mutation(epoch, "stagnation");
        }
        self.core.finish(epoch, nav, frame, events)
    }

    fn core(&self) -> &BrainCore {
        &self.core
    }
}
