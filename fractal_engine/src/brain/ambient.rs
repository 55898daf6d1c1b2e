// Ambient brain: slow pads, a drone or pulse bass, and a gated melody.
//
// The melody soloist is a two-state gate (idle / playing a theme). Whenever
// the current epoch has reached `busy_until`, it rolls `0.4 + 0.4 × tension`:
// on success it picks a phrase from the melody layer's library group (the
// index is a positional hash of seed and bar), applies the current mutation
// kind, and plays it over `[epoch, epoch + bar_length)`. `busy_until` is set one bar past the
// end, so every theme is followed by at least one bar of rest. Bars outside
// a theme play the generated melody figure.
//
// Theme degrees are measured from the key tonic. The gate runs only while
// the lottery has the melody layer sounding.

use super::{BarScene, Brain, BrainCore, Soloist, render_generated};
use crate::blueprint::PhraseSource;
use crate::dna::GhostChord;
use crate::event::{BarOutput, FractalEvent};
use crate::navigator::NavigationInfo;
use crate::phrase::MutationKind;
use crate::render::{melody_fallback, render_phrase_bar};
use crate::types::{Genre, Layer};
use fractal_prng::hash_unit;

/// Salt for the theme-index hash.
const THEME_SALT: u64 = 0x7e3e;

pub struct AmbientBrain {
    core: BrainCore,
}

impl AmbientBrain {
    pub fn new(core: BrainCore) -> Self {
        AmbientBrain { core }
    }

    /// Chance that an idle soloist starts a theme at `tension`.
    pub fn theme_chance(tension: f64) -> f64 {
        0.4 + 0.4 * tension.clamp(0.0, 1.0)
    }

    /// Run the theme gate for `epoch` and render the melody bar.
    fn melody(&mut self, scene: &BarScene, tag: &str) -> Vec<FractalEvent> {
        let epoch = scene.epoch;
        let core = &mut self.core;
        if epoch >= core.state.busy_until {
            let roll = core.rng.random_bool(Self::theme_chance(scene.frame.tension));
            let unit = hash_unit(core.seed, u64::from(epoch), THEME_SALT);
            let picked = if roll {
                core.library
                    .select(Genre::Ambient, core.mood, tag, unit)
                    .cloned()
            } else {
                None
            };
            core.state.soloist = match picked {
                Some(phrase) => {
                    let phrase = phrase.mutated(core.state.mutation, &mut core.rng);
                    let end = epoch.saturating_add(phrase.bar_length());
                    core.state.busy_until = end.saturating_add(1);
                    tracing::debug!(epoch, phrase = %phrase.id, end, "theme started");
                    Soloist::PlayingTheme {
                        phrase,
                        start: epoch,
                        end,
                    }
                }
                None => Soloist::Idle,
            };
        }

        let Some(section) = core.blueprint.sections.get(scene.nav.section_index) else {
            return Vec::new();
        };
        let behavior = section.behavior(Layer::Melody);
        let ctx = scene.context(Layer::Melody, &behavior, core.key, &core.dna, &core.library);
        match &core.state.soloist {
            Soloist::PlayingTheme { phrase, start, end } if epoch >= *start && epoch < *end => {
                let jitter = core.state.mutation == MutationKind::Jitter;
                render_phrase_bar(
                    Layer::Melody,
                    phrase,
                    epoch - start,
                    core.key.tonic_pc,
                    &ctx,
                    jitter,
                    &mut core.rng,
                )
            }
            _ => melody_fallback(&ctx),
        }
    }
}

impl Brain for AmbientBrain {
    fn genre(&self) -> Genre {
        Genre::Ambient
    }

    fn generate_bar(
        &mut self,
        epoch: u32,
        chord: &GhostChord,
        next_chord: Option<&GhostChord>,
        nav: &NavigationInfo,
    ) -> BarOutput {
        let frame = self.core.begin_bar(epoch, nav);
        let scene = BarScene {
            epoch,
            nav,
            chord,
            next_chord,
            frame: &frame,
        };

        let theme_tag = self.core.section(nav).and_then(|s| {
            match s.behavior(Layer::Melody).phrase_source {
                PhraseSource::Library { tag } => Some(tag),
                PhraseSource::Generated => None,
            }
        });
        let gated = theme_tag.is_some() && frame.hints.timbres.contains_key(&Layer::Melody);
        let skip: &[Layer] = if gated { &[Layer::Melody] } else { &[] };

        let mut events = render_generated(&mut self.core, &scene, skip);
        if let (true, Some(tag)) = (gated, &theme_tag) {
            events.extend(self.melody(&scene, tag));
        }
        self.core.finish(epoch, nav, frame, events)
    }

    fn core(&self) -> &BrainCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_chance_tracks_tension() {
        assert!((AmbientBrain::theme_chance(0.0) - 0.4).abs() < 1e-12);
        assert!((AmbientBrain::theme_chance(1.0) - 0.8).abs() < 1e-12);
        assert!((AmbientBrain::theme_chance(7.0) - 0.8).abs() < 1e-12);
    }
}
