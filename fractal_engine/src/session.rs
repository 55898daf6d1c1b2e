// Session: one deterministic run of the engine.
//
// A session is built from an immutable `SessionConfig` (seed, mood, genre,
// total bars), a blueprint and a phrase library. Construction validates the
// inputs, lays out the navigator, generates the suite DNA on its own PRNG
// stream and builds the genre's brain on a second stream. Replaying the same
// (config, blueprint, library, bar sequence) reproduces every bar exactly.
//
// Bars are produced either directly (`generate_bar(epoch)`, any order) or by
// the scheduler-style cursor (`start`, then `next_bar` until `stop`). The
// engine has no timers; `beat_seconds` and `bar_start_seconds` let a caller
// place bars on a clock. `reset` rebuilds the brain and rewinds the cursor;
// the DNA is a pure function of the config and is kept.
//
// Every event passes a well-formedness filter on the way out: anything with
// non-finite or out-of-range fields is dropped with a warning.

use crate::blueprint::Blueprint;
use crate::brain::{Brain, BrainCore, new_brain};
use crate::dna::{SuiteDna, generate_suite_dna};
use crate::error::EngineError;
use crate::event::BarOutput;
use crate::library::PhraseLibrary;
use crate::navigator::BlueprintNavigator;
use crate::phrase::BEATS_PER_BAR;
use crate::types::{Genre, Mood};
use fractal_prng::SeededRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// PRNG stream salt for DNA generation.
pub const DNA_STREAM: u64 = 0xd7a;
/// PRNG stream salt for the brain.
pub const BRAIN_STREAM: u64 = 0xb7a1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub seed: u64,
    pub mood: Mood,
    pub genre: Genre,
    pub total_bars: u32,
}

pub struct Session {
    config: SessionConfig,
    blueprint: Arc<Blueprint>,
    library: Arc<PhraseLibrary>,
    navigator: BlueprintNavigator,
    dna: Arc<SuiteDna>,
    brain: Box<dyn Brain>,
    running: bool,
    cursor: u32,
}

fn build_brain(
    config: &SessionConfig,
    blueprint: &Arc<Blueprint>,
    library: &Arc<PhraseLibrary>,
    dna: &Arc<SuiteDna>,
) -> Box<dyn Brain> {
    let core = BrainCore::new(
        config.seed,
        config.mood,
        Arc::clone(blueprint),
        Arc::clone(library),
        Arc::clone(dna),
        SeededRng::derive(config.seed, BRAIN_STREAM),
    );
    new_brain(config.genre, core)
}

impl Session {
    pub fn new(
        config: SessionConfig,
        blueprint: Blueprint,
        library: Arc<PhraseLibrary>,
    ) -> Result<Self, EngineError> {
        blueprint.validate()?;
        library.validate()?;
        let navigator = BlueprintNavigator::new(&blueprint, config.total_bars)?;

        let mut dna_rng = SeededRng::derive(config.seed, DNA_STREAM);
        let dna = Arc::new(generate_suite_dna(
            &blueprint,
            &navigator,
            config.mood,
            config.genre,
            &library,
            &mut dna_rng,
        ));
        let blueprint = Arc::new(blueprint);
        let brain = build_brain(&config, &blueprint, &library, &dna);

        tracing::info!(
            seed = config.seed,
            mood = ?config.mood,
            genre = ?config.genre,
            total_bars = config.total_bars,
            blueprint = %blueprint.name,
            tempo = dna.base_tempo,
            "session created"
        );

        Ok(Session {
            config,
            blueprint,
            library,
            navigator,
            dna,
            brain,
            running: false,
            cursor: 0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn navigator(&self) -> &BlueprintNavigator {
        &self.navigator
    }

    pub fn dna(&self) -> &SuiteDna {
        &self.dna
    }

    pub fn brain(&self) -> &dyn Brain {
        self.brain.as_ref()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Rebuild the brain from scratch and rewind the cursor. The running
    /// flag is left as it was.
    pub fn reset(&mut self) {
        self.brain = build_brain(&self.config, &self.blueprint, &self.library, &self.dna);
        self.cursor = 0;
    }

    /// Seconds per beat at the DNA tempo.
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.dna.base_tempo
    }

    /// Seconds from the start of the run to the downbeat of `epoch`.
    pub fn bar_start_seconds(&self, epoch: u32) -> f64 {
        f64::from(epoch) * f64::from(BEATS_PER_BAR) * self.beat_seconds()
    }

    /// Produce bar `epoch`. Epochs past the end loop over the piece.
    pub fn generate_bar(&mut self, epoch: u32) -> BarOutput {
        let Some(nav) = self.navigator.tick(epoch) else {
            return BarOutput::silent(epoch);
        };
        let Some(chord) = self.dna.chord_at(epoch) else {
            tracing::error!(epoch, "no chord covers this bar");
            return BarOutput::silent(epoch);
        };
        let next = self.dna.next_chord(epoch);
        let mut output = self.brain.generate_bar(epoch, chord, next, &nav);

        let before = output.events.len();
        output.events.retain(|e| e.is_well_formed());
        let dropped = before - output.events.len();
        if dropped > 0 {
            tracing::warn!(epoch, dropped, "dropped malformed events");
        }
        output
    }

    /// Produce the bar under the cursor and advance it, or `None` while the
    /// session is stopped.
    pub fn next_bar(&mut self) -> Option<BarOutput> {
        if !self.running {
            return None;
        }
        let output = self.generate_bar(self.cursor);
        self.cursor = self.cursor.wrapping_add(1);
        Some(output)
    }

    /// Epoch `next_bar` will produce.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(genre: Genre, blueprint: Blueprint) -> Session {
        let config = SessionConfig {
            seed: 7,
            mood: Mood::Calm,
            genre,
            total_bars: 24,
        };
        Session::new(config, blueprint, Arc::new(PhraseLibrary::default_library())).unwrap()
    }

    #[test]
    fn zero_bars_is_rejected() {
        let config = SessionConfig {
            seed: 1,
            mood: Mood::Calm,
            genre: Genre::Ambient,
            total_bars: 0,
        };
        let result = Session::new(
            config,
            Blueprint::ambient_suite(),
            Arc::new(PhraseLibrary::default_library()),
        );
        assert!(matches!(result, Err(EngineError::ZeroBars)));
    }

    #[test]
    fn invalid_blueprint_is_rejected() {
        let mut bp = Blueprint::ambient_suite();
        bp.sections.clear();
        let config = SessionConfig {
            seed: 1,
            mood: Mood::Calm,
            genre: Genre::Ambient,
            total_bars: 8,
        };
        let result = Session::new(config, bp, Arc::new(PhraseLibrary::default_library()));
        assert!(matches!(result, Err(EngineError::Blueprint(_))));
    }

    #[test]
    fn cursor_only_advances_while_running() {
        let mut s = session(Genre::Ambient, Blueprint::ambient_suite());
        assert!(s.next_bar().is_none());
        s.start();
        assert!(s.is_running());
        assert_eq!(s.next_bar().unwrap().bar, 0);
        assert_eq!(s.next_bar().unwrap().bar, 1);
        s.stop();
        assert!(s.next_bar().is_none());
        assert_eq!(s.cursor(), 2);
    }

    #[test]
    fn reset_replays_identically() {
        let mut s = session(Genre::Blues, Blueprint::blues_suite());
        s.start();
        let first: Vec<BarOutput> = (0..12).filter_map(|_| s.next_bar()).collect();
        s.reset();
        let again: Vec<BarOutput> = (0..12).filter_map(|_| s.next_bar()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn timing_follows_tempo() {
        let s = session(Genre::Ambient, Blueprint::ambient_suite());
        let beat = s.beat_seconds();
        assert!((beat - 60.0 / s.dna().base_tempo).abs() < 1e-12);
        assert!((s.bar_start_seconds(3) - 12.0 * beat).abs() < 1e-9);
    }

    #[test]
    fn epochs_near_the_top_of_the_range_render() {
        for (genre, blueprint) in [
            (Genre::Ambient, Blueprint::single_section("main")),
            (Genre::Ambient, Blueprint::ambient_suite()),
            (Genre::Blues, Blueprint::blues_suite()),
        ] {
            let mut s = session(genre, blueprint);
            for epoch in u32::MAX - 40..=u32::MAX {
                let out = s.generate_bar(epoch);
                assert_eq!(out.bar, epoch);
                assert!(out.events.iter().all(|e| e.is_well_formed()));
            }
        }
    }

    #[test]
    fn cursor_wraps_at_the_end_of_the_range() {
        let mut s = session(Genre::Blues, Blueprint::blues_suite());
        s.cursor = u32::MAX;
        s.start();
        assert_eq!(s.next_bar().unwrap().bar, u32::MAX);
        assert_eq!(s.next_bar().unwrap().bar, 0);
    }

    #[test]
    fn bars_loop_over_the_piece() {
        let mut s = session(Genre::Ambient, Blueprint::ambient_suite());
        let out = s.generate_bar(24);
        let nav = out.navigation.unwrap();
        assert_eq!(nav.bar, 0);
        assert!(nav.is_part_transition);
        assert_eq!(out.bar, 24);
    }
}
