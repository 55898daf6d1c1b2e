// Per-layer renderers: turn one bar of context into note events.
//
// Every renderer is a plain function of a `RenderContext` and the brain's
// PRNG. None of them sees or mutates brain state; the brain decides which
// layers sound and hands each one its context. Onsets are in beats from the
// bar's downbeat and stay inside the bar; durations may ring past it.
//
// Layers:
// - accompaniment: sustained pad voicing of the chord, always emitted, with a
//   filter-cutoff hint that opens with tension.
// - bass: drone, pulse, root-fifth or walking line (chromatic approach into
//   the next chord on a chord's last bar).
// - drums: General MIDI kick/snare/hat/ride hits tagged with kit samples.
// - melody: fallback figure when no library phrase plays (sustained chord
//   third, plus an arpeggio above tension 0.6).
// - harmony, piano accompaniment, sparkles and sound effects.
//
// Library phrases are rendered by `render_phrase_bar`; degrees are measured
// from the root pitch class the brain passes in.

use crate::blueprint::LayerBehavior;
use crate::dna::GhostChord;
use crate::event::{FractalEvent, Phrasing, Technique};
use crate::library::DrumKit;
use crate::phrase::{
    BEATS_PER_BAR, Phrase, TICKS_PER_BAR, TICKS_PER_BEAT, jitter_onset, ticks_to_beats,
};
use crate::scale::Key;
use crate::timbre::Timbre;
use crate::types::{BassStyle, DrumStyle, Layer, RhythmicFeel};
use fractal_prng::SeededRng;

/// Beats in one bar.
pub const BAR_BEATS: f64 = BEATS_PER_BAR as f64;

/// Tension above which the melody fallback adds an arpeggio.
pub const ARPEGGIO_TENSION: f64 = 0.6;

// General MIDI percussion map.
pub const GM_KICK: u8 = 36;
pub const GM_SNARE: u8 = 38;
pub const GM_CLAP: u8 = 39;
pub const GM_CLOSED_HAT: u8 = 42;
pub const GM_RIDE: u8 = 51;

/// Everything a renderer may read for one layer and one bar.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Epoch as requested (before looping); stamped into event params.
    pub epoch: u32,
    /// Bar within the piece (after looping).
    pub bar: u32,
    pub chord: &'a GhostChord,
    pub next_chord: Option<&'a GhostChord>,
    pub tension: f64,
    pub timbre: Timbre,
    pub key: Key,
    pub feel: RhythmicFeel,
    pub behavior: &'a LayerBehavior,
    pub bass_style: BassStyle,
    pub drum_style: DrumStyle,
    pub kit: Option<&'a DrumKit>,
}

impl RenderContext<'_> {
    fn base(&self) -> u8 {
        self.behavior.register.base_pitch()
    }

    fn notes(&self) -> u32 {
        self.behavior.density(self.tension)
    }

    fn is_last_bar_of_chord(&self) -> bool {
        self.bar + 1 == self.chord.end_bar()
    }

    fn note(
        &self,
        layer: Layer,
        pitch: u8,
        onset: f64,
        duration: f64,
        weight: f64,
    ) -> FractalEvent {
        FractalEvent::note(layer, pitch, onset, duration, weight, self.epoch)
    }
}

/// Render a generated layer. Melody renders its fallback figure.
pub fn render_layer(layer: Layer, ctx: &RenderContext, rng: &mut SeededRng) -> Vec<FractalEvent> {
    match layer {
        Layer::Accompaniment => accompaniment(ctx),
        Layer::Bass => bass(ctx, rng),
        Layer::Drums => drums(ctx, rng),
        Layer::Melody => melody_fallback(ctx),
        Layer::Harmony => harmony(ctx),
        Layer::PianoAccompaniment => piano(ctx),
        Layer::Sparkles => sparkles(ctx, rng),
        Layer::SoundFx => sound_fx(ctx, rng),
    }
}

/// Sustained pad voicing.
pub fn accompaniment(ctx: &RenderContext) -> Vec<FractalEvent> {
    let cutoff = 400.0 + 3600.0 * ctx.tension.clamp(0.0, 1.0);
    let weight = 0.35 + 0.3 * ctx.tension;
    ctx.chord
        .pitches(ctx.base())
        .into_iter()
        .map(|p| {
            ctx.note(Layer::Accompaniment, p, 0.0, BAR_BEATS, weight)
                .with_phrasing(Phrasing::Sustained)
                .with_cutoff(cutoff)
        })
        .collect()
}

pub fn bass(ctx: &RenderContext, rng: &mut SeededRng) -> Vec<FractalEvent> {
    let base = ctx.base();
    let root = ctx.chord.bass_note(base);
    let fifth = root.saturating_add(7).min(127);
    let weight = 0.55 + 0.3 * ctx.tension;
    let layer = Layer::Bass;
    match ctx.bass_style {
        BassStyle::Drone => vec![
            ctx.note(layer, root, 0.0, BAR_BEATS, weight * 0.8)
                .with_phrasing(Phrasing::Sustained),
        ],
        BassStyle::Pulse => {
            let n = ctx.notes().max(1);
            let step = BAR_BEATS / f64::from(n);
            (0..n)
                .map(|i| {
                    ctx.note(layer, root, f64::from(i) * step, step * 0.9, weight)
                        .with_phrasing(Phrasing::Detached)
                })
                .collect()
        }
        BassStyle::RootFifth => {
            let mut events = vec![
                ctx.note(layer, root, 0.0, 1.5, weight),
                ctx.note(layer, fifth, 2.0, 1.5, weight * 0.9),
            ];
            if ctx.notes() > 2 {
                let octave = root.saturating_add(12).min(127);
                events.push(ctx.note(layer, octave, 1.0 + ctx.feel.offbeat(), 0.4, weight * 0.7));
                events.push(ctx.note(layer, fifth, 3.0 + ctx.feel.offbeat(), 0.4, weight * 0.7));
            }
            events
        }
        BassStyle::Walking => {
            let third = root.saturating_add(ctx.chord.quality.third()).min(127);
            let mut line = [root, third, fifth, root.saturating_add(9).min(127)];
            if ctx.is_last_bar_of_chord() {
                if let Some(next) = ctx.next_chord {
                    let target = next.root_in(base);
                    line[3] = if rng.random_bool(0.5) {
                        target.saturating_add(1).min(127)
                    } else {
                        target.saturating_sub(1)
                    };
                }
            }
            line.iter()
                .enumerate()
                .map(|(beat, &p)| {
                    let e = ctx.note(layer, p, beat as f64, 0.9, weight);
                    if beat == 3 && ctx.is_last_bar_of_chord() {
                        e.with_technique(Technique::Slide)
                    } else {
                        e
                    }
                })
                .collect()
        }
    }
}

fn hit(
    ctx: &RenderContext,
    pitch: u8,
    onset: f64,
    weight: f64,
    slot: Option<&[String]>,
) -> FractalEvent {
    let e = ctx
        .note(Layer::Drums, pitch, onset, 0.25, weight)
        .with_technique(Technique::Hit)
        .with_phrasing(Phrasing::Accented);
    match slot.and_then(|s| DrumKit::sample(s, ctx.bar)) {
        Some(sample) => e.with_sample(sample),
        None => e,
    }
}

pub fn drums(ctx: &RenderContext, rng: &mut SeededRng) -> Vec<FractalEvent> {
    let kit = ctx.kit;
    let kick = kit.map(|k| k.kick.as_slice());
    let snare = kit.map(|k| k.snare.as_slice());
    let hihat = kit.map(|k| k.hihat.as_slice());
    let ride = kit.map(|k| k.ride.as_slice());
    let perc = kit.map(|k| k.perc.as_slice());
    let offbeat = ctx.feel.offbeat();
    let t = ctx.tension;
    let mut events = Vec::new();

    match ctx.drum_style {
        DrumStyle::Ambient => {
            events.push(hit(ctx, GM_KICK, 0.0, 0.35 + 0.2 * t, kick));
            if t > 0.5 {
                events.push(hit(ctx, GM_RIDE, 2.0, 0.25 + 0.2 * t, ride));
            }
            let extra = ctx.notes().saturating_sub(2);
            for _ in 0..extra.min(4) {
                let onset = ticks_to_beats(rng.range_usize(0, TICKS_PER_BAR as usize) as u32);
                events.push(
                    hit(ctx, GM_CLAP, onset, 0.15 + 0.15 * t, perc)
                        .with_technique(Technique::Ghost),
                );
            }
        }
        DrumStyle::Brushes => {
            for beat in 0..BEATS_PER_BAR {
                let b = f64::from(beat);
                events.push(hit(ctx, GM_RIDE, b, 0.3 + 0.2 * t, ride));
                if beat % 2 == 1 {
                    events.push(
                        hit(ctx, GM_SNARE, b, 0.25 + 0.2 * t, snare)
                            .with_technique(Technique::Ghost),
                    );
                    events.push(hit(ctx, GM_RIDE, b + offbeat, 0.2 + 0.1 * t, ride));
                }
            }
            events.push(hit(ctx, GM_KICK, 0.0, 0.3, kick));
        }
        DrumStyle::ShuffleGroove | DrumStyle::StraightGroove => {
            for beat in 0..BEATS_PER_BAR {
                let b = f64::from(beat);
                if beat % 2 == 0 {
                    events.push(hit(ctx, GM_KICK, b, 0.6 + 0.3 * t, kick));
                } else {
                    events.push(hit(ctx, GM_SNARE, b, 0.55 + 0.3 * t, snare));
                }
                events.push(hit(ctx, GM_CLOSED_HAT, b, 0.35 + 0.2 * t, hihat));
                if ctx.notes() > 4 || rng.random_bool(0.5 + 0.5 * t) {
                    events.push(
                        hit(ctx, GM_CLOSED_HAT, b + offbeat, 0.2 + 0.15 * t, hihat)
                            .with_technique(Technique::Ghost),
                    );
                }
            }
            if t > 0.75 && rng.random_bool(0.5) {
                events.push(hit(ctx, GM_KICK, 2.0 + offbeat, 0.5, kick));
            }
        }
    }
    events
}

/// Sustained chord third; above `ARPEGGIO_TENSION` an arpeggio climbs the
/// second half of the bar.
pub fn melody_fallback(ctx: &RenderContext) -> Vec<FractalEvent> {
    let pitches = ctx.chord.pitches(ctx.base());
    let third = pitches.get(1).copied().unwrap_or(pitches[0]);
    let mut events = vec![
        ctx.note(Layer::Melody, third, 0.0, BAR_BEATS, 0.3 + 0.3 * ctx.tension)
            .with_phrasing(Phrasing::Sustained),
    ];
    if ctx.tension > ARPEGGIO_TENSION {
        let n = ctx.notes().clamp(2, 4) as usize;
        let upper = pitches.iter().map(|&p| p.saturating_add(12).min(127));
        let lower = pitches.iter().copied();
        let climb = lower
            .chain(upper)
            .map(|p| p.saturating_add(12).min(127))
            .take(n);
        for (i, p) in climb.enumerate() {
            let onset = 2.0 + i as f64 * 0.5;
            events.push(
                ctx.note(Layer::Melody, p, onset, 0.45, 0.35 + 0.3 * ctx.tension)
                    .with_phrasing(Phrasing::Detached),
            );
        }
    }
    events
}

/// Third-and-fifth dyads, repeated with density.
pub fn harmony(ctx: &RenderContext) -> Vec<FractalEvent> {
    let pitches = ctx.chord.pitches(ctx.base());
    let dyad: Vec<u8> = pitches.iter().skip(1).take(2).copied().collect();
    let n = ctx.notes().max(1);
    let step = BAR_BEATS / f64::from(n);
    let weight = 0.3 + 0.25 * ctx.tension;
    let mut events = Vec::new();
    for i in 0..n {
        for &p in &dyad {
            events.push(ctx.note(Layer::Harmony, p, f64::from(i) * step, step, weight));
        }
    }
    events
}

/// Broken chord cycling through the voicing.
pub fn piano(ctx: &RenderContext) -> Vec<FractalEvent> {
    let pitches = ctx.chord.pitches(ctx.base());
    let n = ctx.notes().max(1);
    let step = BAR_BEATS / f64::from(n);
    let weight = 0.35 + 0.3 * ctx.tension;
    (0..n)
        .map(|i| {
            let p = pitches[i as usize % pitches.len()];
            let onset = f64::from(i) * step;
            let e = ctx.note(Layer::PianoAccompaniment, p, onset, step * 0.95, weight);
            if i == 0 { e.with_phrasing(Phrasing::Accented) } else { e }
        })
        .collect()
}

/// Scattered high in-key notes with random pan.
pub fn sparkles(ctx: &RenderContext, rng: &mut SeededRng) -> Vec<FractalEvent> {
    let base = ctx.base();
    let pool = ctx.key.pitches_in_range(base, base.saturating_add(24).min(127));
    let mut events = Vec::new();
    for _ in 0..ctx.notes() {
        let Some(&pitch) = rng.choose(&pool) else {
            break;
        };
        let tick = rng.range_usize(0, TICKS_PER_BAR as usize) as u32;
        let duration = rng.range_f64(0.25, 0.5);
        let pan = rng.range_f64(-0.8, 0.8);
        events.push(
            ctx.note(
                Layer::Sparkles,
                pitch,
                ticks_to_beats(tick),
                duration,
                0.2 + 0.3 * ctx.tension,
            )
            .with_phrasing(Phrasing::Detached)
                .with_pan(pan),
        );
    }
    events
}

/// Occasional swell on the chord root.
pub fn sound_fx(ctx: &RenderContext, rng: &mut SeededRng) -> Vec<FractalEvent> {
    if !rng.random_bool(0.15 + 0.25 * ctx.tension) {
        return Vec::new();
    }
    let beat = rng.range_usize(0, BEATS_PER_BAR as usize) as f64;
    let pan = rng.range_f64(-1.0, 1.0);
    let pitch = ctx.chord.root_in(ctx.base());
    vec![
        ctx.note(Layer::SoundFx, pitch, beat, BAR_BEATS - beat, 0.25 + 0.25 * ctx.tension)
            .with_technique(Technique::Swell)
            .with_phrasing(Phrasing::Sustained)
            .with_pan(pan),
    ]
}

/// Render the notes of `phrase` that fall in its `local_bar`, with degrees
/// measured from `root_pc` in the layer's register. `jitter` perturbs onsets.
pub fn render_phrase_bar(
    layer: Layer,
    phrase: &Phrase,
    local_bar: u32,
    root_pc: u8,
    ctx: &RenderContext,
    jitter: bool,
    rng: &mut SeededRng,
) -> Vec<FractalEvent> {
    let base = i32::from(ctx.base()) + i32::from(root_pc % 12);
    let bar_start = local_bar * TICKS_PER_BAR;
    let weight = 0.5 + 0.35 * ctx.tension;
    phrase
        .notes_in_bar(local_bar)
        .map(|n| {
            let pitch = (base + n.degree.semitones()).clamp(0, 127) as u8;
            let mut onset = ticks_to_beats(n.tick - bar_start);
            if jitter {
                onset = jitter_onset(onset, rng, BAR_BEATS);
            }
            let duration = ticks_to_beats(n.duration.max(1));
            let phrasing = if n.duration < TICKS_PER_BEAT {
                Phrasing::Detached
            } else {
                Phrasing::Legato
            };
            ctx.note(layer, pitch, onset, duration, weight)
                .with_technique(n.technique.unwrap_or_default())
                .with_phrasing(phrasing)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PhraseLibrary;
    use crate::phrase::{Degree, PhraseNote};
    use crate::scale::Scale;
    use crate::types::{ChordQuality, Inversion};

    fn chord() -> GhostChord {
        GhostChord {
            root: 57, // A
            quality: ChordQuality::Minor,
            start_bar: 0,
            duration_bars: 4,
            inversion: Inversion::Root,
        }
    }

    fn next() -> GhostChord {
        GhostChord {
            root: 50, // D
            quality: ChordQuality::Minor,
            start_bar: 4,
            duration_bars: 4,
            inversion: Inversion::Root,
        }
    }

    fn ctx<'a>(
        chord: &'a GhostChord,
        next: &'a GhostChord,
        behavior: &'a LayerBehavior,
        kit: Option<&'a DrumKit>,
        bar: u32,
        tension: f64,
    ) -> RenderContext<'a> {
        RenderContext {
            epoch: bar,
            bar,
            chord,
            next_chord: Some(next),
            tension,
            timbre: Timbre::WarmPad,
            key: Key::new(Scale::Aeolian, 9),
            feel: RhythmicFeel::Shuffle,
            behavior,
            bass_style: BassStyle::Walking,
            drum_style: DrumStyle::ShuffleGroove,
            kit,
        }
    }

    fn all_well_formed(events: &[FractalEvent]) {
        for e in events {
            assert!(e.is_well_formed(), "{e:?}");
            assert!(e.onset < BAR_BEATS, "{e:?}");
        }
    }

    #[test]
    fn accompaniment_is_unconditional() {
        let (c, n) = (chord(), next());
        let behavior = LayerBehavior::default_for(Layer::Accompaniment);
        for t in [0.0, 0.5, 1.0] {
            let events = accompaniment(&ctx(&c, &n, &behavior, None, 0, t));
            assert_eq!(events.len(), 3);
            all_well_formed(&events);
            let cutoff = events[0].params.filter_cutoff_hz.unwrap();
            assert!((cutoff - (400.0 + 3600.0 * t)).abs() < 1e-9);
        }
    }

    #[test]
    fn walking_bass_approaches_next_chord() {
        let (c, n) = (chord(), next());
        let behavior = LayerBehavior::default_for(Layer::Bass);
        let mut rng = SeededRng::new(1);
        let events = bass(&ctx(&c, &n, &behavior, None, 3, 0.5), &mut rng);
        assert_eq!(events.len(), 4);
        let target = n.root_in(behavior.register.base_pitch());
        let last = events[3].pitch;
        assert!(last == target + 1 || last == target - 1);
        assert_eq!(events[3].technique, Technique::Slide);
        // Mid-chord bars don't approach.
        let events = bass(&ctx(&c, &n, &behavior, None, 1, 0.5), &mut rng);
        assert_eq!(events[3].technique, Technique::Plain);
        all_well_formed(&events);
    }

    #[test]
    fn drums_use_kit_samples_and_feel() {
        let (c, n) = (chord(), next());
        let behavior = LayerBehavior::default_for(Layer::Drums);
        let lib = PhraseLibrary::default_library();
        let kit = lib.drum_kit(DrumStyle::ShuffleGroove);
        let mut rng = SeededRng::new(4);
        let events = drums(&ctx(&c, &n, &behavior, kit, 0, 1.0), &mut rng);
        all_well_formed(&events);
        assert!(events.iter().any(|e| e.pitch == GM_KICK && e.params.sample.is_some()));
        // Shuffle offbeat lands on the triplet.
        assert!(events.iter().any(|e| (e.onset - (2.0 / 3.0)).abs() < 1e-9));
    }

    #[test]
    fn melody_fallback_adds_arpeggio_at_high_tension() {
        let (c, n) = (chord(), next());
        let behavior = LayerBehavior::default_for(Layer::Melody);
        let low = melody_fallback(&ctx(&c, &n, &behavior, None, 0, 0.2));
        assert_eq!(low.len(), 1);
        let high = melody_fallback(&ctx(&c, &n, &behavior, None, 0, 0.9));
        assert!(high.len() > 1);
        all_well_formed(&high);
    }

    #[test]
    fn every_layer_renders_well_formed_events() {
        let (c, n) = (chord(), next());
        let lib = PhraseLibrary::default_library();
        let mut rng = SeededRng::new(99);
        for layer in Layer::ALL {
            let behavior = LayerBehavior::default_for(layer);
            for bar in 0..8 {
                for t in [0.0, 0.4, 0.8, 1.0] {
                    let kit = lib.drum_kit(DrumStyle::Ambient);
                    let mut cx = ctx(&c, &n, &behavior, kit, bar % 4, t);
                    for style in [BassStyle::Drone, BassStyle::Pulse, BassStyle::RootFifth] {
                        cx.bass_style = style;
                        all_well_formed(&render_layer(layer, &cx, &mut rng));
                    }
                    for style in [
                        DrumStyle::Ambient,
                        DrumStyle::Brushes,
                        DrumStyle::StraightGroove,
                    ] {
                        cx.drum_style = style;
                        all_well_formed(&render_layer(layer, &cx, &mut rng));
                    }
                }
            }
        }
    }

    #[test]
    fn phrase_bar_renders_local_window() {
        let (c, n) = (chord(), next());
        let behavior = LayerBehavior::default_for(Layer::Melody);
        let phrase = Phrase::new(
            "p",
            vec![
                PhraseNote::new(0, 12, Degree::Root),
                PhraseNote::new(24, 12, Degree::Fifth),
                PhraseNote::new(48, 24, Degree::Octave),
            ],
        );
        let mut rng = SeededRng::new(0);
        let cx = ctx(&c, &n, &behavior, None, 0, 0.5);
        let bar0 = render_phrase_bar(Layer::Melody, &phrase, 0, 9, &cx, false, &mut rng);
        assert_eq!(bar0.len(), 2);
        assert_eq!(bar0[0].pitch, 69);
        assert_eq!(bar0[1].pitch, 76);
        assert_eq!(bar0[1].onset, 2.0);
        let bar1 = render_phrase_bar(Layer::Melody, &phrase, 1, 9, &cx, true, &mut rng);
        assert_eq!(bar1.len(), 1);
        assert_eq!(bar1[0].pitch, 81);
        all_well_formed(&bar1);
    }
}
