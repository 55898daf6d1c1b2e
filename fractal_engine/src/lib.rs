// Fractal Music Engine
//
// A deterministic, seed-driven procedural music engine. Given a seed, a mood,
// a genre and a blueprint (an authored, percent-based composition plan), it
// produces a reproducible stream of per-bar note events and instrument hints
// for a downstream synthesizer.
//
// Architecture:
// - types.rs: Closed enums shared across modules (layers, moods, genres,
//   chord qualities, feels, bass/drum styles, registers)
// - timbre.rs: Closed timbre enum with a single name/alias resolution table
// - scale.rs: Modes, keys, pitch snapping and diatonic triad qualities
// - blueprint.rs: Blueprint data model, JSON loading, validation, presets
// - navigator.rs: Percent sections → contiguous bar ranges, looping `tick`
// - dna.rs: Once-per-run harmony track, tempo, feel, styles, solo plans
// - tension.rs: Four-band oscillator tension model
// - lottery.rs: Staged instrumentation lottery and timbre commitment
// - phrase.rs: Tick-grid phrases with named degrees and pure mutations
// - library.rs: Tagged phrase groups, solo plans and drum kits
// - render.rs: Per-layer renderers (pad, bass, drums, melody, ...)
// - brain/: Genre conductors (ambient theme gate, blues licks) over a
//   shared core
// - session.rs: Immutable config, start/stop/reset, per-bar generation
// - event.rs: Output types (events, hints, bar output)
// - error.rs: Typed load-time errors
//
// Everything is deterministic given the seed: randomness comes from
// `fractal_prng` streams derived from the session seed, and every map whose
// iteration order reaches the output is a BTreeMap.

pub mod blueprint;
pub mod brain;
pub mod dna;
pub mod error;
pub mod event;
pub mod library;
pub mod lottery;
pub mod navigator;
pub mod phrase;
pub mod render;
pub mod scale;
pub mod session;
pub mod tension;
pub mod timbre;
pub mod types;
