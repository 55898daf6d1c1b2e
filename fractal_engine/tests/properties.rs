// Whole-run properties: determinism, harmony coverage, event hygiene and
// lottery exclusivity across seeds, moods and genres.

use std::collections::BTreeMap;
use std::sync::Arc;

use fractal_engine::blueprint::Blueprint;
use fractal_engine::event::BarOutput;
use fractal_engine::library::PhraseLibrary;
use fractal_engine::session::{Session, SessionConfig};
use fractal_engine::types::{Genre, Layer, Mood};

fn run(
    seed: u64,
    mood: Mood,
    genre: Genre,
    total_bars: u32,
    count: u32,
) -> (Session, Vec<BarOutput>) {
    let blueprint = match genre {
        Genre::Ambient => Blueprint::ambient_suite(),
        Genre::Blues => Blueprint::blues_suite(),
    };
    let config = SessionConfig {
        seed,
        mood,
        genre,
        total_bars,
    };
    let mut session =
        Session::new(config, blueprint, Arc::new(PhraseLibrary::default_library())).unwrap();
    let bars = (0..count).map(|e| session.generate_bar(e)).collect();
    (session, bars)
}

#[test]
fn identical_inputs_replay_identically() {
    for genre in [Genre::Ambient, Genre::Blues] {
        for mood in Mood::ALL {
            let (_, a) = run(1234, mood, genre, 40, 60);
            let (_, b) = run(1234, mood, genre, 40, 60);
            assert_eq!(a, b, "{genre:?} {mood:?} diverged");
        }
    }
}

#[test]
fn different_seeds_differ() {
    let (_, a) = run(1, Mood::Calm, Genre::Ambient, 32, 32);
    let (_, b) = run(2, Mood::Calm, Genre::Ambient, 32, 32);
    assert_ne!(a, b);
}

#[test]
fn harmony_covers_every_bar() {
    for seed in 0..25 {
        for genre in [Genre::Ambient, Genre::Blues] {
            for total in [1, 5, 12, 37, 128] {
                let (session, _) = run(seed, Mood::Epic, genre, total, 0);
                let dna = session.dna();
                let mut next = 0;
                for chord in &dna.harmony {
                    assert_eq!(chord.start_bar, next);
                    next = chord.end_bar();
                }
                assert_eq!(next, total);
                for bar in 0..total {
                    assert!(dna.chord_at(bar).is_some());
                }
            }
        }
    }
}

#[test]
fn events_are_well_formed_and_inside_the_bar() {
    for seed in [0, 17, 99] {
        for genre in [Genre::Ambient, Genre::Blues] {
            let (_, bars) = run(seed, Mood::Enthusiastic, genre, 48, 96);
            for out in &bars {
                assert!((0.0..=1.0).contains(&out.tension));
                assert!((0.0..=1.0).contains(&out.aesthetic_score));
                for e in &out.events {
                    assert!(e.is_well_formed(), "{e:?}");
                    assert!(e.onset < 4.0, "{e:?}");
                    assert_eq!(e.params.bar, out.bar);
                }
                assert!(
                    out.events.windows(2).all(|w| w[0].onset <= w[1].onset),
                    "events out of order in bar {}",
                    out.bar
                );
            }
        }
    }
}

#[test]
fn lottery_signals_only_real_changes() {
    for seed in 0..10 {
        for genre in [Genre::Ambient, Genre::Blues] {
            let (_, bars) = run(seed, Mood::Dreamy, genre, 64, 128);
            // Timbre each layer had the last bar it sounded, however long ago.
            let mut last_heard: BTreeMap<_, _> = BTreeMap::new();
            for out in &bars {
                let hints = &out.hints;
                for layer in &hints.changed {
                    assert!(hints.timbres.contains_key(layer));
                }
                for (layer, timbre) in &hints.timbres {
                    match last_heard.insert(*layer, *timbre) {
                        Some(prev) if hints.changed.contains(layer) => {
                            assert_ne!(prev, *timbre, "equal redraw flagged at bar {}", out.bar);
                        }
                        Some(prev) => {
                            assert_eq!(prev, *timbre, "silent timbre change at bar {}", out.bar);
                        }
                        None => {
                            assert!(hints.changed.contains(layer), "first use unsignalled");
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn accompaniment_plays_every_bar_of_the_ambient_suite() {
    for seed in 0..30 {
        let (_, bars) = run(seed, Mood::Calm, Genre::Ambient, 80, 80);
        for out in &bars {
            assert!(
                out.events_for(Layer::Accompaniment).count() > 0,
                "seed {seed} bar {} has no accompaniment",
                out.bar
            );
        }
    }
}

#[test]
fn events_only_on_sounding_layers() {
    let (_, bars) = run(5, Mood::Dark, Genre::Ambient, 64, 64);
    for out in &bars {
        for e in &out.events {
            assert!(out.hints.timbres.contains_key(&e.layer));
        }
    }
}
