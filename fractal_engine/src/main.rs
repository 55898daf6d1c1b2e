// Fractal Music Engine: CLI entry point.
//
// Builds a session and prints one JSON object per generated bar to stdout.
// Logs go to stderr (`RUST_LOG` overrides the default `info` filter).
//
// Usage:
//   cargo run -p fractal_engine --bin generate -- [--seed N] [--mood MOOD]
//     [--genre GENRE] [--bars N] [--count N] [--blueprint PATH|ambient|blues]
//     [--library PATH] [--dna]
//
// Moods: melancholic, dreamy, calm, dark, epic, joyful, enthusiastic
// Genres: ambient, blues

use fractal_engine::blueprint::Blueprint;
use fractal_engine::error::EngineError;
use fractal_engine::library::PhraseLibrary;
use fractal_engine::session::{Session, SessionConfig};
use fractal_engine::types::{Genre, Mood};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), EngineError> {
    let seed: u64 = parse_flag(args, "--seed").unwrap_or(42);
    let mood_name: String = parse_flag(args, "--mood").unwrap_or_else(|| "melancholic".to_string());
    let genre_name: String = parse_flag(args, "--genre").unwrap_or_else(|| "ambient".to_string());
    let total_bars: u32 = parse_flag(args, "--bars").unwrap_or(64);
    let blueprint_arg: Option<String> = parse_flag(args, "--blueprint");
    let library_path: Option<String> = parse_flag(args, "--library");

    let mood = parse_enum::<Mood>(&mood_name).unwrap_or_else(|| {
        tracing::warn!(mood = %mood_name, "unknown mood; using melancholic");
        Mood::Melancholic
    });
    let genre = parse_enum::<Genre>(&genre_name).unwrap_or_else(|| {
        tracing::warn!(genre = %genre_name, "unknown genre; using ambient");
        Genre::Ambient
    });
    let count: u32 = parse_flag(args, "--count").unwrap_or(total_bars);

    let blueprint = match blueprint_arg.as_deref() {
        Some("ambient") => Blueprint::ambient_suite(),
        Some("blues") => Blueprint::blues_suite(),
        Some(path) => Blueprint::load(Path::new(path))?,
        None => match genre {
            Genre::Ambient => Blueprint::ambient_suite(),
            Genre::Blues => Blueprint::blues_suite(),
        },
    };
    let library = match library_path {
        Some(path) => {
            let lib = PhraseLibrary::load(Path::new(&path))?;
            tracing::info!(path = %path, phrases = lib.phrases.len(), "loaded phrase library");
            lib
        }
        None => PhraseLibrary::default_library(),
    };

    let config = SessionConfig {
        seed,
        mood,
        genre,
        total_bars,
    };
    let mut session = Session::new(config, blueprint, Arc::new(library))?;

    if args.iter().any(|a| a == "--dna") {
        println!("{}", to_json(session.dna()));
    }

    session.start();
    for _ in 0..count {
        let Some(bar) = session.next_bar() else {
            break;
        };
        println!("{}", to_json(&bar));
    }
    session.stop();
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!("failed to serialize output: {e}");
        String::from("null")
    })
}

/// Parse a snake_case enum name through its serde representation.
fn parse_enum<T: serde::de::DeserializeOwned>(name: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase())).ok()
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
