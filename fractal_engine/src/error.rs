// Typed load-time errors.
//
// The engine degrades rather than failing once a session is running (see
// the per-bar fallbacks in `brain/` and `render.rs`). Everything that can be
// rejected up front, malformed blueprints and phrase libraries, is rejected
// here with a typed error instead.

use crate::types::Layer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("blueprint has no sections")]
    NoSections,
    #[error("section '{section}': percent must be finite and positive, got {value}")]
    InvalidPercent { section: String, value: f64 },
    #[error("section '{section}': {layer:?} rule has no timbre options")]
    EmptyOptions { section: String, layer: Layer },
    #[error("section '{section}': {layer:?} option weight must be finite and positive")]
    InvalidWeight { section: String, layer: Layer },
    #[error("section '{section}': {layer:?} activation chance {value} outside [0, 1]")]
    InvalidActivationChance {
        section: String,
        layer: Layer,
        value: f64,
    },
    #[error("section '{section}': staged instrumentation has no stages")]
    EmptyStages { section: String },
    #[error("section '{section}': lottery stage count must be at least 1")]
    ZeroStageCount { section: String },
    #[error("section '{section}': density bounds for {layer:?} are inverted")]
    InvertedDensity { section: String, layer: Layer },
    #[error("invalid tension curve: {0}")]
    InvalidTensionCurve(String),
    #[error("invalid tempo range {min}..{max}")]
    InvalidTempo { min: f64, max: f64 },
    #[error("failed to parse blueprint: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read blueprint: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("phrase library contains no phrases")]
    Empty,
    #[error("phrase '{0}' has no notes")]
    EmptyPhrase(String),
    #[error("phrase '{phrase}': note at tick {tick} runs past {max_bars} bars")]
    PhraseTooLong {
        phrase: String,
        tick: u32,
        max_bars: u32,
    },
    #[error("solo plan '{plan}' references unknown lick '{lick}'")]
    UnknownLick { plan: String, lick: String },
    #[error("failed to parse phrase library: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read phrase library: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("total bar count must be at least 1")]
    ZeroBars,
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),
    #[error(transparent)]
    Library(#[from] LibraryError),
}
