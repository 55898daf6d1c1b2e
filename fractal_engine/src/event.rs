// Engine output: note events and instrument hints.
//
// `FractalEvent` is the atomic output: one note or hit, positioned in beats
// relative to the bar's downbeat. The downstream renderer converts to
// absolute time with the bar start and tempo (beat = 60 / bpm seconds).
//
// `InstrumentHints` tells the renderer which timbre plays each layer this
// bar. `changed` lists the layers whose committed timbre changed this bar;
// only those warrant reconnecting an instrument, and the renderer may delay
// the swap until the layer is silent.
//
// `BarOutput` bundles everything one `generate_bar` call produces.

use crate::navigator::NavigationInfo;
use crate::timbre::Timbre;
use crate::types::Layer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Playing technique tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    #[default]
    Plain,
    Bend,
    Slide,
    Vibrato,
    Ghost,
    Staccato,
    Swell,
    Hit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dynamics {
    Pp,
    P,
    Mp,
    Mf,
    F,
}

impl Dynamics {
    /// Dynamics marking for a 0..1 weight.
    pub fn from_weight(weight: f64) -> Self {
        match weight {
            w if w < 0.2 => Dynamics::Pp,
            w if w < 0.4 => Dynamics::P,
            w if w < 0.6 => Dynamics::Mp,
            w if w < 0.8 => Dynamics::Mf,
            _ => Dynamics::F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phrasing {
    Legato,
    Detached,
    Accented,
    Sustained,
}

/// Advisory parameters consumed only downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    /// Bar index (the epoch, before looping).
    pub bar: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_cutoff_hz: Option<f64>,
    /// Drum-kit sample name for percussive hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    /// Stereo position in [−1, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractalEvent {
    pub layer: Layer,
    /// MIDI pitch (General MIDI drum map for the drum layer).
    pub pitch: u8,
    /// Onset in beats from the bar's downbeat.
    pub onset: f64,
    /// Duration in beats.
    pub duration: f64,
    /// Loudness in [0, 1].
    pub weight: f64,
    pub technique: Technique,
    pub dynamics: Dynamics,
    pub phrasing: Phrasing,
    pub params: EventParams,
}

impl FractalEvent {
    /// A plain legato note with dynamics derived from its weight.
    pub fn note(layer: Layer, pitch: u8, onset: f64, duration: f64, weight: f64, bar: u32) -> Self {
        let weight = weight.clamp(0.0, 1.0);
        FractalEvent {
            layer,
            pitch: pitch.min(127),
            onset,
            duration,
            weight,
            technique: Technique::Plain,
            dynamics: Dynamics::from_weight(weight),
            phrasing: Phrasing::Legato,
            params: EventParams {
                bar,
                ..EventParams::default()
            },
        }
    }

    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = technique;
        self
    }

    pub fn with_phrasing(mut self, phrasing: Phrasing) -> Self {
        self.phrasing = phrasing;
        self
    }

    pub fn with_cutoff(mut self, hz: f64) -> Self {
        self.params.filter_cutoff_hz = Some(hz);
        self
    }

    pub fn with_sample(mut self, sample: &str) -> Self {
        self.params.sample = Some(sample.to_string());
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.params.pan = Some(pan.clamp(-1.0, 1.0));
        self
    }

    /// True when every numeric field is finite and in its documented range.
    pub fn is_well_formed(&self) -> bool {
        let finite_opt = |v: Option<f64>| v.is_none_or(f64::is_finite);
        self.onset.is_finite()
            && self.onset >= 0.0
            && self.duration.is_finite()
            && self.duration > 0.0
            && self.weight.is_finite()
            && (0.0..=1.0).contains(&self.weight)
            && self.pitch <= 127
            && finite_opt(self.params.filter_cutoff_hz)
            && finite_opt(self.params.pan)
    }
}

/// Per-bar timbre assignments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentHints {
    /// Timbre for every layer that is active this bar.
    pub timbres: BTreeMap<Layer, Timbre>,
    /// Layers whose committed timbre changed this bar (reconnect signals).
    pub changed: BTreeSet<Layer>,
    /// For staged sections: fraction of the section's stages revealed so
    /// far, reported for layers summoned in the current stage.
    pub summon_progress: BTreeMap<Layer, f64>,
}

/// Everything one bar of generation produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarOutput {
    /// The epoch that was requested (before looping).
    pub bar: u32,
    pub events: Vec<FractalEvent>,
    pub hints: InstrumentHints,
    pub tension: f64,
    /// Placeholder telemetry score in [0, 1].
    pub aesthetic_score: f64,
    pub navigation: Option<NavigationInfo>,
}

impl BarOutput {
    /// Output for a bar that could not be placed in the blueprint.
    pub fn silent(bar: u32) -> Self {
        BarOutput {
            bar,
            events: Vec::new(),
            hints: InstrumentHints::default(),
            tension: 0.0,
            aesthetic_score: 0.0,
            navigation: None,
        }
    }

    pub fn events_for(&self, layer: Layer) -> impl Iterator<Item = &FractalEvent> {
        self.events.iter().filter(move |e| e.layer == layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamics_follow_weight() {
        assert_eq!(Dynamics::from_weight(0.0), Dynamics::Pp);
        assert_eq!(Dynamics::from_weight(0.5), Dynamics::Mp);
        assert_eq!(Dynamics::from_weight(1.0), Dynamics::F);
    }

    #[test]
    fn note_constructor_clamps() {
        let e = FractalEvent::note(Layer::Melody, 200, 0.0, 1.0, 1.7, 3);
        assert_eq!(e.pitch, 127);
        assert_eq!(e.weight, 1.0);
        assert_eq!(e.params.bar, 3);
        assert!(e.is_well_formed());
    }

    #[test]
    fn non_finite_events_are_malformed() {
        let mut e = FractalEvent::note(Layer::Bass, 40, 0.0, 1.0, 0.5, 0);
        e.onset = f64::NAN;
        assert!(!e.is_well_formed());
        let e = FractalEvent::note(Layer::Bass, 40, 0.0, 1.0, 0.5, 0).with_cutoff(f64::INFINITY);
        assert!(!e.is_well_formed());
        let mut e = FractalEvent::note(Layer::Bass, 40, 0.0, 1.0, 0.5, 0);
        e.duration = 0.0;
        assert!(!e.is_well_formed());
    }

    #[test]
    fn params_skip_empty_fields() {
        let e = FractalEvent::note(Layer::Drums, 36, 0.0, 0.25, 0.8, 1).with_sample("kick_soft");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["params"]["sample"], "kick_soft");
        assert!(json["params"].get("pan").is_none());
    }
}
