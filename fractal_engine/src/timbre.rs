// Timbre identifiers.
//
// A timbre is the downstream renderer's instrument choice for a layer. The
// engine never synthesizes anything; it only names timbres in
// `InstrumentHints`. Names resolve through the single `TIMBRE_NAMES` table,
// which also carries the legacy aliases authored blueprints still use. An
// unknown name is a deserialization error, so a blueprint that loads can
// never reference a timbre the renderer does not know.

use crate::types::Layer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timbre {
    // Pads
    WarmPad,
    GlassPad,
    Strings,
    Choir,
    Organ,
    // Bass
    SynthBass,
    FretlessBass,
    UprightBass,
    // Drums
    AmbientKit,
    BrushKit,
    BluesKit,
    // Keys
    AcousticPiano,
    ElectricPiano,
    // Leads
    Flute,
    Violin,
    CleanGuitar,
    OverdriveGuitar,
    Harmonica,
    Saxophone,
    // Sparkles
    Celesta,
    MusicBox,
    Bells,
    // Sound effects
    Wind,
    Rain,
    Shimmer,
}

/// The one name resolution table: canonical names first, then aliases.
const TIMBRE_NAMES: &[(&str, Timbre)] = &[
    ("warm_pad", Timbre::WarmPad),
    ("glass_pad", Timbre::GlassPad),
    ("strings", Timbre::Strings),
    ("choir", Timbre::Choir),
    ("organ", Timbre::Organ),
    ("synth_bass", Timbre::SynthBass),
    ("fretless_bass", Timbre::FretlessBass),
    ("upright_bass", Timbre::UprightBass),
    ("ambient_kit", Timbre::AmbientKit),
    ("brush_kit", Timbre::BrushKit),
    ("blues_kit", Timbre::BluesKit),
    ("acoustic_piano", Timbre::AcousticPiano),
    ("electric_piano", Timbre::ElectricPiano),
    ("flute", Timbre::Flute),
    ("violin", Timbre::Violin),
    ("clean_guitar", Timbre::CleanGuitar),
    ("overdrive_guitar", Timbre::OverdriveGuitar),
    ("harmonica", Timbre::Harmonica),
    ("saxophone", Timbre::Saxophone),
    ("celesta", Timbre::Celesta),
    ("music_box", Timbre::MusicBox),
    ("bells", Timbre::Bells),
    ("wind", Timbre::Wind),
    ("rain", Timbre::Rain),
    ("shimmer", Timbre::Shimmer),
    // Aliases
    ("synth", Timbre::WarmPad),
    ("pad", Timbre::WarmPad),
    ("piano", Timbre::AcousticPiano),
    ("rhodes", Timbre::ElectricPiano),
    ("bass", Timbre::SynthBass),
    ("guitar", Timbre::CleanGuitar),
    ("sax", Timbre::Saxophone),
    ("drums", Timbre::AmbientKit),
];

impl Timbre {
    /// Resolve a canonical name or alias.
    pub fn from_name(name: &str) -> Option<Timbre> {
        let needle = name.trim().to_ascii_lowercase();
        TIMBRE_NAMES
            .iter()
            .find(|(n, _)| *n == needle)
            .map(|&(_, t)| t)
    }

    /// Canonical name (the first table entry for this timbre).
    pub fn name(self) -> &'static str {
        TIMBRE_NAMES
            .iter()
            .find(|&&(_, t)| t == self)
            .map(|&(n, _)| n)
            .unwrap_or("warm_pad")
    }

    /// Timbre used when a layer activates without an authored rule.
    pub fn default_for(layer: Layer) -> Timbre {
        match layer {
            Layer::Accompaniment => Timbre::WarmPad,
            Layer::Bass => Timbre::SynthBass,
            Layer::Drums => Timbre::AmbientKit,
            Layer::Melody => Timbre::Flute,
            Layer::Harmony => Timbre::Strings,
            Layer::PianoAccompaniment => Timbre::AcousticPiano,
            Layer::Sparkles => Timbre::Celesta,
            Layer::SoundFx => Timbre::Wind,
        }
    }
}

impl TryFrom<String> for Timbre {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Timbre::from_name(&name).ok_or_else(|| format!("unknown timbre '{name}'"))
    }
}

impl From<Timbre> for String {
    fn from(t: Timbre) -> String {
        t.name().to_string()
    }
}

impl std::fmt::Display for Timbre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
