// Instrumentation lottery: which layers play, and on which timbre.
//
// Owns the activated-layer set and the committed timbre per layer. A section
// is split into `N` equal stages (`stage = bar_in_section × N / section_bars`;
// flat sections have one stage). Rules are evaluated only when the
// (section, stage) pair differs from the last one evaluated, so a stage's
// rules fire once on its first bar.
//
// Per rule:
// - inactive layer: roll `activation_chance` on the brain's PRNG; on success
//   the layer becomes active for the rest of the session and a timbre is
//   committed.
// - active layer with two or more options: redraw the timbre. A redraw equal
//   to the committed timbre is not a change (no reconnect signal).
//
// Timbre draws use `hash_unit(seed, bar, option_count)` rather than the PRNG
// stream, so a timbre choice can be replayed from the bar alone. The
// blueprint's substitution table remaps a drawn timbre before it is
// compared and committed.
//
// Lottery-mode sections shuffle their (layer, rule) list once (cached per
// section) and spread it over the stages in contiguous chunks. Layers in a
// section's active set that no rule in the section mentions activate
// implicitly with their default timbre.
//
// The accompaniment pad sounds on every bar: before its rule activates it,
// it plays on its (substituted) default timbre.
//
// Change signals are computed against the timbre last reported for each
// layer, not against the previous bar. A rule may redraw the timbre of a
// layer the section silences; the change is then reported on the first bar
// the layer sounds again.

use crate::blueprint::{Blueprint, InstrumentRule, Instrumentation, Section};
use crate::event::InstrumentHints;
use crate::navigator::NavigationInfo;
use crate::timbre::Timbre;
use crate::types::Layer;
use fractal_prng::{SeededRng, hash_unit, select_branch};
use std::collections::{BTreeMap, BTreeSet};

/// Stage index of `bar_in_section` when a section of `section_bars` bars is
/// split into `stage_count` equal stages.
pub fn stage_of(bar_in_section: u32, section_bars: u32, stage_count: usize) -> usize {
    if section_bars == 0 || stage_count <= 1 {
        return 0;
    }
    let stage = u64::from(bar_in_section) * stage_count as u64 / u64::from(section_bars);
    (stage as usize).min(stage_count - 1)
}

/// Pure weighted timbre pick for `bar`.
pub fn draw_timbre(seed: u64, bar: u32, rule: &InstrumentRule) -> Option<Timbre> {
    let weights: Vec<f64> = rule.options.iter().map(|o| o.weight).collect();
    let unit = hash_unit(seed, u64::from(bar), rule.options.len() as u64);
    let idx = select_branch(unit, &weights)?;
    rule.options.get(idx).map(|o| o.timbre)
}

#[derive(Debug, Clone)]
pub struct InstrumentationLottery {
    seed: u64,
    activated: BTreeSet<Layer>,
    committed: BTreeMap<Layer, Timbre>,
    last_stage: Option<(usize, usize)>,
    /// Lottery-mode chunking per section index: rule indices per stage.
    lottery_chunks: BTreeMap<usize, Vec<Vec<usize>>>,
    /// Summon progress of layers activated in the current stage.
    stage_summons: BTreeMap<Layer, f64>,
    /// Timbre last reported in the hints, per layer.
    reported: BTreeMap<Layer, Timbre>,
}

impl InstrumentationLottery {
    pub fn new(seed: u64) -> Self {
        InstrumentationLottery {
            seed,
            activated: BTreeSet::new(),
            committed: BTreeMap::new(),
            last_stage: None,
            lottery_chunks: BTreeMap::new(),
            stage_summons: BTreeMap::new(),
            reported: BTreeMap::new(),
        }
    }

    pub fn is_active(&self, layer: Layer) -> bool {
        self.activated.contains(&layer)
    }

    pub fn committed(&self, layer: Layer) -> Option<Timbre> {
        self.committed.get(&layer).copied()
    }

    pub fn activated(&self) -> &BTreeSet<Layer> {
        &self.activated
    }

    /// Layers that may sound in `section` this bar: active and in the
    /// section's layer set, plus the accompaniment pad.
    pub fn sounding(&self, section: &Section) -> BTreeSet<Layer> {
        let mut layers: BTreeSet<Layer> = self
            .activated
            .intersection(&section.layers)
            .copied()
            .collect();
        layers.insert(Layer::Accompaniment);
        layers
    }

    /// Timbre `layer` sounds on: the committed one, or its default.
    fn sounding_timbre(&self, layer: Layer, substitutions: &BTreeMap<Timbre, Timbre>) -> Timbre {
        self.committed(layer)
            .unwrap_or_else(|| substitute(Timbre::default_for(layer), substitutions))
    }

    /// Evaluate the rules for this bar (if the stage changed) and report the
    /// bar's timbre assignments.
    pub fn update(
        &mut self,
        blueprint: &Blueprint,
        nav: &NavigationInfo,
        rng: &mut SeededRng,
    ) -> InstrumentHints {
        let Some(section) = blueprint.sections.get(nav.section_index) else {
            return InstrumentHints::default();
        };

        let stage_count = section.instrumentation.stage_count();
        let stage = stage_of(nav.bar_in_section, nav.section_bars, stage_count);
        if self.last_stage != Some((nav.section_index, stage)) {
            self.last_stage = Some((nav.section_index, stage));
            self.stage_summons.clear();

            let rules = self.stage_rules(nav.section_index, section, stage, rng);
            for (layer, rule) in rules {
                let was_active = self.is_active(layer);
                self.apply_rule(layer, &rule, nav.bar, &blueprint.substitutions, rng);
                if !was_active && self.is_active(layer) && section.instrumentation.is_staged() {
                    let progress = (stage + 1) as f64 / stage_count as f64;
                    self.stage_summons.insert(layer, progress);
                }
            }

            for &layer in &section.layers {
                if self.is_active(layer) || section.has_rule_for(layer) {
                    continue;
                }
                let timbre = substitute(Timbre::default_for(layer), &blueprint.substitutions);
                self.activated.insert(layer);
                self.committed.insert(layer, timbre);
            }
        }

        let sounding = self.sounding(section);
        let timbres: BTreeMap<Layer, Timbre> = sounding
            .iter()
            .map(|&l| (l, self.sounding_timbre(l, &blueprint.substitutions)))
            .collect();
        let mut changed = BTreeSet::new();
        for (&layer, &timbre) in &timbres {
            if self.reported.insert(layer, timbre) != Some(timbre) {
                changed.insert(layer);
            }
        }
        InstrumentHints {
            timbres,
            changed,
            summon_progress: self
                .stage_summons
                .iter()
                .filter(|(l, _)| sounding.contains(l))
                .map(|(&l, &p)| (l, p))
                .collect(),
        }
    }

    /// The (layer, rule) pairs that fire on entering `stage`.
    fn stage_rules(
        &mut self,
        section_index: usize,
        section: &Section,
        stage: usize,
        rng: &mut SeededRng,
    ) -> Vec<(Layer, InstrumentRule)> {
        match &section.instrumentation {
            Instrumentation::Flat { rules } => {
                rules.iter().map(|(&l, r)| (l, r.clone())).collect()
            }
            Instrumentation::Staged { stages } => stages
                .get(stage)
                .map(|s| s.iter().map(|(&l, r)| (l, r.clone())).collect())
                .unwrap_or_default(),
            Instrumentation::Lottery { stage_count, rules } => {
                let chunks = self.lottery_chunks.entry(section_index).or_insert_with(|| {
                    let mut order: Vec<usize> = (0..rules.len()).collect();
                    rng.shuffle(&mut order);
                    chunk_evenly(&order, (*stage_count).max(1))
                });
                chunks
                    .get(stage)
                    .map(|idxs| {
                        idxs.iter()
                            .filter_map(|&i| rules.get(i))
                            .map(|r| (r.layer, r.rule.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            }
        }
    }

    /// Apply one rule. Returns true when the committed timbre changed.
    fn apply_rule(
        &mut self,
        layer: Layer,
        rule: &InstrumentRule,
        bar: u32,
        substitutions: &BTreeMap<Timbre, Timbre>,
        rng: &mut SeededRng,
    ) -> bool {
        if rule.options.is_empty() {
            return false;
        }
        if !self.is_active(layer) {
            if !rng.random_bool(rule.activation_chance) {
                return false;
            }
            let Some(drawn) = draw_timbre(self.seed, bar, rule) else {
                return false;
            };
            self.activated.insert(layer);
            self.committed.insert(layer, substitute(drawn, substitutions));
            tracing::debug!(?layer, bar, "layer activated");
            return true;
        }
        if rule.options.len() < 2 && self.committed.contains_key(&layer) {
            return false;
        }
        let Some(drawn) = draw_timbre(self.seed, bar, rule) else {
            return false;
        };
        let timbre = substitute(drawn, substitutions);
        if self.committed(layer) == Some(timbre) {
            return false;
        }
        self.committed.insert(layer, timbre);
        tracing::debug!(?layer, bar, ?timbre, "timbre redrawn");
        true
    }
}

fn substitute(timbre: Timbre, substitutions: &BTreeMap<Timbre, Timbre>) -> Timbre {
    substitutions.get(&timbre).copied().unwrap_or(timbre)
}

/// Split `items` into `n` contiguous chunks whose sizes differ by at most one.
fn chunk_evenly(items: &[usize], n: usize) -> Vec<Vec<usize>> {
    (0..n)
        .map(|i| {
            let start = i * items.len() / n;
            let end = (i + 1) * items.len() / n;
            items[start..end].to_vec()
        })
        .collect()
}
