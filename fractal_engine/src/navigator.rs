// Blueprint navigator: percent-based sections → absolute bar ranges.
//
// Built once per session from a blueprint and a target bar count. Every
// section receives `round(total × percent / 100)` bars, rounded
// independently and clamped so the running total never overshoots; the last
// section absorbs whatever remains. Sub-sections are distributed the same way
// inside their parent's range. The resulting ranges are contiguous, start at
// bar 0 and cover `[0, total − 1]` exactly, whatever the rounding does.
// Sections that round to zero bars are kept (so section indices stay aligned
// with the blueprint) but are never returned by `tick`.
//
// `tick(bar)` loops: bars are taken modulo the total, so an endless scheduler
// simply wraps around the piece. A miss (impossible for ranges built here,
// but reachable through a hand-built navigator) is logged as a critical
// configuration error and yields `None`.
//
// See also: `brain/mod.rs`, which turns `is_part_transition` into a macro
// mutation and `is_sub_part_transition` into a micro mutation.

use crate::blueprint::Blueprint;
use crate::error::{BlueprintError, EngineError};
use serde::Serialize;

/// A half-open run of bars `[start_bar, start_bar + bar_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BarRange {
    pub start_bar: u32,
    pub bar_count: u32,
}

impl BarRange {
    /// Last bar of the range (inclusive), or `None` if the range is empty.
    pub fn end_bar(&self) -> Option<u32> {
        (self.bar_count > 0).then(|| self.start_bar + self.bar_count - 1)
    }

    pub fn contains(&self, bar: u32) -> bool {
        bar >= self.start_bar && bar - self.start_bar < self.bar_count
    }

    pub fn is_empty(&self) -> bool {
        self.bar_count == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubSectionSpan {
    pub index: usize,
    pub id: String,
    pub range: BarRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionSpan {
    pub index: usize,
    pub id: String,
    pub range: BarRange,
    pub sub_sections: Vec<SubSectionSpan>,
}

/// Where a bar sits in the blueprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationInfo {
    /// The bar after looping (`epoch % total_bars`).
    pub bar: u32,
    pub section_index: usize,
    pub section_id: String,
    pub sub_section_index: Option<usize>,
    pub sub_section_id: Option<String>,
    /// First bar of the section.
    pub is_part_transition: bool,
    /// First bar of the sub-section. Mirrors `is_part_transition` for
    /// sections without sub-sections.
    pub is_sub_part_transition: bool,
    pub bar_in_section: u32,
    pub section_bars: u32,
    /// Position through the whole piece in [0, 1).
    pub progress: f64,
}

#[derive(Debug, Clone)]
pub struct BlueprintNavigator {
    total_bars: u32,
    sections: Vec<SectionSpan>,
}

/// Split `total` bars starting at `start` by the given percents. The final
/// entry absorbs the rounding remainder.
fn distribute(total: u32, start: u32, percents: &[f64]) -> Vec<BarRange> {
    let mut ranges = Vec::with_capacity(percents.len());
    let mut used: u32 = 0;
    for (i, &percent) in percents.iter().enumerate() {
        let remaining = total - used;
        let count = if i + 1 == percents.len() {
            remaining
        } else {
            let share = if percent.is_finite() && percent > 0.0 {
                (f64::from(total) * percent / 100.0).round()
            } else {
                0.0
            };
            (share.min(f64::from(remaining))) as u32
        };
        ranges.push(BarRange {
            start_bar: start + used,
            bar_count: count,
        });
        used += count;
    }
    ranges
}

impl BlueprintNavigator {
    pub fn new(blueprint: &Blueprint, total_bars: u32) -> Result<Self, EngineError> {
        if total_bars == 0 {
            return Err(EngineError::ZeroBars);
        }
        if blueprint.sections.is_empty() {
            return Err(BlueprintError::NoSections.into());
        }

        let percents: Vec<f64> = blueprint.sections.iter().map(|s| s.percent).collect();
        let ranges = distribute(total_bars, 0, &percents);

        let sections = blueprint
            .sections
            .iter()
            .zip(ranges)
            .enumerate()
            .map(|(index, (section, range))| {
                let sub_percents: Vec<f64> =
                    section.sub_sections.iter().map(|s| s.percent).collect();
                let sub_ranges = distribute(range.bar_count, range.start_bar, &sub_percents);
                let sub_sections = section
                    .sub_sections
                    .iter()
                    .zip(sub_ranges)
                    .enumerate()
                    .map(|(sub_index, (sub, sub_range))| SubSectionSpan {
                        index: sub_index,
                        id: sub.id.clone(),
                        range: sub_range,
                    })
                    .collect();
                SectionSpan {
                    index,
                    id: section.id.clone(),
                    range,
                    sub_sections,
                }
            })
            .collect();

        Ok(BlueprintNavigator {
            total_bars,
            sections,
        })
    }

    pub fn total_bars(&self) -> u32 {
        self.total_bars
    }

    pub fn sections(&self) -> &[SectionSpan] {
        &self.sections
    }

    /// Navigation info for `epoch`, looping over the piece.
    pub fn tick(&self, epoch: u32) -> Option<NavigationInfo> {
        let bar = epoch % self.total_bars;
        let Some(span) = self.sections.iter().find(|s| s.range.contains(bar)) else {
            tracing::error!(
                epoch,
                bar,
                total_bars = self.total_bars,
                "no section covers this bar; blueprint percentages are inconsistent"
            );
            return None;
        };

        let is_part_transition = bar == span.range.start_bar;
        let sub = span.sub_sections.iter().find(|s| s.range.contains(bar));
        let is_sub_part_transition = match sub {
            Some(sub) => bar == sub.range.start_bar,
            None => is_part_transition,
        };

        Some(NavigationInfo {
            bar,
            section_index: span.index,
            section_id: span.id.clone(),
            sub_section_index: sub.map(|s| s.index),
            sub_section_id: sub.map(|s| s.id.clone()),
            is_part_transition,
            is_sub_part_transition,
            bar_in_section: bar - span.range.start_bar,
            section_bars: span.range.bar_count,
            progress: f64::from(bar) / f64::from(self.total_bars),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::SubSection;

    fn assert_contiguous(ranges: &[BarRange], start: u32, total: u32) {
        let mut next = start;
        for r in ranges {
            assert_eq!(r.start_bar, next, "gap or overlap at {r:?}");
            next += r.bar_count;
        }
        assert_eq!(next, start + total, "ranges do not cover the span");
    }

    #[test]
    fn distribute_absorbs_remainder_in_last() {
        let ranges = distribute(10, 0, &[33.3, 33.3, 33.4]);
        assert_eq!(
            ranges.iter().map(|r| r.bar_count).collect::<Vec<_>>(),
            vec![3, 3, 4]
        );
        assert_contiguous(&ranges, 0, 10);
    }

    #[test]
    fn distribute_never_overshoots() {
        // Percents summing to 150: later sections get clamped.
        let ranges = distribute(8, 0, &[75.0, 75.0, 0.0]);
        assert_eq!(
            ranges.iter().map(|r| r.bar_count).collect::<Vec<_>>(),
            vec![6, 2, 0]
        );
        assert_contiguous(&ranges, 0, 8);
    }

    #[test]
    fn boundary_coverage_for_many_totals() {
        let bp = Blueprint::ambient_suite();
        for total in 1..=97 {
            let nav = BlueprintNavigator::new(&bp, total).unwrap();
            let ranges: Vec<BarRange> = nav.sections().iter().map(|s| s.range).collect();
            assert_contiguous(&ranges, 0, total);
            for span in nav.sections() {
                if !span.sub_sections.is_empty() {
                    let subs: Vec<BarRange> = span.sub_sections.iter().map(|s| s.range).collect();
                    assert_contiguous(&subs, span.range.start_bar, span.range.bar_count);
                }
            }
            for bar in 0..total {
                assert!(nav.tick(bar).is_some(), "bar {bar} of {total} unmapped");
            }
        }
    }

    #[test]
    fn tick_flags_transitions_and_loops() {
        let bp = Blueprint::single_section("main");
        let nav = BlueprintNavigator::new(&bp, 16).unwrap();
        let first = nav.tick(0).unwrap();
        assert!(first.is_part_transition);
        assert!(first.is_sub_part_transition);
        assert!(!nav.tick(1).unwrap().is_part_transition);
        // Looping: bar 16 is bar 0 again.
        let looped = nav.tick(16).unwrap();
        assert_eq!(looped.bar, 0);
        assert!(looped.is_part_transition);
    }

    #[test]
    fn sub_section_transitions() {
        let mut bp = Blueprint::single_section("main");
        bp.sections[0].sub_sections = vec![
            SubSection {
                id: "a".into(),
                percent: 50.0,
            },
            SubSection {
                id: "b".into(),
                percent: 50.0,
            },
        ];
        let nav = BlueprintNavigator::new(&bp, 8).unwrap();
        let at4 = nav.tick(4).unwrap();
        assert!(at4.is_sub_part_transition);
        assert!(!at4.is_part_transition);
        assert_eq!(at4.sub_section_id.as_deref(), Some("b"));
        assert!(!nav.tick(5).unwrap().is_sub_part_transition);
    }

    #[test]
    fn zero_bars_rejected() {
        let bp = Blueprint::single_section("main");
        assert!(matches!(
            BlueprintNavigator::new(&bp, 0),
            Err(EngineError::ZeroBars)
        ));
    }
}
