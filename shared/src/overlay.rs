//! Layout indicators drawn over wells, and the compound highlight.

use std::collections::HashMap;

use crate::plate::Plate;

/// Vertical distance between stacked indicators of one well.
pub const INDICATOR_SPACING_PX: u32 = 9;
pub const DEFAULT_COMPOUND_COLOR: &str = "#9e9e9e";

const CONTROL_COLORS: [(&str, &str); 4] = [
    ("dmso", "#4a6fa5"),
    ("blank", "#ffffff"),
    ("empty", "#ffffff"),
    ("untreated", "#c7c7c7"),
];

const CYCLE_COLORS: [&str; 10] = [
    "#e6194b", "#3cb44b", "#ffe119", "#f58231", "#911eb4",
    "#46f0f0", "#f032e6", "#bcf60c", "#fabebe", "#008080",
];

/// Compound id to indicator color.
#[derive(Debug, Clone, Default)]
pub struct CompoundPalette {
    colors: HashMap<String, String>,
}

impl CompoundPalette {
    /// Controls keep fixed colors; other compounds take cycle colors in
    /// first-seen order.
    pub fn for_plate(plate: &Plate) -> Self {
        let mut palette = Self::default();
        let mut next = 0;
        let compounds = plate
            .layout
            .values()
            .flatten()
            .filter_map(|record| record.compound.as_deref());
        for compound in compounds {
            let key = compound.to_lowercase();
            if palette.colors.contains_key(&key) {
                continue;
            }
            let color = match CONTROL_COLORS.iter().find(|(control, _)| *control == key) {
                Some((_, color)) => color.to_string(),
                None => {
                    let color = CYCLE_COLORS[next % CYCLE_COLORS.len()];
                    next += 1;
                    color.to_string()
                }
            };
            palette.colors.insert(key, color);
        }
        palette
    }

    pub fn color(&self, compound: &str) -> &str {
        self.colors
            .get(&compound.to_lowercase())
            .map(String::as_str)
            .unwrap_or(DEFAULT_COMPOUND_COLOR)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutIndicator {
    pub well: String,
    pub slot: usize,
    pub compound: String,
    pub color: String,
    pub offset_px: u32,
    pub tooltip: String,
}

/// Every indicator of a plate with the current highlight state.
#[derive(Debug, Clone, Default)]
pub struct LayoutOverlay {
    indicators: Vec<LayoutIndicator>,
    lit: Vec<bool>,
    highlighted: Option<String>,
}

impl LayoutOverlay {
    pub fn build(plate: &Plate) -> Self {
        let palette = CompoundPalette::for_plate(plate);
        let indicators: Vec<LayoutIndicator> = plate
            .layout
            .iter()
            .flat_map(|(well, records)| {
                let palette = &palette;
                records.iter().enumerate().map(move |(slot, record)| LayoutIndicator {
                    well: well.clone(),
                    slot,
                    compound: record.compound_key().to_string(),
                    color: palette.color(record.compound_key()).to_string(),
                    offset_px: slot as u32 * INDICATOR_SPACING_PX,
                    tooltip: record.tooltip(),
                })
            })
            .collect();
        let lit = vec![false; indicators.len()];
        Self { indicators, lit, highlighted: None }
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Indicators of one well with their overlay-wide index.
    pub fn for_well<'a>(&'a self, well: &'a str) -> impl Iterator<Item = (usize, &'a LayoutIndicator)> + 'a {
        self.indicators
            .iter()
            .enumerate()
            .filter(move |(_, indicator)| indicator.well == well)
    }

    pub fn is_lit(&self, index: usize) -> bool {
        self.lit.get(index).copied().unwrap_or(false)
    }

    /// Highlights every indicator sharing `compound` (or clears with `None`)
    /// and returns the indices whose state flipped.
    pub fn hover(&mut self, compound: Option<&str>) -> Vec<(usize, bool)> {
        let compound = compound.filter(|compound| !compound.is_empty());
        if self.highlighted.as_deref() == compound {
            return Vec::new();
        }
        self.highlighted = compound.map(str::to_string);

        let mut changed = Vec::new();
        for (index, indicator) in self.indicators.iter().enumerate() {
            let lit = compound.is_some_and(|compound| indicator.compound.eq_ignore_ascii_case(compound));
            if self.lit[index] != lit {
                self.lit[index] = lit;
                changed.push((index, lit));
            }
        }
        changed
    }
}
