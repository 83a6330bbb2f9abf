use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ingest::field_string;

/// One experimental condition placed in a well.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WellLayout {
    pub compound: Option<String>,
    pub batch: Option<String>,
    pub concentration: Option<String>,
    pub perturbation_type: Option<String>,
    pub cell_line: Option<String>,
    pub cells_per_well: Option<String>,
}

impl WellLayout {
    pub(super) fn from_value(raw: &Value) -> Option<Self> {
        raw.as_object()?;
        Some(Self {
            compound: field_string(raw, &["compound", "cbkid", "compound_id"]),
            batch: field_string(raw, &["batch", "batchid", "batch_id"]),
            concentration: field_string(raw, &["concentration", "cmpd_conc", "conc"]),
            perturbation_type: field_string(raw, &["perturbation_type", "pert_type"]),
            cell_line: field_string(raw, &["cell_line", "cellline"]),
            cells_per_well: field_string(raw, &["cells_per_well", "cells"]),
        })
    }

    /// Compound key for the overlay palette; empty when none is recorded.
    pub fn compound_key(&self) -> &str {
        self.compound.as_deref().unwrap_or_default()
    }

    /// One `label: value` line per recorded field.
    pub fn tooltip(&self) -> String {
        [
            ("compound", &self.compound),
            ("batch", &self.batch),
            ("concentration", &self.concentration),
            ("perturbation", &self.perturbation_type),
            ("cell line", &self.cell_line),
            ("cells/well", &self.cells_per_well),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|value| format!("{label}: {value}")))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tooltip_skips_absent_fields() {
        let layout = WellLayout::from_value(&serde_json::json!({
            "cbkid": "CBK042", "cmpd_conc": 0.5, "cell_line": "A549"
        }))
        .unwrap();
        assert_eq!(layout.tooltip(), "compound: CBK042\nconcentration: 0.5\ncell line: A549");
    }

    #[test]
    fn non_objects_are_not_layout_records() {
        assert!(WellLayout::from_value(&serde_json::json!("DMSO")).is_none());
        assert_eq!(WellLayout::default().compound_key(), "");
    }
}
