//! Project → acquisition tree built from list-plates results.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::plate::TRASH_PROJECT;

pub const LATEST_GROUP_KEY: &str = "__latest__";
pub const LATEST_GROUP_LABEL: &str = "Latest acquisitions";
const NO_PROJECT_LABEL: &str = "(no project)";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PlateQuery {
    pub query: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PlateListRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub project: String,
    #[serde(default, alias = "plate", alias = "barcode", deserialize_with = "lenient_string")]
    pub plate_barcode: String,
    #[serde(default, alias = "plate_acquisition_id", deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub microscope: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hidden: bool,
    /// Remaining result columns, searchable by the free-text filter.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PlateListRow {
    pub fn is_hidden(&self) -> bool {
        self.hidden || self.project == TRASH_PROJECT
    }

    pub fn label(&self) -> String {
        match (self.name.is_empty(), self.plate_barcode.is_empty()) {
            (false, _) => self.name.clone(),
            (true, false) => format!("{} ({})", self.plate_barcode, self.id),
            (true, true) => self.id.clone(),
        }
    }

    fn matches(&self, terms: &[String]) -> bool {
        let extra = self.extra.values().map(|value| match value {
            Value::String(text) => text.to_lowercase(),
            other => other.to_string().to_lowercase(),
        });
        let fields: Vec<String> = [&self.project, &self.plate_barcode, &self.id, &self.name, &self.microscope]
            .into_iter()
            .map(|field| field.to_lowercase())
            .chain(extra)
            .collect();
        terms
            .iter()
            .all(|term| fields.iter().any(|field| field.contains(term.as_str())))
    }

    fn numeric_id(&self) -> i64 {
        self.id.trim().parse().unwrap_or(i64::MIN)
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "t" | "yes"),
        _ => false,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Wrapped { results: Vec<PlateListRow> },
    Bare(Vec<PlateListRow>),
}

/// Rows of a list-plates response, bare or wrapped in `{"results": [...]}`.
pub fn parse_list_response(json: &str) -> Result<Vec<PlateListRow>, serde_json::Error> {
    Ok(match serde_json::from_str(json)? {
        ListResponse::Wrapped { results } => results,
        ListResponse::Bare(rows) => rows,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarOptions {
    pub filter: String,
    pub show_hidden: bool,
    pub sort_alphabetically: bool,
    pub latest_count: usize,
}

impl Default for SidebarOptions {
    fn default() -> Self {
        Self {
            filter: String::new(),
            show_hidden: false,
            sort_alphabetically: false,
            latest_count: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Latest,
    Project,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarGroup {
    pub key: String,
    pub label: String,
    pub kind: GroupKind,
    pub rows: Vec<PlateListRow>,
}

/// Groups visible rows by project, with a leading "Latest acquisitions"
/// group while no filter is active.
pub fn build_tree(rows: &[PlateListRow], options: &SidebarOptions) -> Vec<SidebarGroup> {
    let terms: Vec<String> = options
        .filter
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    let visible: Vec<&PlateListRow> = rows
        .iter()
        .filter(|row| options.show_hidden || !row.is_hidden())
        .filter(|row| row.matches(&terms))
        .collect();

    let mut groups = Vec::new();

    if terms.is_empty() && options.latest_count > 0 && !visible.is_empty() {
        let mut latest = visible.clone();
        latest.sort_by_key(|row| std::cmp::Reverse(row.numeric_id()));
        latest.truncate(options.latest_count);
        groups.push(SidebarGroup {
            key: LATEST_GROUP_KEY.to_string(),
            label: LATEST_GROUP_LABEL.to_string(),
            kind: GroupKind::Latest,
            rows: latest.into_iter().cloned().collect(),
        });
    }

    let mut projects: IndexMap<&str, Vec<PlateListRow>> = IndexMap::new();
    for row in visible {
        projects.entry(row.project.as_str()).or_default().push(row.clone());
    }
    if options.sort_alphabetically {
        projects.sort_by(|a, _, b, _| a.to_lowercase().cmp(&b.to_lowercase()));
    }
    groups.extend(projects.into_iter().map(|(project, rows)| SidebarGroup {
        key: format!("project:{project}"),
        label: if project.is_empty() { NO_PROJECT_LABEL.to_string() } else { project.to_string() },
        kind: GroupKind::Project,
        rows,
    }));

    groups
}

/// Applies a confirmed move-to-trash to the cached rows.
pub fn mark_row_trashed(rows: &mut [PlateListRow], acquisition_id: &str) -> bool {
    let mut found = false;
    for row in rows.iter_mut().filter(|row| row.id == acquisition_id) {
        row.project = TRASH_PROJECT.to_string();
        row.hidden = true;
        found = true;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: &str = r#"{"results": [
        {"project": "screens", "plate_barcode": "P101", "id": 5, "name": "P101-t1", "microscope": "ImageXpress", "hidden": 0},
        {"project": "covid", "plate_barcode": "P202", "id": "12", "name": "P202-t1", "microscope": "squid", "hidden": false},
        {"project": "screens", "plate_barcode": "P101", "id": 9, "name": "P101-t2", "microscope": "ImageXpress", "hidden": 1},
        {"project": "trash", "plate_barcode": "P303", "id": 3, "name": "old", "microscope": "squid"},
        {"project": "Assay", "plate_barcode": "P404", "id": 7, "name": "P404-t1", "microscope": "nikon", "cell_line": "U2OS"}
    ]}"#;

    fn rows() -> Vec<PlateListRow> {
        parse_list_response(ROWS).unwrap()
    }

    fn ids(group: &SidebarGroup) -> Vec<&str> {
        group.rows.iter().map(|row| row.id.as_str()).collect()
    }

    #[test]
    fn lenient_fields_are_normalized() {
        let rows = rows();
        assert_eq!(rows[0].id, "5");
        assert!(!rows[0].hidden);
        assert!(rows[2].hidden);
        assert_eq!(rows[4].extra["cell_line"], "U2OS");
    }

    #[test]
    fn bare_arrays_are_accepted() {
        let rows = parse_list_response(r#"[{"plate": "P9", "project": "x", "id": 1}]"#).unwrap();
        assert_eq!(rows[0].plate_barcode, "P9");
    }

    #[test]
    fn hidden_rows_are_excluded_by_default() {
        let groups = build_tree(&rows(), &SidebarOptions::default());
        let latest = &groups[0];
        assert_eq!(latest.kind, GroupKind::Latest);
        assert_eq!(ids(latest), ["12", "7", "5"]);
        let labels: Vec<&str> = groups[1..].iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["screens", "covid", "Assay"]);
    }

    #[test]
    fn show_hidden_includes_trash_and_flagged_rows() {
        let options = SidebarOptions { show_hidden: true, ..SidebarOptions::default() };
        let groups = build_tree(&rows(), &options);
        assert_eq!(ids(&groups[0]), ["12", "9", "7", "5", "3"]);
        assert_eq!(ids(&groups[1]), ["5", "9"]);
    }

    #[test]
    fn filter_matches_any_field_and_drops_latest_group() {
        let options = SidebarOptions { filter: "u2os".into(), ..SidebarOptions::default() };
        let groups = build_tree(&rows(), &options);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Assay");

        let options = SidebarOptions { filter: "imagexpress P101".into(), show_hidden: true, ..SidebarOptions::default() };
        let groups = build_tree(&rows(), &options);
        assert_eq!(ids(&groups[0]), ["5", "9"]);
    }

    #[test]
    fn projects_sort_alphabetically_when_enabled() {
        let options = SidebarOptions { sort_alphabetically: true, latest_count: 2, ..SidebarOptions::default() };
        let groups = build_tree(&rows(), &options);
        assert_eq!(ids(&groups[0]), ["12", "7"]);
        let labels: Vec<&str> = groups[1..].iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["Assay", "covid", "screens"]);
    }

    #[test]
    fn trashing_moves_row_out_of_view() {
        let mut rows = rows();
        assert!(mark_row_trashed(&mut rows, "12"));
        let groups = build_tree(&rows, &SidebarOptions::default());
        assert!(groups.iter().all(|group| group.rows.iter().all(|row| row.id != "12")));
    }
}
