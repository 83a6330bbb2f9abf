//! Canonical plate model: acquisition → well → site → depth → channel.
//!
//! Every plate is normalized into this shape once, at ingestion
//! ([`parse_plate_response`]). Accessors below are total: an absent key
//! yields an empty mapping instead of an error so the UI stays renderable
//! with partial data.

mod ingest;
mod layout;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

pub use ingest::{PlateError, parse_plate_response};
pub use layout::WellLayout;

/// Depth key synthesized for sites that carry channels without a depth layer.
pub const DEFAULT_DEPTH: &str = "default";
/// Project sentinel marking an acquisition as moved to trash.
pub const TRASH_PROJECT: &str = "trash";

pub type Channels = IndexMap<String, Channel>;

static NO_WELLS: LazyLock<IndexMap<String, Well>> = LazyLock::new(IndexMap::new);
static NO_SITES: LazyLock<IndexMap<String, Site>> = LazyLock::new(IndexMap::new);
static NO_DEPTHS: LazyLock<IndexMap<String, ZPlane>> = LazyLock::new(IndexMap::new);
static NO_CHANNELS: LazyLock<Channels> = LazyLock::new(IndexMap::new);

// ===== MODEL TYPES =====

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Plate {
    pub barcode: String,
    pub layout: IndexMap<String, Vec<WellLayout>>,
    pub acquisitions: IndexMap<String, Acquisition>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Acquisition {
    pub id: String,
    pub name: String,
    pub project: String,
    pub hidden: bool,
    pub folder: String,
    pub wells: IndexMap<String, Well>,
}

impl Acquisition {
    pub fn is_trashed(&self) -> bool {
        self.hidden || self.project == TRASH_PROJECT
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Well {
    pub id: String,
    pub sites: IndexMap<String, Site>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Site {
    pub id: String,
    pub depths: IndexMap<String, ZPlane>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ZPlane {
    pub channels: Channels,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub id: String,
    pub dye: String,
    /// Opaque token passed verbatim to the image-merge endpoint.
    pub path: String,
    pub image_meta: BTreeMap<String, String>,
}

impl Channel {
    /// `key: value` lines of the image metadata, sorted by key.
    pub fn tooltip(&self) -> String {
        let mut lines = vec![format!("channel: {}", self.id), format!("dye: {}", self.dye)];
        lines.extend(self.image_meta.iter().map(|(key, value)| format!("{key}: {value}")));
        lines.join("\n")
    }
}

// ===== ACCESSORS =====

impl Plate {
    pub fn acquisition(&self, acquisition_id: &str) -> Option<&Acquisition> {
        self.acquisitions.get(acquisition_id)
    }

    pub fn acquisition_ids(&self) -> Vec<String> {
        self.acquisitions.keys().cloned().collect()
    }

    pub fn acquisition_index(&self, acquisition_id: &str) -> Option<usize> {
        self.acquisitions.get_index_of(acquisition_id)
    }

    pub fn first_acquisition_id(&self) -> Option<&str> {
        self.acquisitions.keys().next().map(String::as_str)
    }

    pub fn wells(&self, acquisition_id: &str) -> &IndexMap<String, Well> {
        self.acquisition(acquisition_id)
            .map(|acquisition| &acquisition.wells)
            .unwrap_or(&*NO_WELLS)
    }

    pub fn sites(&self, acquisition_id: &str, well: &str) -> &IndexMap<String, Site> {
        self.wells(acquisition_id)
            .get(well)
            .map(|well| &well.sites)
            .unwrap_or(&*NO_SITES)
    }

    pub fn depths(&self, acquisition_id: &str, well: &str, site: &str) -> &IndexMap<String, ZPlane> {
        self.sites(acquisition_id, well)
            .get(site)
            .map(|site| &site.depths)
            .unwrap_or(&*NO_DEPTHS)
    }

    /// Channels of one addressed plane, empty when any key is absent.
    ///
    /// `depth == None` picks the site's first depth, which is the synthetic
    /// [`DEFAULT_DEPTH`] for plates without a depth layer.
    pub fn channels(&self, acquisition_id: &str, well: &str, site: &str, depth: Option<&str>) -> &Channels {
        let depths = self.depths(acquisition_id, well, site);
        let plane = match depth {
            Some(depth) => depths.get(depth),
            None => depths.values().next(),
        };
        plane.map(|plane| &plane.channels).unwrap_or(&*NO_CHANNELS)
    }

    /// Channel table for selectors: the addressed plane, else the first
    /// non-empty plane of the same well. Only a well missing from the
    /// acquisition falls back to the representative set; a present well
    /// never borrows another well's channels.
    pub fn channels_or_fallback(&self, acquisition_id: &str, well: &str, site: &str, depth: Option<&str>) -> &Channels {
        let channels = self.channels(acquisition_id, well, site, depth);
        if !channels.is_empty() {
            return channels;
        }
        match self.wells(acquisition_id).get(well) {
            Some(well) => well
                .sites
                .values()
                .flat_map(|site| site.depths.values())
                .map(|plane| &plane.channels)
                .find(|channels| !channels.is_empty())
                .unwrap_or(&*NO_CHANNELS),
            None => self.representative_channels(acquisition_id),
        }
    }

    /// First non-empty channel set by insertion order: first well, first
    /// site, first depth of the acquisition.
    pub fn representative_channels(&self, acquisition_id: &str) -> &Channels {
        self.wells(acquisition_id)
            .values()
            .flat_map(|well| well.sites.values())
            .flat_map(|site| site.depths.values())
            .map(|plane| &plane.channels)
            .find(|channels| !channels.is_empty())
            .unwrap_or(&*NO_CHANNELS)
    }

    pub fn representative_sites(&self, acquisition_id: &str) -> &IndexMap<String, Site> {
        self.wells(acquisition_id)
            .values()
            .map(|well| &well.sites)
            .find(|sites| !sites.is_empty())
            .unwrap_or(&*NO_SITES)
    }

    pub fn representative_depths(&self, acquisition_id: &str) -> &IndexMap<String, ZPlane> {
        self.representative_sites(acquisition_id)
            .values()
            .map(|site| &site.depths)
            .find(|depths| !depths.is_empty())
            .unwrap_or(&*NO_DEPTHS)
    }

    /// Distinct site ids across all wells of the acquisition.
    pub fn available_sites(&self, acquisition_id: &str) -> Vec<String> {
        let sites = self
            .wells(acquisition_id)
            .values()
            .flat_map(|well| well.sites.keys().cloned());
        sorted_distinct(sites)
    }

    /// Distinct depth keys across all wells and sites of the acquisition.
    pub fn available_depths(&self, acquisition_id: &str) -> Vec<String> {
        let depths = self
            .wells(acquisition_id)
            .values()
            .flat_map(|well| well.sites.values())
            .flat_map(|site| site.depths.keys().cloned());
        sorted_distinct(depths)
    }

    /// Distinct channels across all wells, one entry per channel id, sorted by id.
    pub fn available_channels(&self, acquisition_id: &str) -> Vec<Channel> {
        let mut by_id: IndexMap<String, Channel> = IndexMap::new();
        let planes = self
            .wells(acquisition_id)
            .values()
            .flat_map(|well| well.sites.values())
            .flat_map(|site| site.depths.values());
        for plane in planes {
            for (id, channel) in &plane.channels {
                by_id.entry(id.clone()).or_insert_with(|| channel.clone());
            }
        }
        let order = sorted_distinct(by_id.keys().cloned());
        order
            .into_iter()
            .filter_map(|id| by_id.shift_remove(&id))
            .collect()
    }

    /// Layout records of one well; empty when the plate has no layout.
    pub fn well_layout_meta(&self, well: &str) -> &[WellLayout] {
        self.layout.get(well).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Marks an acquisition as trashed after the server confirmed the move.
    pub fn mark_acquisition_trashed(&mut self, acquisition_id: &str) -> bool {
        match self.acquisitions.get_mut(acquisition_id) {
            Some(acquisition) => {
                acquisition.project = TRASH_PROJECT.to_string();
                acquisition.hidden = true;
                true
            }
            None => false,
        }
    }
}

/// Deduplicates and sorts numerically when every id is a number, else
/// lexicographically.
pub fn sorted_distinct(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let distinct: IndexSet<String> = ids.into_iter().collect();
    let mut ids: Vec<String> = distinct.into_iter().collect();
    let all_numeric = ids.iter().all(|id| id.trim().parse::<f64>().is_ok());
    if all_numeric {
        ids.sort_by(|a, b| {
            let a = a.trim().parse::<f64>().unwrap_or_default();
            let b = b.trim().parse::<f64>().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });
    } else {
        ids.sort();
    }
    ids
}
