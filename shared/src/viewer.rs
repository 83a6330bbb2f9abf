//! Layer stack of the single-image viewer.
//!
//! One layer per acquisition at the same well, site and depth. Entering a
//! position requests every layer once, the visible one first; switching
//! acquisitions afterwards only moves opacity.

use indexmap::IndexMap;

use crate::channels::{ChannelSelection, ImageKind, build_image_url};
use crate::plate::Plate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerKey {
    pub well: String,
    pub site: String,
    pub depth: String,
    pub channels: ChannelSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerRequest {
    pub acquisition_id: String,
    pub url: String,
    pub generation: u64,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Loading,
    Resident,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub url: String,
    pub state: LayerState,
    pub opacity: f32,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct ViewerSynchronizer {
    key: Option<ViewerKey>,
    layers: IndexMap<String, Layer>,
    selected: Option<String>,
    next_generation: u64,
    requests_issued: usize,
}

impl ViewerSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&ViewerKey> {
        self.key.as_ref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Opens the viewer on a position. Re-entering the current position only
    /// reselects; a new position drops all layers and requests them again.
    pub fn enter(&mut self, plate: &Plate, key: ViewerKey, selected: &str) -> Vec<LayerRequest> {
        if self.key.as_ref() == Some(&key) {
            return self.select_acquisition(plate, selected);
        }
        self.layers.clear();
        self.key = Some(key);
        self.selected = Some(selected.to_string());

        let mut order: Vec<&str> = Vec::with_capacity(plate.acquisitions.len());
        if plate.acquisition(selected).is_some() {
            order.push(selected);
        }
        order.extend(plate.acquisitions.keys().map(String::as_str).filter(|id| *id != selected));
        order.into_iter().filter_map(|id| self.request_layer(plate, id)).collect()
    }

    /// Makes `acquisition_id` the only opaque layer. Layers already present
    /// are never requested again.
    pub fn select_acquisition(&mut self, plate: &Plate, acquisition_id: &str) -> Vec<LayerRequest> {
        self.selected = Some(acquisition_id.to_string());
        let missing = !self.layers.contains_key(acquisition_id);
        let request = if missing { self.request_layer(plate, acquisition_id) } else { None };
        for (id, layer) in &mut self.layers {
            layer.opacity = if id == acquisition_id { 1.0 } else { 0.0 };
        }
        request.into_iter().collect()
    }

    fn request_layer(&mut self, plate: &Plate, acquisition_id: &str) -> Option<LayerRequest> {
        let key = self.key.as_ref()?;
        plate.acquisition(acquisition_id)?;
        let channels = plate.channels(acquisition_id, &key.well, &key.site, Some(&key.depth));
        let url = build_image_url(Some(channels), &key.channels, ImageKind::Full);
        let visible = self.selected.as_deref() == Some(acquisition_id);

        self.next_generation += 1;
        self.requests_issued += 1;
        let generation = self.next_generation;
        self.layers.insert(
            acquisition_id.to_string(),
            Layer {
                url: url.clone(),
                state: LayerState::Loading,
                opacity: if visible { 1.0 } else { 0.0 },
                generation,
            },
        );
        Some(LayerRequest { acquisition_id: acquisition_id.to_string(), url, generation, visible })
    }

    /// Records a finished load. Returns `false` for completions that belong
    /// to a superseded request.
    pub fn load_completed(&mut self, acquisition_id: &str, generation: u64) -> bool {
        self.finish(acquisition_id, generation, LayerState::Resident)
    }

    pub fn load_failed(&mut self, acquisition_id: &str, generation: u64) -> bool {
        self.finish(acquisition_id, generation, LayerState::Failed)
    }

    fn finish(&mut self, acquisition_id: &str, generation: u64, state: LayerState) -> bool {
        match self.layers.get_mut(acquisition_id) {
            Some(layer) if layer.generation == generation => {
                layer.state = state;
                true
            }
            _ => false,
        }
    }

    pub fn layer(&self, acquisition_id: &str) -> Option<&Layer> {
        self.layers.get(acquisition_id)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.layers.iter().map(|(id, layer)| (id.as_str(), layer))
    }

    /// `(finished, total)` layers of the current position.
    pub fn progress(&self) -> (usize, usize) {
        let finished = self
            .layers
            .values()
            .filter(|layer| layer.state != LayerState::Loading)
            .count();
        (finished, self.layers.len())
    }

    /// Image requests issued since creation.
    pub fn requests_issued(&self) -> usize {
        self.requests_issued
    }

    pub fn close(&mut self) {
        self.key = None;
        self.selected = None;
        self.layers.clear();
    }
}

/// CSS filter applied to a whole rendered surface.
pub fn brightness_filter(brightness_percent: u32) -> String {
    format!("brightness({brightness_percent}%) contrast({brightness_percent}%)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::parse_plate_response;

    fn plate() -> Plate {
        parse_plate_response(
            r#"{"barcode": "P1", "acquisitions": {
                "A": {"wells": {"B02": {"sites": {"1": {"channels": {"1": {"path": "a"}}}}}}},
                "B": {"wells": {"B02": {"sites": {"1": {"channels": {"1": {"path": "b"}}}}}}},
                "C": {"wells": {"B02": {"sites": {"1": {"channels": {"1": {"path": "c"}}}}}}}
            }}"#,
            "P1",
        )
        .unwrap()
    }

    fn key() -> ViewerKey {
        ViewerKey {
            well: "B02".into(),
            site: "1".into(),
            depth: "default".into(),
            channels: ChannelSelection::Single("1".into()),
        }
    }

    #[test]
    fn entering_requests_visible_layer_first() {
        let mut viewer = ViewerSynchronizer::new();
        let requests = viewer.enter(&plate(), key(), "B");

        let order: Vec<(&str, bool)> = requests.iter().map(|r| (r.acquisition_id.as_str(), r.visible)).collect();
        assert_eq!(order, [("B", true), ("A", false), ("C", false)]);
        assert_eq!(requests[0].url, "/api/image-merge/ch1/b/ch2/undefined/ch3/undefined/channels.png");
        assert_eq!(viewer.layer("B").unwrap().opacity, 1.0);
        assert_eq!(viewer.layer("A").unwrap().opacity, 0.0);
    }

    #[test]
    fn switching_back_and_forth_never_reloads() {
        let plate = plate();
        let mut viewer = ViewerSynchronizer::new();
        for request in viewer.enter(&plate, key(), "A") {
            viewer.load_completed(&request.acquisition_id, request.generation);
        }
        let issued = viewer.requests_issued();

        assert!(viewer.select_acquisition(&plate, "B").is_empty());
        assert!(viewer.select_acquisition(&plate, "A").is_empty());
        assert!(viewer.enter(&plate, key(), "A").is_empty());

        assert_eq!(viewer.requests_issued(), issued);
        assert_eq!(viewer.layer("A").unwrap().opacity, 1.0);
        assert_eq!(viewer.layer("B").unwrap().opacity, 0.0);
        assert_eq!(viewer.progress(), (3, 3));
    }

    #[test]
    fn new_position_supersedes_pending_loads() {
        let plate = plate();
        let mut viewer = ViewerSynchronizer::new();
        let old = viewer.enter(&plate, key(), "A");
        let moved = ViewerKey { channels: ChannelSelection::Pair("1".into(), "1".into()), ..key() };
        let new = viewer.enter(&plate, moved, "A");

        assert!(!viewer.load_completed("A", old[0].generation));
        assert!(viewer.load_completed("A", new[0].generation));
        assert_eq!(viewer.progress(), (1, 3));
    }

    #[test]
    fn missing_plane_gets_placeholder_layer() {
        let plate = plate();
        let mut viewer = ViewerSynchronizer::new();
        let other_well = ViewerKey { well: "H12".into(), ..key() };
        let requests = viewer.enter(&plate, other_well, "A");
        assert!(requests.iter().all(|r| r.url == crate::channels::PLACEHOLDER_IMAGE_URL));
    }

    #[test]
    fn brightness_filter_is_css() {
        assert_eq!(brightness_filter(150), "brightness(150%) contrast(150%)");
    }
}
