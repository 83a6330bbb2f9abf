//! The session's selection record and the refresh cascade each edit triggers.

use serde::{Deserialize, Serialize};

use crate::channels::ChannelSelection;
use crate::config::{MAX_ANIMATION_SPEED, MAX_BRIGHTNESS_PERCENT, MIN_BRIGHTNESS_PERCENT, UserPreferences};
use crate::deep_link::ViewerLink;
use crate::plate::Plate;

pub const MIN_ZOOM_PERCENT: u32 = 10;
pub const MAX_ZOOM_PERCENT: u32 = 800;
pub const DEFAULT_ZOOM_PERCENT: u32 = 100;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Selection {
    pub acquisition_id: Option<String>,
    /// Plane shown in the viewer; `None` while the viewer is closed.
    pub viewer: Option<ViewerFocus>,
    /// Sites and depths drawn in the grid. The viewer keeps its own.
    pub sites: Vec<String>,
    pub depths: Vec<String>,
    pub channels: Option<ChannelSelection>,
    pub zoom_percent: u32,
    pub brightness_percent: u32,
    pub animating: bool,
    pub animation_speed: u8,
    pub show_hidden: bool,
    pub show_layout_overlay: bool,
    pub search_filter: String,
    pub sidebar_sort_alphabetically: bool,
}

/// The single (well, site, depth) plane the viewer stacks acquisitions of.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewerFocus {
    pub well: String,
    pub site: String,
    pub depth: String,
}

impl Default for Selection {
    fn default() -> Self {
        Self::from_preferences(&UserPreferences::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEdit {
    Acquisition(String),
    OpenViewer { well: String, site: String, depth: String },
    CloseViewer,
    Sites(Vec<String>),
    ToggleSite(String),
    Depths(Vec<String>),
    ToggleDepth(String),
    Channels(ChannelSelection),
    Zoom(u32),
    Brightness(u32),
    Animating(bool),
    AnimationSpeed(u8),
    ShowHidden(bool),
    ShowLayoutOverlay(bool),
    SearchFilter(String),
    SortAlphabetically(bool),
}

/// Which consumers must react to an applied edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshScope {
    /// Selector option lists depend on the change.
    pub toolbar: bool,
    pub grid: bool,
    pub viewer: bool,
    pub sidebar: bool,
    /// A durable preference changed.
    pub preferences: bool,
}

impl RefreshScope {
    pub const NONE: Self = Self { toolbar: false, grid: false, viewer: false, sidebar: false, preferences: false };
    pub const FULL: Self = Self { toolbar: true, grid: true, viewer: true, sidebar: true, preferences: false };
    pub const REDRAW: Self = Self { toolbar: false, grid: true, viewer: true, sidebar: false, preferences: false };
    pub const SIDEBAR: Self = Self { toolbar: false, grid: false, viewer: false, sidebar: true, preferences: false };

    fn persisted(self) -> Self {
        Self { preferences: true, ..self }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

impl Selection {
    pub fn from_preferences(preferences: &UserPreferences) -> Self {
        Self {
            acquisition_id: None,
            viewer: None,
            sites: Vec::new(),
            depths: Vec::new(),
            channels: None,
            zoom_percent: DEFAULT_ZOOM_PERCENT,
            brightness_percent: preferences.brightness_percent,
            animating: false,
            animation_speed: preferences.animation_speed,
            show_hidden: preferences.show_hidden,
            show_layout_overlay: preferences.show_layout_overlay,
            search_filter: String::new(),
            sidebar_sort_alphabetically: preferences.sort_alphabetically,
        }
    }

    /// Selection that reopens a bookmarked viewer position. The grid behind
    /// it starts from the plate defaults.
    pub fn from_link(link: &ViewerLink, preferences: &UserPreferences) -> Self {
        Self {
            acquisition_id: Some(link.acquisition_id.clone()),
            viewer: Some(ViewerFocus {
                well: link.well.clone(),
                site: link.site.clone(),
                depth: link.depth.clone(),
            }),
            channels: Some(link.channels.clone()),
            ..Self::from_preferences(preferences)
        }
    }

    pub fn preferences(&self) -> UserPreferences {
        UserPreferences {
            brightness_percent: self.brightness_percent,
            show_hidden: self.show_hidden,
            show_layout_overlay: self.show_layout_overlay,
            sort_alphabetically: self.sidebar_sort_alphabetically,
            animation_speed: self.animation_speed,
        }
    }

    /// Applies one edit and reports what must be refreshed. An edit that
    /// leaves the record unchanged refreshes nothing.
    pub fn apply(&mut self, edit: SelectionEdit) -> RefreshScope {
        let before = self.clone();
        let scope = match edit {
            SelectionEdit::Acquisition(id) => {
                self.acquisition_id = Some(id);
                RefreshScope::FULL
            }
            SelectionEdit::OpenViewer { well, site, depth } => {
                self.viewer = Some(ViewerFocus { well, site, depth });
                RefreshScope { viewer: true, ..RefreshScope::NONE }
            }
            SelectionEdit::CloseViewer => {
                self.viewer = None;
                RefreshScope { viewer: true, ..RefreshScope::NONE }
            }
            SelectionEdit::Sites(sites) => {
                self.sites = sites;
                RefreshScope::REDRAW
            }
            SelectionEdit::ToggleSite(site) => {
                toggle(&mut self.sites, site);
                RefreshScope::REDRAW
            }
            SelectionEdit::Depths(depths) => {
                self.depths = depths;
                RefreshScope::REDRAW
            }
            SelectionEdit::ToggleDepth(depth) => {
                toggle(&mut self.depths, depth);
                RefreshScope::REDRAW
            }
            SelectionEdit::Channels(channels) => {
                self.channels = Some(channels);
                RefreshScope::REDRAW
            }
            SelectionEdit::Zoom(percent) => {
                self.zoom_percent = percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT);
                RefreshScope::REDRAW
            }
            SelectionEdit::Brightness(percent) => {
                self.brightness_percent = percent.clamp(MIN_BRIGHTNESS_PERCENT, MAX_BRIGHTNESS_PERCENT);
                RefreshScope::REDRAW.persisted()
            }
            SelectionEdit::Animating(animating) => {
                self.animating = animating;
                RefreshScope::NONE
            }
            SelectionEdit::AnimationSpeed(speed) => {
                self.animation_speed = speed.min(MAX_ANIMATION_SPEED);
                RefreshScope::NONE.persisted()
            }
            SelectionEdit::ShowHidden(show) => {
                self.show_hidden = show;
                RefreshScope::SIDEBAR.persisted()
            }
            SelectionEdit::ShowLayoutOverlay(show) => {
                self.show_layout_overlay = show;
                RefreshScope { grid: true, ..RefreshScope::NONE }.persisted()
            }
            SelectionEdit::SearchFilter(filter) => {
                self.search_filter = filter;
                RefreshScope::SIDEBAR
            }
            SelectionEdit::SortAlphabetically(sort) => {
                self.sidebar_sort_alphabetically = sort;
                RefreshScope::SIDEBAR.persisted()
            }
        };

        if *self == before { RefreshScope::NONE } else { scope }
    }

    /// Fills in defaults for a freshly loaded plate and drops references the
    /// plate cannot satisfy.
    pub fn reconcile(&mut self, plate: &Plate) {
        let acquisition_valid = self
            .acquisition_id
            .as_deref()
            .is_some_and(|id| plate.acquisition(id).is_some());
        if !acquisition_valid {
            self.acquisition_id = plate.first_acquisition_id().map(str::to_string);
        }
        let Some(acquisition_id) = self.acquisition_id.clone() else {
            self.viewer = None;
            self.sites.clear();
            self.depths.clear();
            self.channels = None;
            return;
        };

        if let Some(focus) = &self.viewer {
            if !plate.wells(&acquisition_id).contains_key(&focus.well) {
                self.viewer = None;
            }
        }

        let sites = plate.available_sites(&acquisition_id);
        self.sites.retain(|site| sites.contains(site));
        if self.sites.is_empty() {
            self.sites = sites;
        }

        let depths = plate.available_depths(&acquisition_id);
        self.depths.retain(|depth| depths.contains(depth));
        if self.depths.is_empty() {
            self.depths = depths.into_iter().take(1).collect();
        }

        let channels = plate.available_channels(&acquisition_id);
        let resolvable = self.channels.as_ref().is_some_and(|selection| {
            let table = plate.representative_channels(&acquisition_id);
            match selection {
                ChannelSelection::Preset(name) => crate::channels::preset_channel_ids(table, name).is_some(),
                explicit => explicit
                    .ids()
                    .iter()
                    .all(|id| channels.iter().any(|channel| channel.id == *id)),
            }
        });
        if !resolvable {
            self.channels = ChannelSelection::default_for(&channels);
        }
    }

    /// Position the viewer shows: acquisition, well, site and depth.
    pub fn viewer_position(&self) -> Option<(&str, &str, &str, &str)> {
        let focus = self.viewer.as_ref()?;
        Some((self.acquisition_id.as_deref()?, &focus.well, &focus.site, &focus.depth))
    }
}

fn toggle(values: &mut Vec<String>, value: String) {
    match values.iter().position(|existing| *existing == value) {
        Some(index) if values.len() > 1 => {
            values.remove(index);
        }
        Some(_) => {}
        None => values.push(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::parse_plate_response;

    fn plate() -> Plate {
        parse_plate_response(
            r#"{"barcode": "P1", "acquisitions": {
                "11": {"wells": {"A01": {"sites": {
                    "1": {"z_positions": {"0": {"channels": {"1": {"dye": "HOECHST", "path": "a"}, "2": {"dye": "MITO", "path": "b"}}}}},
                    "2": {"z_positions": {"0": {"channels": {"1": {"dye": "HOECHST", "path": "c"}}},
                                          "1": {"channels": {"1": {"dye": "HOECHST", "path": "d"}}}}}}}}},
                "12": {"wells": {}}
            }}"#,
            "P1",
        )
        .unwrap()
    }

    #[test]
    fn acquisition_change_refreshes_everything() {
        let mut selection = Selection::default();
        assert_eq!(selection.apply(SelectionEdit::Acquisition("11".into())), RefreshScope::FULL);
    }

    #[test]
    fn visual_edits_only_redraw() {
        let mut selection = Selection::default();
        assert_eq!(selection.apply(SelectionEdit::Zoom(150)), RefreshScope::REDRAW);
        assert_eq!(
            selection.apply(SelectionEdit::Channels(ChannelSelection::Single("1".into()))),
            RefreshScope::REDRAW
        );
        let scope = selection.apply(SelectionEdit::Brightness(140));
        assert!(scope.grid && scope.viewer && scope.preferences);
        assert!(!scope.toolbar && !scope.sidebar);
    }

    #[test]
    fn sidebar_edits_do_not_touch_renderers() {
        let mut selection = Selection::default();
        let scope = selection.apply(SelectionEdit::SearchFilter("exp".into()));
        assert_eq!(scope, RefreshScope::SIDEBAR);
        let scope = selection.apply(SelectionEdit::ShowHidden(true));
        assert!(scope.sidebar && scope.preferences && !scope.grid);
    }

    #[test]
    fn unchanged_value_refreshes_nothing() {
        let mut selection = Selection::default();
        assert!(selection.apply(SelectionEdit::Zoom(DEFAULT_ZOOM_PERCENT)).is_empty());
        assert!(selection.apply(SelectionEdit::Brightness(5000)).preferences);
        assert!(selection.apply(SelectionEdit::Brightness(5000)).is_empty());
    }

    #[test]
    fn toggling_keeps_at_least_one_site() {
        let mut selection = Selection { sites: vec!["1".into()], ..Selection::default() };
        assert!(selection.apply(SelectionEdit::ToggleSite("1".into())).is_empty());
        selection.apply(SelectionEdit::ToggleSite("2".into()));
        assert_eq!(selection.sites, ["1", "2"]);
        selection.apply(SelectionEdit::ToggleSite("1".into()));
        assert_eq!(selection.sites, ["2"]);
    }

    #[test]
    fn reconcile_fills_defaults_from_plate() {
        let plate = plate();
        let mut selection = Selection::default();
        selection.reconcile(&plate);

        assert_eq!(selection.acquisition_id.as_deref(), Some("11"));
        assert_eq!(selection.sites, ["1", "2"]);
        assert_eq!(selection.depths, ["0"]);
        assert_eq!(selection.channels, Some(ChannelSelection::Pair("1".into(), "2".into())));
    }

    #[test]
    fn reconcile_keeps_valid_deep_link_values() {
        let plate = plate();
        let link = ViewerLink {
            barcode: "P1".into(),
            acquisition_id: "11".into(),
            well: "A01".into(),
            site: "2".into(),
            depth: "1".into(),
            channels: ChannelSelection::Single("1".into()),
        };
        let mut selection = Selection::from_link(&link, &UserPreferences::default());
        selection.reconcile(&plate);

        assert_eq!(selection.viewer_position(), Some(("11", "A01", "2", "1")));
        assert_eq!(selection.channels, Some(ChannelSelection::Single("1".into())));
        assert_eq!(selection.sites, ["1", "2"]);
        assert_eq!(selection.depths, ["0"]);
    }

    #[test]
    fn viewer_keeps_its_plane_apart_from_the_grid_selection() {
        let mut selection = Selection::default();
        selection.reconcile(&plate());

        let scope = selection.apply(SelectionEdit::OpenViewer {
            well: "A01".into(),
            site: "2".into(),
            depth: "1".into(),
        });
        assert!(scope.viewer && !scope.grid);
        assert_eq!(selection.viewer_position(), Some(("11", "A01", "2", "1")));
        assert_eq!(selection.sites, ["1", "2"]);
        assert_eq!(selection.depths, ["0"]);

        selection.apply(SelectionEdit::CloseViewer);
        assert_eq!(selection.viewer_position(), None);
        assert_eq!(selection.sites, ["1", "2"]);
        assert_eq!(selection.depths, ["0"]);
    }

    #[test]
    fn reconcile_replaces_stale_references() {
        let plate = plate();
        let mut selection = Selection {
            acquisition_id: Some("999".into()),
            viewer: Some(ViewerFocus { well: "H12".into(), site: "1".into(), depth: "0".into() }),
            channels: Some(ChannelSelection::Single("7".into())),
            ..Selection::default()
        };
        selection.reconcile(&plate);
        assert_eq!(selection.acquisition_id.as_deref(), Some("11"));
        assert_eq!(selection.viewer, None);
        assert_eq!(selection.channels, Some(ChannelSelection::Pair("1".into(), "2".into())));
    }

    #[test]
    fn animation_flag_changes_no_renderer() {
        let mut selection = Selection::default();
        let scope = selection.apply(SelectionEdit::Animating(true));
        assert_eq!(scope, RefreshScope::NONE);
        assert!(selection.animating);
    }
}
