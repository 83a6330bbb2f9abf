//! Bookmarkable routes.
//!
//! `/plate/{barcode}[/{acquisition}]` opens a plate, and
//! `/viewer/{barcode}/{acquisition}/{well}/{site}/{depth}/{channels}` opens
//! the viewer on one image. Routes work on already-decoded path segments;
//! percent-encoding is left to the caller.

use serde::{Deserialize, Serialize};

use crate::channels::{ChannelSelection, ChannelSelectionError};
use crate::selection::Selection;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AppRoute {
    Home,
    Plate { barcode: String, acquisition_id: Option<String> },
    Viewer(ViewerLink),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ViewerLink {
    pub barcode: String,
    pub acquisition_id: String,
    pub well: String,
    pub site: String,
    pub depth: String,
    pub channels: ChannelSelection,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("unknown route '/{0}'")]
    Unknown(String),
    #[error("route '/{route}' expects {expected} segments, got {actual}")]
    SegmentCount { route: &'static str, expected: &'static str, actual: usize },
    #[error(transparent)]
    Channels(#[from] ChannelSelectionError),
}

impl AppRoute {
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, RouteError> {
        let segments: Vec<&str> = segments
            .iter()
            .map(|segment| segment.as_ref())
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Ok(Self::Home),
            ["plate", barcode] => Ok(Self::Plate { barcode: barcode.to_string(), acquisition_id: None }),
            ["plate", barcode, acquisition] => Ok(Self::Plate {
                barcode: barcode.to_string(),
                acquisition_id: Some(acquisition.to_string()),
            }),
            ["plate", rest @ ..] => Err(RouteError::SegmentCount { route: "plate", expected: "1 or 2", actual: rest.len() }),
            ["viewer", barcode, acquisition, well, site, depth, channels] => Ok(Self::Viewer(ViewerLink {
                barcode: barcode.to_string(),
                acquisition_id: acquisition.to_string(),
                well: well.to_string(),
                site: site.to_string(),
                depth: depth.to_string(),
                channels: channels.parse()?,
            })),
            ["viewer", rest @ ..] => Err(RouteError::SegmentCount { route: "viewer", expected: "6", actual: rest.len() }),
            [other, ..] => Err(RouteError::Unknown(other.to_string())),
        }
    }

    /// Splits a raw path without decoding.
    pub fn parse_path(path: &str) -> Result<Self, RouteError> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').collect();
        Self::from_segments(&segments)
    }

    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Home => Vec::new(),
            Self::Plate { barcode, acquisition_id } => {
                let mut segments = vec!["plate".to_string(), barcode.clone()];
                segments.extend(acquisition_id.clone());
                segments
            }
            Self::Viewer(link) => vec![
                "viewer".to_string(),
                link.barcode.clone(),
                link.acquisition_id.clone(),
                link.well.clone(),
                link.site.clone(),
                link.depth.clone(),
                link.channels.to_string(),
            ],
        }
    }

    pub fn to_path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }

    /// Route that reopens the current view: the viewer position while one is
    /// open, otherwise the plate at the selected acquisition.
    pub fn for_view(barcode: &str, selection: &Selection) -> Self {
        match (selection.viewer_position(), &selection.channels) {
            (Some((acquisition_id, well, site, depth)), Some(channels)) => Self::Viewer(ViewerLink {
                barcode: barcode.to_string(),
                acquisition_id: acquisition_id.to_string(),
                well: well.to_string(),
                site: site.to_string(),
                depth: depth.to_string(),
                channels: channels.clone(),
            }),
            _ => Self::Plate {
                barcode: barcode.to_string(),
                acquisition_id: selection.acquisition_id.clone(),
            },
        }
    }

    pub fn barcode(&self) -> Option<&str> {
        match self {
            Self::Home => None,
            Self::Plate { barcode, .. } => Some(barcode),
            Self::Viewer(link) => Some(&link.barcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::ViewerFocus;

    #[test]
    fn viewer_links_round_trip() {
        let route = AppRoute::parse_path("/viewer/P013725/3210/B02/1/0/1,2,3").unwrap();
        let AppRoute::Viewer(link) = &route else {
            panic!("expected viewer route, got {route:?}");
        };
        assert_eq!(link.well, "B02");
        assert_eq!(link.channels, ChannelSelection::Triple("1".into(), "2".into(), "3".into()));
        assert_eq!(route.to_path(), "/viewer/P013725/3210/B02/1/0/1,2,3");
    }

    #[test]
    fn plate_routes_with_and_without_acquisition() {
        assert_eq!(
            AppRoute::parse_path("/plate/P1/").unwrap(),
            AppRoute::Plate { barcode: "P1".into(), acquisition_id: None }
        );
        let route = AppRoute::parse_path("/plate/P1/42?x=1").unwrap();
        assert_eq!(route.to_path(), "/plate/P1/42");
        assert_eq!(route.barcode(), Some("P1"));
        assert_eq!(AppRoute::parse_path("/").unwrap(), AppRoute::Home);
    }

    #[test]
    fn legacy_channel_tokens_are_normalized_in_links() {
        let route = AppRoute::parse_path("/viewer/P1/1/A01/1/default/1-2").unwrap();
        assert_eq!(route.to_path(), "/viewer/P1/1/A01/1/default/1,2");
    }

    #[test]
    fn malformed_routes_are_rejected() {
        assert_eq!(AppRoute::parse_path("/settings"), Err(RouteError::Unknown("settings".into())));
        assert!(matches!(
            AppRoute::parse_path("/viewer/P1/1/A01"),
            Err(RouteError::SegmentCount { route: "viewer", actual: 3, .. })
        ));
        assert!(matches!(
            AppRoute::parse_path("/plate/P1/1/2"),
            Err(RouteError::SegmentCount { route: "plate", actual: 3, .. })
        ));
    }

    #[test]
    fn current_view_maps_to_viewer_or_plate_route() {
        let mut selection = Selection {
            acquisition_id: Some("7".into()),
            sites: vec!["2".into()],
            depths: vec!["default".into()],
            channels: Some(ChannelSelection::Pair("1".into(), "3".into())),
            ..Selection::default()
        };
        assert_eq!(AppRoute::for_view("P1", &selection).to_path(), "/plate/P1/7");

        selection.viewer = Some(ViewerFocus { well: "C05".into(), site: "2".into(), depth: "default".into() });
        assert_eq!(AppRoute::for_view("P1", &selection).to_path(), "/viewer/P1/7/C05/2/default/1,3");
    }
}
