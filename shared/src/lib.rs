use serde::{Deserialize, Serialize};

pub mod animation;
pub mod channels;
pub mod config;
pub mod deep_link;
pub mod geometry;
pub mod grid;
pub mod overlay;
pub mod plate;
pub mod selection;
pub mod sidebar;
pub mod viewer;
pub mod well_name;

pub use channels::{ChannelSelection, ImageKind, build_image_url, resolve_image_url};
pub use config::{AppConfig, AppSection, MigrationStrategy, ServerSection, UserPreferences};
pub use deep_link::{AppRoute, ViewerLink};
pub use geometry::{PlateGeometry, plate_size};
pub use plate::{Acquisition, Channel, Plate, Site, Well, WellLayout, ZPlane};
pub use selection::{RefreshScope, Selection, SelectionEdit, ViewerFocus};
pub use sidebar::{PlateListRow, PlateQuery};

// ===== MESSAGE TYPES =====

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum UpMsg {
    LoadConfig,
    SavePreferences(UserPreferences),
    ListPlates(PlateQuery),
    LoadPlate { barcode: String, acquisition_id: Option<String> },
    MoveToTrash { acquisition_id: String },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DownMsg {
    ConfigLoaded(AppConfig),
    ConfigSaved,
    ConfigError(String),
    PlateList(Vec<PlateListRow>),
    PlateLoaded(Plate),
    MovedToTrash { acquisition_id: String },
    /// A plate API call failed; `request` is echoed so the user can retry it.
    ApiError { error: ApiError, request: UpMsg },
}

// ===== API ERRORS =====

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiError {
    pub endpoint: String,
    /// HTTP status, absent when the request never got a response.
    pub status: Option<u16>,
    /// Raw response body or transport error message.
    pub body: String,
}

impl ApiError {
    pub fn title(&self) -> String {
        match self.status {
            Some(status) => format!("Request failed with status {status}"),
            None => "Request failed".to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} returned {status}: {}", self.endpoint, self.body),
            None => write!(f, "{} failed: {}", self.endpoint, self.body),
        }
    }
}

impl UpMsg {
    /// Short description for error dialogs.
    pub fn describe(&self) -> String {
        match self {
            Self::LoadConfig => "load configuration".to_string(),
            Self::SavePreferences(_) => "save preferences".to_string(),
            Self::ListPlates(query) if query.query.is_empty() => "list plates".to_string(),
            Self::ListPlates(query) => format!("list plates matching '{}'", query.query),
            Self::LoadPlate { barcode, .. } => format!("load plate {barcode}"),
            Self::MoveToTrash { acquisition_id } => format!("move acquisition {acquisition_id} to trash"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_text_includes_status_and_body() {
        let error = ApiError {
            endpoint: "/api/plate/P1".into(),
            status: Some(500),
            body: "db down".into(),
        };
        assert_eq!(error.to_string(), "/api/plate/P1 returned 500: db down");
        assert_eq!(error.title(), "Request failed with status 500");
    }

    #[test]
    fn messages_survive_json_transport() {
        let msg = UpMsg::LoadPlate { barcode: "P1".into(), acquisition_id: Some("3".into()) };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(serde_json::from_str::<UpMsg>(&json).unwrap(), msg);
    }
}
