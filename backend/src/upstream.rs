//! HTTP client for the plate API.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use shared::plate::{PlateError, parse_plate_response};
use shared::sidebar::parse_list_response;
use shared::{ApiError, Plate, PlateListRow, PlateQuery};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const LOGGED_BODY_CHARS: usize = 200;

static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
});

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid API base URL '{base}': {reason}")]
    InvalidBase { base: String, reason: String },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16, body: String },
    #[error("{endpoint} returned an unreadable plate: {source}")]
    Plate {
        endpoint: String,
        #[source]
        source: PlateError,
    },
    #[error("{endpoint} returned an unreadable plate list: {source}")]
    List {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UpstreamError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::InvalidBase { base, .. } => base,
            Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Plate { endpoint, .. }
            | Self::List { endpoint, .. } => endpoint,
        }
    }

    /// Wire form shown in the browser's error dialog.
    pub fn into_api_error(self) -> ApiError {
        let endpoint = self.endpoint().to_string();
        match self {
            Self::Status { status, body, .. } => ApiError { endpoint, status: Some(status), body },
            other => ApiError { endpoint, status: None, body: other.to_string() },
        }
    }
}

/// `base` with `segments` appended, each percent-encoded.
pub fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, UpstreamError> {
    let invalid = |reason: String| UpstreamError::InvalidBase { base: base.to_string(), reason };
    let mut url = Url::parse(base).map_err(|error| invalid(error.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub fn plate_url(base: &str, barcode: &str, acquisition_id: Option<&str>) -> Result<Url, UpstreamError> {
    match acquisition_id {
        Some(acquisition_id) => endpoint_url(base, &["api", "plate", barcode, acquisition_id]),
        None => endpoint_url(base, &["api", "plate", barcode]),
    }
}

/// Fails with the status and raw body for anything but 2xx.
pub fn check_status(endpoint: &str, status: u16, body: String) -> Result<String, UpstreamError> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(UpstreamError::Status { endpoint: endpoint.to_string(), status, body })
    }
}

fn truncated(body: &str) -> String {
    match body.char_indices().nth(LOGGED_BODY_CHARS) {
        Some((index, _)) => format!("{}…", &body[..index]),
        None => body.to_string(),
    }
}

async fn send_for_text(endpoint: &str, request: RequestBuilder) -> Result<String, UpstreamError> {
    let transport = |source| UpstreamError::Transport { endpoint: endpoint.to_string(), source };
    let response = request.send().await.map_err(transport)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport)?;

    match check_status(endpoint, status, body) {
        Ok(body) => {
            log::debug!("{endpoint} -> {status} ({} bytes)", body.len());
            Ok(body)
        }
        Err(error) => {
            if let UpstreamError::Status { body, .. } = &error {
                log::warn!("{endpoint} -> {status}: {}", truncated(body));
            }
            Err(error)
        }
    }
}

pub async fn fetch_plate(base: &str, barcode: &str, acquisition_id: Option<&str>) -> Result<Plate, UpstreamError> {
    let url = plate_url(base, barcode, acquisition_id)?;
    let endpoint = url.path().to_string();
    let body = send_for_text(&endpoint, CLIENT.get(url)).await?;
    let plate = parse_plate_response(&body, barcode).map_err(|source| UpstreamError::Plate {
        endpoint: endpoint.clone(),
        source,
    })?;
    log::info!(
        "Loaded plate {} with {} acquisitions",
        plate.barcode,
        plate.acquisitions.len()
    );
    Ok(plate)
}

pub async fn list_plates(base: &str, query: &PlateQuery) -> Result<Vec<PlateListRow>, UpstreamError> {
    let url = endpoint_url(base, &["api", "list-plates"])?;
    let endpoint = url.path().to_string();
    let request = CLIENT.post(url).form(&[("query", query.query.as_str())]);
    let body = send_for_text(&endpoint, request).await?;
    let rows = parse_list_response(&body).map_err(|source| UpstreamError::List {
        endpoint: endpoint.clone(),
        source,
    })?;
    log::info!("Listed {} plate rows for query '{}'", rows.len(), query.query);
    Ok(rows)
}

pub async fn move_to_trash(base: &str, acquisition_id: &str) -> Result<(), UpstreamError> {
    let url = endpoint_url(base, &["api", "move-to-trash", acquisition_id])?;
    let endpoint = url.path().to_string();
    send_for_text(&endpoint, CLIENT.get(url)).await?;
    log::info!("Moved acquisition {acquisition_id} to trash");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_encode_each_segment() {
        let url = plate_url("http://imagedb:8080/", "P0 17", Some("3")).unwrap();
        assert_eq!(url.as_str(), "http://imagedb:8080/api/plate/P0%2017/3");

        let url = endpoint_url("http://imagedb/prefix", &["api", "list-plates"]).unwrap();
        assert_eq!(url.path(), "/prefix/api/list-plates");
    }

    #[test]
    fn invalid_base_is_reported() {
        let error = endpoint_url("not a url", &["api"]).unwrap_err();
        assert!(matches!(error, UpstreamError::InvalidBase { .. }));
        assert_eq!(error.into_api_error().status, None);
    }

    #[test]
    fn non_success_status_keeps_raw_body() {
        assert_eq!(check_status("/api/plate/P1", 200, "{}".into()).unwrap(), "{}");

        let error = check_status("/api/plate/P1", 502, "<html>Bad Gateway</html>".into()).unwrap_err();
        let api_error = error.into_api_error();
        assert_eq!(api_error.status, Some(502));
        assert_eq!(api_error.body, "<html>Bad Gateway</html>");
        assert_eq!(api_error.endpoint, "/api/plate/P1");
    }

    #[test]
    fn decode_failures_carry_no_status() {
        let source = parse_plate_response("[]", "P1").unwrap_err();
        let error = UpstreamError::Plate { endpoint: "/api/plate/P1".into(), source };
        let api_error = error.into_api_error();
        assert_eq!(api_error.status, None);
        assert!(api_error.body.contains("not an object"));
    }

    #[test]
    fn long_bodies_are_truncated_for_logs() {
        let body = "x".repeat(500);
        assert_eq!(truncated(&body).chars().count(), LOGGED_BODY_CHARS + 1);
        assert_eq!(truncated("short"), "short");
    }
}
