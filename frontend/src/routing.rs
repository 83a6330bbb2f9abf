//! Address bar ⇄ [`AppRoute`].

use shared::AppRoute;
use wasm_bindgen::JsValue;
use zoon::*;

fn decode_segment(segment: &str) -> String {
    js_sys::decode_uri_component(segment)
        .map(String::from)
        .unwrap_or_else(|_| segment.to_string())
}

fn encoded_path(route: &AppRoute) -> String {
    let segments: Vec<String> = route
        .segments()
        .iter()
        .map(|segment| String::from(js_sys::encode_uri_component(segment)))
        .collect();
    format!("/{}", segments.join("/"))
}

/// Route the page was opened with; unknown addresses open the home view.
pub fn current_route() -> AppRoute {
    let Some(path) = web_sys::window().and_then(|window| window.location().pathname().ok()) else {
        return AppRoute::Home;
    };
    let segments: Vec<String> = path.split('/').map(decode_segment).collect();
    AppRoute::from_segments(&segments).unwrap_or_else(|error| {
        zoon::println!("Ignoring address {path}: {error}");
        AppRoute::Home
    })
}

/// Rewrites the address without adding a history entry.
pub fn replace_route(route: &AppRoute) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let path = encoded_path(route);
    if window.location().pathname().ok().as_deref() == Some(path.as_str()) {
        return;
    }
    if let Ok(history) = window.history() {
        if let Err(error) = history.replace_state_with_url(&JsValue::NULL, "", Some(&path)) {
            zoon::println!("Failed to update address to {path}: {error:?}");
        }
    }
}
