//! Blocking error dialog for failed API calls and uncaught script errors.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use shared::{ApiError, UpMsg};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen::closure::Closure;
use zoon::*;

static NEXT_ALERT_ID: AtomicU64 = AtomicU64::new(1);

static ALERTS: LazyLock<MutableVec<ErrorAlert>> = LazyLock::new(MutableVec::new);

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAlert {
    pub id: u64,
    pub title: String,
    pub message: String,
    /// Raw status/body or stack trace, shown verbatim.
    pub technical_error: String,
    /// Request re-sent by the Retry button.
    pub retry: Option<UpMsg>,
}

impl ErrorAlert {
    fn next_id() -> u64 {
        NEXT_ALERT_ID.fetch_add(1, Ordering::Relaxed)
    }

    pub fn api(error: &ApiError, request: UpMsg) -> Self {
        Self {
            id: Self::next_id(),
            title: error.title(),
            message: format!("Could not {}.", request.describe()),
            technical_error: format!("{}\n\n{}", error.endpoint, error.body),
            retry: Some(request),
        }
    }

    pub fn connection(request: &UpMsg, error: String) -> Self {
        Self {
            id: Self::next_id(),
            title: "Connection Error".to_string(),
            message: format!("Could not reach the server to {}.", request.describe()),
            technical_error: error,
            retry: Some(request.clone()),
        }
    }

    pub fn config(error: String) -> Self {
        Self {
            id: Self::next_id(),
            title: "Configuration Error".to_string(),
            message: "Preferences could not be loaded or saved; defaults stay in effect.".to_string(),
            technical_error: error,
            retry: Some(UpMsg::LoadConfig),
        }
    }

    pub fn script_error(message: String, stack: String) -> Self {
        Self {
            id: Self::next_id(),
            title: "Script Error".to_string(),
            message,
            technical_error: stack,
            retry: None,
        }
    }
}

pub fn show_alert(alert: ErrorAlert) {
    zoon::println!("{}: {}\n{}", alert.title, alert.message, alert.technical_error);
    ALERTS.lock_mut().push_cloned(alert);
}

pub fn dismiss_alert(id: u64) {
    ALERTS.lock_mut().retain(|alert| alert.id != id);
}

fn retry_alert(alert: &ErrorAlert) {
    dismiss_alert(alert.id);
    if let Some(request) = alert.retry.clone() {
        crate::connection::send_up_msg(request);
    }
}

/// Oldest unresolved alert; the dialog shows one at a time.
pub fn current_alert_signal() -> impl Signal<Item = Option<ErrorAlert>> {
    ALERTS
        .signal_vec_cloned()
        .to_signal_cloned()
        .map(|alerts| alerts.first().cloned())
}

pub fn error_modal(alert: ErrorAlert) -> impl Element {
    El::new()
        .s(Width::fill())
        .s(Height::fill())
        .s(Background::new().color("rgba(0, 0, 0, 0.6)"))
        .child(
            Column::new()
                .s(Align::center())
                .s(Width::fill().max(720))
                .s(Padding::all(20))
                .s(Gap::new().y(12))
                .s(RoundedCorners::all(6))
                .s(Background::new().color("rgb(38, 38, 42)"))
                .s(Font::new().color("rgb(230, 230, 230)").size(14))
                .item(
                    El::new()
                        .s(Font::new().size(18).weight(FontWeight::Bold))
                        .child(alert.title.clone()),
                )
                .item(El::new().child(alert.message.clone()))
                .item(
                    El::new()
                        .s(Height::fill().max(400))
                        .s(Scrollbars::both())
                        .s(Padding::all(8))
                        .s(Background::new().color("rgb(24, 24, 27)"))
                        .s(Font::new().family([FontFamily::new("Fira Code"), FontFamily::new("monospace")]).size(12))
                        .update_raw_el(|raw_el| raw_el.style("white-space", "pre-wrap"))
                        .child(alert.technical_error.clone()),
                )
                .item(
                    Row::new()
                        .s(Align::new().right())
                        .s(Gap::new().x(8))
                        .item(alert.retry.is_some().then(|| {
                            let alert = alert.clone();
                            dialog_button("Retry", move || retry_alert(&alert))
                        }))
                        .item({
                            let id = alert.id;
                            dialog_button("Close", move || dismiss_alert(id))
                        }),
                ),
        )
}

fn dialog_button(label: &str, on_press: impl FnMut() + 'static) -> impl Element {
    let (hovered, hovered_signal) = Mutable::new_and_signal(false);
    Button::new()
        .s(Padding::new().x(14).y(6))
        .s(RoundedCorners::all(4))
        .s(Background::new().color_signal(
            hovered_signal.map_bool(|| "rgb(70, 110, 200)", || "rgb(55, 90, 170)"),
        ))
        .on_hovered_change(move |is_hovered| hovered.set_neq(is_hovered))
        .label(label)
        .on_press(on_press)
}

fn stack_of(value: &JsValue) -> String {
    js_sys::Reflect::get(value, &JsValue::from_str("stack"))
        .ok()
        .and_then(|stack| stack.as_string())
        .unwrap_or_default()
}

/// Routes uncaught script errors to the dialog and panics to a static overlay.
/// A panic leaves the app without a running executor, so its overlay is
/// written to the DOM directly.
pub fn install_error_hooks() {
    std::panic::set_hook(Box::new(|panic_info| {
        let stack = stack_of(&js_sys::Error::new("").into());
        let message = panic_info.to_string();
        web_sys::console::error_1(&JsValue::from_str(&format!("FRONTEND PANIC: {message}\n{stack}")));
        render_panic_overlay(&message, &stack);
    }));

    let Some(window) = web_sys::window() else {
        return;
    };
    let on_error = Closure::<dyn FnMut(web_sys::ErrorEvent)>::new(|event: web_sys::ErrorEvent| {
        show_alert(ErrorAlert::script_error(event.message(), stack_of(&event.error())));
    });
    if window
        .add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())
        .is_ok()
    {
        on_error.forget();
    }
}

fn render_panic_overlay(message: &str, stack: &str) {
    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        return;
    };
    let (Ok(overlay), Some(body)) = (document.create_element("pre"), document.body()) else {
        return;
    };
    let _ = overlay.set_attribute(
        "style",
        "position:fixed;inset:10%;z-index:1000;overflow:auto;margin:0;padding:20px;\
         background:rgb(38,38,42);color:rgb(230,230,230);border-radius:6px;white-space:pre-wrap",
    );
    overlay.set_text_content(Some(&format!("Script Error\n\n{message}\n\n{stack}")));
    let _ = body.append_child(&overlay);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_alerts_offer_retry_of_the_failed_request() {
        let request = UpMsg::LoadPlate { barcode: "P1".into(), acquisition_id: None };
        let error = ApiError {
            endpoint: "/api/plate/P1".into(),
            status: Some(502),
            body: "<html>Bad Gateway</html>".into(),
        };
        let alert = ErrorAlert::api(&error, request.clone());

        assert_eq!(alert.title, "Request failed with status 502");
        assert_eq!(alert.message, "Could not load plate P1.");
        assert!(alert.technical_error.ends_with("<html>Bad Gateway</html>"));
        assert_eq!(alert.retry, Some(request));
    }

    #[test]
    fn alert_ids_are_unique() {
        let first = ErrorAlert::script_error("boom".into(), String::new());
        let second = ErrorAlert::script_error("boom".into(), String::new());
        assert_ne!(first.id, second.id);
        assert_eq!(first.retry, None);
    }
}
